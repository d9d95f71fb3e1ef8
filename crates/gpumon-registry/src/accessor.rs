//! Label accessors: per-label functions that read a value off an entity.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use gpumon_core::LabelValue;

use crate::error::AccessorError;

/// Resolves one label dimension for an entity.
///
/// Implementations are stateless; the entity is only passed through.
pub trait Accessor<E: ?Sized>: Send + Sync {
    fn resolve(&self, entity: &E) -> anyhow::Result<LabelValue>;
}

impl<E: ?Sized, F> Accessor<E> for F
where
    F: Fn(&E) -> anyhow::Result<LabelValue> + Send + Sync,
{
    fn resolve(&self, entity: &E) -> anyhow::Result<LabelValue> {
        self(entity)
    }
}

/// Label name → accessor. One accessor per label; the last one added wins.
pub struct AccessorRegistry<E: ?Sized> {
    accessors: RwLock<HashMap<String, Arc<dyn Accessor<E>>>>,
}

impl<E: ?Sized> AccessorRegistry<E> {
    pub fn new() -> Self {
        Self {
            accessors: RwLock::new(HashMap::new()),
        }
    }

    /// Store the accessor for a label, replacing any previous one.
    pub fn add_accessor<A>(&self, label: &str, accessor: A)
    where
        A: Accessor<E> + 'static,
    {
        let mut accessors = self.accessors.write().expect("accessors lock");
        if accessors
            .insert(label.to_string(), Arc::new(accessor))
            .is_some()
        {
            debug!(label, "accessor replaced");
        } else {
            debug!(label, "accessor added");
        }
    }

    /// Store a closure as the accessor for a label.
    pub fn add_fn<F>(&self, label: &str, f: F)
    where
        F: Fn(&E) -> anyhow::Result<LabelValue> + Send + Sync + 'static,
    {
        self.add_accessor(label, f);
    }

    /// Resolve a label for an entity into its display string.
    pub fn resolve(&self, label: &str, entity: &E) -> Result<String, AccessorError> {
        // Clone the accessor out so it never runs under the lock.
        let accessor = self
            .accessors
            .read()
            .expect("accessors lock")
            .get(label)
            .cloned()
            .ok_or_else(|| AccessorError::NotFound(label.to_string()))?;

        accessor
            .resolve(entity)
            .map(|value| value.to_string())
            .map_err(|source| AccessorError::Failed {
                label: label.to_string(),
                source,
            })
    }

    pub fn contains(&self, label: &str) -> bool {
        self.accessors
            .read()
            .expect("accessors lock")
            .contains_key(label)
    }

    /// Registered label names, sorted.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .accessors
            .read()
            .expect("accessors lock")
            .keys()
            .cloned()
            .collect();
        labels.sort();
        labels
    }
}

impl<E: ?Sized> Default for AccessorRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
