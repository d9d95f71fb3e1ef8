//! gpumon-registry: the dynamic metric registry and label-resolution engine.
//!
//! # Architecture
//!
//! ```text
//! MetricRegistry          (name → Observable, published to a prometheus::Registry)
//!   ├── register() / load_all()   ← once at startup, idempotent
//!   ├── lookup() / is_declared()  ← every collection pass
//!   └── gather()                  → exposition
//!
//! AccessorRegistry<E>     (label name → Accessor<E>)
//!   └── resolve(label, &E) → String
//!
//! LabelResolver<E>
//!   └── resolve_labels(metric, &E) → LabelSet  (schema labels × accessors)
//! ```
//!
//! `E` is the entity handle type supplied by the hardware layer. Nothing in
//! this crate inspects it beyond passing it to accessors.

pub mod accessor;
pub mod error;
pub mod metrics;
pub mod resolver;

pub use accessor::{Accessor, AccessorRegistry};
pub use error::{AccessorError, RegistryError, RegistryResult};
pub use metrics::{MetricRegistry, Observable};
pub use resolver::LabelResolver;
