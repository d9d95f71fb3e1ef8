//! Metric declaration parser.
//!
//! Declarations are read from TOML (default) or JSON:
//!
//! ```toml
//! [[metrics]]
//! name = "gpu_temperature"
//! help = "Temperature of the GPU in degrees Celsius."
//! type = "gauge"
//! labels = { label1 = "gpu_id", label2 = "gpu_name" }
//! ```
//!
//! `labels` may also be a plain list (`labels = ["gpu_id", "gpu_name"]`).
//! Both forms are flattened into a set of label names.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};

/// The kind of observable a declaration produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
}

impl FromStr for MetricKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("gauge") {
            Ok(MetricKind::Gauge)
        } else {
            Err(())
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Gauge => f.write_str("gauge"),
        }
    }
}

/// Unit a byte-valued reading is reported in.
///
/// Only applied when a declaration asks for it; readings are otherwise
/// exposed exactly as the device reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "bytes", alias = "B")]
    Bytes,
    #[serde(alias = "kib")]
    KiB,
    #[serde(alias = "mib")]
    MiB,
    #[serde(alias = "gib")]
    GiB,
}

impl Unit {
    /// Divisor applied to a raw byte reading.
    pub fn divisor(&self) -> f64 {
        match self {
            Unit::Bytes => 1.0,
            Unit::KiB => 1024.0,
            Unit::MiB => 1024.0 * 1024.0,
            Unit::GiB => 1024.0 * 1024.0 * 1024.0,
        }
    }

    /// Convert a raw byte reading into this unit.
    pub fn convert(&self, raw: f64) -> f64 {
        raw / self.divisor()
    }
}

/// A validated metric declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSchema {
    pub name: String,
    pub help: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub labels: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
}

impl MetricSchema {
    /// Build a gauge declaration in code.
    pub fn gauge<I, S>(name: &str, help: &str, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            kind: MetricKind::Gauge,
            labels: labels.into_iter().map(Into::into).collect(),
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Label names in canonical (sorted) order.
    pub fn label_names(&self) -> Vec<&str> {
        self.labels.iter().map(String::as_str).collect()
    }

    /// Apply the declared unit, if any, to a raw reading.
    pub fn scale(&self, raw: f64) -> f64 {
        match self.unit {
            Some(unit) => unit.convert(raw),
            None => raw,
        }
    }
}

/// Format of a declaration source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Toml,
    Json,
}

impl SourceFormat {
    /// Pick a format from a file extension. Anything but `.json` is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SourceFormat::Json,
            _ => SourceFormat::Toml,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Declarations {
    #[serde(default)]
    metrics: Vec<Declaration>,
}

#[derive(Debug, Deserialize)]
struct Declaration {
    name: String,
    help: String,
    #[serde(rename = "type", alias = "kind")]
    kind: String,
    #[serde(default)]
    labels: LabelSpec,
    #[serde(default)]
    unit: Option<Unit>,
}

/// The two accepted shapes of a `labels` field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LabelSpec {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl Default for LabelSpec {
    fn default() -> Self {
        LabelSpec::List(Vec::new())
    }
}

impl LabelSpec {
    fn into_names(self) -> Vec<String> {
        match self {
            LabelSpec::List(names) => names,
            LabelSpec::Map(map) => map.into_values().collect(),
        }
    }
}

/// Parse declarations from an in-memory string.
pub fn load_str(source: &str, format: SourceFormat) -> SchemaResult<Vec<MetricSchema>> {
    let decls: Declarations = match format {
        SourceFormat::Toml => toml::from_str(source)?,
        SourceFormat::Json => serde_json::from_str(source)?,
    };

    if decls.metrics.is_empty() {
        return Err(SchemaError::NoMetrics);
    }

    decls.metrics.into_iter().map(validate).collect()
}

/// Parse declarations from any byte source.
pub fn load_reader<R: Read>(mut reader: R, format: SourceFormat) -> SchemaResult<Vec<MetricSchema>> {
    let mut source = String::new();
    reader
        .read_to_string(&mut source)
        .map_err(|source| SchemaError::Read {
            path: "<reader>".to_string(),
            source,
        })?;
    load_str(&source, format)
}

/// Parse declarations from a file; the format follows the extension.
pub fn load_file(path: &Path) -> SchemaResult<Vec<MetricSchema>> {
    let source = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
        path: path.display().to_string(),
        source,
    })?;
    load_str(&source, SourceFormat::from_path(path))
}

fn validate(decl: Declaration) -> SchemaResult<MetricSchema> {
    if !is_valid_metric_name(&decl.name) {
        return Err(SchemaError::InvalidMetricName(decl.name));
    }

    if decl.help.trim().is_empty() {
        return Err(SchemaError::MissingHelp(decl.name));
    }

    let kind = decl
        .kind
        .parse::<MetricKind>()
        .map_err(|_| SchemaError::UnsupportedKind {
            metric: decl.name.clone(),
            kind: decl.kind.clone(),
        })?;

    let mut labels = BTreeSet::new();
    for label in decl.labels.into_names() {
        if !is_valid_label_name(&label) {
            return Err(SchemaError::InvalidLabelName {
                metric: decl.name,
                label,
            });
        }
        if labels.contains(&label) {
            return Err(SchemaError::DuplicateLabel {
                metric: decl.name,
                label,
            });
        }
        labels.insert(label);
    }

    Ok(MetricSchema {
        name: decl.name,
        help: decl.help,
        kind,
        labels,
        unit: decl.unit,
    })
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, excluding the reserved `__` prefix.
pub fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
