//! gpumon-metrics: sample collection and exposition.
//!
//! # Architecture
//!
//! ```text
//! SampleCollector
//!   ├── collect_once() → one pass: devices × declared catalogue metrics
//!   └── run()          → periodic pass loop until shutdown
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for the /metrics endpoint
//! ```

pub mod collector;
pub mod error;
pub mod exposition;

pub use collector::{PassSummary, SampleCollector, PROCESSED_OPS_METRIC};
pub use error::SampleError;
pub use exposition::{render_prometheus, CONTENT_TYPE};
