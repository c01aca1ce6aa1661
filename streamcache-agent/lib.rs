// Macros (must be first for visibility)
#[macro_use]
pub mod macros;

pub mod common;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod prom;

pub use config::{ExportConfig, TransportConfig};
pub use error::{AgentError, Result};
pub use orchestrator::MetricCollector;
pub use prom::StreamCacheMetricExporter;
