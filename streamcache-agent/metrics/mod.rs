pub mod types;

pub use types::{LaneMetric, RegisterMetric};
