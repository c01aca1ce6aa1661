pub mod stream_cache;

pub use stream_cache::StreamCacheMetricExporter;
