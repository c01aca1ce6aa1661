// Poll loop for the StreamCache exporter
// Drives register polling on a fixed tick until cancelled

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use streamcache_raw::gateway::StreamCache;

use crate::config::ExportConfig;
use crate::prom::StreamCacheMetricExporter;

pub struct MetricCollector {
    interval: Duration,
    exporter: Arc<StreamCacheMetricExporter>,
}

impl MetricCollector {
    pub fn new(config: &ExportConfig, cache: Arc<StreamCache>) -> crate::error::Result<Self> {
        let exporter = Arc::new(StreamCacheMetricExporter::new(cache)?);
        tracing::info!("StreamCache exporter initialized");

        Ok(Self {
            interval: config.poll_interval,
            exporter,
        })
    }

    /// Start the collection loop
    pub fn start(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tracing::warn!(
            "Starting StreamCache poll loop every {:?}",
            self.interval
        );

        tokio::spawn(async move {
            self.collection_loop(cancel_token).await;
        })
    }

    /// One poll tick per interval; registers pick their ticks by poll interval
    async fn collection_loop(self, cancel_token: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        let mut tick: u64 = 0;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    tracing::info!("Poll loop stopped after {} ticks", tick);
                    break;
                }
                _ = interval.tick() => {
                    self.exporter.collect(tick).await;
                    tick = tick.wrapping_add(1);
                }
            }
        }
    }

    /// Get a reference to the exporter for the metrics handler
    pub fn exporter(&self) -> Arc<StreamCacheMetricExporter> {
        Arc::clone(&self.exporter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::open_bus;
    use crate::config::TransportConfig;

    #[tokio::test]
    async fn test_loop_stops_on_cancel() {
        let mut config = ExportConfig::new(TransportConfig::Simulated, 1);
        config.poll_interval = Duration::from_millis(5);

        let bus = open_bus(&config).unwrap();
        let cache = Arc::new(StreamCache::connect(1, bus).unwrap());
        let collector = MetricCollector::new(&config, cache).unwrap();
        let exporter = collector.exporter();

        let token = CancellationToken::new();
        let handle = collector.start(token.clone());
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        handle.await.unwrap();

        let families = exporter.registry().gather();
        assert!(families
            .iter()
            .any(|mf| mf.get_name() == "streamcache_derived_value"));
    }
}
