// StreamCache Metrics Exporter

use prometheus::{Gauge, Opts, Registry};
use std::collections::HashMap;
use std::sync::Arc;

use streamcache_raw::gateway::StreamCache;
use streamcache_raw::PollTarget;

use crate::error::Result;
use crate::metrics::{LaneMetric, RegisterMetric};

pub struct StreamCacheMetricExporter {
    cache: Arc<StreamCache>,
    registry: Arc<Registry>,
    lane_gauges: HashMap<LaneMetric, Vec<Gauge>>,
    monitor_enabled: Gauge,
    poll_gauges: Vec<(PollTarget, Gauge)>,
    derived_gauges: HashMap<String, Gauge>,
}

impl StreamCacheMetricExporter {
    pub fn new(cache: Arc<StreamCache>) -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let monitor_enabled = Gauge::with_opts(Opts::new(
            RegisterMetric::MonitorEnabled.name(),
            RegisterMetric::MonitorEnabled.help(),
        ))?;
        registry.register(Box::new(monitor_enabled.clone()))?;

        let mut exporter = Self {
            cache,
            registry,
            lane_gauges: HashMap::new(),
            monitor_enabled,
            poll_gauges: Vec::new(),
            derived_gauges: HashMap::new(),
        };

        exporter.register_metrics()?;

        Ok(exporter)
    }

    fn register_metrics(&mut self) -> Result<()> {
        for &metric in LaneMetric::ALL {
            let opts = Opts::new(metric.name(), metric.help());

            let mut lanes = Vec::with_capacity(self.cache.num_lanes());
            for lane in 0..self.cache.num_lanes() {
                let gauge = Gauge::with_opts(opts.clone().const_label("lane", lane.to_string()))?;
                self.registry.register(Box::new(gauge.clone()))?;
                lanes.push(gauge);
            }
            self.lane_gauges.insert(metric, lanes);
        }

        let polled = Opts::new(
            RegisterMetric::PolledRegister.name(),
            RegisterMetric::PolledRegister.help(),
        );
        for target in self.cache.map().poll_targets() {
            let gauge = Gauge::with_opts(polled.clone().const_label("register", target.path.clone()))?;
            self.registry.register(Box::new(gauge.clone()))?;
            self.poll_gauges.push((target, gauge));
        }

        let derived = Opts::new(
            RegisterMetric::DerivedValue.name(),
            RegisterMetric::DerivedValue.help(),
        );
        for value in self.cache.map().derived_values() {
            let gauge = Gauge::with_opts(
                derived
                    .clone()
                    .const_label("name", value.name())
                    .const_label("units", value.units().unwrap_or("")),
            )?;
            self.registry.register(Box::new(gauge.clone()))?;
            self.derived_gauges.insert(value.name().to_string(), gauge);
        }

        tracing::info!(
            "Registered StreamCache metrics: {} lanes, {} polled registers, {} derived values",
            self.cache.num_lanes(),
            self.poll_gauges.len(),
            self.derived_gauges.len()
        );

        Ok(())
    }

    fn set_lane(&self, metric: LaneMetric, lane: usize, value: f64) {
        if let Some(gauge) = self.lane_gauges.get(&metric).and_then(|g| g.get(lane)) {
            gauge.set(value);
        }
    }

    /// Refresh every gauge once; returns the number of failed reads
    ///
    /// Registers declaring a poll interval are only read on ticks that are a
    /// multiple of their interval.
    pub fn poll(&self, tick: u64) -> usize {
        let mut failures = 0;

        for (target, gauge) in &self.poll_gauges {
            if tick % target.interval.max(1) as u64 != 0 {
                continue;
            }
            match self.cache.map().read(&target.path) {
                Ok(raw) => gauge.set(raw as f64),
                Err(e) => {
                    failures += 1;
                    tracing::error!("Failed to poll {}: {}", target.path, e);
                }
            }
        }

        for reading in self.cache.map().derived_readings() {
            match reading.value {
                Ok(value) => {
                    if let Some(gauge) = self.derived_gauges.get(&reading.name) {
                        gauge.set(value);
                    }
                }
                Err(e) => {
                    failures += 1;
                    tracing::error!("Failed to evaluate {}: {}", reading.name, e);
                }
            }
        }

        match self.cache.monitor_enabled() {
            Ok(enabled) => self.monitor_enabled.set(if enabled { 1.0 } else { 0.0 }),
            Err(e) => {
                failures += 1;
                tracing::error!("Failed to read monitor enable: {}", e);
            }
        }

        for lane in 0..self.cache.num_lanes() {
            match self.cache.lane_status(lane) {
                Ok(status) => {
                    self.set_lane(LaneMetric::BlockSize, lane, status.block_size as f64);
                    self.set_lane(LaneMetric::BlocksPause, lane, status.blocks_pause as f64);
                    self.set_lane(
                        LaneMetric::BlocksFree,
                        lane,
                        status.occupancy.blocks_free as f64,
                    );
                    self.set_lane(
                        LaneMetric::BlocksQueued,
                        lane,
                        status.occupancy.blocks_queued as f64,
                    );
                    self.set_lane(
                        LaneMetric::WriteQueueCount,
                        lane,
                        status.write_queue_count as f64,
                    );
                    self.set_lane(LaneMetric::WriteIndex, lane, status.write_index as f64);
                    self.set_lane(
                        LaneMetric::WriteCommitIndex,
                        lane,
                        status.write_commit_index as f64,
                    );
                    self.set_lane(LaneMetric::ReadIndex, lane, status.read_index as f64);
                }
                Err(e) => {
                    failures += 1;
                    tracing::error!("Failed to read status of lane {}: {}", lane, e);
                }
            }
        }

        failures
    }

    /// Collect metrics once (called by orchestrator)
    pub async fn collect(&self, tick: u64) {
        let failures = self.poll(tick);
        if failures > 0 {
            tracing::warn!("StreamCache poll tick {} had {} failed reads", tick, failures);
        }
    }

    pub fn cache(&self) -> Arc<StreamCache> {
        Arc::clone(&self.cache)
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }
}
