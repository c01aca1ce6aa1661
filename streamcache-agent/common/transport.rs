use std::sync::Arc;

use streamcache_raw::gateway::mig_lane::{self, LaneOccupancy, LANE_STRIDE};
use streamcache_raw::gateway::mon_clock::{self, MON_CLOCK_COUNT};
use streamcache_raw::gateway::stream_cache::offsets;
use streamcache_raw::{Bus, DevMemBus, MemoryBus, RegisterLayout};

use crate::common::mmio::MmapBus;
use crate::config::{ExportConfig, TransportConfig};
use crate::error::{AgentError, Result};

/// Nominal clock counts reported by the simulated monitors (Hz)
const SIMULATED_CLOCKS: [u32; MON_CLOCK_COUNT] =
    [125_000_000, 156_250_000, 200_000_000, 250_000_000];

/// Open the bus transport selected by `config`
pub fn open_bus(config: &ExportConfig) -> Result<Arc<dyn Bus>> {
    match &config.transport {
        TransportConfig::Simulated => {
            let size = config.transport.window_size(config.num_lanes, config.base);
            let bus = MemoryBus::new(size);
            seed_simulation(&bus, config.base, config.num_lanes)?;
            tracing::warn!("Using simulated StreamCache ({} bytes)", size);
            Ok(Arc::new(bus))
        }
        TransportConfig::DevMem { path, offset, size } => {
            Ok(Arc::new(DevMemBus::open(path, *offset, *size)?))
        }
        TransportConfig::Mmap { path, offset, size } => {
            Ok(Arc::new(MmapBus::open(path, *offset, *size)?))
        }
    }
}

fn bus_address(base: u32, offset: u32) -> Result<u32> {
    base.checked_add(offset).ok_or_else(|| {
        AgentError::ConfigError(format!(
            "simulated register 0x{base:x} + 0x{offset:x} exceeds the 32-bit address space"
        ))
    })
}

/// Fill a simulated bus with an idle gateway: empty lanes and running clocks
pub fn seed_simulation(bus: &MemoryBus, base: u32, num_lanes: usize) -> Result<()> {
    for (index, &hz) in SIMULATED_CLOCKS.iter().enumerate() {
        bus.poke(bus_address(base, mon_clock::raw_offset(index))?, hz);
    }

    let idle = LaneOccupancy {
        blocks_free: 0x1FF,
        blocks_queued: 0,
    };
    for lane in 0..num_lanes as u32 {
        let stride = lane.saturating_mul(LANE_STRIDE);
        let lane_base = bus_address(bus_address(base, offsets::MIG_LANE_BASE)?, stride)?;
        bus.poke(bus_address(lane_base, mig_lane::offsets::OCCUPANCY)?, idle.to_word());

        let detail_base = bus_address(bus_address(base, offsets::MIG_LANE_DETAIL_BASE)?, stride)?;
        bus.poke(
            bus_address(detail_base, mig_lane::offsets::IDS)?,
            lane | (lane << 8) | (lane << 16),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamcache_raw::gateway::StreamCache;

    #[test]
    fn test_simulated_bus_reads_back_clocks() {
        let config = ExportConfig::new(TransportConfig::Simulated, 2);
        let bus = open_bus(&config).unwrap();

        let cache = StreamCache::connect(2, bus).unwrap();
        assert!((cache.clock_frequency_mhz(1).unwrap() - 156.25).abs() < 1e-9);

        let status = cache.lane_status(1).unwrap();
        assert_eq!(status.occupancy.blocks_free, 0x1FF);
        assert_eq!(cache.lane_detail(1).unwrap().ids.vid, 1);
    }

    #[test]
    fn test_seed_rejects_wrapping_base() {
        let bus = MemoryBus::new(0x200);
        assert!(matches!(
            seed_simulation(&bus, 0xFFFF_FF00, 4),
            Err(AgentError::ConfigError(_))
        ));
        assert!(seed_simulation(&bus, 0, 4).is_ok());
        assert_eq!(bus.peek(0x100), 125_000_000);
    }

    #[test]
    fn test_missing_device_fails() {
        let config = ExportConfig::new(
            TransportConfig::DevMem {
                path: "/nonexistent/resource0".into(),
                offset: 0,
                size: 0x1000,
            },
            4,
        );
        assert!(open_bus(&config).is_err());
    }
}
