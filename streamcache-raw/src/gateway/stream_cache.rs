//! StreamCache top-level register block
//!
//! ## Address Map
//!
//! | Offset               | Block                                  |
//! |----------------------|----------------------------------------|
//! | 0x000                | control word (`monEnable`, `usrRst`)   |
//! | 0x080 + i * 0x20     | `MigLane[i]`                           |
//! | 0x100 + i * 0x04     | `MonClock{i}Raw`                       |
//! | 0x180 + i * 0x20     | `MigLaneDetail[i]`                     |
//!
//! The block does not check that `num_lanes` lanes fit below the next block;
//! with more than four lanes the summary lanes run into the monitor counters.

use std::sync::Arc;

use super::mig_lane::{self, LaneDests, LaneIds, LaneOccupancy, LANE_STRIDE};
use super::mon_clock::{self, MON_CLOCK_COUNT};
use crate::bus::Bus;
use crate::device::{array_name, DeviceNode};
use crate::error::{RegisterError, Result};
use crate::map::AddressMap;
use crate::register::{RegisterDescriptor, RegisterLayout, WORD_BYTES};

/// Lane count of the standard gateway build
pub const DEFAULT_NUM_LANES: usize = 4;

pub const MIG_LANE_PATTERN: &str = "MigLane[{}]";
pub const MIG_LANE_DETAIL_PATTERN: &str = "MigLaneDetail[{}]";

/// Byte offsets of the top-level blocks
pub mod offsets {
    /// Control word
    pub const CONTROL: u32 = 0x000;

    /// First `MigLane` block
    pub const MIG_LANE_BASE: u32 = 0x080;

    /// First `MigLaneDetail` block
    pub const MIG_LANE_DETAIL_BASE: u32 = 0x180;
}

pub mod names {
    pub const MON_ENABLE: &str = "monEnable";
    pub const USR_RST: &str = "usrRst";
}

/// Bytes of address space covered by a map with `num_lanes` lanes
pub fn address_span(num_lanes: usize) -> usize {
    let lanes = num_lanes as u64 * LANE_STRIDE as u64;
    let detail_end = if num_lanes == 0 {
        0
    } else {
        offsets::MIG_LANE_DETAIL_BASE as u64 + lanes
    };
    let monitor_end = mon_clock::raw_offset(MON_CLOCK_COUNT) as u64;
    detail_end.max(monitor_end).max(WORD_BYTES as u64) as usize
}

/// Build the StreamCache address map for `num_lanes` lanes
///
/// `num_lanes == 0` is valid and leaves only the control bits and the clock
/// monitors.
pub fn build(num_lanes: usize) -> Result<AddressMap> {
    build_at(num_lanes, 0)
}

/// Build the StreamCache address map placed at `base` on the bus
pub fn build_at(num_lanes: usize, base: u32) -> Result<AddressMap> {
    let mut root = DeviceNode::new("StreamCache")
        .with_description("Local RAM to Host RAM Controller")
        .at(base);

    root.add_register(
        RegisterDescriptor::rw(names::MON_ENABLE, offsets::CONTROL, 1, 0)?
            .with_description("Enable lane monitoring"),
    )?;
    root.add_register(
        RegisterDescriptor::rw(names::USR_RST, offsets::CONTROL, 1, 1)?
            .with_description("User reset"),
    )?;

    root.instantiate_array(
        num_lanes,
        MIG_LANE_PATTERN,
        offsets::MIG_LANE_BASE,
        LANE_STRIDE,
        |_| mig_lane::mig_lane(),
    )?;
    root.instantiate_array(
        num_lanes,
        MIG_LANE_DETAIL_PATTERN,
        offsets::MIG_LANE_DETAIL_BASE,
        LANE_STRIDE,
        |_| mig_lane::mig_lane_detail(),
    )?;

    let mut derived = Vec::with_capacity(MON_CLOCK_COUNT);
    for index in 0..MON_CLOCK_COUNT {
        let raw = mon_clock::raw_counter(index)?;
        let raw_path = raw.name().to_string();
        root.add_register(raw)?;
        derived.push(mon_clock::frequency(index, raw_path)?);
    }

    AddressMap::new(root, derived)
}

/// Control word layout (`monEnable` bit 0, `usrRst` bit 1)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlWord {
    pub mon_enable: bool,
    pub usr_rst: bool,
}

impl RegisterLayout for ControlWord {
    fn to_word(&self) -> u32 {
        (self.mon_enable as u32) | ((self.usr_rst as u32) << 1)
    }

    fn from_word(word: u32) -> Self {
        Self {
            mon_enable: (word & 0b01) != 0,
            usr_rst: (word & 0b10) != 0,
        }
    }
}

/// Snapshot of one `MigLane` block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneStatus {
    pub block_size: u8,
    pub blocks_pause: u16,
    pub occupancy: LaneOccupancy,
    pub write_queue_count: u8,
    pub write_index: u16,
    pub write_commit_index: u16,
    pub read_index: u16,
}

/// Snapshot of one `MigLaneDetail` block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneDetail {
    pub ids: LaneIds,
    pub dests: LaneDests,
}

/// Typed access to a StreamCache instance
pub struct StreamCache {
    map: AddressMap,
    num_lanes: usize,
}

impl StreamCache {
    pub fn new(num_lanes: usize) -> Result<Self> {
        Self::with_base(num_lanes, 0)
    }

    pub fn with_base(num_lanes: usize, base: u32) -> Result<Self> {
        Ok(Self {
            map: build_at(num_lanes, base)?,
            num_lanes,
        })
    }

    /// Build and attach `bus` in one step
    pub fn connect(num_lanes: usize, bus: Arc<dyn Bus>) -> Result<Self> {
        let mut cache = Self::new(num_lanes)?;
        cache.attach(bus);
        Ok(cache)
    }

    pub fn attach(&mut self, bus: Arc<dyn Bus>) {
        self.map.attach(bus);
    }

    pub fn map(&self) -> &AddressMap {
        &self.map
    }

    pub fn num_lanes(&self) -> usize {
        self.num_lanes
    }

    fn lane_path(&self, pattern: &str, lane: usize, field: &str) -> Result<String> {
        if lane >= self.num_lanes {
            return Err(RegisterError::NoSuchLane {
                lane,
                num_lanes: self.num_lanes,
            });
        }
        Ok(format!("{}.{}", array_name(pattern, lane), field))
    }

    fn lane_field(&self, lane: usize, field: &str) -> Result<u32> {
        let path = self.lane_path(MIG_LANE_PATTERN, lane, field)?;
        self.map.read(&path)
    }

    pub fn control(&self) -> Result<ControlWord> {
        self.map.read_layout(names::MON_ENABLE)
    }

    /// Write both control bits in a single bus transaction
    pub fn set_control(&self, control: ControlWord) -> Result<()> {
        self.map.write_layout(names::MON_ENABLE, &control)
    }

    pub fn monitor_enabled(&self) -> Result<bool> {
        Ok(self.map.read(names::MON_ENABLE)? != 0)
    }

    pub fn set_monitor_enabled(&self, enable: bool) -> Result<()> {
        self.map.write(names::MON_ENABLE, enable as u32)
    }

    /// Pulse `usrRst`: assert, then release
    pub fn user_reset(&self) -> Result<()> {
        tracing::info!("Pulsing StreamCache user reset");
        self.map.write(names::USR_RST, 1)?;
        self.map.write(names::USR_RST, 0)
    }

    pub fn set_block_size(&self, lane: usize, block_size: u32) -> Result<()> {
        let path = self.lane_path(MIG_LANE_PATTERN, lane, mig_lane::names::BLOCK_SIZE)?;
        self.map.write(&path, block_size)
    }

    pub fn set_blocks_pause(&self, lane: usize, blocks: u32) -> Result<()> {
        let path = self.lane_path(MIG_LANE_PATTERN, lane, mig_lane::names::BLOCKS_PAUSE)?;
        self.map.write(&path, blocks)
    }

    pub fn lane_status(&self, lane: usize) -> Result<LaneStatus> {
        use super::mig_lane::names;

        let occupancy_path = self.lane_path(MIG_LANE_PATTERN, lane, names::BLOCKS_FREE)?;

        Ok(LaneStatus {
            block_size: self.lane_field(lane, names::BLOCK_SIZE)? as u8,
            blocks_pause: self.lane_field(lane, names::BLOCKS_PAUSE)? as u16,
            occupancy: self.map.read_layout(&occupancy_path)?,
            write_queue_count: self.lane_field(lane, names::WRITE_QUEUE_COUNT)? as u8,
            write_index: self.lane_field(lane, names::WR_INDEX)? as u16,
            write_commit_index: self.lane_field(lane, names::WC_INDEX)? as u16,
            read_index: self.lane_field(lane, names::RD_INDEX)? as u16,
        })
    }

    pub fn lane_detail(&self, lane: usize) -> Result<LaneDetail> {
        let ids = self.lane_path(MIG_LANE_DETAIL_PATTERN, lane, mig_lane::names::WID)?;
        let dests = self.lane_path(MIG_LANE_DETAIL_PATTERN, lane, mig_lane::names::WDEST)?;

        Ok(LaneDetail {
            ids: self.map.read_layout(&ids)?,
            dests: self.map.read_layout(&dests)?,
        })
    }

    /// Frequency of monitored clock `index` in MHz
    pub fn clock_frequency_mhz(&self, index: usize) -> Result<f64> {
        self.map.evaluate(&mon_clock::frequency_name(index))
    }
}
