//! MIG lane register definitions
//!
//! Each lane has a summary block (`MigLane`) and a detail block
//! (`MigLaneDetail`), both 0x20 bytes wide.

use crate::device::DeviceNode;
use crate::error::Result;
use crate::register::{RegisterDescriptor, RegisterLayout};

/// Size of one lane block in bytes
pub const LANE_STRIDE: u32 = 0x20;

/// Bit width of the ring-buffer index and occupancy fields
pub const BLOCK_INDEX_BITS: u8 = 9;

/// Byte offsets inside a `MigLane` block
pub mod offsets {
    /// Block size select
    pub const BLOCK_SIZE: u32 = 0x000;

    /// Pause threshold in blocks (bits 8-16)
    pub const BLOCKS_PAUSE: u32 = 0x004;

    /// Free and queued block counts
    pub const OCCUPANCY: u32 = 0x008;

    /// Write queue depth
    pub const WRITE_QUEUE: u32 = 0x00C;

    /// Ring write index
    pub const WR_INDEX: u32 = 0x010;

    /// Ring write-commit index
    pub const WC_INDEX: u32 = 0x014;

    /// Ring read index
    pub const RD_INDEX: u32 = 0x018;

    /// Write-side AXI stream identifiers (`MigLaneDetail`)
    pub const IDS: u32 = 0x000;

    /// Read-side AXI stream destinations (`MigLaneDetail`)
    pub const DESTS: u32 = 0x004;
}

/// Field names, as used in register paths
pub mod names {
    pub const BLOCK_SIZE: &str = "blockSize";
    pub const BLOCKS_PAUSE: &str = "blocksPause";
    pub const BLOCKS_FREE: &str = "blocksFree";
    pub const BLOCKS_QUEUED: &str = "blocksQueued";
    pub const WRITE_QUEUE_COUNT: &str = "writeQueCnt";
    pub const WR_INDEX: &str = "wrIndex";
    pub const WC_INDEX: &str = "wcIndex";
    pub const RD_INDEX: &str = "rdIndex";

    pub const WID: &str = "wid";
    pub const RID: &str = "rid";
    pub const VID: &str = "vid";
    pub const WDEST: &str = "wdest";
    pub const RDEST: &str = "rdest";
    pub const VDEST: &str = "vdest";
}

/// Build one `MigLane` summary block
pub fn mig_lane() -> Result<DeviceNode> {
    let mut lane = DeviceNode::new("MigLane").with_description("RAM Controller");

    lane.add_register(RegisterDescriptor::rw(names::BLOCK_SIZE, offsets::BLOCK_SIZE, 4, 0)?)?;
    lane.add_register(RegisterDescriptor::rw(
        names::BLOCKS_PAUSE,
        offsets::BLOCKS_PAUSE,
        BLOCK_INDEX_BITS,
        8,
    )?)?;
    lane.add_register(RegisterDescriptor::ro(
        names::BLOCKS_FREE,
        offsets::OCCUPANCY,
        BLOCK_INDEX_BITS,
        0,
    )?)?;
    lane.add_register(RegisterDescriptor::ro(
        names::BLOCKS_QUEUED,
        offsets::OCCUPANCY,
        BLOCK_INDEX_BITS,
        12,
    )?)?;
    lane.add_register(RegisterDescriptor::ro(
        names::WRITE_QUEUE_COUNT,
        offsets::WRITE_QUEUE,
        8,
        0,
    )?)?;
    lane.add_register(RegisterDescriptor::ro(
        names::WR_INDEX,
        offsets::WR_INDEX,
        BLOCK_INDEX_BITS,
        0,
    )?)?;
    lane.add_register(RegisterDescriptor::ro(
        names::WC_INDEX,
        offsets::WC_INDEX,
        BLOCK_INDEX_BITS,
        0,
    )?)?;
    lane.add_register(RegisterDescriptor::ro(
        names::RD_INDEX,
        offsets::RD_INDEX,
        BLOCK_INDEX_BITS,
        0,
    )?)?;

    Ok(lane)
}

/// Build one `MigLaneDetail` block
pub fn mig_lane_detail() -> Result<DeviceNode> {
    let mut detail = DeviceNode::new("MigLaneDetail").with_description("RAM Controller");

    for (name, bit_offset) in [(names::WID, 0), (names::RID, 8), (names::VID, 16)] {
        detail.add_register(RegisterDescriptor::ro(name, offsets::IDS, 8, bit_offset)?)?;
    }
    for (name, bit_offset) in [(names::WDEST, 0), (names::RDEST, 8), (names::VDEST, 16)] {
        detail.add_register(RegisterDescriptor::ro(name, offsets::DESTS, 8, bit_offset)?)?;
    }

    Ok(detail)
}

/// Lane occupancy word layout
///
/// ## Register Format
///
/// | Bits   | Field         | Description                   |
/// |--------|---------------|-------------------------------|
/// | 0-8    | blocks_free   | Free DDR blocks               |
/// | 9-11   | reserved      |                               |
/// | 12-20  | blocks_queued | Blocks waiting for the host   |
/// | 21-31  | reserved      |                               |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneOccupancy {
    pub blocks_free: u16,
    pub blocks_queued: u16,
}

impl RegisterLayout for LaneOccupancy {
    fn to_word(&self) -> u32 {
        (self.blocks_free as u32 & 0x1FF) | ((self.blocks_queued as u32 & 0x1FF) << 12)
    }

    fn from_word(word: u32) -> Self {
        Self {
            blocks_free: (word & 0x1FF) as u16,
            blocks_queued: ((word >> 12) & 0x1FF) as u16,
        }
    }

    fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.blocks_free > 0x1FF || self.blocks_queued > 0x1FF {
            return Err("Block counts must be <= 511 (9 bits)");
        }
        Ok(())
    }
}

/// Write-side stream identifier word (`wid`, `rid`, `vid` at bits 0/8/16)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneIds {
    pub wid: u8,
    pub rid: u8,
    pub vid: u8,
}

impl RegisterLayout for LaneIds {
    fn to_word(&self) -> u32 {
        self.wid as u32 | ((self.rid as u32) << 8) | ((self.vid as u32) << 16)
    }

    fn from_word(word: u32) -> Self {
        Self {
            wid: (word & 0xFF) as u8,
            rid: ((word >> 8) & 0xFF) as u8,
            vid: ((word >> 16) & 0xFF) as u8,
        }
    }
}

/// Read-side stream destination word (`wdest`, `rdest`, `vdest` at bits 0/8/16)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneDests {
    pub wdest: u8,
    pub rdest: u8,
    pub vdest: u8,
}

impl RegisterLayout for LaneDests {
    fn to_word(&self) -> u32 {
        self.wdest as u32 | ((self.rdest as u32) << 8) | ((self.vdest as u32) << 16)
    }

    fn from_word(word: u32) -> Self {
        Self {
            wdest: (word & 0xFF) as u8,
            rdest: ((word >> 8) & 0xFF) as u8,
            vdest: ((word >> 16) & 0xFF) as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_field_layout() {
        let lane = mig_lane().unwrap();
        let fields: Vec<(String, u32, u8, u8)> = lane
            .registers()
            .map(|r| {
                let r = r.unwrap();
                (
                    r.path,
                    r.address,
                    r.descriptor.bit_width(),
                    r.descriptor.bit_offset(),
                )
            })
            .collect();

        assert_eq!(fields.len(), 8);
        assert_eq!(fields[0], ("blockSize".to_string(), 0x00, 4, 0));
        assert_eq!(fields[1], ("blocksPause".to_string(), 0x04, 9, 8));
        assert_eq!(fields[3], ("blocksQueued".to_string(), 0x08, 9, 12));
        assert_eq!(fields[7], ("rdIndex".to_string(), 0x18, 9, 0));
    }

    #[test]
    fn test_detail_fields_are_read_only() {
        let detail = mig_lane_detail().unwrap();
        assert_eq!(detail.registers().count(), 6);
        assert!(detail
            .registers()
            .all(|r| !r.unwrap().descriptor.mode().is_writable()));
        assert_eq!(detail.find("vdest").unwrap().address, 0x04);
    }

    #[test]
    fn test_occupancy_round_trip() {
        let occ = LaneOccupancy {
            blocks_free: 0x1F0,
            blocks_queued: 0x00F,
        };
        let word = occ.to_word();
        assert_eq!(word, 0x0000_F1F0);
        assert_eq!(LaneOccupancy::from_word(word), occ);
        assert!(LaneOccupancy {
            blocks_free: 512,
            blocks_queued: 0
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_ids_decode() {
        let ids = LaneIds::from_word(0x0003_0201);
        assert_eq!((ids.wid, ids.rid, ids.vid), (1, 2, 3));
        assert_eq!(LaneDests::from_word(0xFF00_0000), LaneDests::default());
    }
}
