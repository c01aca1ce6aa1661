//! Camera Link Gateway register definitions
//!
//! The StreamCache buffers camera frames in DDR through MIG (Memory Interface
//! Generator) lanes before they are moved to host RAM. Its register block
//! contains:
//!
//! - **Control** - monitor enable and user reset bits
//! - **MigLane** - per-lane block size, pause threshold, occupancy and ring indices
//! - **MigLaneDetail** - per-lane AXI stream id/dest fields
//! - **MonClock** - free-running clock monitors and their MHz conversion
//!
//! All registers are 32-bit words; fields are bit slices of those words.

pub mod mig_lane;
pub mod mon_clock;
pub mod stream_cache;

pub use mig_lane::{LaneDests, LaneIds, LaneOccupancy};
pub use stream_cache::{ControlWord, LaneDetail, LaneStatus, StreamCache, DEFAULT_NUM_LANES};
