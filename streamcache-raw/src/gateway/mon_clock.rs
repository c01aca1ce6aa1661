//! Clock monitor registers
//!
//! Each monitor is a 29-bit counter that the firmware latches once per
//! sampling window with the number of rising edges seen on the monitored
//! clock. With a one-second window the raw count is the frequency in Hz, so
//! multiplying by [`MON_CLOCK_SCALE`] yields MHz.
//!
//! The window length is a property of the firmware, not of this register
//! block. If a build changes it, the scale must change with it.

use std::time::Duration;

use crate::derived::{DerivedValue, DisplayFormat, Transform};
use crate::error::Result;
use crate::register::RegisterDescriptor;

/// Number of monitored clocks
pub const MON_CLOCK_COUNT: usize = 4;

/// Byte offset of `MonClock0Raw`
pub const MON_CLOCK_BASE: u32 = 0x100;

/// Distance between consecutive monitor counters
pub const MON_CLOCK_STRIDE: u32 = 0x4;

/// Bit width of the raw counters
pub const MON_CLOCK_WIDTH_BITS: u8 = 29;

/// Window over which the firmware counts clock edges
pub const MON_CLOCK_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Raw edge count per window to MHz
pub const MON_CLOCK_SCALE: f64 = 1.0e-6;

/// Poll the raw counters every poll tick
pub const MON_CLOCK_POLL_INTERVAL: u32 = 1;

pub const MON_CLOCK_UNITS: &str = "MHz";

pub fn raw_name(index: usize) -> String {
    format!("MonClock{index}Raw")
}

pub fn frequency_name(index: usize) -> String {
    format!("MonClock{index}Frequency")
}

/// Byte offset of monitor `index`
pub fn raw_offset(index: usize) -> u32 {
    MON_CLOCK_BASE + index as u32 * MON_CLOCK_STRIDE
}

/// Raw counter for monitor `index`; hidden and polled every tick
pub fn raw_counter(index: usize) -> Result<RegisterDescriptor> {
    Ok(
        RegisterDescriptor::ro(raw_name(index), raw_offset(index), MON_CLOCK_WIDTH_BITS, 0)?
            .hidden()
            .with_poll_interval(MON_CLOCK_POLL_INTERVAL),
    )
}

/// Frequency in MHz derived from the raw counter at `raw_path`
pub fn frequency(index: usize, raw_path: String) -> Result<DerivedValue> {
    Ok(DerivedValue::new(
        frequency_name(index),
        vec![raw_path],
        Transform::Linear {
            scale: MON_CLOCK_SCALE,
        },
    )?
    .with_units(MON_CLOCK_UNITS)
    .with_display(DisplayFormat::Fixed(3)))
}
