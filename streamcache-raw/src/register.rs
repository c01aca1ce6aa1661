//! Register descriptors and typed word layouts
//!
//! A [`RegisterDescriptor`] names one bit-sliced field inside a 32-bit bus
//! word. Several descriptors may share a word as long as their bit ranges
//! are disjoint; the device tree enforces that when fields are added.

use std::fmt;
use std::ops::Range;

use crate::error::{RegisterError, Result};

/// Width of one addressed bus word in bits
pub const WORD_BITS: u8 = 32;

/// Width of one addressed bus word in bytes
pub const WORD_BYTES: u8 = 4;

/// Access mode of a register field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::ReadOnly => "RO",
            AccessMode::ReadWrite => "RW",
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, AccessMode::ReadWrite)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static declaration of one register field
///
/// | Property     | Meaning                                          |
/// |--------------|--------------------------------------------------|
/// | `offset`     | byte offset of the word, relative to the parent  |
/// | `bit_width`  | field width, 1-32 bits                           |
/// | `bit_offset` | position of the field's LSB inside the word      |
/// | `mode`       | RO or RW                                         |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterDescriptor {
    name: String,
    offset: u32,
    bit_width: u8,
    bit_offset: u8,
    mode: AccessMode,
    description: Option<String>,
    hidden: bool,
    poll_interval: Option<u32>,
}

impl RegisterDescriptor {
    /// Declare a field, rejecting bit ranges that do not fit one word
    pub fn new(
        name: impl Into<String>,
        offset: u32,
        bit_width: u8,
        bit_offset: u8,
        mode: AccessMode,
    ) -> Result<Self> {
        let name = name.into();
        if bit_width == 0
            || bit_width > WORD_BITS
            || bit_offset >= WORD_BITS
            || bit_offset + bit_width > WORD_BITS
        {
            return Err(RegisterError::InvalidBitRange {
                name,
                bit_width,
                bit_offset,
            });
        }

        Ok(Self {
            name,
            offset,
            bit_width,
            bit_offset,
            mode,
            description: None,
            hidden: false,
            poll_interval: None,
        })
    }

    /// Declare a read-write field
    pub fn rw(name: impl Into<String>, offset: u32, bit_width: u8, bit_offset: u8) -> Result<Self> {
        Self::new(name, offset, bit_width, bit_offset, AccessMode::ReadWrite)
    }

    /// Declare a read-only field
    pub fn ro(name: impl Into<String>, offset: u32, bit_width: u8, bit_offset: u8) -> Result<Self> {
        Self::new(name, offset, bit_width, bit_offset, AccessMode::ReadOnly)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Hide the field from casual enumeration
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Ask the external poller to refresh this field every `ticks` poll ticks
    pub fn with_poll_interval(mut self, ticks: u32) -> Self {
        self.poll_interval = Some(ticks);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn bit_width(&self) -> u8 {
        self.bit_width
    }

    pub fn bit_offset(&self) -> u8 {
        self.bit_offset
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn poll_interval(&self) -> Option<u32> {
        self.poll_interval
    }

    /// Largest value the field can hold
    pub fn max_value(&self) -> u32 {
        ((1u64 << self.bit_width) - 1) as u32
    }

    /// Mask of the field in word position
    pub fn mask(&self) -> u32 {
        self.max_value() << self.bit_offset
    }

    pub fn bit_range(&self) -> Range<u8> {
        self.bit_offset..self.bit_offset + self.bit_width
    }

    /// Extract this field from a raw bus word
    pub fn extract(&self, word: u32) -> u32 {
        (word & self.mask()) >> self.bit_offset
    }

    /// Shift a field value into word position
    pub fn encode(&self, value: u32) -> Result<u32> {
        if value > self.max_value() {
            return Err(RegisterError::OutOfRange {
                name: self.name.clone(),
                value,
                bit_width: self.bit_width,
            });
        }
        Ok(value << self.bit_offset)
    }

    /// Fails with `AccessViolation` unless the field is RW
    pub fn check_writable(&self) -> Result<()> {
        if self.mode.is_writable() {
            Ok(())
        } else {
            Err(RegisterError::AccessViolation {
                name: self.name.clone(),
            })
        }
    }

    /// True when both fields live in the same word and share at least one bit
    pub fn overlaps(&self, other: &RegisterDescriptor) -> bool {
        self.offset == other.offset && (self.mask() & other.mask()) != 0
    }
}

/// Trait for words that pack several fields and can be converted to/from a raw value
///
/// # Example
///
/// ```
/// use streamcache_raw::RegisterLayout;
///
/// #[derive(Debug, Default)]
/// struct Status {
///     ready: bool,
///     level: u8,
/// }
///
/// impl RegisterLayout for Status {
///     fn to_word(&self) -> u32 {
///         (self.ready as u32) | ((self.level as u32) << 8)
///     }
///
///     fn from_word(word: u32) -> Self {
///         Self {
///             ready: (word & 1) != 0,
///             level: ((word >> 8) & 0xFF) as u8,
///         }
///     }
/// }
///
/// let status = Status::from_word(0x0301);
/// assert!(status.ready);
/// assert_eq!(status.level, 3);
/// ```
pub trait RegisterLayout: Sized {
    /// Convert this layout to a raw bus word
    fn to_word(&self) -> u32;

    /// Parse a raw bus word into this layout
    fn from_word(word: u32) -> Self;

    /// Validate that the field values fit their widths
    fn validate(&self) -> std::result::Result<(), &'static str> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_fields_wider_than_word() {
        assert!(RegisterDescriptor::ro("ok", 0, 32, 0).is_ok());
        assert!(RegisterDescriptor::ro("ok", 0, 1, 31).is_ok());

        let err = RegisterDescriptor::ro("wide", 0, 9, 24).unwrap_err();
        assert!(matches!(err, RegisterError::InvalidBitRange { .. }));
        assert!(RegisterDescriptor::ro("empty", 0, 0, 0).is_err());
        assert!(RegisterDescriptor::ro("past", 0, 1, 32).is_err());
    }

    #[test]
    fn test_extract_and_encode() {
        let queued = RegisterDescriptor::ro("blocksQueued", 0x8, 9, 12).unwrap();
        assert_eq!(queued.mask(), 0x1FF << 12);
        assert_eq!(queued.extract(0x0015_A0FF), 0x15A);
        assert_eq!(queued.encode(0x1FF).unwrap(), 0x1FF000);
        assert!(matches!(
            queued.encode(0x200),
            Err(RegisterError::OutOfRange { bit_width: 9, .. })
        ));
    }

    #[test]
    fn test_full_word_field() {
        let word = RegisterDescriptor::rw("scratch", 0x0, 32, 0).unwrap();
        assert_eq!(word.max_value(), u32::MAX);
        assert_eq!(word.mask(), u32::MAX);
        assert_eq!(word.encode(u32::MAX).unwrap(), u32::MAX);
    }

    #[test]
    fn test_check_writable() {
        let ro = RegisterDescriptor::ro("wid", 0, 8, 0).unwrap();
        let rw = RegisterDescriptor::rw("blockSize", 0, 4, 0).unwrap();
        assert!(matches!(
            ro.check_writable(),
            Err(RegisterError::AccessViolation { .. })
        ));
        assert!(rw.check_writable().is_ok());
    }

    #[test]
    fn test_overlap_detection() {
        let wid = RegisterDescriptor::ro("wid", 0, 8, 0).unwrap();
        let rid = RegisterDescriptor::ro("rid", 0, 8, 8).unwrap();
        let bad = RegisterDescriptor::ro("bad", 0, 4, 6).unwrap();
        let elsewhere = RegisterDescriptor::ro("wdest", 4, 8, 0).unwrap();

        assert!(!wid.overlaps(&rid));
        assert!(wid.overlaps(&bad));
        assert!(rid.overlaps(&bad));
        assert!(!wid.overlaps(&elsewhere));
    }
}
