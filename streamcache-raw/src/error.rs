//! Error types for register map construction and access

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, RegisterError>;

/// Failures reported by a bus transport
///
/// These are passed through the register layer unchanged so callers can tell
/// a hardware fault apart from a schema or access error.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to open bus device {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read bus address 0x{address:X}: {source}")]
    ReadFailed {
        address: u32,
        source: std::io::Error,
    },

    #[error("Failed to write bus address 0x{address:X}: {source}")]
    WriteFailed {
        address: u32,
        source: std::io::Error,
    },

    #[error("Bus address 0x{address:X} is outside the mapped window of {size} bytes")]
    Unmapped { address: u32, size: usize },

    #[error("Bus address 0x{address:X} is not aligned to {word_size}-byte words")]
    Unaligned { address: u32, word_size: u8 },

    #[error("Unsupported bus word size: {0} bytes")]
    WordSize(u8),

    #[error("Bus fault at 0x{address:X}: {reason}")]
    Fault { address: u32, reason: String },
}

/// Errors raised while building or accessing a register map
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("Register {name} is read-only")]
    AccessViolation { name: String },

    #[error("Value 0x{value:X} does not fit the {bit_width}-bit field {name}")]
    OutOfRange {
        name: String,
        value: u32,
        bit_width: u8,
    },

    #[error("Duplicate name {name} under {parent}")]
    DuplicateName { parent: String, name: String },

    #[error("Register {name} has invalid bit range: width {bit_width} at offset {bit_offset}")]
    InvalidBitRange {
        name: String,
        bit_width: u8,
        bit_offset: u8,
    },

    #[error("Register {name} overlaps {other} at offset 0x{offset:X}")]
    OverlappingFields {
        name: String,
        other: String,
        offset: u32,
    },

    #[error("Register {name} accessed before a bus was attached")]
    NotConnected { name: String },

    #[error("Unknown register: {0}")]
    UnknownRegister(String),

    #[error("Unknown derived value: {0}")]
    UnknownDerivedValue(String),

    #[error("Lane {lane} does not exist (map has {num_lanes} lanes)")]
    NoSuchLane { lane: usize, num_lanes: usize },

    #[error("Invalid register layout: {0}")]
    Layout(&'static str),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_is_transparent() {
        let err: RegisterError = TransportError::Fault {
            address: 0x100,
            reason: "bus timeout".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Bus fault at 0x100: bus timeout");
    }

    #[test]
    fn test_out_of_range_display() {
        let err = RegisterError::OutOfRange {
            name: "blockSize".to_string(),
            value: 0x10,
            bit_width: 4,
        };
        assert!(err.to_string().contains("4-bit field blockSize"));
    }
}
