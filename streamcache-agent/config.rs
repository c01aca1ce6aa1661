use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use streamcache_raw::gateway::stream_cache;

use crate::error::{AgentError, Result};

/// How the agent reaches the StreamCache registers
#[derive(Debug, Clone)]
pub enum TransportConfig {
    /// In-memory bus seeded with plausible values, for bring-up without hardware
    Simulated,
    /// Seek/read/write on a device or resource file
    DevMem {
        path: PathBuf,
        offset: u64,
        size: usize,
    },
    /// mmap of a device or resource file with volatile word access
    Mmap {
        path: PathBuf,
        offset: u64,
        size: usize,
    },
}

impl TransportConfig {
    /// Bytes of bus address space the transport exposes
    pub fn window_size(&self, num_lanes: usize, base: u32) -> usize {
        match self {
            TransportConfig::Simulated => base as usize + stream_cache::address_span(num_lanes),
            TransportConfig::DevMem { size, .. } | TransportConfig::Mmap { size, .. } => *size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub transport: TransportConfig,
    pub num_lanes: usize,
    /// Offset of the StreamCache block inside the transport window
    pub base: u32,
    pub poll_interval: Duration,
    pub listen: SocketAddr,
}

impl ExportConfig {
    /// Create a configuration with the default base, poll interval and listen address
    pub fn new(transport: TransportConfig, num_lanes: usize) -> Self {
        Self {
            transport,
            num_lanes,
            base: 0,
            poll_interval: Duration::from_secs(1),
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }

    /// Check that the register block fits the bus address space and the
    /// transport window
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(AgentError::ConfigError(
                "poll interval must be non-zero".to_string(),
            ));
        }

        let end = self.base as u64 + stream_cache::address_span(self.num_lanes) as u64;
        if end > u64::from(u32::MAX) + 1 {
            return Err(AgentError::ConfigError(format!(
                "StreamCache with {} lanes at 0x{:x} runs past the 32-bit bus address space",
                self.num_lanes, self.base
            )));
        }

        let needed = end as usize;
        let window = self.transport.window_size(self.num_lanes, self.base);
        if needed > window {
            return Err(AgentError::ConfigError(format!(
                "StreamCache with {} lanes at 0x{:x} needs 0x{:x} bytes, window is 0x{:x}",
                self.num_lanes, self.base, needed, window
            )));
        }

        if self.num_lanes > stream_cache::DEFAULT_NUM_LANES {
            tracing::warn!(
                "{} lanes requested; lane blocks beyond {} overlap the clock monitors",
                self.num_lanes,
                stream_cache::DEFAULT_NUM_LANES
            );
        }

        Ok(())
    }
}

/// Parse an integer given in decimal or with a `0x` prefix
pub fn parse_int(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid integer {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("0x1000"), Ok(0x1000));
        assert_eq!(parse_int("4096"), Ok(4096));
        assert_eq!(parse_int("0x10_0000"), Ok(0x10_0000));
        assert!(parse_int("zz").is_err());
    }

    #[test]
    fn test_validate_window_too_small() {
        let config = ExportConfig::new(
            TransportConfig::DevMem {
                path: PathBuf::from("/dev/mem"),
                offset: 0,
                size: 0x100,
            },
            4,
        );
        assert!(matches!(
            config.validate(),
            Err(AgentError::ConfigError(_))
        ));
    }

    #[test]
    fn test_validate_simulated() {
        let mut config = ExportConfig::new(TransportConfig::Simulated, 4);
        config.base = 0x400;
        assert!(config.validate().is_ok());

        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_base_overflow() {
        let mut config = ExportConfig::new(TransportConfig::Simulated, 4);
        config.base = 0xFFFF_FF00;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("32-bit"));

        config.base = 0xFFFF_FE00;
        assert!(config.validate().is_ok());
    }
}
