use std::io;
use thiserror::Error;

use streamcache_raw::{RegisterError, TransportError};

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Register operation failed: {0}")]
    RegisterError(#[from] RegisterError),

    #[error("Bus transport failed: {0}")]
    TransportError(#[from] TransportError),

    #[error("Memory mapping failed: {0}")]
    MmapError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Nix error: {0}")]
    NixError(#[from] nix::Error),

    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
