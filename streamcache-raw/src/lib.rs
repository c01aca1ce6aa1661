//! # streamcache-raw
//!
//! Register map definitions for the Camera Link Gateway StreamCache, the
//! FPGA block that buffers camera streams in DDR through MIG lanes before
//! they reach host RAM.
//!
//! This crate provides a typed register schema (descriptors, relocatable
//! device nodes, derived values), a resolver that turns the schema into an
//! absolute address map, and the bus abstraction that map talks to.
//!
//! ## Features
//!
//! - `devmem` (default) - file-backed bus transport for `/dev/mem` or PCIe
//!   BAR resource files
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use streamcache_raw::gateway::{stream_cache, StreamCache};
//! use streamcache_raw::MemoryBus;
//!
//! let bus = Arc::new(MemoryBus::new(stream_cache::address_span(4)));
//! let cache = StreamCache::connect(4, bus.clone())?;
//!
//! bus.poke(0x100, 125_000_000);
//! let readings = cache.map().derived_readings();
//! assert_eq!(readings[0].formatted(), "125.000 MHz");
//!
//! cache.set_block_size(0, 3)?;
//! assert_eq!(cache.lane_status(0)?.block_size, 3);
//! # Ok::<(), streamcache_raw::RegisterError>(())
//! ```

pub mod bus;
pub mod derived;
#[cfg(all(unix, feature = "devmem"))]
pub mod devmem;
pub mod device;
pub mod error;
pub mod gateway;
pub mod map;
pub mod register;

// Re-export for convenience
pub use bus::{Bus, MemoryBus};
pub use derived::{DerivedReading, DerivedValue, DisplayFormat, Transform};
#[cfg(all(unix, feature = "devmem"))]
pub use devmem::DevMemBus;
pub use device::{DeviceNode, Node, ResolvedRegister};
pub use error::{RegisterError, Result, TransportError};
pub use map::{AddressMap, PollTarget, RegisterInfo};
pub use register::{AccessMode, RegisterDescriptor, RegisterLayout};
