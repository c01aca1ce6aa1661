pub mod mmio;
pub mod transport;

pub use mmio::MmapBus;
pub use transport::{open_bus, seed_simulation};
