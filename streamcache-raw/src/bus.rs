//! Bus transport abstraction
//!
//! The register layer never touches hardware directly. Every access becomes a
//! word-sized transaction on a [`Bus`]; the transport is responsible for
//! serializing concurrent callers, including across the read-modify-write
//! performed by [`Bus::modify`].

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::TransportError;
use crate::register::WORD_BYTES;

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// A word-addressed memory-mapped bus
pub trait Bus: Send + Sync {
    /// Read one word of `word_size` bytes at `address`
    fn read(&self, address: u32, word_size: u8) -> TransportResult<u32>;

    /// Write one word of `word_size` bytes at `address`
    fn write(&self, address: u32, word_size: u8, value: u32) -> TransportResult<()>;

    /// Replace the bits selected by `mask` with `bits`, returning the word written
    ///
    /// The default implementation is a plain read followed by a write.
    /// Transports shared between threads should override it and hold their
    /// lock across both halves.
    fn modify(&self, address: u32, word_size: u8, mask: u32, bits: u32) -> TransportResult<u32> {
        let word = self.read(address, word_size)?;
        let updated = (word & !mask) | (bits & mask);
        self.write(address, word_size, updated)?;
        Ok(updated)
    }
}

/// Reject word sizes other than the 32-bit words this map is built on
pub fn check_word_size(word_size: u8) -> TransportResult<()> {
    if word_size != WORD_BYTES {
        return Err(TransportError::WordSize(word_size));
    }
    Ok(())
}

/// Reject addresses that are unaligned or fall outside a window of `size` bytes
pub fn check_address(address: u32, word_size: u8, size: usize) -> TransportResult<()> {
    check_word_size(word_size)?;
    if address % word_size as u32 != 0 {
        return Err(TransportError::Unaligned { address, word_size });
    }
    if address as usize + word_size as usize > size {
        return Err(TransportError::Unmapped { address, size });
    }
    Ok(())
}

/// In-memory bus for simulation and tests
///
/// Unwritten words read as zero. [`MemoryBus::poke`] lets a simulation play
/// the hardware side, e.g. updating read-only status words.
pub struct MemoryBus {
    words: Mutex<HashMap<u32, u32>>,
    size: usize,
}

impl MemoryBus {
    /// Create a bus covering `size` bytes of address space
    pub fn new(size: usize) -> Self {
        Self {
            words: Mutex::new(HashMap::new()),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Set a raw word, bypassing access modes
    pub fn poke(&self, address: u32, value: u32) {
        self.words.lock().insert(address, value);
    }

    /// Get a raw word without a bus transaction
    pub fn peek(&self, address: u32) -> u32 {
        self.words.lock().get(&address).copied().unwrap_or(0)
    }
}

impl Bus for MemoryBus {
    fn read(&self, address: u32, word_size: u8) -> TransportResult<u32> {
        check_address(address, word_size, self.size)?;
        let value = self.peek(address);
        tracing::trace!("MemoryBus read: 0x{:04x} = 0x{:08x}", address, value);
        Ok(value)
    }

    fn write(&self, address: u32, word_size: u8, value: u32) -> TransportResult<()> {
        check_address(address, word_size, self.size)?;
        tracing::trace!("MemoryBus write: 0x{:04x} <- 0x{:08x}", address, value);
        self.poke(address, value);
        Ok(())
    }

    fn modify(&self, address: u32, word_size: u8, mask: u32, bits: u32) -> TransportResult<u32> {
        check_address(address, word_size, self.size)?;
        let mut words = self.words.lock();
        let word = words.entry(address).or_insert(0);
        *word = (*word & !mask) | (bits & mask);
        Ok(*word)
    }
}
