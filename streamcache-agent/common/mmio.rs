//! Memory-mapped bus transport
//!
//! Maps a register window (usually a PCIe BAR `resource0` file) and performs
//! volatile 32-bit accesses on it. A mutex serializes callers so that
//! read-modify-write sequences are atomic with respect to this process.

use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use parking_lot::Mutex;
use std::ffi::c_void;
use std::fs::OpenOptions;
use std::num::NonZeroUsize;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use streamcache_raw::bus::{check_address, Bus, TransportResult};

use crate::error::{AgentError, Result};

pub struct MmapBus {
    ptr: *mut u8,
    len: usize,
    path: PathBuf,
    lock: Mutex<()>,
}

// The mapping is owned by this struct and every access goes through `lock`.
unsafe impl Send for MmapBus {}
unsafe impl Sync for MmapBus {}

fn page_size() -> u64 {
    // SAFETY: sysconf has no preconditions
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

impl MmapBus {
    pub fn open(path: impl AsRef<Path>, offset: u64, size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if offset % page_size() != 0 {
            return Err(AgentError::MmapError(format!(
                "offset 0x{offset:x} of {} is not page aligned",
                path.display()
            )));
        }
        let len = NonZeroUsize::new(size)
            .ok_or_else(|| AgentError::MmapError("register window is empty".to_string()))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(&path)
            .map_err(|e| {
                AgentError::MmapError(format!("Failed to open {}: {e}", path.display()))
            })?;

        // Device nodes report no length; regular and sysfs resource files must
        // cover the window or accesses past the end raise SIGBUS.
        let metadata = file.metadata()?;
        if metadata.is_file() && offset.saturating_add(size as u64) > metadata.len() {
            return Err(AgentError::MmapError(format!(
                "window 0x{offset:x}+0x{size:x} exceeds {} ({} bytes)",
                path.display(),
                metadata.len()
            )));
        }

        // SAFETY: we map a fresh shared region and never hand out references into it
        let ptr = unsafe {
            mmap(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                Some(&file),
                offset as libc::off_t,
            )
        }?;

        tracing::info!(
            "Mapped {} bytes of {} at offset 0x{:x}",
            size,
            path.display(),
            offset
        );

        Ok(Self {
            ptr: ptr as *mut u8,
            len: size,
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Safety
    ///
    /// `address` must have passed `check_address` against `self.len`.
    unsafe fn load(&self, address: u32) -> u32 {
        let word = self.ptr.add(address as usize) as *const u32;
        u32::from_le(std::ptr::read_volatile(word))
    }

    /// # Safety
    ///
    /// `address` must have passed `check_address` against `self.len`.
    unsafe fn store(&self, address: u32, value: u32) {
        let word = self.ptr.add(address as usize) as *mut u32;
        std::ptr::write_volatile(word, value.to_le());
    }
}

impl Bus for MmapBus {
    fn read(&self, address: u32, word_size: u8) -> TransportResult<u32> {
        check_address(address, word_size, self.len)?;
        let _guard = self.lock.lock();
        // SAFETY: bounds and alignment checked above
        let value = unsafe { self.load(address) };
        tracing::debug!("MMIO read: 0x{:04x} = 0x{:08x}", address, value);
        Ok(value)
    }

    fn write(&self, address: u32, word_size: u8, value: u32) -> TransportResult<()> {
        check_address(address, word_size, self.len)?;
        let _guard = self.lock.lock();
        tracing::debug!("MMIO write: 0x{:04x} <- 0x{:08x}", address, value);
        // SAFETY: bounds and alignment checked above
        unsafe { self.store(address, value) };
        Ok(())
    }

    fn modify(&self, address: u32, word_size: u8, mask: u32, bits: u32) -> TransportResult<u32> {
        check_address(address, word_size, self.len)?;
        let _guard = self.lock.lock();
        // SAFETY: bounds and alignment checked above
        let updated = unsafe {
            let word = self.load(address);
            let updated = (word & !mask) | (bits & mask);
            self.store(address, updated);
            updated
        };
        tracing::debug!("MMIO modify: 0x{:04x} -> 0x{:08x}", address, updated);
        Ok(updated)
    }
}

impl Drop for MmapBus {
    fn drop(&mut self) {
        // SAFETY: ptr/len describe the mapping created in `open`
        let _ = unsafe { munmap(self.ptr as *mut c_void, self.len) };
    }
}
