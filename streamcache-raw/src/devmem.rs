//! File-backed bus transport
//!
//! Accesses registers through a character device or sysfs resource file,
//! e.g. `/sys/bus/pci/devices/0000:01:00.0/resource0` or `/dev/mem`.
//! Each bus address is translated to `base + address` in the file.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::bus::{check_address, Bus, TransportResult};
use crate::error::TransportError;

pub struct DevMemBus {
    file: Mutex<File>,
    path: PathBuf,
    base: u64,
    size: usize,
}

impl DevMemBus {
    /// Open `path` for synchronous register access
    ///
    /// `base` is the file offset of bus address 0 and `size` the length of the
    /// register window in bytes.
    ///
    /// # Errors
    ///
    /// Returns `OpenFailed` if the file does not exist or the caller lacks
    /// permission (most resource files need root or CAP_SYS_RAWIO).
    pub fn open(path: impl AsRef<Path>, base: u64, size: usize) -> TransportResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(&path)
            .map_err(|e| TransportError::OpenFailed {
                path: path.clone(),
                source: e,
            })?;

        tracing::info!(
            "Opened register window {} at base 0x{:x} ({} bytes)",
            path.display(),
            base,
            size
        );

        Ok(Self {
            file: Mutex::new(file),
            path,
            base,
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_locked(&self, file: &mut File, address: u32) -> TransportResult<u32> {
        file.seek(SeekFrom::Start(self.base + address as u64))
            .map_err(|e| TransportError::ReadFailed { address, source: e })?;

        let mut buffer = [0u8; 4];
        file.read_exact(&mut buffer)
            .map_err(|e| TransportError::ReadFailed { address, source: e })?;

        Ok(u32::from_le_bytes(buffer))
    }

    fn write_locked(&self, file: &mut File, address: u32, value: u32) -> TransportResult<()> {
        file.seek(SeekFrom::Start(self.base + address as u64))
            .map_err(|e| TransportError::WriteFailed { address, source: e })?;

        file.write_all(&value.to_le_bytes())
            .map_err(|e| TransportError::WriteFailed { address, source: e })?;

        Ok(())
    }
}

impl Bus for DevMemBus {
    fn read(&self, address: u32, word_size: u8) -> TransportResult<u32> {
        check_address(address, word_size, self.size)?;
        let mut file = self.file.lock();
        let value = self.read_locked(&mut file, address)?;
        tracing::debug!("Bus read: 0x{:04x} = 0x{:08x}", address, value);
        Ok(value)
    }

    fn write(&self, address: u32, word_size: u8, value: u32) -> TransportResult<()> {
        check_address(address, word_size, self.size)?;
        let mut file = self.file.lock();
        tracing::debug!("Bus write: 0x{:04x} <- 0x{:08x}", address, value);
        self.write_locked(&mut file, address, value)
    }

    fn modify(&self, address: u32, word_size: u8, mask: u32, bits: u32) -> TransportResult<u32> {
        check_address(address, word_size, self.size)?;
        let mut file = self.file.lock();
        let word = self.read_locked(&mut file, address)?;
        let updated = (word & !mask) | (bits & mask);
        tracing::debug!(
            "Bus modify: 0x{:04x} 0x{:08x} -> 0x{:08x}",
            address,
            word,
            updated
        );
        self.write_locked(&mut file, address, updated)?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, size: usize) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "streamcache-devmem-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::write(&path, vec![0u8; size]).unwrap();
        path
    }

    #[test]
    fn test_open_missing_device() {
        let err = DevMemBus::open("/nonexistent/resource0", 0, 0x1000)
            .err()
            .unwrap();
        assert!(err.to_string().contains("Failed to open bus device"));
    }

    #[test]
    fn test_file_round_trip_with_base() {
        let path = scratch_file("rw", 0x400);
        let bus = DevMemBus::open(&path, 0x100, 0x200).unwrap();

        bus.write(0x80, 4, 0x1234_5678).unwrap();
        assert_eq!(bus.read(0x80, 4).unwrap(), 0x1234_5678);

        let raw = std::fs::read(&path).unwrap();
        assert_eq!(&raw[0x180..0x184], &0x1234_5678u32.to_le_bytes());

        assert_eq!(bus.modify(0x80, 4, 0xFF, 0xAA).unwrap(), 0x1234_56AA);
        assert!(bus.read(0x200, 4).is_err());

        std::fs::remove_file(&path).unwrap();
    }
}
