//! Resolved address map and register access
//!
//! [`AddressMap::new`] walks the device tree once, records every register at
//! its absolute address, and checks derived value dependencies. After that
//! the tree shape never changes; only the values behind it do, through the
//! attached [`Bus`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::bus::Bus;
use crate::derived::{DerivedReading, DerivedValue};
use crate::device::DeviceNode;
use crate::error::{RegisterError, Result};
use crate::register::{AccessMode, RegisterDescriptor, RegisterLayout, WORD_BYTES};

#[derive(Debug, Clone)]
struct Entry {
    address: u32,
    descriptor: RegisterDescriptor,
    /// Another declared field lives in the same word
    shared: bool,
}

/// One register as exposed to dump/documentation tooling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInfo {
    pub path: String,
    pub address: u32,
    pub bit_width: u8,
    pub bit_offset: u8,
    pub mode: AccessMode,
    pub hidden: bool,
    pub description: Option<String>,
}

impl fmt::Display for RegisterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msb = self.bit_offset + self.bit_width - 1;
        let bits = if self.bit_width == 1 {
            format!("[{}]", self.bit_offset)
        } else {
            format!("[{}:{}]", msb, self.bit_offset)
        };
        write!(
            f,
            "0x{:04X} {:<8} {} {}",
            self.address, bits, self.mode, self.path
        )
    }
}

/// A register the external poller should refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTarget {
    pub path: String,
    pub address: u32,
    /// Interval in poll ticks
    pub interval: u32,
}

pub struct AddressMap {
    root: DeviceNode,
    order: Vec<String>,
    entries: HashMap<String, Entry>,
    derived: Vec<DerivedValue>,
    derived_index: HashMap<String, usize>,
    bus: Option<Arc<dyn Bus>>,
}

impl AddressMap {
    /// Resolve `root` and its derived values into an address map
    ///
    /// # Errors
    ///
    /// - `DuplicateName` if two derived values share a name, or a derived
    ///   value reuses a register path
    /// - `UnknownRegister` if a derived value depends on a path that does not exist
    /// - `Layout` if a register's absolute address does not fit in 32 bits
    pub fn new(root: DeviceNode, derived: Vec<DerivedValue>) -> Result<Self> {
        let mut order = Vec::new();
        let mut entries = HashMap::new();
        let mut words: HashMap<u32, usize> = HashMap::new();

        for reg in root.registers() {
            let reg = reg?;
            *words.entry(reg.address).or_insert(0) += 1;
            order.push(reg.path.clone());
            entries.insert(
                reg.path,
                Entry {
                    address: reg.address,
                    descriptor: reg.descriptor.clone(),
                    shared: false,
                },
            );
        }

        for entry in entries.values_mut() {
            entry.shared = words.get(&entry.address).copied().unwrap_or(0) > 1;
        }

        let mut derived_index: HashMap<String, usize> = HashMap::new();
        for (idx, value) in derived.iter().enumerate() {
            if entries.contains_key(value.name()) || derived_index.contains_key(value.name()) {
                return Err(RegisterError::DuplicateName {
                    parent: root.name().to_string(),
                    name: value.name().to_string(),
                });
            }
            if let Some(missing) = value
                .dependencies()
                .iter()
                .find(|dep| !entries.contains_key(dep.as_str()))
            {
                return Err(RegisterError::UnknownRegister(missing.clone()));
            }
            derived_index.insert(value.name().to_string(), idx);
        }

        tracing::info!(
            "Resolved address map {}: {} registers, {} derived values",
            root.name(),
            order.len(),
            derived.len()
        );

        Ok(Self {
            root,
            order,
            entries,
            derived,
            derived_index,
            bus: None,
        })
    }

    pub fn name(&self) -> &str {
        self.root.name()
    }

    pub fn root(&self) -> &DeviceNode {
        &self.root
    }

    /// Number of registers in the map
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Attach the transport all reads and writes go through
    pub fn attach(&mut self, bus: Arc<dyn Bus>) {
        tracing::info!("Attached bus to address map {}", self.root.name());
        self.bus = Some(bus);
    }

    pub fn is_connected(&self) -> bool {
        self.bus.is_some()
    }

    fn entry(&self, path: &str) -> Result<&Entry> {
        self.entries
            .get(path)
            .ok_or_else(|| RegisterError::UnknownRegister(path.to_string()))
    }

    fn bus(&self, path: &str) -> Result<&Arc<dyn Bus>> {
        self.bus.as_ref().ok_or_else(|| RegisterError::NotConnected {
            name: path.to_string(),
        })
    }

    pub fn descriptor(&self, path: &str) -> Option<&RegisterDescriptor> {
        self.entries.get(path).map(|e| &e.descriptor)
    }

    /// Absolute byte address of the word holding `path`
    pub fn address(&self, path: &str) -> Option<u32> {
        self.entries.get(path).map(|e| e.address)
    }

    /// Read a single field
    pub fn read(&self, path: &str) -> Result<u32> {
        let entry = self.entry(path)?;
        let bus = self.bus(path)?;
        let word = bus.read(entry.address, WORD_BYTES)?;
        let value = entry.descriptor.extract(word);
        tracing::debug!(
            "Register read: {} @ 0x{:04x} = 0x{:x}",
            path,
            entry.address,
            value
        );
        Ok(value)
    }

    /// Write a single field
    ///
    /// Fields sharing their word with other declared fields are written with a
    /// read-modify-write so siblings keep their values.
    ///
    /// # Errors
    ///
    /// - `AccessViolation` for read-only fields
    /// - `OutOfRange` if `value` does not fit the field
    /// - `NotConnected` before a bus is attached
    /// - `Transport` for bus failures
    pub fn write(&self, path: &str, value: u32) -> Result<()> {
        let entry = self.entry(path)?;
        entry.descriptor.check_writable()?;
        let bits = entry.descriptor.encode(value)?;
        let bus = self.bus(path)?;

        tracing::debug!(
            "Register write: {} @ 0x{:04x} <- 0x{:x}",
            path,
            entry.address,
            value
        );

        if entry.shared {
            bus.modify(entry.address, WORD_BYTES, entry.descriptor.mask(), bits)?;
        } else {
            bus.write(entry.address, WORD_BYTES, bits)?;
        }
        Ok(())
    }

    /// Read the whole word holding `path` as a typed layout
    pub fn read_layout<T: RegisterLayout>(&self, path: &str) -> Result<T> {
        let entry = self.entry(path)?;
        let bus = self.bus(path)?;
        let word = bus.read(entry.address, WORD_BYTES)?;
        Ok(T::from_word(word))
    }

    /// Write the whole word holding `path` from a typed layout
    ///
    /// Every field declared in that word must be RW.
    pub fn write_layout<T: RegisterLayout>(&self, path: &str, layout: &T) -> Result<()> {
        let entry = self.entry(path)?;
        layout.validate().map_err(RegisterError::Layout)?;

        if let Some(ro) = self.entries.values().find(|other| {
            other.address == entry.address && !other.descriptor.mode().is_writable()
        }) {
            return Err(RegisterError::AccessViolation {
                name: ro.descriptor.name().to_string(),
            });
        }

        let bus = self.bus(path)?;
        bus.write(entry.address, WORD_BYTES, layout.to_word())?;
        Ok(())
    }

    /// Every register in traversal order
    ///
    /// Hidden registers are only listed with `include_hidden`.
    pub fn enumerate(&self, include_hidden: bool) -> Vec<RegisterInfo> {
        self.order
            .iter()
            .filter_map(|path| {
                let entry = &self.entries[path];
                let desc = &entry.descriptor;
                if desc.is_hidden() && !include_hidden {
                    return None;
                }
                Some(RegisterInfo {
                    path: path.clone(),
                    address: entry.address,
                    bit_width: desc.bit_width(),
                    bit_offset: desc.bit_offset(),
                    mode: desc.mode(),
                    hidden: desc.is_hidden(),
                    description: desc.description().map(str::to_string),
                })
            })
            .collect()
    }

    /// Registers that declare a poll interval
    pub fn poll_targets(&self) -> Vec<PollTarget> {
        self.order
            .iter()
            .filter_map(|path| {
                let entry = &self.entries[path];
                entry.descriptor.poll_interval().map(|interval| PollTarget {
                    path: path.clone(),
                    address: entry.address,
                    interval,
                })
            })
            .collect()
    }

    pub fn derived_values(&self) -> &[DerivedValue] {
        &self.derived
    }

    pub fn derived(&self, name: &str) -> Option<&DerivedValue> {
        self.derived_index.get(name).map(|&idx| &self.derived[idx])
    }

    /// Evaluate one derived value with fresh dependency reads
    pub fn evaluate(&self, name: &str) -> Result<f64> {
        let value = self
            .derived(name)
            .ok_or_else(|| RegisterError::UnknownDerivedValue(name.to_string()))?;
        value.evaluate(self)
    }

    /// Current reading of every derived value
    pub fn derived_readings(&self) -> Vec<DerivedReading> {
        self.derived
            .iter()
            .map(|value| DerivedReading {
                name: value.name().to_string(),
                value: value.evaluate(self),
                units: value.units().map(str::to_string),
                display: value.display(),
            })
            .collect()
    }
}
