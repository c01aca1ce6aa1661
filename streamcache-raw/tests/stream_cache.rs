use std::collections::HashSet;
use std::sync::Arc;

use streamcache_raw::bus::TransportResult;
use streamcache_raw::gateway::stream_cache::{self, StreamCache};
use streamcache_raw::{
    AccessMode, Bus, DeviceNode, MemoryBus, Node, RegisterError, TransportError,
};

/// Bus whose reads fail at one address
struct FaultyBus {
    inner: MemoryBus,
    fail_at: u32,
}

impl Bus for FaultyBus {
    fn read(&self, address: u32, word_size: u8) -> TransportResult<u32> {
        if address == self.fail_at {
            return Err(TransportError::Fault {
                address,
                reason: "completion timeout".to_string(),
            });
        }
        self.inner.read(address, word_size)
    }

    fn write(&self, address: u32, word_size: u8, value: u32) -> TransportResult<()> {
        self.inner.write(address, word_size, value)
    }
}

fn check_sibling_names(node: &DeviceNode) {
    let mut seen = HashSet::new();
    for child in node.children() {
        assert!(seen.insert(child.name()), "duplicate {}", child.name());
        if let Node::Device(dev) = child {
            check_sibling_names(dev);
        }
    }
}

#[test]
fn test_every_field_fits_one_word() {
    let map = stream_cache::build(4).unwrap();
    for reg in map.enumerate(true) {
        assert!(
            reg.bit_offset as u32 + reg.bit_width as u32 <= 32,
            "{} overflows its word",
            reg.path
        );
    }
}

#[test]
fn test_sibling_names_are_distinct() {
    let map = stream_cache::build(4).unwrap();
    check_sibling_names(map.root());
}

#[test]
fn test_lane_offsets() {
    let map = stream_cache::build(4).unwrap();
    let lanes: Vec<u32> = map
        .root()
        .devices()
        .filter(|d| d.name().starts_with("MigLane["))
        .map(|d| d.offset())
        .collect();
    assert_eq!(lanes, vec![0x080, 0x0A0, 0x0C0, 0x0E0]);

    let details: Vec<u32> = map
        .root()
        .devices()
        .filter(|d| d.name().starts_with("MigLaneDetail["))
        .map(|d| d.offset())
        .collect();
    assert_eq!(details, vec![0x180, 0x1A0, 0x1C0, 0x1E0]);
}

#[test]
fn test_write_errors() {
    let bus = Arc::new(MemoryBus::new(stream_cache::address_span(4)));
    let cache = StreamCache::connect(4, bus).unwrap();
    let map = cache.map();

    for reg in map.enumerate(true) {
        match reg.mode {
            AccessMode::ReadWrite => {
                let too_big = 1u32 << reg.bit_width;
                assert!(
                    matches!(
                        map.write(&reg.path, too_big),
                        Err(RegisterError::OutOfRange { .. })
                    ),
                    "{} accepted 0x{:x}",
                    reg.path,
                    too_big
                );
            }
            AccessMode::ReadOnly => {
                assert!(
                    matches!(
                        map.write(&reg.path, 0),
                        Err(RegisterError::AccessViolation { .. })
                    ),
                    "{} accepted a write",
                    reg.path
                );
            }
        }
    }
}

#[test]
fn test_rw_round_trip() {
    let bus = Arc::new(MemoryBus::new(stream_cache::address_span(4)));
    let cache = StreamCache::connect(4, bus).unwrap();
    let map = cache.map();

    for path in ["MigLane[1].blockSize", "MigLane[1].blocksPause"] {
        let max = map.descriptor(path).unwrap().max_value();
        for v in [0, 1, max / 2, max] {
            map.write(path, v).unwrap();
            assert_eq!(map.read(path).unwrap(), v, "{path}");
        }
    }
}

#[test]
fn test_shared_word_read_modify_write() {
    let bus = Arc::new(MemoryBus::new(stream_cache::address_span(0)));
    let cache = StreamCache::connect(0, bus.clone()).unwrap();
    let map = cache.map();

    map.write("usrRst", 1).unwrap();
    let before = map.read("usrRst").unwrap();
    map.write("monEnable", 1).unwrap();
    map.write("monEnable", 0).unwrap();
    assert_eq!(map.read("usrRst").unwrap(), before);
    assert_eq!(bus.peek(0x0), 0b10);
}

#[test]
fn test_clock_frequency_display() {
    let bus = Arc::new(MemoryBus::new(stream_cache::address_span(4)));
    let cache = StreamCache::connect(4, bus.clone()).unwrap();
    bus.poke(0x100, 125_000_000);

    let value = cache.map().evaluate("MonClock0Frequency").unwrap();
    assert!((value - 125.0).abs() < 1e-9);

    let reading = &cache.map().derived_readings()[0];
    assert_eq!(reading.name, "MonClock0Frequency");
    assert_eq!(reading.display.format(value), "125.000");
    assert_eq!(reading.units.as_deref(), Some("MHz"));
}

#[test]
fn test_raw_counter_masks_to_29_bits() {
    let bus = Arc::new(MemoryBus::new(stream_cache::address_span(0)));
    let cache = StreamCache::connect(0, bus.clone()).unwrap();
    bus.poke(0x108, 0xE000_0000 | 100_000_000);
    assert_eq!(cache.map().read("MonClock2Raw").unwrap(), 100_000_000);
}

#[test]
fn test_transport_error_propagates_through_derived_value() {
    let bus = Arc::new(FaultyBus {
        inner: MemoryBus::new(stream_cache::address_span(4)),
        fail_at: 0x104,
    });
    let cache = StreamCache::connect(4, bus).unwrap();

    let err = cache.map().evaluate("MonClock1Frequency").unwrap_err();
    assert!(matches!(
        err,
        RegisterError::Transport(TransportError::Fault { address: 0x104, .. })
    ));

    assert!(cache.map().evaluate("MonClock0Frequency").is_ok());

    let readings = cache.map().derived_readings();
    assert!(readings[1].value.is_err());
    assert!(readings[1].formatted().starts_with("<error"));
}

#[test]
fn test_zero_lanes() {
    let map = stream_cache::build(0).unwrap();
    assert_eq!(map.root().devices().count(), 0);
    assert_eq!(map.len(), 2 + 4);
    assert_eq!(map.derived_values().len(), 4);

    let visible: Vec<String> = map.enumerate(false).into_iter().map(|r| r.path).collect();
    assert_eq!(visible, vec!["monEnable", "usrRst"]);

    let polled: Vec<String> = map.poll_targets().into_iter().map(|p| p.path).collect();
    assert_eq!(
        polled,
        vec!["MonClock0Raw", "MonClock1Raw", "MonClock2Raw", "MonClock3Raw"]
    );
}

#[test]
fn test_not_connected_before_attach() {
    let cache = StreamCache::new(1).unwrap();
    assert!(matches!(
        cache.lane_status(0),
        Err(RegisterError::NotConnected { .. })
    ));
}
