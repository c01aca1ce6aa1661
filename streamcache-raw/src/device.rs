//! Device nodes: relocatable containers of registers and sub-devices

use std::collections::HashMap;

use crate::error::{RegisterError, Result};
use crate::register::RegisterDescriptor;

/// A child of a [`DeviceNode`]
#[derive(Debug, Clone)]
pub enum Node {
    Register(RegisterDescriptor),
    Device(DeviceNode),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Register(reg) => reg.name(),
            Node::Device(dev) => dev.name(),
        }
    }
}

/// A named container placed at `offset` bytes from its parent
///
/// Children keep their declaration order; a name index gives direct lookup.
#[derive(Debug, Clone)]
pub struct DeviceNode {
    name: String,
    description: Option<String>,
    offset: u32,
    children: Vec<Node>,
    by_name: HashMap<String, usize>,
}

impl DeviceNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            offset: 0,
            children: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Place this node at `offset` bytes from its parent
    pub fn at(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.by_name.get(name).map(|&idx| &self.children[idx])
    }

    pub fn register(&self, name: &str) -> Option<&RegisterDescriptor> {
        match self.get(name)? {
            Node::Register(reg) => Some(reg),
            Node::Device(_) => None,
        }
    }

    pub fn device(&self, name: &str) -> Option<&DeviceNode> {
        match self.get(name)? {
            Node::Device(dev) => Some(dev),
            Node::Register(_) => None,
        }
    }

    /// Sub-devices in declaration order
    pub fn devices(&self) -> impl Iterator<Item = &DeviceNode> {
        self.children.iter().filter_map(|child| match child {
            Node::Device(dev) => Some(dev),
            Node::Register(_) => None,
        })
    }

    /// Add a register field
    ///
    /// # Errors
    ///
    /// - `DuplicateName` if a sibling already uses the name
    /// - `OverlappingFields` if the field shares bits with a sibling in the same word
    pub fn add_register(&mut self, register: RegisterDescriptor) -> Result<()> {
        for child in &self.children {
            if let Node::Register(other) = child {
                if other.name() != register.name() && other.overlaps(&register) {
                    return Err(RegisterError::OverlappingFields {
                        name: register.name().to_string(),
                        other: other.name().to_string(),
                        offset: register.offset(),
                    });
                }
            }
        }
        self.insert(Node::Register(register))
    }

    /// Add a sub-device at `offset` bytes from this node
    pub fn add_device(&mut self, device: DeviceNode, offset: u32) -> Result<()> {
        self.insert(Node::Device(device.at(offset)))
    }

    fn insert(&mut self, node: Node) -> Result<()> {
        if self.by_name.contains_key(node.name()) {
            return Err(RegisterError::DuplicateName {
                parent: self.name.clone(),
                name: node.name().to_string(),
            });
        }
        self.by_name
            .insert(node.name().to_string(), self.children.len());
        self.children.push(node);
        Ok(())
    }

    /// Add `count` sub-devices built by `factory`
    ///
    /// Element `i` is named by substituting `i` for `{}` in `name_pattern`
    /// and placed at `base + i * stride`.
    ///
    /// ```
    /// use streamcache_raw::{DeviceNode, RegisterDescriptor};
    ///
    /// let mut root = DeviceNode::new("Root");
    /// root.instantiate_array(2, "Lane[{}]", 0x80, 0x20, |_| {
    ///     let mut lane = DeviceNode::new("Lane");
    ///     lane.add_register(RegisterDescriptor::rw("ctrl", 0x0, 8, 0)?)?;
    ///     Ok(lane)
    /// })?;
    ///
    /// assert_eq!(root.device("Lane[1]").unwrap().offset(), 0xA0);
    /// # Ok::<(), streamcache_raw::RegisterError>(())
    /// ```
    pub fn instantiate_array<F>(
        &mut self,
        count: usize,
        name_pattern: &str,
        base: u32,
        stride: u32,
        mut factory: F,
    ) -> Result<()>
    where
        F: FnMut(usize) -> Result<DeviceNode>,
    {
        for index in 0..count {
            let offset = u32::try_from(index)
                .ok()
                .and_then(|i| i.checked_mul(stride))
                .and_then(|delta| delta.checked_add(base))
                .ok_or(RegisterError::Layout(
                    "array element offset exceeds the 32-bit address space",
                ))?;

            let mut element = factory(index)?;
            element.name = array_name(name_pattern, index);
            self.add_device(element, offset)?;
        }
        Ok(())
    }

    /// Depth-first iterator over every register below this node
    ///
    /// Paths are dotted and relative to this node; addresses include this
    /// node's own offset. Each call starts a fresh traversal. A register or
    /// sub-device whose absolute address does not fit in 32 bits yields a
    /// `Layout` error in its place.
    pub fn registers(&self) -> Registers<'_> {
        Registers {
            stack: vec![Frame {
                children: self.children.iter(),
                prefix: String::new(),
                base: self.offset,
            }],
        }
    }

    /// Resolve a dotted path such as `MigLane[0].blockSize`
    pub fn find(&self, path: &str) -> Option<ResolvedRegister<'_>> {
        let mut node = self;
        let mut base = self.offset;
        let mut parts = path.split('.').peekable();

        while let Some(part) = parts.next() {
            let last = parts.peek().is_none();
            match node.get(part)? {
                Node::Device(dev) if !last => {
                    base = base.checked_add(dev.offset)?;
                    node = dev;
                }
                Node::Register(reg) if last => {
                    return Some(ResolvedRegister {
                        path: path.to_string(),
                        address: base.checked_add(reg.offset())?,
                        descriptor: reg,
                    });
                }
                _ => return None,
            }
        }
        None
    }
}

/// Substitute `index` into an array name pattern
///
/// Patterns without a `{}` placeholder get `[index]` appended.
pub fn array_name(pattern: &str, index: usize) -> String {
    if pattern.contains("{}") {
        pattern.replacen("{}", &index.to_string(), 1)
    } else {
        format!("{pattern}[{index}]")
    }
}

/// A register together with its dotted path and absolute byte address
#[derive(Debug, Clone)]
pub struct ResolvedRegister<'a> {
    pub path: String,
    pub address: u32,
    pub descriptor: &'a RegisterDescriptor,
}

struct Frame<'a> {
    children: std::slice::Iter<'a, Node>,
    prefix: String,
    base: u32,
}

/// Lazy depth-first traversal returned by [`DeviceNode::registers`]
pub struct Registers<'a> {
    stack: Vec<Frame<'a>>,
}

const ADDRESS_OVERFLOW: RegisterError =
    RegisterError::Layout("register address exceeds the 32-bit address space");

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

impl<'a> Iterator for Registers<'a> {
    type Item = Result<ResolvedRegister<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            match frame.children.next() {
                None => {
                    self.stack.pop();
                }
                Some(Node::Register(reg)) => {
                    let Some(address) = frame.base.checked_add(reg.offset()) else {
                        return Some(Err(ADDRESS_OVERFLOW));
                    };
                    return Some(Ok(ResolvedRegister {
                        path: join(&frame.prefix, reg.name()),
                        address,
                        descriptor: reg,
                    }));
                }
                Some(Node::Device(dev)) => {
                    let Some(base) = frame.base.checked_add(dev.offset()) else {
                        return Some(Err(ADDRESS_OVERFLOW));
                    };
                    let next = Frame {
                        children: dev.children.iter(),
                        prefix: join(&frame.prefix, dev.name()),
                        base,
                    };
                    self.stack.push(next);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane() -> Result<DeviceNode> {
        let mut dev = DeviceNode::new("Lane");
        dev.add_register(RegisterDescriptor::rw("ctrl", 0x0, 4, 0)?)?;
        dev.add_register(RegisterDescriptor::ro("status", 0x4, 8, 0)?)?;
        Ok(dev)
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut dev = DeviceNode::new("Top");
        dev.add_register(RegisterDescriptor::rw("ctrl", 0x0, 1, 0).unwrap())
            .unwrap();
        let err = dev
            .add_register(RegisterDescriptor::rw("ctrl", 0x4, 1, 0).unwrap())
            .unwrap_err();
        assert!(matches!(err, RegisterError::DuplicateName { .. }));

        let err = dev.add_device(DeviceNode::new("ctrl"), 0x40).unwrap_err();
        assert!(matches!(err, RegisterError::DuplicateName { .. }));
    }

    #[test]
    fn test_overlapping_fields_rejected() {
        let mut dev = DeviceNode::new("Top");
        dev.add_register(RegisterDescriptor::rw("a", 0x0, 4, 0).unwrap())
            .unwrap();
        dev.add_register(RegisterDescriptor::rw("b", 0x0, 4, 4).unwrap())
            .unwrap();
        let err = dev
            .add_register(RegisterDescriptor::rw("c", 0x0, 2, 3).unwrap())
            .unwrap_err();
        assert!(matches!(err, RegisterError::OverlappingFields { .. }));
    }

    #[test]
    fn test_array_offsets_and_names() {
        let mut root = DeviceNode::new("Top");
        root.instantiate_array(4, "Lane[{}]", 0x080, 0x20, |_| lane())
            .unwrap();

        let offsets: Vec<u32> = root.devices().map(|d| d.offset()).collect();
        assert_eq!(offsets, vec![0x080, 0x0A0, 0x0C0, 0x0E0]);

        let names: Vec<&str> = root.devices().map(|d| d.name()).collect();
        assert_eq!(names, vec!["Lane[0]", "Lane[1]", "Lane[2]", "Lane[3]"]);
    }

    #[test]
    fn test_array_name_without_placeholder() {
        assert_eq!(array_name("Lane", 3), "Lane[3]");
        assert_eq!(array_name("Clock{}Raw", 2), "Clock2Raw");
    }

    #[test]
    fn test_traversal_is_depth_first_and_restartable() {
        let mut root = DeviceNode::new("Top");
        root.add_register(RegisterDescriptor::rw("enable", 0x0, 1, 0).unwrap())
            .unwrap();
        root.instantiate_array(2, "Lane[{}]", 0x80, 0x20, |_| lane())
            .unwrap();

        let first: Vec<(String, u32)> = root
            .registers()
            .map(|r| r.map(|r| (r.path, r.address)))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            first,
            vec![
                ("enable".to_string(), 0x00),
                ("Lane[0].ctrl".to_string(), 0x80),
                ("Lane[0].status".to_string(), 0x84),
                ("Lane[1].ctrl".to_string(), 0xA0),
                ("Lane[1].status".to_string(), 0xA4),
            ]
        );

        assert_eq!(root.registers().count(), first.len());
    }

    #[test]
    fn test_find_resolves_nested_paths() {
        let mut root = DeviceNode::new("Top");
        root.instantiate_array(2, "Lane[{}]", 0x80, 0x20, |_| lane())
            .unwrap();

        let reg = root.find("Lane[1].status").unwrap();
        assert_eq!(reg.address, 0xA4);
        assert_eq!(reg.descriptor.bit_width(), 8);

        assert!(root.find("Lane[1]").is_none());
        assert!(root.find("Lane[2].status").is_none());
        assert!(root.find("Lane[0].status.extra").is_none());
    }

    #[test]
    fn test_address_overflow_is_reported() {
        let mut root = DeviceNode::new("Top").at(0xFFFF_FF00);
        root.add_register(RegisterDescriptor::rw("enable", 0x0, 1, 0).unwrap())
            .unwrap();
        root.instantiate_array(2, "Lane[{}]", 0x80, 0x80, |_| lane())
            .unwrap();

        let resolved: Vec<Result<u32>> = root.registers().map(|r| r.map(|r| r.address)).collect();
        assert_eq!(resolved.len(), 4);
        assert_eq!(*resolved[0].as_ref().unwrap(), 0xFFFF_FF00);
        assert_eq!(*resolved[2].as_ref().unwrap(), 0xFFFF_FF84);
        assert!(matches!(resolved[3], Err(RegisterError::Layout(_))));

        assert!(root.find("Lane[0].status").is_some());
        assert!(root.find("Lane[1].status").is_none());

        let mut top = DeviceNode::new("Top").at(0xFFFF_FFF0);
        top.add_register(RegisterDescriptor::ro("status", 0x20, 8, 0).unwrap())
            .unwrap();
        assert!(matches!(
            top.registers().next(),
            Some(Err(RegisterError::Layout(_)))
        ));
        assert!(top.find("status").is_none());
    }

    #[test]
    fn test_factory_error_aborts_build() {
        let mut root = DeviceNode::new("Top");
        let result = root.instantiate_array(3, "Lane[{}]", 0x0, 0x20, |i| {
            if i == 1 {
                Err(RegisterError::Layout("bad lane"))
            } else {
                lane()
            }
        });
        assert!(result.is_err());
    }
}
