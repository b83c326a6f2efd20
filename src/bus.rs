//! The port registry and the modules mapped into the port address space.
//!
//! Every module owns an 8-bit id and declares its ports up front in a [`ModuleDecl`].
//! The [`Registry`] turns those declarations into two lookup directions:
//! - by address ([`Registry::lookup_by_address`]), used by the segment compiler, and
//! - by name ([`Registry::lookup_by_name`]), used to build programs and for diagnostics.
//!
//! The read and write namespaces of a module are independent:
//! a module can expose one read port and one write port at the same offset.
//!
//! ```
//! use move_machine::bus::{Direction, Registry};
//!
//! let registry = Registry::standard().unwrap();
//! let op = registry.lookup_by_name("alu.op", Direction::Write).unwrap();
//! assert_eq!(op.address().unwrap().word(), 0x02A0_0000);
//!
//! let found = registry.lookup_by_address(0x02A0_0000, Direction::Read).unwrap();
//! assert_eq!(found.name(), "alu.op");
//! assert!(registry.lookup_by_address(0x7700_0000, Direction::Read).is_none());
//! ```
//!
//! This module consists of:
//! - [`Registry`], [`ModuleDecl`], [`PortDecl`], [`PortDescriptor`]: the port catalog
//! - [`Module`]: a module instance, created once per compiled segment
//! - [`Host`]: what module instances see of the machine they run on
//! - the built-in modules: [`sys`], [`alu`], [`ram`], [`io`], [`jmp`]
pub mod alu;
pub mod io;
pub mod jmp;
pub mod ram;
pub mod sys;
#[cfg(test)]
pub(crate) mod testing;

use std::collections::HashMap;

use crate::err::{ConfigurationError, RuntimeTrap};
use crate::isa::{PortAddr, LITERAL_TAG, OFFSET_MASK};

/// Which namespace of a module an access goes through.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Direction {
    /// Source operands read from ports.
    Read,
    /// Destination operands write to ports.
    Write,
}
impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Read  => f.write_str("read"),
            Direction::Write => f.write_str("write"),
        }
    }
}

/// Which namespaces a port is registered in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Capability {
    /// Only readable.
    Read,
    /// Only writable.
    Write,
    /// Readable and writable at the same offset.
    ReadWrite,
}
impl Capability {
    /// Whether accesses in the given direction are allowed.
    pub fn allows(self, dir: Direction) -> bool {
        matches!(
            (self, dir),
            (Capability::ReadWrite, _) | (Capability::Read, Direction::Read) | (Capability::Write, Direction::Write)
        )
    }
}

/// How an access to a port is carried out.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Accessor {
    /// Field-like: the value lives in the given storage cell of the module instance.
    ///
    /// Reading returns the cell; writing replaces it. No side effects occur.
    Cell(u16),
    /// Method-like: the access calls [`Module::read`] or [`Module::write`] with the given key.
    Handler(u16),
}

/// Where a declared port sits inside its module.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PortOffset {
    /// A fixed 24-bit offset.
    At(u32),
    /// Wildcard fallback, matched by any offset with no fixed entry.
    Any,
}

/// A port, as declared by a module.
#[derive(Clone, Copy, Debug)]
pub struct PortDecl {
    /// Position in the module's namespace.
    pub offset: PortOffset,
    /// Name, without the module prefix.
    pub name: &'static str,
    /// Additional names resolving to the same port.
    pub aliases: &'static [&'static str],
    /// Namespaces the port is registered in.
    pub capability: Capability,
    /// How accesses are carried out.
    pub accessor: Accessor,
}
impl PortDecl {
    /// Declares a field-like port backed by a storage cell.
    pub const fn cell(offset: u32, name: &'static str, capability: Capability, cell: u16) -> Self {
        Self { offset: PortOffset::At(offset), name, aliases: &[], capability, accessor: Accessor::Cell(cell) }
    }
    /// Declares a method-like port backed by a handler.
    pub const fn handler(offset: u32, name: &'static str, capability: Capability, key: u16) -> Self {
        Self { offset: PortOffset::At(offset), name, aliases: &[], capability, accessor: Accessor::Handler(key) }
    }
    /// Turns this port into the wildcard fallback of its namespaces.
    pub const fn fallback(self) -> Self {
        Self { offset: PortOffset::Any, ..self }
    }
    /// Adds alternate names.
    pub const fn aliases(self, aliases: &'static [&'static str]) -> Self {
        Self { aliases, ..self }
    }
}

/// How a module takes part in execution.
#[derive(Clone, Copy)]
pub enum ModuleKind {
    /// Ports are dispatched to a module instance, created by this factory once per segment.
    Dispatched(fn() -> Box<dyn Module>),
    /// Ports are resolved by the compiler itself and never dispatched (jump control).
    Inline,
}
impl std::fmt::Debug for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleKind::Dispatched(_) => f.write_str("Dispatched"),
            ModuleKind::Inline => f.write_str("Inline"),
        }
    }
}

/// The static description of a module: its id, its name prefix, and its port table.
#[derive(Clone, Copy, Debug)]
pub struct ModuleDecl {
    /// 8-bit module id (top byte of every port address).
    pub id: u8,
    /// Prefix of every port name (`alu` in `alu.op`).
    pub prefix: &'static str,
    /// Number of storage cells an instance holds (bound for [`Accessor::Cell`]).
    pub cells: u16,
    /// The declared ports.
    pub ports: &'static [PortDecl],
    /// How the module executes.
    pub kind: ModuleKind,
}

/// A registered port.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PortDescriptor {
    module: u8,
    offset: PortOffset,
    name: String,
    aliases: Vec<String>,
    capability: Capability,
    accessor: Accessor,
}
impl PortDescriptor {
    /// Id of the owning module.
    pub fn module_id(&self) -> u8 {
        self.module
    }
    /// The address of this port, or `None` for a wildcard fallback.
    pub fn address(&self) -> Option<PortAddr> {
        match self.offset {
            PortOffset::At(off) => Some(PortAddr::new(self.module, off)),
            PortOffset::Any => None,
        }
    }
    /// Whether this is a wildcard fallback entry.
    pub fn is_fallback(&self) -> bool {
        self.offset == PortOffset::Any
    }
    /// The full name (`prefix.name`).
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Alternate full names.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }
    /// Namespaces this port is registered in.
    pub fn capability(&self) -> Capability {
        self.capability
    }
    /// How accesses are carried out.
    pub fn accessor(&self) -> Accessor {
        self.accessor
    }
}

/// Sparse map from 24-bit offset to port, with an optional fallback.
#[derive(Default, Debug)]
struct PortTable {
    ports: HashMap<u32, usize>,
    fallback: Option<usize>,
}
impl PortTable {
    fn get(&self, offset: u32) -> Option<usize> {
        self.ports.get(&offset).copied().or(self.fallback)
    }
}

#[derive(Debug)]
struct ModuleEntry {
    decl: ModuleDecl,
    reads: PortTable,
    writes: PortTable,
}
impl ModuleEntry {
    fn table(&self, dir: Direction) -> &PortTable {
        match dir {
            Direction::Read  => &self.reads,
            Direction::Write => &self.writes,
        }
    }
}

/// The catalog of all modules and their ports.
///
/// A registry is built once (typically with [`Registry::standard`]) and then shared,
/// read-only, by the machine, the compiler, and whatever builds programs.
#[derive(Debug)]
pub struct Registry {
    modules: Vec<Option<ModuleEntry>>,
    ports: Vec<PortDescriptor>,
    read_names: HashMap<String, usize>,
    write_names: HashMap<String, usize>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            modules: std::iter::repeat_with(|| None).take(256).collect(),
            ports: vec![],
            read_names: HashMap::new(),
            write_names: HashMap::new(),
        }
    }

    /// Creates a registry holding the built-in modules:
    /// [`sys`], [`alu`], [`ram`] (`mem`), [`io`], and [`jmp`].
    pub fn standard() -> Result<Self, ConfigurationError> {
        let mut registry = Self::new();
        for decl in [sys::DECL, alu::DECL, ram::DECL, io::DECL, jmp::DECL] {
            registry.register_module(decl)?;
        }
        Ok(registry)
    }

    fn names(&self, dir: Direction) -> &HashMap<String, usize> {
        match dir {
            Direction::Read  => &self.read_names,
            Direction::Write => &self.write_names,
        }
    }

    /// Registers a module's port table.
    ///
    /// # Errors
    ///
    /// This fails (leaving the registry unchanged) if:
    /// - the module id is taken or reserved,
    /// - a port offset exceeds 24 bits or a cell index exceeds the declared cells,
    /// - two ports share an address (or two fallbacks exist) in one namespace of the module,
    /// - two ports share a name or alias in one direction.
    pub fn register_module(&mut self, decl: ModuleDecl) -> Result<(), ConfigurationError> {
        if decl.id == LITERAL_TAG {
            return Err(ConfigurationError::ReservedModuleId(decl.id));
        }
        if self.modules[usize::from(decl.id)].is_some() {
            return Err(ConfigurationError::DuplicateModule(decl.id));
        }

        let prefix = match decl.prefix {
            "" => String::new(),
            p  => format!("{p}."),
        };

        // Validate everything against a scratch copy of the tables first,
        // so a failing declaration leaves no partial entries behind.
        let base = self.ports.len();
        let mut entry = ModuleEntry { decl, reads: Default::default(), writes: Default::default() };
        let mut new_ports = vec![];
        let mut new_names: [HashMap<String, usize>; 2] = Default::default();

        for port in decl.ports {
            let name = format!("{prefix}{}", port.name);
            if let PortOffset::At(off) = port.offset {
                if off > OFFSET_MASK {
                    return Err(ConfigurationError::OffsetOutOfRange { name, offset: off });
                }
            }
            if let Accessor::Cell(cell) = port.accessor {
                if cell >= decl.cells {
                    return Err(ConfigurationError::CellOutOfRange { name, cell, cells: decl.cells });
                }
            }

            let index = base + new_ports.len();
            let descriptor = PortDescriptor {
                module: decl.id,
                offset: port.offset,
                aliases: port.aliases.iter().map(|a| format!("{prefix}{a}")).collect(),
                name,
                capability: port.capability,
                accessor: port.accessor,
            };

            for (di, dir) in [Direction::Read, Direction::Write].into_iter().enumerate() {
                if !port.capability.allows(dir) { continue };

                let table = match dir {
                    Direction::Read  => &mut entry.reads,
                    Direction::Write => &mut entry.writes,
                };
                match port.offset {
                    PortOffset::At(off) => {
                        if let Some(&existing) = table.ports.get(&off) {
                            return Err(ConfigurationError::DuplicateAddress {
                                address: PortAddr::new(decl.id, off),
                                direction: dir,
                                existing: lookup_name(&self.ports, &new_ports, base, existing),
                                name: descriptor.name.clone(),
                            });
                        }
                        table.ports.insert(off, index);
                    },
                    PortOffset::Any => {
                        if table.fallback.is_some() {
                            return Err(ConfigurationError::DuplicateFallback { module: decl.id, direction: dir });
                        }
                        table.fallback = Some(index);
                    },
                }

                for label in std::iter::once(&descriptor.name).chain(&descriptor.aliases) {
                    if self.names(dir).contains_key(label) || new_names[di].contains_key(label) {
                        return Err(ConfigurationError::DuplicateName { name: label.clone(), direction: dir });
                    }
                    new_names[di].insert(label.clone(), index);
                }
            }

            new_ports.push(descriptor);
        }

        // Commit:
        let [reads, writes] = new_names;
        self.read_names.extend(reads);
        self.write_names.extend(writes);
        self.ports.extend(new_ports);
        self.modules[usize::from(decl.id)] = Some(entry);

        log::debug!("registered module 0x{:02X} ({}) with {} ports", decl.id, decl.prefix, decl.ports.len());
        Ok(())
    }

    /// Finds the port registered at an operand word.
    ///
    /// The top byte selects the module and the low 24 bits select the offset.
    /// If the module has no port at that offset, its fallback (if any) is returned.
    /// This never fails; an unregistered module or offset simply yields `None`.
    pub fn lookup_by_address(&self, word: u32, dir: Direction) -> Option<&PortDescriptor> {
        let addr = PortAddr::from_word(word);
        let entry = self.modules[usize::from(addr.module_id())].as_ref()?;
        let index = entry.table(dir).get(addr.offset())?;
        self.ports.get(index)
    }

    /// Finds the port with the given full name (or alias) in one direction.
    pub fn lookup_by_name(&self, name: &str, dir: Direction) -> Option<&PortDescriptor> {
        self.ports.get(*self.names(dir).get(name)?)
    }

    /// Describes an operand word for tracing.
    ///
    /// A source word with the literal tag is rendered as `#k`.
    /// A registered port is rendered as its full name.
    /// Anything else gives `None`.
    pub fn explain_opcode(&self, word: u32, is_destination_slot: bool) -> Option<String> {
        if !is_destination_slot && (word >> 24) as u8 == LITERAL_TAG {
            return Some(format!("#{}", word & OFFSET_MASK));
        }

        let dir = match is_destination_slot {
            true  => Direction::Write,
            false => Direction::Read,
        };
        self.lookup_by_address(word, dir)
            .map(|port| port.name().to_string())
    }

    /// The declaration of a registered module.
    pub fn module(&self, id: u8) -> Option<&ModuleDecl> {
        self.modules[usize::from(id)].as_ref().map(|e| &e.decl)
    }

    /// Iterates over all registered modules in id order.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleDecl> + '_ {
        self.modules.iter()
            .flatten()
            .map(|e| &e.decl)
    }

    /// Iterates over all registered ports.
    pub fn ports(&self) -> impl Iterator<Item = &PortDescriptor> + '_ {
        self.ports.iter()
    }
}
impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup_name(ports: &[PortDescriptor], pending: &[PortDescriptor], base: usize, index: usize) -> String {
    match index.checked_sub(base) {
        Some(i) => pending.get(i),
        None => ports.get(index),
    }.map_or_else(String::new, |p| p.name.clone())
}

/// What a module instance sees of the machine it runs on.
///
/// [`Machine`] is the real implementation.
/// Compiled segments can also be run against any other host (which is what the tests do).
///
/// [`Machine`]: crate::sim::Machine
pub trait Host {
    /// Reads the big-endian word at a RAM byte offset.
    fn read_from_ram(&self, offset: u32) -> Result<u32, RuntimeTrap>;
    /// Writes the big-endian word at a RAM byte offset, notifying memory listeners.
    fn write_to_ram(&self, offset: u32, value: u32) -> Result<(), RuntimeTrap>;
    /// Suspension point. Called with the offset of the instruction about to execute.
    ///
    /// This may block until the host is resumed.
    fn breakpoint(&self, offset: u32) -> Result<(), RuntimeTrap>;
    /// Output of `alu.print`.
    fn print(&self, value: u32);
    /// Wires the host's peripherals into a freshly created I/O module.
    fn prepare_io_subsystem(&self, io: &mut io::IoModule);
}

/// The context of a single port access.
pub struct Bus<'h> {
    /// The host the segment runs on.
    pub host: &'h dyn Host,
    /// Offset of the instruction performing the access.
    pub offset: u32,
    /// The address that was accessed (relevant for fallback ports).
    pub addr: PortAddr,
}

/// What happens after a write handler returns.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PortEffect {
    /// Keep executing.
    Continue,
    /// Stop the program (`sys.shutdown`).
    Halt,
}

/// A module instance.
///
/// One instance of every dispatched module is created per compiled segment
/// and shared by every instruction of that segment.
pub trait Module: Send {
    /// The storage backing the module's field-like ports.
    fn cells(&mut self) -> &mut [u32];

    /// Handles a read from a method-like port.
    ///
    /// Modules without readable handlers are never called here.
    fn read(&mut self, key: u16, bus: &Bus<'_>) -> Result<u32, RuntimeTrap> {
        let _ = (key, bus);
        Ok(0)
    }

    /// Handles a write to a method-like port.
    fn write(&mut self, key: u16, value: u32, bus: &Bus<'_>) -> Result<PortEffect, RuntimeTrap>;

    /// Called once when the owning segment is bound to a host.
    fn attach(&mut self, host: &dyn Host) {
        let _ = host;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scratch([u32; 2]);
    impl Module for Scratch {
        fn cells(&mut self) -> &mut [u32] {
            &mut self.0
        }
        fn write(&mut self, _key: u16, _value: u32, _bus: &Bus<'_>) -> Result<PortEffect, RuntimeTrap> {
            Ok(PortEffect::Continue)
        }
    }
    fn scratch() -> Box<dyn Module> {
        Box::new(Scratch([0; 2]))
    }
    fn decl(id: u8, prefix: &'static str, ports: &'static [PortDecl]) -> ModuleDecl {
        ModuleDecl { id, prefix, cells: 2, ports, kind: ModuleKind::Dispatched(scratch) }
    }

    #[test]
    fn test_standard_catalog() {
        let reg = Registry::standard().unwrap();

        let cases = [
            ("alu.op",     Direction::Read,  0x02A0_0000),
            ("alu.result", Direction::Read,  0x02A0_0001),
            ("alu.add",    Direction::Write, 0x0200_0010),
            ("alu.sub",    Direction::Write, 0x0200_0012),
            ("alu.print",  Direction::Write, 0x0200_0011),
            ("mem.ptr",    Direction::Write, 0x1300_0001),
            ("mem.addr",   Direction::Write, 0x1300_0001),
            ("mem.result", Direction::Read,  0x1300_0005),
            ("io.poll",    Direction::Read,  0x1400_0004),
            ("jmp.branch", Direction::Write, 0x9000_0000),
            ("jmp.nonneg", Direction::Write, 0x9000_0001),
            ("jmp.zero",   Direction::Write, 0x9000_0002),
        ];
        for (name, dir, word) in cases {
            let port = reg.lookup_by_name(name, dir).unwrap_or_else(|| panic!("{name} missing"));
            assert_eq!(port.address().map(PortAddr::word), Some(word), "{name}");
        }

        // write-only ports are not readable
        assert!(reg.lookup_by_name("alu.add", Direction::Read).is_none());
        assert!(reg.lookup_by_name("io.poll", Direction::Write).is_none());
        assert_eq!(reg.modules().map(|m| m.id).collect::<Vec<_>>(), [0x01, 0x02, 0x13, 0x14, 0x90]);
    }

    #[test]
    fn test_duplicate_read_address() {
        static PORTS: &[PortDecl] = &[
            PortDecl::cell(0x01, "a", Capability::Read, 0),
            PortDecl::cell(0x01, "b", Capability::Read, 1),
        ];
        let mut reg = Registry::new();
        let err = reg.register_module(decl(0x40, "t", PORTS)).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateAddress { direction: Direction::Read, .. }));

        // nothing was committed
        assert!(reg.module(0x40).is_none());
        assert!(reg.lookup_by_name("t.a", Direction::Read).is_none());
    }

    #[test]
    fn test_same_address_across_namespaces() {
        static PORTS: &[PortDecl] = &[
            PortDecl::cell(0x01, "status", Capability::Read, 0),
            PortDecl::handler(0x01, "control", Capability::Write, 0),
        ];
        let mut reg = Registry::new();
        reg.register_module(decl(0x40, "t", PORTS)).unwrap();

        assert_eq!(reg.lookup_by_address(0x4000_0001, Direction::Read).unwrap().name(), "t.status");
        assert_eq!(reg.lookup_by_address(0x4000_0001, Direction::Write).unwrap().name(), "t.control");
    }

    #[test]
    fn test_duplicate_names() {
        static A: &[PortDecl] = &[PortDecl::cell(0x01, "x", Capability::ReadWrite, 0)];
        static B: &[PortDecl] = &[PortDecl::cell(0x02, "y", Capability::Write, 0).aliases(&["x"])];

        let mut reg = Registry::new();
        reg.register_module(decl(0x40, "t", A)).unwrap();
        // same prefix, different id: t.x collides in the write direction
        let err = reg.register_module(decl(0x41, "t", B)).unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateName { name: "t.x".into(), direction: Direction::Write });

        // same name in a different direction is fine
        static C: &[PortDecl] = &[PortDecl::cell(0x02, "y", Capability::Read, 0)];
        static D: &[PortDecl] = &[PortDecl::cell(0x03, "y", Capability::Write, 0)];
        reg.register_module(decl(0x42, "u", C)).unwrap();
        reg.register_module(decl(0x43, "u", D)).unwrap();
    }

    #[test]
    fn test_module_id_checks() {
        static P: &[PortDecl] = &[];
        let mut reg = Registry::new();
        assert_eq!(reg.register_module(decl(LITERAL_TAG, "lit", P)), Err(ConfigurationError::ReservedModuleId(0x11)));
        reg.register_module(decl(0x40, "t", P)).unwrap();
        assert_eq!(reg.register_module(decl(0x40, "u", P)), Err(ConfigurationError::DuplicateModule(0x40)));
    }

    #[test]
    fn test_decl_bounds() {
        static WIDE: &[PortDecl] = &[PortDecl::cell(0x100_0000, "wide", Capability::Read, 0)];
        static CELL: &[PortDecl] = &[PortDecl::cell(0x01, "cell", Capability::Read, 2)];
        let mut reg = Registry::new();
        assert!(matches!(
            reg.register_module(decl(0x40, "t", WIDE)),
            Err(ConfigurationError::OffsetOutOfRange { offset: 0x100_0000, .. })
        ));
        assert!(matches!(
            reg.register_module(decl(0x40, "t", CELL)),
            Err(ConfigurationError::CellOutOfRange { cell: 2, cells: 2, .. })
        ));
    }

    #[test]
    fn test_fallback() {
        static PORTS: &[PortDecl] = &[
            PortDecl::cell(0x01, "fixed", Capability::Read, 0),
            PortDecl::handler(0, "range", Capability::Read, 7).fallback(),
        ];
        static TWO: &[PortDecl] = &[
            PortDecl::handler(0, "a", Capability::Write, 0).fallback(),
            PortDecl::handler(0, "b", Capability::Write, 1).fallback(),
        ];
        let mut reg = Registry::new();
        reg.register_module(decl(0x40, "t", PORTS)).unwrap();

        assert_eq!(reg.lookup_by_address(0x4000_0001, Direction::Read).unwrap().name(), "t.fixed");
        let any = reg.lookup_by_address(0x4012_3456, Direction::Read).unwrap();
        assert_eq!(any.name(), "t.range");
        assert!(any.is_fallback());
        assert_eq!(any.address(), None);
        assert!(reg.lookup_by_address(0x4012_3456, Direction::Write).is_none());

        assert_eq!(
            reg.register_module(decl(0x41, "u", TWO)),
            Err(ConfigurationError::DuplicateFallback { module: 0x41, direction: Direction::Write })
        );
    }

    #[test]
    fn test_lookup_never_fails() {
        let reg = Registry::standard().unwrap();
        let words = (0..=255u32)
            .flat_map(|m| [0, 1, 5, 0x10, 0xA0_0000, 0xFF_FFFF].map(move |o| m << 24 | o))
            .chain([0, u32::MAX, 0x1100_0000]);

        for w in words {
            for dir in [Direction::Read, Direction::Write] {
                if let Some(port) = reg.lookup_by_address(w, dir) {
                    assert!(port.capability().allows(dir));
                    assert_eq!(u32::from(port.module_id()), w >> 24);
                }
            }
        }
    }

    #[test]
    fn test_explain_opcode() {
        let reg = Registry::standard().unwrap();
        assert_eq!(reg.explain_opcode(0x1100_002A, false).as_deref(), Some("#42"));
        assert_eq!(reg.explain_opcode(0x02A0_0001, false).as_deref(), Some("alu.result"));
        assert_eq!(reg.explain_opcode(0x9000_0001, true).as_deref(), Some("jmp.nonneg"));
        assert_eq!(reg.explain_opcode(0x0200_0010, true).as_deref(), Some("alu.add"));
        // literal tag means nothing in the destination slot
        assert_eq!(reg.explain_opcode(0x1100_002A, true), None);
        assert_eq!(reg.explain_opcode(0x0200_0010, false), None);
        assert_eq!(reg.explain_opcode(0xDEAD_BEEF, false), None);
    }
}
