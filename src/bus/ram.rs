//! The RAM controller (`mem`, module `0x13`).
//!
//! Gives programs word access to the machine's RAM through the host:
//! - `mem.read` takes a byte offset and loads the word there into `mem.value`.
//! - `mem.write` stores the moved value at the byte offset held in `mem.ptr`.
//!
//! Stores go through [`Host::write_to_ram`], so memory listeners see them
//! (and a store into a live instruction is refused).
//!
//! [`Host::write_to_ram`]: super::Host::write_to_ram
use crate::err::RuntimeTrap;

use super::{Bus, Capability, Module, ModuleDecl, ModuleKind, PortDecl, PortEffect};

const PTR: u16 = 0;
const VALUE: u16 = 1;

const READ: u16 = 0;
const WRITE: u16 = 1;

const PORTS: &[PortDecl] = &[
    PortDecl::cell(0x01, "ptr", Capability::ReadWrite, PTR).aliases(&["addr"]),
    PortDecl::handler(0x03, "read", Capability::Write, READ),
    PortDecl::handler(0x04, "write", Capability::Write, WRITE),
    PortDecl::cell(0x05, "value", Capability::ReadWrite, VALUE).aliases(&["result"]),
];

/// Declaration of the `mem` module.
pub const DECL: ModuleDecl = ModuleDecl {
    id: 0x13,
    prefix: "mem",
    cells: 2,
    ports: PORTS,
    kind: ModuleKind::Dispatched(MemoryController::create),
};

/// An instance of the RAM controller.
#[derive(Debug, Default)]
pub struct MemoryController {
    cells: [u32; 2],
}
impl MemoryController {
    fn create() -> Box<dyn Module> {
        Box::<MemoryController>::default()
    }
}
impl Module for MemoryController {
    fn cells(&mut self) -> &mut [u32] {
        &mut self.cells
    }

    fn write(&mut self, key: u16, value: u32, bus: &Bus<'_>) -> Result<PortEffect, RuntimeTrap> {
        match key {
            READ  => self.cells[usize::from(VALUE)] = bus.host.read_from_ram(value)?,
            WRITE => bus.host.write_to_ram(self.cells[usize::from(PTR)], value)?,
            _ => {}
        }
        Ok(PortEffect::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::TestHost;
    use crate::isa::PortAddr;

    #[test]
    fn test_load_store() {
        let host = TestHost::new(vec![0; 32]);
        let bus = Bus { host: &host, offset: 0, addr: PortAddr::new(0x13, 0) };
        let mut mem = MemoryController::default();

        mem.cells[usize::from(PTR)] = 12;
        mem.write(WRITE, 0xDEAD_BEEF, &bus).unwrap();
        assert_eq!(host.ram.borrow()[12..16], [0xDE, 0xAD, 0xBE, 0xEF]);

        mem.write(READ, 12, &bus).unwrap();
        assert_eq!(mem.cells[usize::from(VALUE)], 0xDEAD_BEEF);

        // ptr is untouched by a read
        assert_eq!(mem.cells[usize::from(PTR)], 12);
    }

    #[test]
    fn test_out_of_bounds() {
        let host = TestHost::new(vec![0; 32]);
        let bus = Bus { host: &host, offset: 0, addr: PortAddr::new(0x13, 0) };
        let mut mem = MemoryController::default();

        let err = mem.write(READ, 30, &bus).unwrap_err();
        assert!(matches!(err, RuntimeTrap::RamOutOfBounds { offset: 30 }));
    }
}
