//! The arithmetic unit (`alu`, module `0x02`).
//!
//! `alu.op` holds the left operand, and every operation port takes the right operand
//! as the moved value, storing its output into `alu.result`:
//!
//! | port         | offset     | access | effect                               |
//! |--------------|------------|--------|--------------------------------------|
//! | `alu.op`     | `0xA00000` | rw     | storage                              |
//! | `alu.result` | `0xA00001` | rw     | storage                              |
//! | `alu.temp`   | `0xA00002` | rw     | storage                              |
//! | `alu.add`    | `0x000010` | w      | `result = op + v` (wrapping)         |
//! | `alu.print`  | `0x000011` | w      | prints `v` on the host console       |
//! | `alu.sub`    | `0x000012` | w      | `result = op - v` (wrapping)         |
//! | `alu.lshift` | `0x000013` | w      | `result = op << (v & 31)`            |
//! | `alu.rshift` | `0x000014` | w      | `result = op >> (v & 31)` (arithmetic) |
use crate::err::RuntimeTrap;

use super::{Bus, Capability, Module, ModuleDecl, ModuleKind, PortDecl, PortEffect};

const OP: u16 = 0;
const RESULT: u16 = 1;
const TEMP: u16 = 2;

const ADD: u16 = 0;
const PRINT: u16 = 1;
const SUB: u16 = 2;
const LSHIFT: u16 = 3;
const RSHIFT: u16 = 4;

const PORTS: &[PortDecl] = &[
    PortDecl::cell(0xA00000, "op",     Capability::ReadWrite, OP),
    PortDecl::cell(0xA00001, "result", Capability::ReadWrite, RESULT),
    PortDecl::cell(0xA00002, "temp",   Capability::ReadWrite, TEMP),
    PortDecl::handler(0x10, "add",    Capability::Write, ADD),
    PortDecl::handler(0x11, "print",  Capability::Write, PRINT),
    PortDecl::handler(0x12, "sub",    Capability::Write, SUB),
    PortDecl::handler(0x13, "lshift", Capability::Write, LSHIFT),
    PortDecl::handler(0x14, "rshift", Capability::Write, RSHIFT),
];

/// Declaration of the `alu` module.
pub const DECL: ModuleDecl = ModuleDecl {
    id: 0x02,
    prefix: "alu",
    cells: 3,
    ports: PORTS,
    kind: ModuleKind::Dispatched(Alu::create),
};

/// An instance of the arithmetic unit.
#[derive(Debug, Default)]
pub struct Alu {
    cells: [u32; 3],
}
impl Alu {
    fn create() -> Box<dyn Module> {
        Box::<Alu>::default()
    }
}
impl Module for Alu {
    fn cells(&mut self) -> &mut [u32] {
        &mut self.cells
    }

    fn write(&mut self, key: u16, value: u32, bus: &Bus<'_>) -> Result<PortEffect, RuntimeTrap> {
        let op = self.cells[usize::from(OP)];
        let result = match key {
            ADD    => op.wrapping_add(value),
            SUB    => op.wrapping_sub(value),
            LSHIFT => op << (value & 31),
            RSHIFT => ((op as i32) >> (value & 31)) as u32,
            PRINT  => {
                bus.host.print(value);
                return Ok(PortEffect::Continue);
            },
            _ => return Ok(PortEffect::Continue),
        };
        self.cells[usize::from(RESULT)] = result;
        Ok(PortEffect::Continue)
    }
}
