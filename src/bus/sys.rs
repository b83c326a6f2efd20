//! System control (`sys`, module `0x01`).
//!
//! - `sys.shutdown`: ends the program. The run returns [`ExitReason::Completed`].
//! - `sys.breakpoint`: suspension point. Calls [`Host::breakpoint`] with the offset
//!   of the instruction, which may block until the host resumes.
//!
//! When segments are compiled with single-stepping,
//! the compiler emits the same suspension before every instruction.
//!
//! [`ExitReason::Completed`]: crate::sim::segment::ExitReason::Completed
//! [`Host::breakpoint`]: super::Host::breakpoint
use crate::err::RuntimeTrap;

use super::{Bus, Capability, Module, ModuleDecl, ModuleKind, PortDecl, PortEffect};

const SHUTDOWN: u16 = 0;
const BREAKPOINT: u16 = 1;

const PORTS: &[PortDecl] = &[
    PortDecl::handler(0x00, "shutdown", Capability::Write, SHUTDOWN),
    PortDecl::handler(0x01, "breakpoint", Capability::Write, BREAKPOINT),
];

/// Declaration of the `sys` module.
pub const DECL: ModuleDecl = ModuleDecl {
    id: 0x01,
    prefix: "sys",
    cells: 0,
    ports: PORTS,
    kind: ModuleKind::Dispatched(System::create),
};

/// An instance of the system control module.
#[derive(Debug, Default)]
pub struct System;
impl System {
    fn create() -> Box<dyn Module> {
        Box::new(System)
    }
}
impl Module for System {
    fn cells(&mut self) -> &mut [u32] {
        &mut []
    }

    fn write(&mut self, key: u16, _value: u32, bus: &Bus<'_>) -> Result<PortEffect, RuntimeTrap> {
        match key {
            SHUTDOWN => Ok(PortEffect::Halt),
            BREAKPOINT => {
                bus.host.breakpoint(bus.offset)?;
                Ok(PortEffect::Continue)
            },
            _ => Ok(PortEffect::Continue),
        }
    }
}
