//! A port registry, segment compiler, and threaded machine for a move computer.
//!
//! A move machine has exactly one instruction: copy a value from a source port to a destination port.
//! Everything else (arithmetic, memory, I/O, jumps) is a side effect of moving into the right port.
//!
//! # Usage
//!
//! Ports are resolved through a [`Registry`](bus::Registry),
//! which knows the port tables of every module:
//! ```
//! use move_machine::bus::{Direction, Registry};
//!
//! let registry = Registry::standard().unwrap();
//! let port = registry.lookup_by_name("alu.op", Direction::Write).unwrap();
//! assert_eq!(port.address().unwrap().word(), 0x02A0_0000);
//! ```
//!
//! Programs can be written as listings and loaded into a [`Machine`](sim::Machine):
//! ```
//! use std::sync::Arc;
//! use move_machine::asm::Program;
//! use move_machine::bus::Registry;
//! use move_machine::sim::{Machine, MachineConfig};
//! use move_machine::sim::compile::CompileOptions;
//!
//! let registry = Arc::new(Registry::standard().unwrap());
//! let program = Program::from_listing(&registry, "
//!     #10 -> alu.op
//!     #1 -> alu.sub
//!     alu.result -> sys.shutdown
//! ").unwrap();
//!
//! let machine = Machine::new(registry, MachineConfig {
//!     ram_size: 4096,
//!     compile: CompileOptions { strict: false, single_step: false },
//!     ..Default::default()
//! });
//! machine.copy_into_ram(0, &program.to_bytes()).unwrap();
//! machine.execute().unwrap(); // <-- Result can be handled accordingly
//! ```
//!
//! With single-stepping compiled in, execution blocks until another thread
//! starts or steps the machine. See the [`sim`] module for more details.
#![warn(missing_docs)]

pub mod asm;
pub mod bus;
pub mod err;
pub mod isa;
pub mod sim;
