//! Jump control (`jmp`, module `0x90`).
//!
//! These ports only exist so that they have names and addresses.
//! The segment compiler resolves every move into them inline,
//! so the module is never instantiated (see [`ControlOp`]).
//!
//! [`ControlOp`]: crate::isa::ControlOp
use crate::isa::{ControlOp, JMP_MODULE};

use super::{Capability, ModuleDecl, ModuleKind, PortDecl};

const PORTS: &[PortDecl] = &[
    PortDecl::handler(ControlOp::Branch.word() & 0xFF_FFFF, "branch", Capability::Write, 0),
    PortDecl::handler(ControlOp::BranchIfNonNeg.word() & 0xFF_FFFF, "nonneg", Capability::Write, 1),
    PortDecl::handler(ControlOp::BranchIfZero.word() & 0xFF_FFFF, "zero", Capability::Write, 2),
];

/// Declaration of the `jmp` module.
pub const DECL: ModuleDecl = ModuleDecl {
    id: JMP_MODULE,
    prefix: "jmp",
    cells: 0,
    ports: PORTS,
    kind: ModuleKind::Inline,
};
