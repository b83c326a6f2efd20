//! Error types raised by the registry, the segment compiler, and the machine.
//!
//! The errors are split by the stage that raises them:
//! - [`ConfigurationError`]: raised while building the [`Registry`]. These are static defects
//!   in a module's port table and are never retried.
//! - [`CompileError`]: raised while translating a range of RAM into a [`CompiledSegment`].
//! - [`RuntimeTrap`]: raised while a compiled segment executes. One trap ends the run.
//! - [`MachineError`]: what [`Machine::execute`] reports, wrapping either of the previous two.
//!
//! [`Registry`]: crate::bus::Registry
//! [`CompiledSegment`]: crate::sim::segment::CompiledSegment
//! [`Machine::execute`]: crate::sim::Machine::execute
use thiserror::Error;

use crate::bus::Direction;
use crate::isa::PortAddr;

/// A module's port table could not be registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Another module already uses this id.
    #[error("module id 0x{0:02X} is already registered")]
    DuplicateModule(u8),
    /// The id collides with an encoding the instruction format reserves (the literal tag).
    #[error("module id 0x{0:02X} is reserved by the instruction format")]
    ReservedModuleId(u8),
    /// A port offset does not fit in 24 bits.
    #[error("port {name} has offset 0x{offset:X}, which does not fit in 24 bits")]
    OffsetOutOfRange {
        /// Full name of the port.
        name: String,
        /// The offending offset.
        offset: u32,
    },
    /// Two ports share an address in the same namespace of the same module.
    #[error("{direction} slot already defined for {address} ({existing} and {name})")]
    DuplicateAddress {
        /// The colliding address.
        address: PortAddr,
        /// The namespace the collision happened in.
        direction: Direction,
        /// The port registered first.
        existing: String,
        /// The port that was rejected.
        name: String,
    },
    /// Two ports share a name (or alias) in the same direction.
    #[error("{direction} port \"{name}\" is already defined")]
    DuplicateName {
        /// The colliding name.
        name: String,
        /// The namespace the collision happened in.
        direction: Direction,
    },
    /// A module declared more than one wildcard fallback in one namespace.
    #[error("module 0x{module:02X} has more than one {direction} fallback")]
    DuplicateFallback {
        /// Module id.
        module: u8,
        /// The namespace the collision happened in.
        direction: Direction,
    },
    /// A field-like port points past the module's declared storage.
    #[error("port {name} uses cell {cell}, but its module only has {cells} cells")]
    CellOutOfRange {
        /// Full name of the port.
        name: String,
        /// The requested cell.
        cell: u16,
        /// Number of cells the module declares.
        cells: u16,
    },
}

/// A range of RAM could not be translated into a segment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The requested range is reversed, unaligned, or exceeds RAM.
    #[error("invalid segment range {start:#X}..{end:#X} over {len:#X} bytes of RAM")]
    InvalidRange {
        /// Start offset.
        start: u32,
        /// End offset (exclusive).
        end: u32,
        /// Length of the RAM the range was taken from.
        len: usize,
    },
    /// An operand names an address no module registered.
    #[error("no {direction} port at 0x{word:08X} (instruction at {offset:#X})")]
    UnresolvedPort {
        /// Offset of the instruction.
        offset: u32,
        /// The operand word.
        word: u32,
        /// Which slot the word was in.
        direction: Direction,
    },
    /// An unconditional jump takes its target from a port instead of a literal.
    #[error("dynamic jumps unsupported (instruction at {offset:#X})")]
    DynamicJump {
        /// Offset of the instruction.
        offset: u32,
    },
    /// An unconditional jump targets an offset that is not instruction-aligned.
    #[error("jump target {target:#X} is not a multiple of 8 (instruction at {offset:#X})")]
    MisalignedJump {
        /// Offset of the instruction.
        offset: u32,
        /// The requested target.
        target: u32,
    },
}

/// Execution of a compiled segment was aborted.
#[derive(Debug, Error)]
pub enum RuntimeTrap {
    /// Execution reached an instruction that has no valid translation.
    #[error("reached untranslated instruction: {0}")]
    Untranslated(CompileError),
    /// Execution reached an instruction whose bytes changed after compilation,
    /// or a write tried to change an instruction of the live segment.
    #[error("instruction at {offset:#X} was modified while its segment was live")]
    SelfModifyingCode {
        /// Offset of the instruction (or of the attempted write).
        offset: u32,
    },
    /// A RAM access fell outside RAM.
    #[error("RAM access at {offset:#X} is out of bounds")]
    RamOutOfBounds {
        /// Offset of the access.
        offset: u32,
    },
    /// A jump left RAM entirely.
    #[error("jump to {target:#X} lands outside RAM")]
    JumpOutsideRam {
        /// The jump target.
        target: u32,
    },
    /// A segment was entered at an instruction index it does not contain.
    #[error("entry index {index} is outside the segment")]
    EntryOutOfRange {
        /// The requested index.
        index: usize,
    },
    /// A listener callback failed on the compute thread.
    #[error("listener failed: {0}")]
    Listener(#[from] ListenerError),
}

/// Errors reported by [`Machine::execute`].
///
/// [`Machine::execute`]: crate::sim::Machine::execute
#[derive(Debug, Error)]
pub enum MachineError {
    /// Compiling the segment failed.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// The compiled segment trapped.
    #[error(transparent)]
    Trap(#[from] RuntimeTrap),
    /// Another thread is already executing on this machine.
    #[error("machine is already executing on another thread")]
    Busy,
}

/// A failure raised by a memory or execution listener.
///
/// This wraps any error so that it can be carried back through the compute thread.
/// It can be downcast by the typical methods on `dyn Error` after [`ListenerError::into_inner`].
#[derive(Debug)]
pub struct ListenerError(Box<dyn std::error::Error + Send + Sync + 'static>);
impl ListenerError {
    /// Creates a new [`ListenerError`].
    pub fn new(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        ListenerError(Box::new(e))
    }

    /// Get the internal error.
    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self.0
    }
}
impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
impl std::error::Error for ListenerError {}
