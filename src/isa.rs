//! The move instruction and its wire format.
//!
//! Every instruction is 8 bytes: two big-endian 32-bit words, `(source, destination)`.
//!
//! ```text
//!  source:       0x11 | literal:24          (immediate, zero-extended)
//!                id:8 | offset:24           (read port)
//!  destination:  0x9000_0000..=0x9000_0002  (jump control)
//!                id:8 | offset:24           (write port)
//! ```
//!
//! Decoding here only classifies the words.
//! Whether a port address is actually registered is decided by the [`Registry`].
//!
//! ```
//! use move_machine::isa::{ControlOp, Destination, Instr, PortAddr, Source};
//!
//! let instr = Instr::new(Source::Literal(10), Destination::Port(PortAddr::new(0x02, 0xA00000)));
//! let bytes = instr.encode();
//! assert_eq!(bytes, [0x11, 0x00, 0x00, 0x0A, 0x02, 0xA0, 0x00, 0x00]);
//! assert_eq!(Instr::decode(bytes), instr);
//!
//! let jump = Instr::decode_words(0x1100_0008, 0x9000_0000);
//! assert_eq!(jump.dest, Destination::Control(ControlOp::Branch));
//! ```
//!
//! [`Registry`]: crate::bus::Registry

/// Size of one instruction in bytes.
pub const INSTR_SIZE: u32 = 8;

/// Top byte marking a literal source operand.
pub const LITERAL_TAG: u8 = 0x11;

/// Mask of the 24 low bits carried by literals and port offsets.
pub const OFFSET_MASK: u32 = 0x00FF_FFFF;

/// Module id of the jump-control pseudo-module.
pub const JMP_MODULE: u8 = 0x90;

/// An address in a module's read or write namespace.
///
/// The word is encoded as `module_id:8 | offset:24`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortAddr(u32);
impl PortAddr {
    /// Creates an address out of a module id and an offset (truncated to 24 bits).
    pub const fn new(module: u8, offset: u32) -> Self {
        PortAddr(((module as u32) << 24) | (offset & OFFSET_MASK))
    }
    /// Interprets a raw operand word as a port address.
    pub const fn from_word(word: u32) -> Self {
        PortAddr(word)
    }
    /// The module id (top byte).
    pub const fn module_id(self) -> u8 {
        (self.0 >> 24) as u8
    }
    /// The offset inside the module (low 24 bits).
    pub const fn offset(self) -> u32 {
        self.0 & OFFSET_MASK
    }
    /// The raw operand word.
    pub const fn word(self) -> u32 {
        self.0
    }
}
impl std::fmt::Debug for PortAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PortAddr({self})")
    }
}
impl std::fmt::Display for PortAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02X}:{:06X}", self.module_id(), self.offset())
    }
}

/// The three control pseudo-operations, written as destinations.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ControlOp {
    /// `jmp.branch`: jump to the literal source if the condition register is set.
    Branch,
    /// `jmp.nonneg`: set the condition register if the source is nonnegative.
    BranchIfNonNeg,
    /// `jmp.zero`: set the condition register if the source is zero.
    BranchIfZero,
}
impl ControlOp {
    /// The destination word of this operation.
    pub const fn word(self) -> u32 {
        match self {
            ControlOp::Branch         => 0x9000_0000,
            ControlOp::BranchIfNonNeg => 0x9000_0001,
            ControlOp::BranchIfZero   => 0x9000_0002,
        }
    }
    /// Decodes a destination word, if it is a control operation.
    pub const fn from_word(word: u32) -> Option<Self> {
        match word {
            0x9000_0000 => Some(ControlOp::Branch),
            0x9000_0001 => Some(ControlOp::BranchIfNonNeg),
            0x9000_0002 => Some(ControlOp::BranchIfZero),
            _ => None
        }
    }
}

/// Where a move reads its value from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Source {
    /// An immediate 24-bit unsigned constant.
    Literal(u32),
    /// A read port.
    Port(PortAddr),
}
impl Source {
    /// Classifies a source word.
    pub const fn from_word(word: u32) -> Self {
        match (word >> 24) as u8 {
            LITERAL_TAG => Source::Literal(word & OFFSET_MASK),
            _ => Source::Port(PortAddr::from_word(word)),
        }
    }
    /// Encodes this operand. Literals are truncated to 24 bits.
    pub const fn word(self) -> u32 {
        match self {
            Source::Literal(k) => ((LITERAL_TAG as u32) << 24) | (k & OFFSET_MASK),
            Source::Port(p) => p.word(),
        }
    }
}

/// Where a move writes its value to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Destination {
    /// A control pseudo-operation, resolved inline by the compiler.
    Control(ControlOp),
    /// A write port.
    Port(PortAddr),
}
impl Destination {
    /// Classifies a destination word.
    pub const fn from_word(word: u32) -> Self {
        match ControlOp::from_word(word) {
            Some(op) => Destination::Control(op),
            None => Destination::Port(PortAddr::from_word(word)),
        }
    }
    /// Encodes this operand.
    pub const fn word(self) -> u32 {
        match self {
            Destination::Control(op) => op.word(),
            Destination::Port(p) => p.word(),
        }
    }
}

/// A single move instruction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Instr {
    /// Operand the value is read from.
    pub source: Source,
    /// Operand the value is written to.
    pub dest: Destination,
}
impl Instr {
    /// Creates a new instruction.
    pub const fn new(source: Source, dest: Destination) -> Self {
        Self { source, dest }
    }
    /// Classifies a pair of operand words.
    pub const fn decode_words(source: u32, dest: u32) -> Self {
        Self::new(Source::from_word(source), Destination::from_word(dest))
    }
    /// Decodes the 8-byte wire form.
    pub fn decode(bytes: [u8; 8]) -> Self {
        let [s0, s1, s2, s3, d0, d1, d2, d3] = bytes;
        Self::decode_words(
            u32::from_be_bytes([s0, s1, s2, s3]),
            u32::from_be_bytes([d0, d1, d2, d3]),
        )
    }
    /// The raw `(source, destination)` words.
    pub const fn words(&self) -> (u32, u32) {
        (self.source.word(), self.dest.word())
    }
    /// Encodes into the 8-byte wire form.
    pub fn encode(&self) -> [u8; 8] {
        let (src, dst) = self.words();
        let mut out = [0; 8];
        out[..4].copy_from_slice(&src.to_be_bytes());
        out[4..].copy_from_slice(&dst.to_be_bytes());
        out
    }
}

/// Reads the instruction words at `offset`, if 8 bytes are available there.
pub(crate) fn fetch_words(ram: &[u8], offset: u32) -> Option<(u32, u32)> {
    let start = usize::try_from(offset).ok()?;
    let bytes: [u8; 8] = ram.get(start..start.checked_add(8)?)?.try_into().ok()?;
    let [s0, s1, s2, s3, d0, d1, d2, d3] = bytes;
    Some((u32::from_be_bytes([s0, s1, s2, s3]), u32::from_be_bytes([d0, d1, d2, d3])))
}
