//! Building move programs from listings.
//!
//! A listing has one move per line, written `source -> destination`:
//! - a literal source is written `#10` or `#x1F` (at most 24 bits),
//! - a port is written by its full name (`alu.op`, `jmp.branch`),
//! - a word no port is registered at is written raw (`@x0200A000`),
//! - `;` starts a comment.
//!
//! This module notably consists of:
//! - [`Program`]: a sequence of instructions, built by name and encoded into RAM bytes.
//! - [`disassemble`]: the inverse, which renders RAM bytes back into a listing.
//! - [`lex`]: the tokens of the listing notation.
//!
//! Labels, directives, and multi-file assembly belong to the external assembler
//! and are not handled here.
//!
//! ```
//! use move_machine::asm::{disassemble, Program};
//! use move_machine::bus::Registry;
//!
//! let registry = Registry::standard().unwrap();
//! let mut program = Program::new();
//! program.push(&registry, "#10", "alu.op").unwrap()
//!     .push(&registry, "alu.result", "alu.print").unwrap();
//!
//! let bytes = program.to_bytes();
//! assert_eq!(&bytes[..8], [0x11, 0, 0, 10, 0x02, 0xA0, 0, 0]);
//! assert_eq!(disassemble(&registry, &bytes), "#10 -> alu.op\nalu.result -> alu.print\n");
//! ```
pub mod lex;

use logos::Logos;
use thiserror::Error;

use crate::bus::{Direction, Registry};
use crate::isa::{Destination, Instr, Source, INSTR_SIZE, LITERAL_TAG};

use self::lex::{LexErr, Token};

/// Errors raised while building a program.
#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum AsmErr {
    /// An operand could not be tokenized.
    #[error(transparent)]
    Lex(#[from] LexErr),
    /// The line is not of the form `source -> destination`.
    #[error("expected `source -> destination`")]
    Syntax,
    /// No port with this name exists in the direction it was used in.
    #[error("no {direction} port named \"{name}\"")]
    UnknownPort {
        /// The name that was used.
        name: String,
        /// The direction it was used in.
        direction: Direction,
    },
    /// The port is a wildcard fallback, so it has no address to encode.
    #[error("port \"{0}\" has no fixed address")]
    NoAddress(String),
    /// A literal was used as a destination.
    #[error("literals cannot be destinations")]
    LiteralDestination,
    /// An error on a given line of a listing.
    #[error("line {line}: {err}")]
    Line {
        /// Line number (1-indexed).
        line: usize,
        /// The error on the line.
        err: Box<AsmErr>,
    },
}

/// A sequence of move instructions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Program {
    instrs: Vec<Instr>,
}
impl Program {
    /// Creates an empty program.
    pub fn new() -> Self {
        Default::default()
    }

    /// Parses a listing, resolving port names against the registry.
    ///
    /// Blank and comment-only lines produce no instructions.
    pub fn from_listing(registry: &Registry, listing: &str) -> Result<Self, AsmErr> {
        let mut program = Program::new();
        let mut line = 1;
        let mut tokens = vec![];

        let at = |line: usize, err: AsmErr| AsmErr::Line { line, err: Box::new(err) };
        for token in Token::lexer(listing) {
            match token.map_err(|e| at(line, e.into()))? {
                Token::NewLine => {
                    program.push_tokens(registry, &tokens).map_err(|e| at(line, e))?;
                    tokens.clear();
                    line += 1;
                },
                Token::Comment => {},
                t => tokens.push(t),
            }
        }
        program.push_tokens(registry, &tokens).map_err(|e| at(line, e))?;

        Ok(program)
    }

    fn push_tokens(&mut self, registry: &Registry, tokens: &[Token]) -> Result<(), AsmErr> {
        match tokens {
            [] => Ok(()),
            [src, Token::Arrow, dst] => {
                let instr = Instr::new(
                    Source::from_word(source_word(registry, src)?),
                    Destination::from_word(dest_word(registry, dst)?),
                );
                self.instrs.push(instr);
                Ok(())
            },
            _ => Err(AsmErr::Syntax),
        }
    }

    /// Appends a move, with both operands written in listing notation.
    pub fn push(&mut self, registry: &Registry, src: &str, dst: &str) -> Result<&mut Self, AsmErr> {
        let src = single_token(src)?;
        let dst = single_token(dst)?;
        self.push_tokens(registry, &[src, Token::Arrow, dst])?;
        Ok(self)
    }

    /// Appends an already-decoded instruction.
    pub fn push_instr(&mut self, instr: Instr) -> &mut Self {
        self.instrs.push(instr);
        self
    }

    /// Appends a raw 8-byte slot (e.g., data the program reads through `mem.read`).
    pub fn push_words(&mut self, source: u32, dest: u32) -> &mut Self {
        self.push_instr(Instr::decode_words(source, dest))
    }

    /// The instructions of this program.
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    /// Whether the program holds no instructions.
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Encodes the program into the bytes that are loaded into RAM.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.instrs.iter()
            .flat_map(Instr::encode)
            .collect()
    }
}
impl Extend<Instr> for Program {
    fn extend<T: IntoIterator<Item = Instr>>(&mut self, iter: T) {
        self.instrs.extend(iter);
    }
}

fn single_token(operand: &str) -> Result<Token, AsmErr> {
    let mut tokens = Token::lexer(operand);
    match (tokens.next(), tokens.next()) {
        (Some(token), None) => Ok(token?),
        (Some(Err(e)), _) => Err(e.into()),
        _ => Err(AsmErr::Syntax),
    }
}

fn port_word(registry: &Registry, name: &str, direction: Direction) -> Result<u32, AsmErr> {
    let port = registry.lookup_by_name(name, direction)
        .ok_or_else(|| AsmErr::UnknownPort { name: name.to_string(), direction })?;
    port.address()
        .map(|addr| addr.word())
        .ok_or_else(|| AsmErr::NoAddress(port.name().to_string()))
}

fn source_word(registry: &Registry, token: &Token) -> Result<u32, AsmErr> {
    match token {
        Token::Literal(k) => Ok(u32::from(LITERAL_TAG) << 24 | k),
        Token::Raw(w) => Ok(*w),
        Token::Name(n) => port_word(registry, n, Direction::Read),
        _ => Err(AsmErr::Syntax),
    }
}

fn dest_word(registry: &Registry, token: &Token) -> Result<u32, AsmErr> {
    match token {
        Token::Literal(_) => Err(AsmErr::LiteralDestination),
        Token::Raw(w) => Ok(*w),
        Token::Name(n) => port_word(registry, n, Direction::Write),
        _ => Err(AsmErr::Syntax),
    }
}

/// Renders RAM bytes as a listing, one line per 8-byte slot.
///
/// Operands with no registered port are written raw.
/// A trailing partial slot is ignored.
pub fn disassemble(registry: &Registry, bytes: &[u8]) -> String {
    let mut out = String::new();
    for chunk in bytes.chunks_exact(INSTR_SIZE as usize) {
        let (src, dst) = chunk.split_at(4);
        let src = u32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        let dst = u32::from_be_bytes([dst[0], dst[1], dst[2], dst[3]]);

        let explain = |word, is_dest| registry.explain_opcode(word, is_dest)
            .unwrap_or_else(|| format!("@x{word:08X}"));
        out.push_str(&format!("{} -> {}\n", explain(src, false), explain(dst, true)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{ControlOp, PortAddr};

    fn registry() -> Registry {
        Registry::standard().unwrap()
    }

    #[test]
    fn test_listing() {
        let reg = registry();
        let program = Program::from_listing(&reg, "
            ; count down from 10
            #10 -> alu.op
            #1 -> alu.sub          ; subtract
            alu.result -> jmp.nonneg
            #x8 -> jmp.branch
            mem.addr -> mem.ptr
        ").unwrap();

        assert_eq!(program.len(), 5);
        let instrs = program.instrs();
        assert_eq!(instrs[0], Instr::new(Source::Literal(10), Destination::Port(PortAddr::new(0x02, 0xA0_0000))));
        assert_eq!(instrs[1].words(), (0x1100_0001, 0x0200_0012));
        assert_eq!(instrs[2].dest, Destination::Control(ControlOp::BranchIfNonNeg));
        assert_eq!(instrs[3].dest, Destination::Control(ControlOp::Branch));
        // aliases resolve to the same port
        assert_eq!(instrs[4].words(), (0x1300_0001, 0x1300_0001));
    }

    #[test]
    fn test_listing_errors() {
        let reg = registry();

        let err = Program::from_listing(&reg, "#1 -> alu.op\nalu.add -> alu.op").unwrap_err();
        assert_eq!(err, AsmErr::Line {
            line: 2,
            err: Box::new(AsmErr::UnknownPort { name: "alu.add".into(), direction: Direction::Read }),
        });

        let err = Program::from_listing(&reg, "alu.op -> #4").unwrap_err();
        assert_eq!(err, AsmErr::Line { line: 1, err: Box::new(AsmErr::LiteralDestination) });

        let err = Program::from_listing(&reg, "\n\nalu.op alu.result").unwrap_err();
        assert_eq!(err, AsmErr::Line { line: 3, err: Box::new(AsmErr::Syntax) });

        let err = Program::from_listing(&reg, "#x1000000 -> alu.op").unwrap_err();
        assert_eq!(err, AsmErr::Line { line: 1, err: Box::new(AsmErr::Lex(LexErr::LiteralTooWide)) });
        assert_eq!(err.to_string(), "line 1: literal does not fit in 24 bits");
    }

    #[test]
    fn test_push() {
        let reg = registry();
        let mut program = Program::new();
        program.push(&reg, "io.poll", "alu.print").unwrap()
            .push_words(0xDEAD_BEEF, 0)
            .push(&reg, "@x13000005", "sys.shutdown").unwrap();

        assert_eq!(program.instrs()[0].words(), (0x1400_0004, 0x0200_0011));
        assert_eq!(program.instrs()[1].words(), (0xDEAD_BEEF, 0));
        assert_eq!(program.instrs()[2].words(), (0x1300_0005, 0x0100_0000));

        assert_eq!(program.push(&reg, "alu.op alu.op", "alu.op"), Err(AsmErr::Syntax));
        assert_eq!(program.push(&reg, "", "alu.op"), Err(AsmErr::Syntax));
        assert_eq!(program.len(), 3);
    }

    #[test]
    fn test_disassemble() {
        let reg = registry();
        let listing = "\
            #10 -> alu.op\n\
            mem.ptr -> jmp.zero\n\
            #0 -> jmp.branch\n\
            @xDEADBEEF -> @x00000000\n";
        let program = Program::from_listing(&reg, listing).unwrap();
        let bytes = program.to_bytes();

        let text = disassemble(&reg, &bytes);
        assert_eq!(text, "#10 -> alu.op\nmem.ptr -> jmp.zero\n#0 -> jmp.branch\n@xDEADBEEF -> @x00000000\n");
        assert_eq!(Program::from_listing(&reg, &text).unwrap(), program);

        // partial slots are ignored
        assert_eq!(disassemble(&reg, &bytes[..12]), "#10 -> alu.op\n");
    }
}
