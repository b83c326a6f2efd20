//! Tokenizing move listings.
//!
//! This module holds the tokens of the listing notation ([`Token`]),
//! which the [`Program`] parser consumes line by line.
//!
//! [`Program`]: super::Program

use std::num::IntErrorKind;

use logos::{Lexer, Logos};

use crate::isa::OFFSET_MASK;

/// A unit of information in a move listing.
#[derive(Debug, Logos, PartialEq, Eq, Clone)]
#[logos(skip r"[ \t]+", error = LexErr)]
pub enum Token {
    // Like the numeric regexes below, these span over technically invalid tokens
    // (e.g., `#12ab`) so the validator can report what was wrong with them.

    /// A literal source operand (e.g., `#10`, `#x1F`).
    #[regex(r"#\d\w*", lex_dec)]
    #[regex(r"#[Xx]\w*", lex_hex)]
    Literal(u32),

    /// A raw operand word (e.g., `@x0200A000`), for words no port is registered at.
    #[regex(r"@[Xx]?\w*", lex_raw)]
    Raw(u32),

    /// A port name (e.g., `alu.op`, `jmp.branch`).
    #[regex(r"[A-Za-z_]\w*(\.[A-Za-z_]\w*)*", |lx| lx.slice().to_string())]
    Name(String),

    /// The arrow between the source and the destination.
    #[token("->")]
    Arrow,

    /// A comment, which starts with a semicolon and spans the remaining part of the line.
    #[regex(r";.*")]
    Comment,

    /// A new line
    #[regex(r"\r?\n")]
    NewLine,
}

/// Any errors raised in attempting to tokenize a listing.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, thiserror::Error)]
pub enum LexErr {
    /// Literal does not fit in the 24 bits of a literal operand.
    #[error("literal does not fit in 24 bits")]
    LiteralTooWide,
    /// Raw word does not fit in 32 bits.
    #[error("raw word does not fit in 32 bits")]
    WordTooWide,
    /// Numeric token has invalid digits.
    #[error("invalid numeric literal")]
    InvalidNumeric,
    /// Numeric token has no digits after its prefix.
    #[error("numeric literal has no digits")]
    EmptyNumeric,
    /// A symbol was used which does not occur in move listings.
    #[default]
    #[error("unrecognized symbol")]
    InvalidSymbol,
}

fn parse_radix(digits: &str, radix: u32) -> Result<u32, LexErr> {
    u32::from_str_radix(digits, radix)
        .map_err(|e| match e.kind() {
            IntErrorKind::Empty => LexErr::EmptyNumeric,
            IntErrorKind::PosOverflow => LexErr::WordTooWide,
            _ => LexErr::InvalidNumeric,
        })
}
fn fit_literal(value: u32) -> Result<u32, LexErr> {
    match value <= OFFSET_MASK {
        true  => Ok(value),
        false => Err(LexErr::LiteralTooWide),
    }
}
fn lex_dec(lx: &Lexer<'_, Token>) -> Result<u32, LexErr> {
    parse_radix(&lx.slice()[1..], 10)
        .map_err(|e| match e {
            LexErr::WordTooWide => LexErr::LiteralTooWide,
            e => e,
        })
        .and_then(fit_literal)
}
fn lex_hex(lx: &Lexer<'_, Token>) -> Result<u32, LexErr> {
    parse_radix(&lx.slice()[2..], 16)
        .map_err(|e| match e {
            LexErr::WordTooWide => LexErr::LiteralTooWide,
            e => e,
        })
        .and_then(fit_literal)
}
fn lex_raw(lx: &Lexer<'_, Token>) -> Result<u32, LexErr> {
    let body = &lx.slice()[1..];
    match body.strip_prefix(['X', 'x']) {
        Some(hex) => parse_radix(hex, 16),
        None => parse_radix(body, 10),
    }
}

#[cfg(test)]
mod tests {
    use logos::Logos;

    use super::{LexErr, Token};

    fn name(s: &str) -> Token {
        Token::Name(s.to_string())
    }

    #[test]
    fn test_literals() {
        let mut tokens = Token::lexer("#0 #10 #x1F #XfF #16777215");
        assert_eq!(tokens.next(), Some(Ok(Token::Literal(0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Literal(10))));
        assert_eq!(tokens.next(), Some(Ok(Token::Literal(0x1F))));
        assert_eq!(tokens.next(), Some(Ok(Token::Literal(0xFF))));
        assert_eq!(tokens.next(), Some(Ok(Token::Literal(0xFF_FFFF))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_literal_errors() {
        let mut tokens = Token::lexer("#16777216 #x1000000 #99999999999 #12ab #x #xG");
        assert_eq!(tokens.next(), Some(Err(LexErr::LiteralTooWide)));
        assert_eq!(tokens.next(), Some(Err(LexErr::LiteralTooWide)));
        assert_eq!(tokens.next(), Some(Err(LexErr::LiteralTooWide)));
        assert_eq!(tokens.next(), Some(Err(LexErr::InvalidNumeric)));
        assert_eq!(tokens.next(), Some(Err(LexErr::EmptyNumeric)));
        assert_eq!(tokens.next(), Some(Err(LexErr::InvalidNumeric)));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_raw_words() {
        let mut tokens = Token::lexer("@xDEADBEEF @17 @x100000000");
        assert_eq!(tokens.next(), Some(Ok(Token::Raw(0xDEAD_BEEF))));
        assert_eq!(tokens.next(), Some(Ok(Token::Raw(17))));
        assert_eq!(tokens.next(), Some(Err(LexErr::WordTooWide)));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_move_line() {
        let tokens: Vec<_> = Token::lexer("alu.result -> jmp.nonneg ; test\r\n#8->jmp.branch\n")
            .collect();
        assert_eq!(tokens, [
            Ok(name("alu.result")),
            Ok(Token::Arrow),
            Ok(name("jmp.nonneg")),
            Ok(Token::Comment),
            Ok(Token::NewLine),
            Ok(Token::Literal(8)),
            Ok(Token::Arrow),
            Ok(name("jmp.branch")),
            Ok(Token::NewLine),
        ]);
    }

    #[test]
    fn test_invalid_symbols() {
        let mut tokens = Token::lexer("alu.op => $");
        assert_eq!(tokens.next(), Some(Ok(name("alu.op"))));
        assert_eq!(tokens.next(), Some(Err(LexErr::InvalidSymbol)));
        assert!(tokens.all(|t| t.is_err()));
    }
}
