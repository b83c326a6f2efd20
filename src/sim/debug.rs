//! Utilities to debug execution.
//!
//! The key type here is [`Breakpoint`], which can be added to the [`Machine`]
//! with [`Machine::add_breakpoint`] to stop a running machine.
//!
//! Breakpoints are checked at every suspension point while the machine is running.
//! When one matches, the machine stops (as if [`Machine::stop`] was called)
//! and the compute thread blocks until it is resumed.
//!
//! [`Machine`]: super::Machine
//! [`Machine::add_breakpoint`]: super::Machine::add_breakpoint
//! [`Machine::stop`]: super::Machine::stop
use std::fmt::Write;

use super::mem::Ram;

/// Common breakpoints.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Breakpoint {
    /// Break when the program counter is equal to the given offset.
    Pc(u32),

    /// Break when the word at the given RAM offset matches.
    Mem {
        /// Byte offset to check.
        addr: u32,
        /// Predicate to break against.
        value: Comparator
    },
}

impl Breakpoint where Breakpoint: Send + Sync { /* assert Breakpoint is send/sync */ }

impl Breakpoint {
    /// Checks if a break should occur.
    pub fn check(&self, pc: u32, ram: &Ram) -> bool {
        match self {
            Breakpoint::Pc(expected) => *expected == pc,
            Breakpoint::Mem { addr, value: cmp } => ram.read_word(*addr).is_some_and(|w| cmp.check(w)),
        }
    }

    fn fmt_bp(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Pc(expected) => {
                write!(f, "PC == {expected:#010X}")?;
            },
            Self::Mem { addr, value } => {
                write!(f, "mem[{addr:#010X}] ")?;
                value.fmt_cmp(f)?;
            },
        }
        Ok(())
    }
}
impl std::fmt::Debug for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Breakpoint(")?;
        self.fmt_bp(f)?;
        f.write_char(')')
    }
}

/// Predicate checking a word against a value.
///
/// Words are compared as signed integers, the way `jmp.nonneg` interprets them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Comparator {
    /// Never breaks.
    Never,
    /// Break if the word is less than the provided value.
    Lt(i32),
    /// Break if the word is equal to the provided value.
    Eq(i32),
    /// Break if the word is less than or equal to the provided value.
    Le(i32),
    /// Break if the word is greater than the provided value.
    Gt(i32),
    /// Break if the word is not equal to the provided value.
    Ne(i32),
    /// Break if the word is greater than or equal to the provided value.
    Ge(i32),
    /// Always breaks.
    Always
}
impl Comparator {
    /// Checks if the word passes the comparator.
    pub fn check(&self, word: u32) -> bool {
        let operand = word as i32;
        match *self {
            Comparator::Never  => false,
            Comparator::Lt(r)  => operand < r,
            Comparator::Eq(r)  => operand == r,
            Comparator::Le(r)  => operand <= r,
            Comparator::Gt(r)  => operand > r,
            Comparator::Ne(r)  => operand != r,
            Comparator::Ge(r)  => operand >= r,
            Comparator::Always => true,
        }
    }

    fn fmt_cmp(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Comparator::Never  => f.write_str("never"),
            Comparator::Lt(r)  => write!(f, "< {r}"),
            Comparator::Eq(r)  => write!(f, "== {r}"),
            Comparator::Le(r)  => write!(f, "<= {r}"),
            Comparator::Gt(r)  => write!(f, "> {r}"),
            Comparator::Ne(r)  => write!(f, "!= {r}"),
            Comparator::Ge(r)  => write!(f, ">= {r}"),
            Comparator::Always => f.write_str("always"),
        }
    }
}
