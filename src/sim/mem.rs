//! RAM for the machine.
//!
//! This module consists of:
//! - [`Ram`]: The flat byte buffer holding both instructions and data.
//! - [`RamInitStrategy`]: How the buffer is filled before a program is loaded.
//!
//! All word accesses are big-endian and bounds-checked.
//! Offsets do not have to be word-aligned.

use rand::rngs::StdRng;
use rand::Rng;

/// Strategy used to initialize the RAM of the [`Machine`].
///
/// This sets the contents of every byte that the program does not load.
///
/// [`Machine`]: super::Machine
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RamInitStrategy {
    /// Initializes each byte randomly and non-deterministically.
    Unseeded,

    /// Initializes each byte randomly and deterministically.
    Seeded {
        /// The seed the RNG was initialized with.
        seed: u64
    },

    /// Initializes each byte to a known value.
    Known {
        /// The value to initialize each byte to.
        value: u8
    }
}
impl Default for RamInitStrategy {
    fn default() -> Self {
        RamInitStrategy::Known { value: 0 }
    }
}
impl RamInitStrategy {
    fn fill(&self, bytes: &mut [u8]) {
        use rand::SeedableRng;

        match *self {
            RamInitStrategy::Unseeded => rand::thread_rng().fill(bytes),
            RamInitStrategy::Seeded { seed } => StdRng::seed_from_u64(seed).fill(bytes),
            RamInitStrategy::Known { value } => bytes.fill(value),
        }
    }
}

/// The machine's RAM.
#[derive(Clone, PartialEq, Eq)]
pub struct Ram {
    bytes: Box<[u8]>
}
impl Ram {
    /// Creates RAM of the given length, filled according to the strategy.
    pub fn new(len: usize, init: &RamInitStrategy) -> Self {
        let mut bytes = vec![0; len].into_boxed_slice();
        init.fill(&mut bytes);
        Self { bytes }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the RAM has no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The raw contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn span(&self, offset: u32, len: usize) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.bytes.len()).then_some(start..end)
    }

    /// Reads the word at a byte offset, if it lies entirely inside RAM.
    pub fn read_word(&self, offset: u32) -> Option<u32> {
        let span = self.span(offset, 4)?;
        let bytes: [u8; 4] = self.bytes[span].try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    /// Writes the word at a byte offset.
    ///
    /// If the word does not lie entirely inside RAM, nothing is written and this returns `None`.
    pub fn write_word(&mut self, offset: u32, value: u32) -> Option<()> {
        let span = self.span(offset, 4)?;
        self.bytes[span].copy_from_slice(&value.to_be_bytes());
        Some(())
    }

    /// Borrows `len` bytes starting at a byte offset.
    pub fn slice(&self, offset: u32, len: usize) -> Option<&[u8]> {
        self.span(offset, len).map(|span| &self.bytes[span])
    }

    /// Copies `data` into RAM starting at a byte offset.
    ///
    /// If the data does not fit, nothing is written and this returns `None`.
    pub fn copy_from(&mut self, offset: u32, data: &[u8]) -> Option<()> {
        let span = self.span(offset, data.len())?;
        self.bytes[span].copy_from_slice(data);
        Some(())
    }
}
impl std::fmt::Debug for Ram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ram")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_access() {
        let mut ram = Ram::new(16, &RamInitStrategy::default());
        assert_eq!(ram.read_word(0), Some(0));

        ram.write_word(3, 0x0102_0304).unwrap();
        assert_eq!(ram.as_bytes()[3..7], [1, 2, 3, 4]);
        assert_eq!(ram.read_word(3), Some(0x0102_0304));
        assert_eq!(ram.read_word(12), Some(0));

        // partially outside
        assert_eq!(ram.read_word(13), None);
        assert_eq!(ram.write_word(13, 1), None);
        assert_eq!(ram.as_bytes()[13..], [0, 0, 0]);
        assert_eq!(ram.read_word(u32::MAX), None);
    }

    #[test]
    fn test_copy_and_slice() {
        let mut ram = Ram::new(8, &RamInitStrategy::Known { value: 0xFF });
        assert_eq!(ram.copy_from(6, &[1, 2, 3]), None);
        ram.copy_from(6, &[1, 2]).unwrap();
        assert_eq!(ram.slice(4, 4), Some(&[0xFF, 0xFF, 1, 2][..]));
        assert_eq!(ram.slice(8, 0), Some(&[][..]));
        assert_eq!(ram.slice(8, 1), None);
    }

    #[test]
    fn test_seeded_fill_is_deterministic() {
        let a = Ram::new(64, &RamInitStrategy::Seeded { seed: 7 });
        let b = Ram::new(64, &RamInitStrategy::Seeded { seed: 7 });
        let c = Ram::new(64, &RamInitStrategy::Seeded { seed: 8 });
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
