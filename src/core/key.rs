//! Variable keys.
//!
//! A [`Key`] packs an optional character tag into the top byte and an index
//! into the remaining 56 bits, so `x1`, `x2`, `l1` sort by tag first and then
//! by index.

use std::fmt;

const CHR_BITS: u32 = 8;
const INDEX_BITS: u64 = 64 - CHR_BITS as u64;
const INDEX_MASK: u64 = (1u64 << INDEX_BITS) - 1;

/// Opaque, totally ordered variable identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(u64);

impl Key {
    /// Key from a raw integer.
    pub const fn new(raw: u64) -> Self {
        Key(raw)
    }

    /// Key from a character tag and an index, e.g. `Key::symbol('x', 1)`.
    ///
    /// Only ASCII tags fit in the tag byte; the index is truncated to 56 bits.
    pub const fn symbol(chr: char, index: u64) -> Self {
        Key(((chr as u64 & 0xff) << INDEX_BITS) | (index & INDEX_MASK))
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Tag character, if the key was built with [`Key::symbol`].
    pub fn chr(&self) -> Option<char> {
        match (self.0 >> INDEX_BITS) as u8 {
            0 => None,
            c => Some(c as char),
        }
    }

    pub const fn index(&self) -> u64 {
        self.0 & INDEX_MASK
    }
}

impl From<u64> for Key {
    fn from(raw: u64) -> Self {
        Key(raw)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chr() {
            Some(c) => write!(f, "{c}{}", self.index()),
            None => write!(f, "{}", self.0),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
