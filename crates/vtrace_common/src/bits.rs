//! Packed two-state bit vectors for traced signal values.
//!
//! Values are stored least-significant word first in 32-bit words, which is
//! also the layout of the recorder's backing store. [`BitVector`] owns its
//! words; [`Bits`] is a borrowed view over a slice of backing-store words.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bits packed per storage word.
pub const BITS_PER_WORD: u32 = 32;

/// Returns the number of 32-bit words needed to store `width` bits.
pub fn word_count(width: u32) -> usize {
    width.div_ceil(BITS_PER_WORD) as usize
}

/// Returns the mask of valid bits in the most significant word of a
/// `width`-bit value.
pub fn top_word_mask(width: u32) -> u32 {
    match width % BITS_PER_WORD {
        0 => u32::MAX,
        rem => (1u32 << rem) - 1,
    }
}

/// Clears every bit at or above `width` in `words`.
///
/// Words past `word_count(width)` are zeroed entirely. This is the
/// truncation applied to any value wider than its declared width.
pub fn truncate_words(words: &mut [u32], width: u32) {
    let used = word_count(width);
    if used == 0 {
        words.fill(0);
        return;
    }
    if let Some(top) = words.get_mut(used - 1) {
        *top &= top_word_mask(width);
    }
    if words.len() > used {
        words[used..].fill(0);
    }
}

/// A fixed-width vector of two-state bits.
///
/// Bit `i` lives in word `i / 32` at position `i % 32`. Bits above the width
/// are always zero. Deserialization rejects input that breaks either rule.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBitVector")]
pub struct BitVector {
    width: u32,
    words: Vec<u32>,
}

/// Serialized form of a [`BitVector`], checked on the way in.
#[derive(Deserialize)]
struct RawBitVector {
    width: u32,
    words: Vec<u32>,
}

/// Error returned when deserialized words do not fit the declared width.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidBitVector {
    /// The word count does not match the width.
    #[error("a {width}-bit vector needs {expected} word(s), got {actual}")]
    WordCount {
        /// Declared width.
        width: u32,
        /// Words required by the width.
        expected: usize,
        /// Words supplied.
        actual: usize,
    },
    /// Bits above the width are set.
    #[error("bits above width {width} are set")]
    StrayBits {
        /// Declared width.
        width: u32,
    },
}

impl TryFrom<RawBitVector> for BitVector {
    type Error = InvalidBitVector;

    fn try_from(raw: RawBitVector) -> Result<Self, Self::Error> {
        let expected = word_count(raw.width);
        if raw.words.len() != expected {
            return Err(InvalidBitVector::WordCount {
                width: raw.width,
                expected,
                actual: raw.words.len(),
            });
        }
        if raw
            .words
            .last()
            .is_some_and(|top| top & !top_word_mask(raw.width) != 0)
        {
            return Err(InvalidBitVector::StrayBits { width: raw.width });
        }
        Ok(Self {
            width: raw.width,
            words: raw.words,
        })
    }
}

impl BitVector {
    /// Creates a new `BitVector` of the given width with every bit cleared.
    pub fn new(width: u32) -> Self {
        Self {
            width,
            words: vec![0; word_count(width)],
        }
    }

    /// Creates a single-bit vector from a boolean value.
    pub fn from_bool(value: bool) -> Self {
        Self::from_u64(value as u64, 1)
    }

    /// Creates a vector from a `u64` value with the given width.
    ///
    /// Bits beyond the given width are dropped.
    pub fn from_u64(value: u64, width: u32) -> Self {
        let mut v = Self::new(width);
        if let Some(w) = v.words.get_mut(0) {
            *w = value as u32;
        }
        if let Some(w) = v.words.get_mut(1) {
            *w = (value >> 32) as u32;
        }
        truncate_words(&mut v.words, width);
        v
    }

    /// Creates a vector from little-endian words, truncating to `width`.
    ///
    /// Missing high words read as zero; extra words are ignored.
    pub fn from_words(words: &[u32], width: u32) -> Self {
        let mut v = Self::new(width);
        let n = v.words.len().min(words.len());
        v.words[..n].copy_from_slice(&words[..n]);
        truncate_words(&mut v.words, width);
        v
    }

    /// Parses a binary string like `"1010"`; the leftmost character is the
    /// most significant bit.
    ///
    /// Returns `None` on characters other than `0` and `1`, or on an empty
    /// string.
    pub fn from_binary_str(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        let width = s.len() as u32;
        let mut v = Self::new(width);
        for (i, c) in s.chars().rev().enumerate() {
            match c {
                '0' => {}
                '1' => v.set(i as u32, true),
                _ => return None,
            }
        }
        Some(v)
    }

    /// Parses a hex string; each digit contributes four bits.
    pub fn from_hex_str(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        let width = (s.len() as u32) * 4;
        let mut v = Self::new(width);
        for (hex_idx, c) in s.chars().rev().enumerate() {
            let nibble = c.to_digit(16)?;
            let bit = hex_idx as u32 * 4;
            v.words[(bit / BITS_PER_WORD) as usize] |= nibble << (bit % BITS_PER_WORD);
        }
        Some(v)
    }

    /// Returns the number of bits in this vector.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the packed words, least significant first.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Returns the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn get(&self, index: u32) -> bool {
        self.as_bits().get(index)
    }

    /// Sets the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn set(&mut self, index: u32, value: bool) {
        assert!(
            index < self.width,
            "index {index} out of bounds for width {}",
            self.width
        );
        let word = &mut self.words[(index / BITS_PER_WORD) as usize];
        let mask = 1u32 << (index % BITS_PER_WORD);
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    /// Converts to a `u64`, or `None` if a bit above 63 is set.
    pub fn to_u64(&self) -> Option<u64> {
        self.as_bits().to_u64()
    }

    /// Returns a borrowed view of this vector.
    pub fn as_bits(&self) -> Bits<'_> {
        Bits {
            width: self.width,
            words: &self.words,
        }
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_bits(), f)
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector({self})")
    }
}

/// A borrowed `width`-bit value over packed little-endian words.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Bits<'a> {
    width: u32,
    words: &'a [u32],
}

impl<'a> Bits<'a> {
    /// Creates a view over `words` holding a `width`-bit value.
    ///
    /// # Panics
    ///
    /// Panics if `words` is shorter than `word_count(width)`.
    pub fn new(width: u32, words: &'a [u32]) -> Self {
        assert!(
            words.len() >= word_count(width),
            "{} words cannot hold {width} bits",
            words.len()
        );
        Self {
            width,
            words: &words[..word_count(width)],
        }
    }

    /// Returns the number of bits in the value.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the packed words, least significant first.
    pub fn words(&self) -> &'a [u32] {
        self.words
    }

    /// Returns the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn get(&self, index: u32) -> bool {
        assert!(
            index < self.width,
            "index {index} out of bounds for width {}",
            self.width
        );
        let word = self.words[(index / BITS_PER_WORD) as usize];
        (word >> (index % BITS_PER_WORD)) & 1 != 0
    }

    /// Converts to a `u64`, or `None` if a bit above 63 is set.
    pub fn to_u64(&self) -> Option<u64> {
        if self.words.iter().skip(2).any(|&w| w != 0) {
            return None;
        }
        let lo = self.words.first().copied().unwrap_or(0) as u64;
        let hi = self.words.get(1).copied().unwrap_or(0) as u64;
        Some(lo | (hi << 32))
    }

    /// Copies the value into an owned [`BitVector`].
    pub fn to_vector(&self) -> BitVector {
        BitVector::from_words(self.words, self.width)
    }
}

/// Formats the value as binary digits, most significant bit first, padded
/// to the full width.
impl fmt::Display for Bits<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..self.width).rev() {
            f.write_str(if self.get(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for Bits<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bits({self})")
    }
}
