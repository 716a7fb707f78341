//! Layout fingerprints.
//!
//! A trace header carries the fingerprint of the signal layout that produced
//! it, so a reader can tell whether two traces were recorded from the same
//! declarations. [`LayoutHasher`] feeds the layout field by field into a
//! streaming XXH3-128 state; [`ContentHash`] is the finished digest.

use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::Xxh3;

/// A finished 128-bit XXH3 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Hashes a byte slice in one shot.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_128(data).to_le_bytes())
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Returns the first eight hex digits, for log lines.
    pub fn short(&self) -> String {
        self.0[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}..)", self.short())
    }
}

/// Incremental hasher for a signal layout.
///
/// Strings are NUL-terminated and integers little-endian, so adjacent fields
/// cannot run into each other.
pub struct LayoutHasher {
    state: Xxh3,
}

impl LayoutHasher {
    /// Starts an empty layout.
    pub fn new() -> Self {
        Self { state: Xxh3::new() }
    }

    /// Marks the start of a record, e.g. `b'S'` for a signal.
    pub fn tag(&mut self, tag: u8) -> &mut Self {
        self.state.update(&[tag]);
        self
    }

    /// Adds a string field.
    pub fn str(&mut self, s: &str) -> &mut Self {
        self.state.update(s.as_bytes());
        self.state.update(&[0]);
        self
    }

    /// Adds an unsigned field.
    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.state.update(&v.to_le_bytes());
        self
    }

    /// Adds a signed field.
    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.state.update(&v.to_le_bytes());
        self
    }

    /// Adds a one-byte field such as an enum discriminant.
    pub fn byte(&mut self, v: u8) -> &mut Self {
        self.state.update(&[v]);
        self
    }

    /// Returns the digest of everything added so far.
    pub fn finish(&self) -> ContentHash {
        ContentHash(self.state.digest128().to_le_bytes())
    }
}

impl Default for LayoutHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_matches_one_shot() {
        let mut h = LayoutHasher::new();
        h.tag(b'S').str("Counter.clk").u32(0);
        let mut bytes = vec![b'S'];
        bytes.extend_from_slice(b"Counter.clk\0");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(h.finish(), ContentHash::from_bytes(&bytes));
    }

    #[test]
    fn field_boundaries_matter() {
        let mut a = LayoutHasher::new();
        a.str("ab").str("c");
        let mut b = LayoutHasher::new();
        b.str("a").str("bc");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn order_matters() {
        let mut a = LayoutHasher::new();
        a.str("Counter.clk").str("Counter.rst");
        let mut b = LayoutHasher::new();
        b.str("Counter.rst").str("Counter.clk");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn display_is_hex() {
        let h = LayoutHasher::new().finish();
        let s = h.to_string();
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(s.starts_with(&h.short()));
        assert_eq!(h.short().len(), 8);
    }
}
