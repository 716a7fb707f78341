//! Shared foundational types used across the vtrace workspace.
//!
//! This crate provides two-state packed bit vectors for traced values,
//! timescale units for trace timestamps, the trace file format selector, and
//! content hashing used to fingerprint frozen signal layouts.

#![warn(missing_docs)]

pub mod bits;
pub mod format;
pub mod hash;
pub mod time;

pub use bits::{truncate_words, word_count, BitVector, Bits, InvalidBitVector, BITS_PER_WORD};
pub use format::{ParseFormatError, TraceFormat, DEFAULT_VERSION};
pub use hash::{ContentHash, LayoutHasher};
pub use time::{ParseTimescaleError, TimeUnit, Timescale};
