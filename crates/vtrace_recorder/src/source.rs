//! Host-side access to current signal values.

use std::collections::HashMap;

use vtrace_common::{word_count, BitVector};

use crate::signal::SignalCode;

/// Supplies the current value of each declared signal at a recording step.
///
/// `dest` arrives zeroed and sized to the signal's slot count. Implementors
/// write the value least-significant word first. Bits above the declared
/// width are ignored by the recorder.
pub trait ValueSource {
    /// Writes the current value of `code` into `dest`.
    fn read(&self, code: SignalCode, dest: &mut [u32]);
}

impl<F> ValueSource for F
where
    F: Fn(SignalCode, &mut [u32]),
{
    fn read(&self, code: SignalCode, dest: &mut [u32]) {
        self(code, dest)
    }
}

/// A host-side table of current values keyed by signal code.
///
/// Signals without an entry read as zero.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    values: HashMap<SignalCode, Vec<u32>>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value of up to 64 bits.
    pub fn set(&mut self, code: SignalCode, value: u64) -> &mut Self {
        self.values
            .insert(code, vec![value as u32, (value >> 32) as u32]);
        self
    }

    /// Sets a single-bit value.
    pub fn set_bool(&mut self, code: SignalCode, value: bool) -> &mut Self {
        self.set(code, value as u64)
    }

    /// Sets a value from little-endian words.
    pub fn set_words(&mut self, code: SignalCode, words: &[u32]) -> &mut Self {
        self.values.insert(code, words.to_vec());
        self
    }

    /// Sets a value from a bit vector.
    pub fn set_vector(&mut self, code: SignalCode, value: &BitVector) -> &mut Self {
        self.set_words(code, value.words())
    }

    /// Returns the words stored for `code`, if any.
    pub fn get(&self, code: SignalCode) -> Option<&[u32]> {
        self.values.get(&code).map(Vec::as_slice)
    }

    /// Returns the value stored for `code` as a `width`-bit vector.
    pub fn get_vector(&self, code: SignalCode, width: u32) -> BitVector {
        match self.get(code) {
            Some(words) => BitVector::from_words(words, width),
            None => BitVector::new(width),
        }
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl ValueSource for Snapshot {
    fn read(&self, code: SignalCode, dest: &mut [u32]) {
        if let Some(words) = self.values.get(&code) {
            let n = dest.len().min(words.len());
            dest[..n].copy_from_slice(&words[..n]);
        }
    }
}

/// Reads `code` from `source` into a fresh `width`-bit vector.
pub fn read_vector(source: &dyn ValueSource, code: SignalCode, width: u32) -> BitVector {
    let mut words = vec![0; word_count(width)];
    source.read(code, &mut words);
    BitVector::from_words(&words, width)
}
