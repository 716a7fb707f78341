//! The backing store of last-recorded values.
//!
//! A flat arena of 32-bit slots indexed by [`SignalCode`]. Its size is fixed
//! when declaration ends; every access goes through a descriptor whose slot
//! range was validated at that point.

use vtrace_common::Bits;

use crate::signal::SignalDescriptor;

/// Flat storage of the last value recorded for every signal.
#[derive(Debug, Default)]
pub struct BackingStore {
    slots: Vec<u32>,
}

impl BackingStore {
    /// Creates a store of `slot_count` zeroed slots.
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![0; slot_count],
        }
    }

    /// Returns the number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the store has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the stored value of a signal.
    pub fn value(&self, desc: &SignalDescriptor) -> Bits<'_> {
        Bits::new(desc.width, &self.slots[desc.slots()])
    }

    /// Overwrites a signal's slots with `current`.
    ///
    /// `current` must already be truncated to the signal's width and be
    /// exactly `desc.slot_count()` words long.
    pub fn write(&mut self, desc: &SignalDescriptor, current: &[u32]) {
        self.slots[desc.slots()].copy_from_slice(current);
    }

    /// Stores `current` if it differs from the stored value.
    ///
    /// Returns `true` when the value changed. Same preconditions as
    /// [`write`](Self::write).
    pub fn update(&mut self, desc: &SignalDescriptor, current: &[u32]) -> bool {
        let slots = &mut self.slots[desc.slots()];
        if *slots == *current {
            false
        } else {
            slots.copy_from_slice(current);
            true
        }
    }

    /// Releases all slots.
    pub fn clear(&mut self) {
        self.slots = Vec::new();
    }
}
