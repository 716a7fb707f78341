//! Signal identity: codes, directions, kinds, and descriptors.
//!
//! A [`SignalCode`] is the offset of a signal's first slot in the backing
//! store. Codes are handed out contiguously during declaration, so a signal
//! of width `w` occupies codes `code .. code + ceil(w / 32)` and the next
//! signal starts right after it.

use serde::{Deserialize, Serialize};
use std::fmt;

use vtrace_common::word_count;

/// Opaque code identifying a declared signal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct SignalCode(u32);

impl SignalCode {
    /// Creates a `SignalCode` from a raw slot offset.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw slot offset.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Returns the slot offset as a `usize` index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SignalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Port direction of a traced signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigDirection {
    /// Not a port (internal state).
    None,
    /// Module input.
    Input,
    /// Module output.
    Output,
    /// Bidirectional port.
    Inout,
}

/// What kind of object a traced signal is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigKind {
    /// A net, typically a port wire.
    Wire,
    /// A procedural variable.
    Var,
    /// An elaboration-time parameter. Parameters never change after the
    /// first dump.
    Parameter,
}

impl SigKind {
    /// Returns the VCD `$var` type keyword for this kind.
    pub fn vcd_type(self) -> &'static str {
        match self {
            SigKind::Wire => "wire",
            SigKind::Var => "reg",
            SigKind::Parameter => "parameter",
        }
    }
}

/// An explicit `[msb:lsb]` bit range for a bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitRange {
    /// Index of the most significant bit.
    pub msb: i32,
    /// Index of the least significant bit.
    pub lsb: i32,
}

impl BitRange {
    /// Creates a range.
    pub fn new(msb: i32, lsb: i32) -> Self {
        Self { msb, lsb }
    }

    /// Returns the number of bits covered by the range, or `None` if the
    /// count does not fit in a `u32`.
    pub fn width(&self) -> Option<u32> {
        self.msb.abs_diff(self.lsb).checked_add(1)
    }
}

impl fmt::Display for BitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.msb, self.lsb)
    }
}

/// Activity group a signal belongs to.
///
/// Group 0 always exists. Hosts that know a whole group of signals cannot
/// have changed in a step can skip comparing them.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GroupId(u32);

impl GroupId {
    /// The default group.
    pub const DEFAULT: GroupId = GroupId(0);

    /// Creates a group ID from a raw index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// The registry entry of one declared signal. Immutable once declared.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalDescriptor {
    /// Offset of the signal's first slot in the backing store.
    pub code: SignalCode,
    /// Leaf name, as passed to the declaration.
    pub name: String,
    /// Fully qualified name: the scope path joined with `.`, then `name`.
    pub path: String,
    /// Width in bits; at least 1.
    pub width: u32,
    /// Explicit bit range, if one was declared.
    pub range: Option<BitRange>,
    /// Port direction.
    pub direction: SigDirection,
    /// Signal kind.
    pub kind: SigKind,
    /// Activity group.
    pub group: GroupId,
    /// Whether the value is captured once and never scanned for changes.
    pub constant: bool,
}

impl SignalDescriptor {
    /// Returns the number of backing-store slots this signal occupies.
    pub fn slot_count(&self) -> usize {
        word_count(self.width)
    }

    /// Returns the slot index range of this signal.
    pub fn slots(&self) -> std::ops::Range<usize> {
        let start = self.code.index();
        start..start + self.slot_count()
    }

    /// Returns the range to print in trace headers.
    ///
    /// Buses declared without an explicit range get `[width-1:0]`; single
    /// bits get none.
    pub fn display_range(&self) -> Option<BitRange> {
        match self.range {
            Some(r) => Some(r),
            None if self.width > 1 => Some(BitRange::new(self.width as i32 - 1, 0)),
            None => None,
        }
    }
}

/// An additional name under which an existing signal is declared.
///
/// Aliases own no slots; viewers see them as a second variable sharing the
/// target's identifier and value history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasDescriptor {
    /// Code of the aliased signal.
    pub target: SignalCode,
    /// Leaf name.
    pub name: String,
    /// Fully qualified name.
    pub path: String,
    /// Port direction under this name.
    pub direction: SigDirection,
    /// Signal kind under this name.
    pub kind: SigKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(code: u32, width: u32) -> SignalDescriptor {
        SignalDescriptor {
            code: SignalCode::from_raw(code),
            name: "data".into(),
            path: "top.data".into(),
            width,
            range: None,
            direction: SigDirection::None,
            kind: SigKind::Var,
            group: GroupId::DEFAULT,
            constant: false,
        }
    }

    #[test]
    fn code_roundtrip() {
        let c = SignalCode::from_raw(7);
        assert_eq!(c.as_raw(), 7);
        assert_eq!(c.index(), 7);
        assert_eq!(c.to_string(), "7");
    }

    #[test]
    fn slot_count_by_width() {
        assert_eq!(descriptor(0, 1).slot_count(), 1);
        assert_eq!(descriptor(0, 32).slot_count(), 1);
        assert_eq!(descriptor(0, 33).slot_count(), 2);
        assert_eq!(descriptor(4, 65).slots(), 4..7);
    }

    #[test]
    fn range_width() {
        assert_eq!(BitRange::new(8, 0).width(), Some(9));
        assert_eq!(BitRange::new(0, 7).width(), Some(8));
        assert_eq!(BitRange::new(3, 3).width(), Some(1));
        assert_eq!(BitRange::new(-1, -4).width(), Some(4));
        assert_eq!(BitRange::new(i32::MAX, 0).width(), Some(1 << 31));
        assert_eq!(BitRange::new(i32::MAX, i32::MIN).width(), None);
        assert_eq!(BitRange::new(i32::MIN, i32::MAX).width(), None);
        assert_eq!(BitRange::new(7, 0).to_string(), "[7:0]");
    }

    #[test]
    fn display_range_defaults() {
        assert_eq!(descriptor(0, 1).display_range(), None);
        assert_eq!(
            descriptor(0, 8).display_range(),
            Some(BitRange::new(7, 0))
        );
        let mut d = descriptor(0, 4);
        d.range = Some(BitRange::new(4, 1));
        assert_eq!(d.display_range(), Some(BitRange::new(4, 1)));
    }

    #[test]
    fn vcd_types() {
        assert_eq!(SigKind::Wire.vcd_type(), "wire");
        assert_eq!(SigKind::Var.vcd_type(), "reg");
        assert_eq!(SigKind::Parameter.vcd_type(), "parameter");
    }

    #[test]
    fn direction_serde_lowercase() {
        let json = serde_json::to_string(&SigDirection::Input).unwrap();
        assert_eq!(json, "\"input\"");
        let back: SigKind = serde_json::from_str("\"parameter\"").unwrap();
        assert_eq!(back, SigKind::Parameter);
    }
}
