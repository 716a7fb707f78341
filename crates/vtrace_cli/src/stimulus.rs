//! JSON stimulus files for `vtrace replay`.
//!
//! A stimulus declares a design's signals, grouped into nested scopes, and
//! then lists timestamped steps. Each step assigns new values to signals by
//! hierarchical path; signals not mentioned keep their previous value.
//!
//! ```json
//! {
//!   "signals": [{ "name": "clk", "width": 1, "direction": "input" }],
//!   "scopes": [{
//!     "name": "Counter",
//!     "signals": [
//!       { "name": "clk", "alias_of": "clk", "direction": "input" },
//!       { "name": "cnt", "range": [7, 0], "kind": "var" }
//!     ]
//!   }],
//!   "steps": [
//!     { "time": 0, "values": { "clk": 0, "Counter.cnt": "0x00" } },
//!     { "time": 5, "values": { "clk": 1 } }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use vtrace_common::BitVector;
use vtrace_recorder::{BitRange, SigDirection, SigKind};

/// Errors raised while reading or checking a stimulus.
#[derive(Debug, thiserror::Error)]
pub enum StimulusError {
    /// The file could not be read.
    #[error("cannot read stimulus: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid stimulus JSON.
    #[error("invalid stimulus JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The stimulus is well-formed JSON but describes something impossible.
    #[error("invalid stimulus: {0}")]
    Invalid(String),
}

/// A parsed stimulus file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stimulus {
    /// Signals declared at the top level.
    #[serde(default)]
    pub signals: Vec<SignalSpec>,
    /// Top-level scopes, in declaration order.
    #[serde(default)]
    pub scopes: Vec<ScopeSpec>,
    /// Value steps in time order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A named scope and everything declared inside it.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeSpec {
    /// Scope name.
    pub name: String,
    /// Opens a new activity group on entering this scope.
    ///
    /// The group is never closed: it takes in every signal declared after
    /// it, in later sibling scopes as well, until another scope opens its
    /// own group. Replay scans all groups; the grouping only shapes the
    /// recorded layout.
    #[serde(default)]
    pub group: bool,
    /// Signals declared directly in this scope.
    #[serde(default)]
    pub signals: Vec<SignalSpec>,
    /// Nested scopes.
    #[serde(default)]
    pub scopes: Vec<ScopeSpec>,
}

/// One signal declaration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignalSpec {
    /// Leaf name.
    pub name: String,
    /// Width in bits. Exclusive with `range`.
    pub width: Option<u32>,
    /// Explicit `[msb, lsb]` range. Exclusive with `width`.
    pub range: Option<[i32; 2]>,
    /// Port direction.
    #[serde(default = "default_direction")]
    pub direction: SigDirection,
    /// Object kind.
    #[serde(default = "default_kind")]
    pub kind: SigKind,
    /// Value is captured once and never rescanned.
    #[serde(default)]
    pub constant: bool,
    /// Full path of an earlier signal this one is another name for.
    pub alias_of: Option<String>,
}

fn default_direction() -> SigDirection {
    SigDirection::None
}

fn default_kind() -> SigKind {
    SigKind::Wire
}

/// Values assigned at one timestamp.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    /// Logical timestamp.
    pub time: u64,
    /// New values keyed by hierarchical path.
    #[serde(default)]
    pub values: BTreeMap<String, StimValue>,
}

/// A signal value as written in the stimulus.
///
/// Numbers cover widths up to 64 bits. Strings accept a `0x` (hex) or `0b`
/// (binary) prefix, or plain decimal, with `_` separators allowed.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StimValue {
    /// An unsigned integer.
    Number(u64),
    /// A prefixed or decimal string.
    Text(String),
}

impl StimValue {
    /// Converts the value to a vector of exactly `width` bits, dropping any
    /// bits above it.
    pub fn to_vector(&self, width: u32) -> Result<BitVector, StimulusError> {
        let parsed = match self {
            StimValue::Number(n) => return Ok(BitVector::from_u64(*n, width)),
            StimValue::Text(text) => {
                let digits: String = text.trim().chars().filter(|&c| c != '_').collect();
                let value = if let Some(hex) = digits
                    .strip_prefix("0x")
                    .or_else(|| digits.strip_prefix("0X"))
                {
                    BitVector::from_hex_str(hex)
                } else if let Some(bin) = digits
                    .strip_prefix("0b")
                    .or_else(|| digits.strip_prefix("0B"))
                {
                    BitVector::from_binary_str(bin)
                } else {
                    digits.parse::<u64>().ok().map(|n| BitVector::from_u64(n, 64))
                };
                value.ok_or_else(|| StimulusError::Invalid(format!("bad value '{text}'")))?
            }
        };
        Ok(BitVector::from_words(parsed.words(), width))
    }
}

impl SignalSpec {
    /// Returns the declared width, taken from `range` when present.
    pub fn width(&self) -> Option<u32> {
        match self.range {
            Some([msb, lsb]) => BitRange::new(msb, lsb).width(),
            None => self.width,
        }
    }

    fn check(&self, scope: &str) -> Result<(), StimulusError> {
        let invalid = |msg: &str| {
            let path = if scope.is_empty() {
                self.name.clone()
            } else {
                format!("{scope}.{}", self.name)
            };
            Err(StimulusError::Invalid(format!("signal '{path}' {msg}")))
        };
        if self.name.is_empty() {
            return Err(StimulusError::Invalid(format!(
                "empty signal name in scope '{scope}'"
            )));
        }
        if self.alias_of.is_some() {
            if self.width.is_some() || self.range.is_some() || self.constant {
                return invalid("is an alias and cannot declare a width, range, or constant");
            }
            return Ok(());
        }
        match (self.width, self.range) {
            (Some(_), Some(_)) => invalid("has both a width and a range"),
            (None, None) => invalid("needs a width or a range"),
            (Some(0), None) => invalid("has zero width"),
            (None, Some([msb, lsb])) if BitRange::new(msb, lsb).width().is_none() => {
                invalid("has a range that is too wide")
            }
            _ => Ok(()),
        }
    }
}

impl Stimulus {
    /// Parses and checks a stimulus from JSON text.
    pub fn from_json(text: &str) -> Result<Self, StimulusError> {
        let stimulus: Stimulus = serde_json::from_str(text)?;
        stimulus.check()?;
        Ok(stimulus)
    }

    /// Reads and checks a stimulus file.
    pub fn from_file(path: &Path) -> Result<Self, StimulusError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Checks the declarations. Paths in steps and alias targets are
    /// resolved against the recorder later.
    fn check(&self) -> Result<(), StimulusError> {
        for signal in &self.signals {
            signal.check("")?;
        }
        for scope in &self.scopes {
            check_scope(scope, "")?;
        }
        Ok(())
    }
}

fn check_scope(scope: &ScopeSpec, parent: &str) -> Result<(), StimulusError> {
    if scope.name.is_empty() {
        return Err(StimulusError::Invalid(format!(
            "empty scope name under '{parent}'"
        )));
    }
    let path = if parent.is_empty() {
        scope.name.clone()
    } else {
        format!("{parent}.{}", scope.name)
    };
    for signal in &scope.signals {
        signal.check(&path)?;
    }
    for child in &scope.scopes {
        check_scope(child, &path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal() {
        let s = Stimulus::from_json(r#"{ "signals": [{ "name": "a", "width": 1 }] }"#).unwrap();
        assert_eq!(s.signals.len(), 1);
        assert_eq!(s.signals[0].direction, SigDirection::None);
        assert_eq!(s.signals[0].kind, SigKind::Wire);
        assert!(s.steps.is_empty());
    }

    #[test]
    fn parse_nested_scopes_and_steps() {
        let s = Stimulus::from_json(
            r#"{
                "scopes": [{
                    "name": "top",
                    "group": true,
                    "signals": [{ "name": "bus", "range": [15, 8], "kind": "var" }],
                    "scopes": [{ "name": "sub", "signals": [{ "name": "x", "width": 3 }] }]
                }],
                "steps": [{ "time": 0, "values": { "top.bus": "0xff", "top.sub.x": 5 } }]
            }"#,
        )
        .unwrap();
        let top = &s.scopes[0];
        assert!(top.group);
        assert_eq!(top.signals[0].width(), Some(8));
        assert_eq!(top.scopes[0].signals[0].width(), Some(3));
        assert_eq!(s.steps[0].values["top.sub.x"], StimValue::Number(5));
    }

    #[test]
    fn unknown_field_rejected() {
        let err = Stimulus::from_json(r#"{ "signals": [{ "name": "a", "widht": 1 }] }"#)
            .unwrap_err();
        assert!(matches!(err, StimulusError::Json(_)));
    }

    #[test]
    fn missing_width_rejected() {
        let err = Stimulus::from_json(r#"{ "scopes": [{ "name": "t", "signals": [{ "name": "a" }] }] }"#)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid stimulus: signal 't.a' needs a width or a range"
        );
    }

    #[test]
    fn width_and_range_rejected() {
        let err =
            Stimulus::from_json(r#"{ "signals": [{ "name": "a", "width": 4, "range": [3, 0] }] }"#)
                .unwrap_err();
        assert!(err.to_string().contains("both a width and a range"));
    }

    #[test]
    fn zero_width_rejected() {
        let err = Stimulus::from_json(r#"{ "signals": [{ "name": "a", "width": 0 }] }"#)
            .unwrap_err();
        assert!(err.to_string().contains("zero width"));
    }

    #[test]
    fn full_domain_range_rejected() {
        let err = Stimulus::from_json(
            r#"{ "scopes": [{ "name": "t", "signals": [
                { "name": "huge", "range": [2147483647, -2147483648] }
            ] }] }"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid stimulus: signal 't.huge' has a range that is too wide"
        );
        let s = Stimulus::from_json(r#"{ "signals": [{ "name": "n", "range": [-1, -3] }] }"#)
            .unwrap();
        assert_eq!(s.signals[0].width(), Some(3));
    }

    #[test]
    fn alias_with_width_rejected() {
        let err = Stimulus::from_json(
            r#"{ "signals": [
                { "name": "a", "width": 1 },
                { "name": "b", "width": 1, "alias_of": "a" }
            ] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("is an alias"));
    }

    #[test]
    fn number_value_truncates() {
        let v = StimValue::Number(0x1F).to_vector(4).unwrap();
        assert_eq!(v.width(), 4);
        assert_eq!(v.to_u64(), Some(0xF));
    }

    #[test]
    fn text_values() {
        assert_eq!(
            StimValue::Text("0xC8".into()).to_vector(8).unwrap().to_u64(),
            Some(200)
        );
        assert_eq!(
            StimValue::Text("0b1010".into()).to_vector(8).unwrap().to_u64(),
            Some(10)
        );
        assert_eq!(
            StimValue::Text("1_000".into()).to_vector(16).unwrap().to_u64(),
            Some(1000)
        );
    }

    #[test]
    fn wide_hex_value() {
        let v = StimValue::Text("0x1_00000000_00000000".into())
            .to_vector(72)
            .unwrap();
        assert_eq!(v.words(), &[0, 0, 1]);
    }

    #[test]
    fn bad_text_value() {
        assert!(StimValue::Text("0xZZ".into()).to_vector(8).is_err());
        assert!(StimValue::Text("ten".into()).to_vector(8).is_err());
        assert!(StimValue::Text("0b".into()).to_vector(8).is_err());
    }

    #[test]
    fn read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stim.json");
        std::fs::write(&path, r#"{ "signals": [{ "name": "a", "width": 2 }] }"#).unwrap();
        let s = Stimulus::from_file(&path).unwrap();
        assert_eq!(s.signals[0].width(), Some(2));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Stimulus::from_file(&dir.path().join("none.json")).unwrap_err();
        assert!(matches!(err, StimulusError::Io(_)));
    }
}
