//! Trace file formats.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Writer string placed in a trace header's version field when none is
/// configured.
pub const DEFAULT_VERSION: &str = "vtrace";

/// Output format of a trace file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceFormat {
    /// Value Change Dump (IEEE 1364), human-readable text.
    #[default]
    Vcd,
    /// Fast Signal Trace, compressed binary (GTKWave native).
    Fst,
}

impl TraceFormat {
    /// Returns the conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            TraceFormat::Vcd => "vcd",
            TraceFormat::Fst => "fst",
        }
    }

    /// Guesses the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        ext.parse().ok()
    }
}

impl fmt::Display for TraceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Error returned when a format name is not recognized.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown trace format '{0}' (expected 'vcd' or 'fst')")]
pub struct ParseFormatError(pub String);

impl FromStr for TraceFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vcd" => Ok(TraceFormat::Vcd),
            "fst" => Ok(TraceFormat::Fst),
            _ => Err(ParseFormatError(s.to_string())),
        }
    }
}
