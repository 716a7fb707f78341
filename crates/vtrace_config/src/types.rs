//! Configuration types deserialized from `vtrace.toml`.

use serde::Deserialize;
use std::path::PathBuf;

pub use vtrace_common::{TraceFormat, Timescale, DEFAULT_VERSION};

/// The top-level configuration parsed from `vtrace.toml`.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct VtraceConfig {
    /// Trace output settings.
    #[serde(default)]
    pub trace: TraceSettings,
}

/// The `[trace]` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TraceSettings {
    /// Output format (`"vcd"` or `"fst"`).
    #[serde(default)]
    pub format: TraceFormat,
    /// Duration of one timestamp tick, e.g. `"1ns"` or `"10ps"`.
    #[serde(default)]
    pub timescale: Timescale,
    /// Output file path. Relative paths resolve against the working directory.
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Writer string stored in the trace header.
    #[serde(default = "default_version")]
    pub version: String,
    /// Date string stored in the trace header.
    #[serde(default)]
    pub date: Option<String>,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            format: TraceFormat::default(),
            timescale: Timescale::default(),
            output: None,
            version: default_version(),
            date: None,
        }
    }
}
