//! Errors raised while loading `vtrace.toml`.

use std::io;
use std::path::PathBuf;

/// Errors that can occur when loading or validating trace settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The TOML content is malformed or holds a value of the wrong shape,
    /// such as an unknown format or an unsupported timescale.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A setting parsed but is not usable.
    #[error("invalid setting `{key}`: {message}")]
    Invalid {
        /// Dotted key of the setting, e.g. `trace.version`.
        key: &'static str,
        /// What is wrong with it.
        message: String,
    },
}
