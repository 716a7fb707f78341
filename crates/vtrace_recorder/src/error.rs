//! Error types for the trace recorder and its sinks.
//!
//! Almost every variant reports host misuse of the declaration/recording
//! protocol. The only runtime failure is I/O in a sink.

use std::io;

use crate::recorder::Phase;

/// Errors that can occur while declaring or recording a trace.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// An operation was called in a phase that does not allow it.
    #[error("`{operation}` is not allowed while the recorder is {phase}")]
    Protocol {
        /// The rejected operation.
        operation: &'static str,
        /// The phase the recorder was in.
        phase: Phase,
    },

    /// Declaration ended while scopes were still open.
    #[error("declaration ended with {open} unclosed scope(s)")]
    UnbalancedScope {
        /// Number of scopes still open.
        open: usize,
    },

    /// A scope was popped without a matching push.
    #[error("scope popped without a matching push")]
    ScopeUnderflow,

    /// A signal was declared with zero width.
    #[error("signal '{name}' declared with zero width")]
    ZeroWidth {
        /// Fully qualified name of the offending signal.
        name: String,
    },

    /// An explicit bit range covers more bits than a width can hold.
    #[error("signal '{name}' range [{msb}:{lsb}] is too wide")]
    RangeTooWide {
        /// Fully qualified name of the offending signal.
        name: String,
        /// Requested most significant bit.
        msb: i32,
        /// Requested least significant bit.
        lsb: i32,
    },

    /// A scope, signal, or alias name cannot be written to a trace header.
    #[error("invalid name '{name}': names must be non-empty and contain no whitespace")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// A signal code does not name a declared signal.
    #[error("unknown signal code {code}")]
    UnknownCode {
        /// The raw code.
        code: u32,
    },

    /// A timestamp earlier than the previous recording pass was supplied.
    #[error("timestamp {requested} precedes previously recorded timestamp {previous}")]
    TimeRegression {
        /// The last timestamp recorded.
        previous: u64,
        /// The rejected timestamp.
        requested: u64,
    },

    /// An I/O error occurred while writing trace output.
    #[error("trace I/O error: {0}")]
    Io(#[from] io::Error),
}
