//! Signal-trace recorder for discrete-event hardware simulators.
//!
//! The simulation host declares the signals of its design once, then hands
//! the recorder the current signal values after every step. The recorder
//! keeps the last recorded value of every signal in a flat backing store and
//! forwards only the values that changed to a [`TraceSink`], which turns
//! them into a waveform file or an in-memory log.
//!
//! # Usage
//!
//! ```ignore
//! use vtrace_recorder::{MemorySink, SigDirection, SigKind, Snapshot, TraceRecorder};
//!
//! let mut rec = TraceRecorder::new(MemorySink::new());
//! rec.begin_declaration()?;
//! rec.push_scope("Counter")?;
//! let clk = rec.declare_signal("clk", 1, SigDirection::Input, SigKind::Wire)?;
//! rec.pop_scope()?;
//! rec.end_declaration()?;
//!
//! let mut values = Snapshot::new();
//! rec.record_full(0, &values)?;
//! values.set(clk, 1);
//! rec.record_changes(1, &values)?;
//! rec.cleanup()?;
//! ```
//!
//! # Modules
//!
//! - `error`: recorder error type
//! - `signal`: codes, directions, kinds, descriptors
//! - `registry`: scoped naming and slot allocation
//! - `store`: backing store of last-recorded values
//! - `source`: host-side value access
//! - `recorder`: the phase-checked recorder
//! - `sink`: output trait and in-memory sink
//! - `vcd` / `fst`: file sinks
//! - `vcd_reader`: VCD loading

#![warn(missing_docs)]

pub mod error;
pub mod fst;
pub mod recorder;
pub mod registry;
pub mod signal;
pub mod sink;
pub mod source;
pub mod store;
pub mod vcd;
pub mod vcd_reader;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use vtrace_common::{TraceFormat, Timescale};

pub use error::TraceError;
pub use fst::FstSink;
pub use recorder::{Activity, Phase, TraceRecorder};
pub use signal::{
    AliasDescriptor, BitRange, GroupId, SigDirection, SigKind, SignalCode, SignalDescriptor,
};
pub use sink::{Declaration, LayoutInfo, MemorySink, SignalDecl, TraceRecord, TraceSink, ValueChange};
pub use source::{read_vector, Snapshot, ValueSource};
pub use vcd::VcdSink;
pub use vcd_reader::{load_vcd, load_vcd_file, LoadedTrace, VcdLoadError, VcdSignalDef};

/// Header metadata for file sinks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SinkOptions {
    /// Duration of one timestamp tick.
    pub timescale: Timescale,
    /// Writer string; the sink default is used when `None`.
    pub version: Option<String>,
    /// Date string; omitted when `None`.
    pub date: Option<String>,
}

/// Creates a buffered file sink of the given format at `path`.
///
/// # Errors
///
/// Returns [`TraceError::Io`] if the file cannot be created.
pub fn create_file_sink(
    path: &Path,
    format: TraceFormat,
    options: &SinkOptions,
) -> Result<Box<dyn TraceSink>, TraceError> {
    let writer = BufWriter::new(File::create(path)?);
    let sink: Box<dyn TraceSink> = match format {
        TraceFormat::Vcd => {
            let mut sink = VcdSink::new(writer, options.timescale);
            if let Some(version) = &options.version {
                sink = sink.with_version(version.as_str());
            }
            if let Some(date) = &options.date {
                sink = sink.with_date(date.as_str());
            }
            Box::new(sink)
        }
        TraceFormat::Fst => {
            let mut sink = FstSink::new(writer, options.timescale);
            if let Some(version) = &options.version {
                sink = sink.with_version(version.as_str());
            }
            if let Some(date) = &options.date {
                sink = sink.with_date(date.as_str());
            }
            Box::new(sink)
        }
    };
    Ok(sink)
}
