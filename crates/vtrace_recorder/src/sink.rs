//! Trace output: the [`TraceSink`] trait and an in-memory sink.
//!
//! A sink receives the structural trace stream in order: scope and signal
//! declarations, one end-of-definitions marker, then timestamped value
//! changes. The first batch of changes is a full snapshot bracketed by
//! [`begin_snapshot`](TraceSink::begin_snapshot) and
//! [`end_snapshot`](TraceSink::end_snapshot). File formats live in
//! [`vcd`](crate::vcd) and [`fst`](crate::fst).

use serde::Serialize;

use vtrace_common::{BitVector, Bits, ContentHash};

use crate::error::TraceError;
use crate::signal::{BitRange, SigDirection, SigKind, SignalCode};

/// A declaration as passed to a sink.
#[derive(Clone, Copy, Debug)]
pub struct SignalDecl<'a> {
    /// Code of the signal, or of the aliased signal.
    pub code: SignalCode,
    /// Leaf name within the current scope.
    pub name: &'a str,
    /// Fully qualified name.
    pub path: &'a str,
    /// Width in bits.
    pub width: u32,
    /// Range to print, if any.
    pub range: Option<BitRange>,
    /// Port direction.
    pub direction: SigDirection,
    /// Signal kind.
    pub kind: SigKind,
    /// Whether this is a second name for an already-declared code.
    pub alias: bool,
}

/// Summary of a frozen layout, passed at the end of definitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LayoutInfo {
    /// Number of declared signals, excluding aliases.
    pub signal_count: usize,
    /// Number of aliases.
    pub alias_count: usize,
    /// Number of backing-store slots.
    pub slot_count: usize,
    /// Fingerprint of the layout.
    pub hash: ContentHash,
}

/// Receives the ordered trace stream produced by a recorder.
pub trait TraceSink {
    /// Opens a scope in the hierarchy.
    fn begin_scope(&mut self, name: &str) -> Result<(), TraceError>;

    /// Closes the innermost scope.
    fn end_scope(&mut self) -> Result<(), TraceError>;

    /// Declares a signal (or an alias) in the current scope.
    fn declare(&mut self, decl: &SignalDecl<'_>) -> Result<(), TraceError>;

    /// Marks the end of the declaration header.
    fn end_definitions(&mut self, layout: &LayoutInfo) -> Result<(), TraceError>;

    /// Marks the start of a full snapshot at `time`.
    fn begin_snapshot(&mut self, _time: u64) -> Result<(), TraceError> {
        Ok(())
    }

    /// Marks the end of a full snapshot.
    fn end_snapshot(&mut self) -> Result<(), TraceError> {
        Ok(())
    }

    /// Records the value of `code` at `time`.
    fn record_change(
        &mut self,
        time: u64,
        code: SignalCode,
        value: Bits<'_>,
    ) -> Result<(), TraceError>;

    /// Finalizes the output (flush, write trailer, etc.).
    fn finalize(&mut self) -> Result<(), TraceError>;
}

impl<S: TraceSink + ?Sized> TraceSink for Box<S> {
    fn begin_scope(&mut self, name: &str) -> Result<(), TraceError> {
        (**self).begin_scope(name)
    }

    fn end_scope(&mut self) -> Result<(), TraceError> {
        (**self).end_scope()
    }

    fn declare(&mut self, decl: &SignalDecl<'_>) -> Result<(), TraceError> {
        (**self).declare(decl)
    }

    fn end_definitions(&mut self, layout: &LayoutInfo) -> Result<(), TraceError> {
        (**self).end_definitions(layout)
    }

    fn begin_snapshot(&mut self, time: u64) -> Result<(), TraceError> {
        (**self).begin_snapshot(time)
    }

    fn end_snapshot(&mut self) -> Result<(), TraceError> {
        (**self).end_snapshot()
    }

    fn record_change(
        &mut self,
        time: u64,
        code: SignalCode,
        value: Bits<'_>,
    ) -> Result<(), TraceError> {
        (**self).record_change(time, code, value)
    }

    fn finalize(&mut self) -> Result<(), TraceError> {
        (**self).finalize()
    }
}

/// An owned declaration record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Declaration {
    /// Code of the signal, or of the aliased signal.
    pub code: SignalCode,
    /// Fully qualified name.
    pub path: String,
    /// Width in bits.
    pub width: u32,
    /// Range, if any.
    pub range: Option<BitRange>,
    /// Port direction.
    pub direction: SigDirection,
    /// Signal kind.
    pub kind: SigKind,
    /// Whether this is an alias.
    pub alias: bool,
}

/// A timestamped value-change record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValueChange {
    /// Host timestamp.
    pub time: u64,
    /// Signal code.
    pub code: SignalCode,
    /// New value.
    pub value: BitVector,
}

/// One entry in the structural trace stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TraceRecord {
    /// A scope was opened.
    Scope(String),
    /// The innermost scope was closed.
    Upscope,
    /// A signal or alias was declared.
    Declare(Declaration),
    /// The header ended.
    EndDefinitions(LayoutInfo),
    /// A full snapshot started.
    SnapshotBegin(u64),
    /// A full snapshot ended.
    SnapshotEnd,
    /// A value was recorded.
    Change(ValueChange),
    /// The stream was finalized.
    Finalized,
}

/// A sink that keeps the whole stream in memory.
///
/// Used by tests and by hosts that post-process a trace themselves.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    records: Vec<TraceRecord>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every record in arrival order.
    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// Returns the declaration records.
    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.records.iter().filter_map(|r| match r {
            TraceRecord::Declare(d) => Some(d),
            _ => None,
        })
    }

    /// Returns all value-change records.
    pub fn changes(&self) -> impl Iterator<Item = &ValueChange> {
        self.records.iter().filter_map(|r| match r {
            TraceRecord::Change(c) => Some(c),
            _ => None,
        })
    }

    /// Returns the value-change records stamped with `time`.
    pub fn changes_at(&self, time: u64) -> Vec<&ValueChange> {
        self.changes().filter(|c| c.time == time).collect()
    }

    /// Returns the most recently recorded value of `code`, if any.
    pub fn last_value(&self, code: SignalCode) -> Option<&BitVector> {
        self.changes()
            .filter(|c| c.code == code)
            .last()
            .map(|c| &c.value)
    }

    /// Returns `true` once [`finalize`](TraceSink::finalize) has run.
    pub fn is_finalized(&self) -> bool {
        self.records.last() == Some(&TraceRecord::Finalized)
    }
}

impl TraceSink for MemorySink {
    fn begin_scope(&mut self, name: &str) -> Result<(), TraceError> {
        self.records.push(TraceRecord::Scope(name.to_string()));
        Ok(())
    }

    fn end_scope(&mut self) -> Result<(), TraceError> {
        self.records.push(TraceRecord::Upscope);
        Ok(())
    }

    fn declare(&mut self, decl: &SignalDecl<'_>) -> Result<(), TraceError> {
        self.records.push(TraceRecord::Declare(Declaration {
            code: decl.code,
            path: decl.path.to_string(),
            width: decl.width,
            range: decl.range,
            direction: decl.direction,
            kind: decl.kind,
            alias: decl.alias,
        }));
        Ok(())
    }

    fn end_definitions(&mut self, layout: &LayoutInfo) -> Result<(), TraceError> {
        self.records.push(TraceRecord::EndDefinitions(*layout));
        Ok(())
    }

    fn begin_snapshot(&mut self, time: u64) -> Result<(), TraceError> {
        self.records.push(TraceRecord::SnapshotBegin(time));
        Ok(())
    }

    fn end_snapshot(&mut self) -> Result<(), TraceError> {
        self.records.push(TraceRecord::SnapshotEnd);
        Ok(())
    }

    fn record_change(
        &mut self,
        time: u64,
        code: SignalCode,
        value: Bits<'_>,
    ) -> Result<(), TraceError> {
        self.records.push(TraceRecord::Change(ValueChange {
            time,
            code,
            value: value.to_vector(),
        }));
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), TraceError> {
        self.records.push(TraceRecord::Finalized);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(code: u32, path: &str) -> SignalDecl<'_> {
        SignalDecl {
            code: SignalCode::from_raw(code),
            name: path,
            path,
            width: 1,
            range: None,
            direction: SigDirection::Input,
            kind: SigKind::Wire,
            alias: false,
        }
    }

    #[test]
    fn memory_sink_keeps_order() {
        let mut sink = MemorySink::new();
        sink.begin_scope("top").unwrap();
        sink.declare(&decl(0, "top.clk")).unwrap();
        sink.end_scope().unwrap();
        assert_eq!(sink.records().len(), 3);
        assert_eq!(sink.records()[0], TraceRecord::Scope("top".into()));
        assert_eq!(sink.records()[2], TraceRecord::Upscope);
        assert_eq!(sink.declarations().next().unwrap().path, "top.clk");
    }

    #[test]
    fn memory_sink_change_queries() {
        let mut sink = MemorySink::new();
        let one = [1u32];
        let zero = [0u32];
        let code = SignalCode::from_raw(0);
        sink.record_change(0, code, Bits::new(1, &zero)).unwrap();
        sink.record_change(5, code, Bits::new(1, &one)).unwrap();
        assert_eq!(sink.changes().count(), 2);
        assert_eq!(sink.changes_at(5).len(), 1);
        assert_eq!(sink.last_value(code), Some(&BitVector::from_bool(true)));
        assert_eq!(sink.last_value(SignalCode::from_raw(9)), None);
    }

    #[test]
    fn memory_sink_finalized_flag() {
        let mut sink = MemorySink::new();
        assert!(!sink.is_finalized());
        sink.finalize().unwrap();
        assert!(sink.is_finalized());
    }

    #[test]
    fn boxed_sink_forwards() {
        let mut boxed: Box<dyn TraceSink> = Box::new(MemorySink::new());
        boxed.begin_scope("top").unwrap();
        boxed.end_scope().unwrap();
        boxed.finalize().unwrap();
    }
}
