//! The trace recorder: declaration, full dumps, and change detection.
//!
//! A [`TraceRecorder`] moves through four phases in one direction:
//!
//! ```text
//! Idle --begin_declaration--> Declaring --end_declaration--> Recording --cleanup--> Closed
//! ```
//!
//! Calls outside their phase return [`TraceError::Protocol`]. `cleanup` is
//! accepted in every phase and only has an effect the first time.

use std::fmt;

use tracing::{debug, trace};

use vtrace_common::{truncate_words, Bits, ContentHash};

use crate::error::TraceError;
use crate::registry::{DeclareParams, SignalRegistry};
use crate::signal::{
    AliasDescriptor, BitRange, GroupId, SigDirection, SigKind, SignalCode, SignalDescriptor,
};
use crate::sink::{LayoutInfo, SignalDecl, TraceSink};
use crate::source::ValueSource;
use crate::store::BackingStore;

/// Lifecycle phase of a [`TraceRecorder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Created; declaration has not started.
    Idle,
    /// Between `begin_declaration` and `end_declaration`.
    Declaring,
    /// Layout frozen; full dumps and change scans are accepted.
    Recording,
    /// Cleaned up. Terminal.
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Idle => "idle",
            Phase::Declaring => "declaring",
            Phase::Recording => "recording",
            Phase::Closed => "closed",
        })
    }
}

/// Per-group activity flags for [`TraceRecorder::record_changes_active`].
///
/// Groups not covered by the flags count as active.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Activity {
    active: Vec<bool>,
}

impl Activity {
    /// Marks all `group_count` groups active.
    pub fn all(group_count: u32) -> Self {
        Self {
            active: vec![true; group_count as usize],
        }
    }

    /// Marks all `group_count` groups inactive.
    pub fn none(group_count: u32) -> Self {
        Self {
            active: vec![false; group_count as usize],
        }
    }

    /// Sets the flag of one group.
    pub fn set(&mut self, group: GroupId, active: bool) -> &mut Self {
        let index = group.as_raw() as usize;
        if index >= self.active.len() {
            self.active.resize(index + 1, true);
        }
        self.active[index] = active;
        self
    }

    /// Returns whether `group` may have changed.
    pub fn is_active(&self, group: GroupId) -> bool {
        self.active
            .get(group.as_raw() as usize)
            .copied()
            .unwrap_or(true)
    }
}

fn signal_decl(desc: &SignalDescriptor) -> SignalDecl<'_> {
    SignalDecl {
        code: desc.code,
        name: &desc.name,
        path: &desc.path,
        width: desc.width,
        range: desc.display_range(),
        direction: desc.direction,
        kind: desc.kind,
        alias: false,
    }
}

/// Reads the current value of `desc` into the front of `scratch`, masked to
/// the declared width.
fn sample<'b, V: ValueSource + ?Sized>(
    source: &V,
    desc: &SignalDescriptor,
    scratch: &'b mut [u32],
) -> &'b [u32] {
    let buf = &mut scratch[..desc.slot_count()];
    buf.fill(0);
    source.read(desc.code, buf);
    truncate_words(buf, desc.width);
    buf
}

/// Records signal values of a simulated design into a [`TraceSink`].
///
/// The recorder owns the signal registry and the backing store of
/// last-recorded values. The host declares the design's signals once, seeds
/// the store with [`record_full`](Self::record_full), then calls
/// [`record_changes`](Self::record_changes) after every step. Only signals
/// whose value differs from the store are forwarded to the sink, in
/// ascending code order.
pub struct TraceRecorder<S: TraceSink> {
    sink: S,
    phase: Phase,
    registry: SignalRegistry,
    store: BackingStore,
    scratch: Vec<u32>,
    last_time: Option<u64>,
    constants_captured: bool,
    full_dumped: bool,
}

impl<S: TraceSink> TraceRecorder<S> {
    /// Creates an idle recorder writing to `sink`.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            phase: Phase::Idle,
            registry: SignalRegistry::new(),
            store: BackingStore::default(),
            scratch: Vec::new(),
            last_time: None,
            constants_captured: false,
            full_dumped: false,
        }
    }

    fn require(&self, operation: &'static str, phase: Phase) -> Result<(), TraceError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(TraceError::Protocol {
                operation,
                phase: self.phase,
            })
        }
    }

    fn advance_time(&mut self, time: u64) -> Result<(), TraceError> {
        match self.last_time {
            Some(previous) if time < previous => Err(TraceError::TimeRegression {
                previous,
                requested: time,
            }),
            _ => {
                self.last_time = Some(time);
                Ok(())
            }
        }
    }

    // ---- declaration ----

    /// Starts the declaration phase.
    pub fn begin_declaration(&mut self) -> Result<(), TraceError> {
        self.require("begin_declaration", Phase::Idle)?;
        self.phase = Phase::Declaring;
        debug!("declaration started");
        Ok(())
    }

    /// Opens a naming scope; later declarations are prefixed with `name`.
    pub fn push_scope(&mut self, name: &str) -> Result<(), TraceError> {
        self.require("push_scope", Phase::Declaring)?;
        self.registry.push_scope(name)?;
        self.sink.begin_scope(name)
    }

    /// Closes the innermost naming scope.
    pub fn pop_scope(&mut self) -> Result<(), TraceError> {
        self.require("pop_scope", Phase::Declaring)?;
        self.registry.pop_scope()?;
        self.sink.end_scope()
    }

    fn declare(&mut self, params: DeclareParams<'_>) -> Result<SignalCode, TraceError> {
        let desc = self.registry.declare(params)?;
        trace!(
            code = desc.code.as_raw(),
            path = %desc.path,
            width = desc.width,
            constant = desc.constant,
            "declared signal"
        );
        self.sink.declare(&signal_decl(desc))?;
        Ok(desc.code)
    }

    /// Declares a signal in the current scope and returns its code.
    ///
    /// Signals of kind [`SigKind::Parameter`] are treated as constants.
    pub fn declare_signal(
        &mut self,
        name: &str,
        width: u32,
        direction: SigDirection,
        kind: SigKind,
    ) -> Result<SignalCode, TraceError> {
        self.require("declare_signal", Phase::Declaring)?;
        self.declare(DeclareParams {
            name,
            width,
            range: None,
            direction,
            kind,
            constant: false,
        })
    }

    /// Declares a bus with an explicit `[msb:lsb]` range.
    pub fn declare_range(
        &mut self,
        name: &str,
        msb: i32,
        lsb: i32,
        direction: SigDirection,
        kind: SigKind,
    ) -> Result<SignalCode, TraceError> {
        self.require("declare_range", Phase::Declaring)?;
        let (range, width) = self.checked_range(name, msb, lsb)?;
        self.declare(DeclareParams {
            name,
            width,
            range: Some(range),
            direction,
            kind,
            constant: false,
        })
    }

    fn checked_range(
        &self,
        name: &str,
        msb: i32,
        lsb: i32,
    ) -> Result<(BitRange, u32), TraceError> {
        let range = BitRange::new(msb, lsb);
        let width = range.width().ok_or_else(|| TraceError::RangeTooWide {
            name: self.registry.qualify(name),
            msb,
            lsb,
        })?;
        Ok((range, width))
    }

    /// Declares a signal whose value never changes after the first capture.
    ///
    /// Constants are emitted in every full dump and skipped by change scans.
    pub fn declare_constant(
        &mut self,
        name: &str,
        width: u32,
        direction: SigDirection,
        kind: SigKind,
    ) -> Result<SignalCode, TraceError> {
        self.require("declare_constant", Phase::Declaring)?;
        self.declare(DeclareParams {
            name,
            width,
            range: None,
            direction,
            kind,
            constant: true,
        })
    }

    /// Declares a constant bus with an explicit `[msb:lsb]` range.
    pub fn declare_constant_range(
        &mut self,
        name: &str,
        msb: i32,
        lsb: i32,
        direction: SigDirection,
        kind: SigKind,
    ) -> Result<SignalCode, TraceError> {
        self.require("declare_constant_range", Phase::Declaring)?;
        let (range, width) = self.checked_range(name, msb, lsb)?;
        self.declare(DeclareParams {
            name,
            width,
            range: Some(range),
            direction,
            kind,
            constant: true,
        })
    }

    /// Declares `name` in the current scope as a second name for `code`.
    ///
    /// The alias takes no slots and never produces value records of its own.
    pub fn declare_alias(
        &mut self,
        name: &str,
        code: SignalCode,
        direction: SigDirection,
        kind: SigKind,
    ) -> Result<(), TraceError> {
        self.require("declare_alias", Phase::Declaring)?;
        self.registry.alias(name, code, direction, kind)?;
        let (Some(alias), Some(target)) = (
            self.registry.aliases().last(),
            self.registry.descriptor(code),
        ) else {
            return Err(TraceError::UnknownCode {
                code: code.as_raw(),
            });
        };
        trace!(code = code.as_raw(), path = %alias.path, "declared alias");
        self.sink.declare(&SignalDecl {
            code,
            name: &alias.name,
            path: &alias.path,
            width: target.width,
            range: target.display_range(),
            direction,
            kind,
            alias: true,
        })
    }

    /// Opens a new activity group for the signals declared after it.
    pub fn begin_group(&mut self) -> Result<GroupId, TraceError> {
        self.require("begin_group", Phase::Declaring)?;
        Ok(self.registry.begin_group())
    }

    /// Freezes the layout and allocates the backing store.
    pub fn end_declaration(&mut self) -> Result<(), TraceError> {
        self.require("end_declaration", Phase::Declaring)?;
        let open = self.registry.scope_depth();
        if open > 0 {
            return Err(TraceError::UnbalancedScope { open });
        }

        let slot_count = self.registry.slot_count();
        self.store = BackingStore::new(slot_count);
        let widest = self
            .registry
            .signals()
            .iter()
            .map(SignalDescriptor::slot_count)
            .max()
            .unwrap_or(0);
        self.scratch = vec![0; widest];

        let layout = LayoutInfo {
            signal_count: self.registry.signals().len(),
            alias_count: self.registry.aliases().len(),
            slot_count,
            hash: self.registry.layout_hash(),
        };
        self.sink.end_definitions(&layout)?;
        self.phase = Phase::Recording;
        debug!(
            signals = layout.signal_count,
            aliases = layout.alias_count,
            slots = layout.slot_count,
            groups = self.registry.group_count(),
            layout = %layout.hash.short(),
            "declaration complete"
        );
        Ok(())
    }

    // ---- recording ----

    fn capture_constants<V: ValueSource + ?Sized>(&mut self, source: &V) {
        for desc in self.registry.signals().iter().filter(|d| d.constant) {
            let current = sample(source, desc, &mut self.scratch);
            self.store.write(desc, current);
        }
        self.constants_captured = true;
    }

    /// Captures the values of constant signals into the store.
    ///
    /// Emits nothing; the values appear in the next full dump. Only the
    /// first call has an effect, and [`record_full`](Self::record_full)
    /// performs it implicitly if the host never calls it.
    pub fn record_constants<V: ValueSource + ?Sized>(&mut self, source: &V) -> Result<(), TraceError> {
        self.require("record_constants", Phase::Recording)?;
        if !self.constants_captured {
            self.capture_constants(source);
            debug!("constants captured");
        }
        Ok(())
    }

    /// Writes every signal's current value into the store and emits one
    /// record per signal, changed or not.
    pub fn record_full<V: ValueSource + ?Sized>(
        &mut self,
        time: u64,
        source: &V,
    ) -> Result<(), TraceError> {
        self.require("record_full", Phase::Recording)?;
        self.advance_time(time)?;
        if !self.constants_captured {
            self.capture_constants(source);
        }

        self.sink.begin_snapshot(time)?;
        for desc in self.registry.signals() {
            if !desc.constant {
                let current = sample(source, desc, &mut self.scratch);
                self.store.write(desc, current);
            }
            self.sink
                .record_change(time, desc.code, self.store.value(desc))?;
        }
        self.sink.end_snapshot()?;
        self.full_dumped = true;
        debug!(time, signals = self.registry.signals().len(), "full dump");
        Ok(())
    }

    /// Emits one record per signal whose value differs from the store, and
    /// updates the store.
    ///
    /// Called before any full dump, this performs the full dump instead.
    pub fn record_changes<V: ValueSource + ?Sized>(
        &mut self,
        time: u64,
        source: &V,
    ) -> Result<(), TraceError> {
        self.require("record_changes", Phase::Recording)?;
        self.scan(time, source, None)
    }

    /// Like [`record_changes`](Self::record_changes), but skips signals in
    /// groups that `activity` marks inactive.
    pub fn record_changes_active<V: ValueSource + ?Sized>(
        &mut self,
        time: u64,
        source: &V,
        activity: &Activity,
    ) -> Result<(), TraceError> {
        self.require("record_changes_active", Phase::Recording)?;
        self.scan(time, source, Some(activity))
    }

    fn scan<V: ValueSource + ?Sized>(
        &mut self,
        time: u64,
        source: &V,
        activity: Option<&Activity>,
    ) -> Result<(), TraceError> {
        if !self.full_dumped {
            return self.record_full(time, source);
        }
        self.advance_time(time)?;

        let mut changed = 0usize;
        for desc in self.registry.signals() {
            if desc.constant || activity.is_some_and(|a| !a.is_active(desc.group)) {
                continue;
            }
            let current = sample(source, desc, &mut self.scratch);
            if self.store.update(desc, current) {
                self.sink
                    .record_change(time, desc.code, self.store.value(desc))?;
                changed += 1;
            }
        }
        trace!(time, changed, "change scan");
        Ok(())
    }

    /// Finalizes the sink and releases the store.
    ///
    /// Valid in every phase. The sink is finalized only if declaration
    /// completed; calls after the first do nothing.
    pub fn cleanup(&mut self) -> Result<(), TraceError> {
        let previous = self.phase;
        if previous == Phase::Closed {
            return Ok(());
        }
        self.phase = Phase::Closed;
        self.store.clear();
        self.scratch = Vec::new();
        debug!(from = %previous, "recorder closed");
        if previous == Phase::Recording {
            self.sink.finalize()?;
        }
        Ok(())
    }

    // ---- accessors ----

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Looks up a signal or alias by fully qualified name.
    pub fn find(&self, path: &str) -> Option<SignalCode> {
        self.registry.find(path)
    }

    /// Returns the descriptor of the signal starting at `code`.
    pub fn descriptor(&self, code: SignalCode) -> Option<&SignalDescriptor> {
        self.registry.descriptor(code)
    }

    /// Returns all declared signals in ascending code order.
    pub fn descriptors(&self) -> &[SignalDescriptor] {
        self.registry.signals()
    }

    /// Returns all aliases in declaration order.
    pub fn aliases(&self) -> &[AliasDescriptor] {
        self.registry.aliases()
    }

    /// Returns the last recorded value of `code`.
    ///
    /// `None` for unknown codes and outside the recording phase.
    pub fn slot(&self, code: SignalCode) -> Option<Bits<'_>> {
        if self.phase != Phase::Recording {
            return None;
        }
        self.registry.descriptor(code).map(|d| self.store.value(d))
    }

    /// Returns the total number of backing-store slots in the layout.
    pub fn slot_count(&self) -> usize {
        self.registry.slot_count()
    }

    /// Returns the number of activity groups.
    pub fn group_count(&self) -> u32 {
        self.registry.group_count()
    }

    /// Returns the fingerprint of the declared layout.
    pub fn layout_hash(&self) -> ContentHash {
        self.registry.layout_hash()
    }

    /// Returns a reference to the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Returns a mutable reference to the sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consumes the recorder and returns the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, TraceRecord};
    use crate::source::Snapshot;

    fn recorder() -> TraceRecorder<MemorySink> {
        TraceRecorder::new(MemorySink::new())
    }

    fn declared(widths: &[u32]) -> (TraceRecorder<MemorySink>, Vec<SignalCode>) {
        let mut rec = recorder();
        rec.begin_declaration().unwrap();
        rec.push_scope("top").unwrap();
        let codes = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                rec.declare_signal(&format!("s{i}"), w, SigDirection::None, SigKind::Var)
                    .unwrap()
            })
            .collect();
        rec.pop_scope().unwrap();
        rec.end_declaration().unwrap();
        (rec, codes)
    }

    #[test]
    fn phase_display() {
        assert_eq!(Phase::Idle.to_string(), "idle");
        assert_eq!(Phase::Closed.to_string(), "closed");
    }

    #[test]
    fn declare_before_begin_is_rejected() {
        let mut rec = recorder();
        let err = rec
            .declare_signal("clk", 1, SigDirection::Input, SigKind::Wire)
            .unwrap_err();
        assert!(matches!(
            err,
            TraceError::Protocol {
                operation: "declare_signal",
                phase: Phase::Idle
            }
        ));
    }

    #[test]
    fn record_before_end_declaration_is_rejected() {
        let mut rec = recorder();
        rec.begin_declaration().unwrap();
        let err = rec.record_full(0, &Snapshot::new()).unwrap_err();
        assert!(matches!(
            err,
            TraceError::Protocol {
                phase: Phase::Declaring,
                ..
            }
        ));
    }

    #[test]
    fn declare_after_end_is_rejected() {
        let (mut rec, _) = declared(&[1]);
        assert!(matches!(
            rec.declare_signal("late", 1, SigDirection::None, SigKind::Wire),
            Err(TraceError::Protocol {
                phase: Phase::Recording,
                ..
            })
        ));
        assert!(matches!(
            rec.begin_declaration(),
            Err(TraceError::Protocol { .. })
        ));
    }

    #[test]
    fn open_scope_blocks_end_declaration() {
        let mut rec = recorder();
        rec.begin_declaration().unwrap();
        rec.push_scope("a").unwrap();
        rec.push_scope("b").unwrap();
        assert!(matches!(
            rec.end_declaration(),
            Err(TraceError::UnbalancedScope { open: 2 })
        ));
        assert_eq!(rec.phase(), Phase::Declaring);
    }

    #[test]
    fn pop_without_push_is_rejected() {
        let mut rec = recorder();
        rec.begin_declaration().unwrap();
        assert!(matches!(rec.pop_scope(), Err(TraceError::ScopeUnderflow)));
    }

    #[test]
    fn zero_width_is_rejected() {
        let mut rec = recorder();
        rec.begin_declaration().unwrap();
        assert!(matches!(
            rec.declare_signal("nothing", 0, SigDirection::None, SigKind::Var),
            Err(TraceError::ZeroWidth { .. })
        ));
    }

    #[test]
    fn full_domain_range_is_rejected() {
        let mut rec = recorder();
        rec.begin_declaration().unwrap();
        rec.push_scope("top").unwrap();
        let err = rec
            .declare_range("huge", i32::MAX, i32::MIN, SigDirection::None, SigKind::Wire)
            .unwrap_err();
        assert!(matches!(
            err,
            TraceError::RangeTooWide { ref name, msb: i32::MAX, lsb: i32::MIN } if name == "top.huge"
        ));
        assert!(matches!(
            rec.declare_constant_range("huge", i32::MIN, i32::MAX, SigDirection::None, SigKind::Var),
            Err(TraceError::RangeTooWide { .. })
        ));
        assert!(rec.descriptors().is_empty());
        assert!(rec.sink().declarations().next().is_none());
    }

    #[test]
    fn whitespace_in_names_is_rejected() {
        let mut rec = recorder();
        rec.begin_declaration().unwrap();
        assert!(matches!(
            rec.push_scope("my core"),
            Err(TraceError::InvalidName { .. })
        ));
        assert!(matches!(
            rec.declare_signal("a b", 1, SigDirection::None, SigKind::Wire),
            Err(TraceError::InvalidName { .. })
        ));
        assert!(rec.sink().records().is_empty());
        rec.end_declaration().unwrap();
    }

    #[test]
    fn constant_keeps_explicit_range() {
        let mut rec = recorder();
        rec.begin_declaration().unwrap();
        let id = rec
            .declare_constant_range("id", 8, 1, SigDirection::None, SigKind::Var)
            .unwrap();
        rec.end_declaration().unwrap();
        let desc = rec.descriptor(id).unwrap();
        assert!(desc.constant);
        assert_eq!(desc.width, 8);
        assert_eq!(desc.display_range(), Some(BitRange::new(8, 1)));

        let mut snap = Snapshot::new();
        snap.set(id, 0x5A);
        rec.record_full(0, &snap).unwrap();
        snap.set(id, 0);
        rec.record_changes(1, &snap).unwrap();
        assert_eq!(rec.slot(id).unwrap().to_u64(), Some(0x5A));
        assert!(rec.sink().changes_at(1).is_empty());
    }

    #[test]
    fn time_must_not_go_backwards() {
        let (mut rec, codes) = declared(&[1]);
        let mut snap = Snapshot::new();
        rec.record_full(10, &snap).unwrap();
        snap.set(codes[0], 1);
        assert!(matches!(
            rec.record_changes(5, &snap),
            Err(TraceError::TimeRegression {
                previous: 10,
                requested: 5
            })
        ));
        rec.record_changes(10, &snap).unwrap();
        assert_eq!(rec.sink().changes_at(10).len(), 2);
    }

    #[test]
    fn changes_before_full_dump_dump_everything() {
        let (mut rec, _) = declared(&[1, 8]);
        rec.record_changes(0, &Snapshot::new()).unwrap();
        assert_eq!(rec.sink().changes().count(), 2);
        assert!(rec
            .sink()
            .records()
            .contains(&TraceRecord::SnapshotBegin(0)));
    }

    #[test]
    fn activity_skips_inactive_groups() {
        let mut rec = recorder();
        rec.begin_declaration().unwrap();
        let a = rec
            .declare_signal("a", 1, SigDirection::None, SigKind::Var)
            .unwrap();
        let group = rec.begin_group().unwrap();
        let b = rec
            .declare_signal("b", 1, SigDirection::None, SigKind::Var)
            .unwrap();
        rec.end_declaration().unwrap();
        assert_eq!(rec.descriptor(b).unwrap().group, group);

        let mut snap = Snapshot::new();
        rec.record_full(0, &snap).unwrap();
        snap.set(a, 1).set(b, 1);

        let mut activity = Activity::all(rec.group_count());
        activity.set(group, false);
        rec.record_changes_active(1, &snap, &activity).unwrap();
        let changed: Vec<_> = rec.sink().changes_at(1).iter().map(|c| c.code).collect();
        assert_eq!(changed, vec![a]);

        // The skipped change is picked up by the next full scan.
        rec.record_changes(2, &snap).unwrap();
        let changed: Vec<_> = rec.sink().changes_at(2).iter().map(|c| c.code).collect();
        assert_eq!(changed, vec![b]);
    }

    #[test]
    fn activity_defaults_to_active() {
        let activity = Activity::none(1);
        assert!(!activity.is_active(GroupId::DEFAULT));
        assert!(activity.is_active(GroupId::from_raw(5)));
        let mut grown = Activity::default();
        grown.set(GroupId::from_raw(2), false);
        assert!(grown.is_active(GroupId::from_raw(1)));
        assert!(!grown.is_active(GroupId::from_raw(2)));
    }

    #[test]
    fn constants_are_dumped_but_never_scanned() {
        let mut rec = recorder();
        rec.begin_declaration().unwrap();
        let width = rec
            .declare_signal("WIDTH", 32, SigDirection::None, SigKind::Parameter)
            .unwrap();
        let id = rec
            .declare_constant("id", 8, SigDirection::None, SigKind::Var)
            .unwrap();
        let x = rec
            .declare_signal("x", 1, SigDirection::None, SigKind::Var)
            .unwrap();
        rec.end_declaration().unwrap();

        let mut snap = Snapshot::new();
        snap.set(width, 8).set(id, 0x42);
        rec.record_constants(&snap).unwrap();

        // Later host values for constants are ignored.
        snap.set(width, 99).set(id, 0).set(x, 1);
        rec.record_full(0, &snap).unwrap();
        assert_eq!(rec.slot(width).unwrap().to_u64(), Some(8));
        assert_eq!(rec.slot(id).unwrap().to_u64(), Some(0x42));
        assert_eq!(rec.sink().changes_at(0).len(), 3);

        rec.record_changes(1, &snap).unwrap();
        assert!(rec.sink().changes_at(1).is_empty());
    }

    #[test]
    fn implicit_constant_capture_in_full_dump() {
        let mut rec = recorder();
        rec.begin_declaration().unwrap();
        let p = rec
            .declare_signal("P", 4, SigDirection::None, SigKind::Parameter)
            .unwrap();
        rec.end_declaration().unwrap();
        let mut snap = Snapshot::new();
        snap.set(p, 0xF3);
        rec.record_full(0, &snap).unwrap();
        assert_eq!(rec.slot(p).unwrap().to_u64(), Some(0x3));
    }

    #[test]
    fn alias_forwarded_with_target_shape() {
        let mut rec = recorder();
        rec.begin_declaration().unwrap();
        let bus = rec
            .declare_range("bus", 7, 0, SigDirection::Input, SigKind::Wire)
            .unwrap();
        rec.push_scope("inner").unwrap();
        rec.declare_alias("bus", bus, SigDirection::Input, SigKind::Wire)
            .unwrap();
        rec.pop_scope().unwrap();
        rec.end_declaration().unwrap();

        let decls: Vec<_> = rec.sink().declarations().cloned().collect();
        assert_eq!(decls.len(), 2);
        assert!(decls[1].alias);
        assert_eq!(decls[1].path, "inner.bus");
        assert_eq!(decls[1].width, 8);
        assert_eq!(decls[1].range, Some(BitRange::new(7, 0)));
        assert_eq!(rec.find("inner.bus"), Some(bus));
        assert_eq!(rec.slot_count(), 1);
        assert_eq!(rec.aliases().len(), 1);
    }

    #[test]
    fn alias_of_unknown_code_is_rejected() {
        let mut rec = recorder();
        rec.begin_declaration().unwrap();
        assert!(matches!(
            rec.declare_alias("x", SignalCode::from_raw(3), SigDirection::None, SigKind::Wire),
            Err(TraceError::UnknownCode { code: 3 })
        ));
    }

    #[test]
    fn layout_summary_reaches_sink() {
        let (rec, _) = declared(&[1, 40, 8]);
        let layout = rec
            .sink()
            .records()
            .iter()
            .find_map(|r| match r {
                TraceRecord::EndDefinitions(l) => Some(*l),
                _ => None,
            })
            .unwrap();
        assert_eq!(layout.signal_count, 3);
        assert_eq!(layout.slot_count, 4);
        assert_eq!(layout.hash, rec.layout_hash());
    }

    #[test]
    fn cleanup_is_idempotent_and_finalizes_once() {
        let (mut rec, codes) = declared(&[1]);
        rec.record_full(0, &Snapshot::new()).unwrap();
        rec.cleanup().unwrap();
        rec.cleanup().unwrap();
        assert_eq!(rec.phase(), Phase::Closed);
        assert!(rec.slot(codes[0]).is_none());
        let finals = rec
            .sink()
            .records()
            .iter()
            .filter(|r| **r == TraceRecord::Finalized)
            .count();
        assert_eq!(finals, 1);
        assert!(matches!(
            rec.record_changes(1, &Snapshot::new()),
            Err(TraceError::Protocol {
                phase: Phase::Closed,
                ..
            })
        ));
    }

    #[test]
    fn cleanup_before_declaration_completes() {
        let mut rec = recorder();
        rec.cleanup().unwrap();
        assert_eq!(rec.phase(), Phase::Closed);
        assert!(!rec.sink().is_finalized());

        let mut rec = recorder();
        rec.begin_declaration().unwrap();
        rec.push_scope("top").unwrap();
        rec.cleanup().unwrap();
        assert_eq!(rec.phase(), Phase::Closed);
        assert!(!rec.sink().is_finalized());
    }

    #[test]
    fn closure_source_works() {
        let (mut rec, codes) = declared(&[8]);
        rec.record_full(0, &|_: SignalCode, dest: &mut [u32]| dest[0] = 0x1AB)
            .unwrap();
        assert_eq!(rec.slot(codes[0]).unwrap().to_u64(), Some(0xAB));
    }
}
