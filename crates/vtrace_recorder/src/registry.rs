//! The signal registry: scoped naming and slot allocation.
//!
//! The registry is filled during declaration and read-only afterwards. It
//! never talks to a sink; [`TraceRecorder`](crate::TraceRecorder) forwards
//! each registration to its sink.

use std::collections::HashMap;

use vtrace_common::{word_count, ContentHash, LayoutHasher};

use crate::error::TraceError;
use crate::signal::{
    AliasDescriptor, BitRange, GroupId, SigDirection, SigKind, SignalCode, SignalDescriptor,
};

/// Parameters of a single declaration.
#[derive(Clone, Copy, Debug)]
pub struct DeclareParams<'a> {
    /// Leaf name within the current scope.
    pub name: &'a str,
    /// Width in bits.
    pub width: u32,
    /// Explicit bit range, if any.
    pub range: Option<BitRange>,
    /// Port direction.
    pub direction: SigDirection,
    /// Signal kind.
    pub kind: SigKind,
    /// Forces constant treatment regardless of `kind`.
    pub constant: bool,
}

/// Checks that `name` can be written as a single token of a trace header.
fn check_name(name: &str) -> Result<(), TraceError> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(TraceError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Declared signals, their slot layout, and the scope stack used while
/// declaring.
///
/// `(scope, name)` pairs must be unique. Duplicates are not detected: the
/// later declaration gets its own code and shadows the earlier one in
/// [`find`](Self::find).
#[derive(Debug, Default)]
pub struct SignalRegistry {
    scopes: Vec<String>,
    signals: Vec<SignalDescriptor>,
    aliases: Vec<AliasDescriptor>,
    by_path: HashMap<String, SignalCode>,
    next_slot: u32,
    current_group: GroupId,
    group_count: u32,
}

impl SignalRegistry {
    /// Creates an empty registry with only the default activity group.
    pub fn new() -> Self {
        Self {
            group_count: 1,
            ..Self::default()
        }
    }

    /// Opens a naming scope.
    pub fn push_scope(&mut self, name: &str) -> Result<(), TraceError> {
        check_name(name)?;
        self.scopes.push(name.to_string());
        Ok(())
    }

    /// Closes the innermost naming scope and returns its name.
    pub fn pop_scope(&mut self) -> Result<String, TraceError> {
        self.scopes.pop().ok_or(TraceError::ScopeUnderflow)
    }

    /// Returns the number of currently open scopes.
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Returns `name` prefixed with the current scope path.
    pub fn qualify(&self, name: &str) -> String {
        if self.scopes.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.scopes.join("."), name)
        }
    }

    /// Opens a new activity group; later declarations belong to it.
    pub fn begin_group(&mut self) -> GroupId {
        let id = GroupId::from_raw(self.group_count);
        self.group_count += 1;
        self.current_group = id;
        id
    }

    /// Returns the number of activity groups, including the default one.
    pub fn group_count(&self) -> u32 {
        self.group_count
    }

    /// Registers a signal and allocates its slots.
    pub fn declare(&mut self, params: DeclareParams<'_>) -> Result<&SignalDescriptor, TraceError> {
        check_name(params.name)?;
        let path = self.qualify(params.name);
        if params.width == 0 {
            return Err(TraceError::ZeroWidth { name: path });
        }

        let code = SignalCode::from_raw(self.next_slot);
        self.next_slot += word_count(params.width) as u32;
        self.by_path.insert(path.clone(), code);
        self.signals.push(SignalDescriptor {
            code,
            name: params.name.to_string(),
            path,
            width: params.width,
            range: params.range,
            direction: params.direction,
            kind: params.kind,
            group: self.current_group,
            constant: params.constant || params.kind == SigKind::Parameter,
        });
        Ok(&self.signals[self.signals.len() - 1])
    }

    /// Registers an additional name for an already-declared signal.
    pub fn alias(
        &mut self,
        name: &str,
        target: SignalCode,
        direction: SigDirection,
        kind: SigKind,
    ) -> Result<&AliasDescriptor, TraceError> {
        check_name(name)?;
        if self.descriptor(target).is_none() {
            return Err(TraceError::UnknownCode {
                code: target.as_raw(),
            });
        }
        let path = self.qualify(name);
        self.by_path.insert(path.clone(), target);
        self.aliases.push(AliasDescriptor {
            target,
            name: name.to_string(),
            path,
            direction,
            kind,
        });
        Ok(&self.aliases[self.aliases.len() - 1])
    }

    /// Returns the descriptor for `code`, if `code` starts a declared signal.
    pub fn descriptor(&self, code: SignalCode) -> Option<&SignalDescriptor> {
        self.signals
            .binary_search_by_key(&code, |d| d.code)
            .ok()
            .map(|i| &self.signals[i])
    }

    /// Looks up a signal or alias by fully qualified name.
    pub fn find(&self, path: &str) -> Option<SignalCode> {
        self.by_path.get(path).copied()
    }

    /// Returns all declared signals in ascending code order.
    pub fn signals(&self) -> &[SignalDescriptor] {
        &self.signals
    }

    /// Returns all aliases in declaration order.
    pub fn aliases(&self) -> &[AliasDescriptor] {
        &self.aliases
    }

    /// Returns the total number of backing-store slots allocated.
    pub fn slot_count(&self) -> usize {
        self.next_slot as usize
    }

    /// Computes a fingerprint of the layout: every signal's path, code,
    /// width, range, direction, and kind, plus every alias.
    ///
    /// Two registries built from the same declaration sequence hash equal.
    pub fn layout_hash(&self) -> ContentHash {
        let mut h = LayoutHasher::new();
        for d in &self.signals {
            h.tag(b'S').str(&d.path).u32(d.code.as_raw()).u32(d.width);
            match d.range {
                Some(r) => h.byte(1).i32(r.msb).i32(r.lsb),
                None => h.byte(0),
            };
            h.byte(d.direction as u8)
                .byte(d.kind as u8)
                .byte(d.constant as u8);
        }
        for a in &self.aliases {
            h.tag(b'A')
                .str(&a.path)
                .u32(a.target.as_raw())
                .byte(a.direction as u8)
                .byte(a.kind as u8);
        }
        h.finish()
    }
}
