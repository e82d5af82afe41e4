//! Per-job resolution ledger.
//!
//! The ledger is the single piece of shared mutable state threaded between the
//! compiler hook and the fixed-point driver. The hook records every symbolic
//! reference it sees; the driver resolves pending entries between compile
//! passes and writes the outcomes back. Entries are monotone: once a key is
//! marked [`Resolution::Unresolved`] or [`Resolution::Module`] it is never
//! re-attempted and never weakens - the only permitted rewrite is a promotion
//! upgrading an unresolved helper key to a module binding.
//!
//! A ledger lives for exactly one linking job and is discarded with it.

use std::collections::HashMap;

use tracing::trace;

use crate::reference::{RefKey, ReferenceKind};

/// Resolution state of one tracked reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Recorded by the compiler hook, not yet attempted.
    Pending,
    /// Attempted; no module found. The reference stays a runtime lookup.
    /// Also the terminal state of the ambiguous half of a promoted
    /// context-or-helper entry.
    Unresolved,
    /// Resolved to a concrete module request string.
    Module(String),
}

/// Mapping from reference identity to resolution state for one job.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: HashMap<RefKey, Resolution>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reference as pending if it has not been seen before.
    ///
    /// Idempotent: re-recording a key in any state is a no-op, so a reference
    /// encountered on every compile pass is only ever resolved once.
    pub fn record(&mut self, key: RefKey) {
        if !self.entries.contains_key(&key) {
            trace!(reference = %key, "recording reference");
            self.entries.insert(key, Resolution::Pending);
        }
    }

    pub fn get(&self, key: &RefKey) -> Option<&Resolution> {
        self.entries.get(key)
    }

    /// Snapshot of all entries still awaiting a resolution attempt.
    pub fn pending(&self) -> Vec<RefKey> {
        self.entries
            .iter()
            .filter(|(_, state)| **state == Resolution::Pending)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Mark a pending entry as attempted with no module found.
    ///
    /// A no-op when the entry has already settled: a name recorded under two
    /// kinds in the same pass can be settled by a promotion before its own
    /// result is merged, and that outcome must stand.
    pub fn mark_unresolved(&mut self, key: &RefKey) {
        if self.entries.get(key) != Some(&Resolution::Pending) {
            return;
        }
        trace!(reference = %key, "no module found, leaving as runtime lookup");
        self.entries.insert(key.clone(), Resolution::Unresolved);
    }

    /// Mark a pending entry as resolved to `request`.
    ///
    /// A context-or-helper entry is promoted into the helper namespace: the
    /// ambiguous `?name` key is consumed and the module request is stored
    /// under `#name`, so later passes treat the name as a known helper.
    /// Returns the helper name when a promotion happened.
    ///
    /// Entries that have already settled are left untouched, and a promotion
    /// never displaces a module request already held by the helper key.
    pub fn mark_module(&mut self, key: &RefKey, request: String) -> Option<String> {
        if self.entries.get(key) != Some(&Resolution::Pending) {
            return None;
        }
        trace!(reference = %key, %request, "resolved to module");

        if key.kind == ReferenceKind::ContextOrHelper {
            let helper_key = key.promote_to_helper();
            self.entries.insert(key.clone(), Resolution::Unresolved);
            if !matches!(self.entries.get(&helper_key), Some(Resolution::Module(_))) {
                self.entries.insert(helper_key, Resolution::Module(request));
            }
            Some(key.name.clone())
        } else {
            self.entries.insert(key.clone(), Resolution::Module(request));
            None
        }
    }

    /// Number of tracked references, across all states.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
