// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use understory_schema::{
    Action, EntryKind, EntryMeta, FolderSettings, RenderPredicate, ResolvedEntry, Settings, Value,
};

/// A stored control, as seen by renderers.
///
/// Returned by value from [`Store::get`](crate::Store::get); mutating a copy
/// has no effect on the store.
#[derive(Clone, Debug)]
pub struct Entry {
    /// Full dot-separated path.
    pub path: String,
    /// Control kind.
    pub kind: EntryKind,
    /// Committed value; `None` for buttons and monitors.
    pub value: Option<Value>,
    /// Plugin settings.
    pub settings: Settings,
    /// Display metadata, including the live disabled flag.
    pub meta: EntryMeta,
    /// Visibility rule.
    pub render: Option<RenderPredicate>,
    /// Number of active registrations.
    pub ref_count: usize,
    pub(crate) seq: u64,
    pub(crate) action: Option<Action>,
}

impl Entry {
    pub(crate) fn from_resolved(path: &str, resolved: &ResolvedEntry, seq: u64) -> Self {
        Self {
            path: path.to_owned(),
            kind: resolved.kind.clone(),
            value: resolved.value.clone(),
            settings: resolved.settings.clone(),
            meta: resolved.meta.clone(),
            render: resolved.render.clone(),
            ref_count: 1,
            seq,
            action: resolved.action.clone(),
        }
    }

    /// Returns `true` while the input is disabled.
    #[must_use]
    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.meta.disabled
    }

    /// The value readers see: `None` while disabled.
    #[must_use]
    pub fn reader_value(&self) -> Option<&Value> {
        if self.meta.disabled {
            None
        } else {
            self.value.as_ref()
        }
    }

    /// Display label.
    #[must_use]
    #[inline]
    pub fn label(&self) -> &str {
        &self.meta.label
    }

    pub(crate) fn same_metadata(&self, resolved: &ResolvedEntry) -> bool {
        self.kind == resolved.kind
            && self.settings == resolved.settings
            && self.meta == resolved.meta
            && self.render == resolved.render
    }
}

/// A folder node. Children are derived from path prefixes.
#[derive(Clone, Debug)]
pub(crate) struct FolderEntry {
    pub(crate) settings: FolderSettings,
    /// Settings came from a registration rather than the store default.
    pub(crate) explicit: bool,
    pub(crate) seq: u64,
    /// Entries stored anywhere below this folder.
    pub(crate) descendants: usize,
}
