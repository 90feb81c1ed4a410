// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Non-fatal problems reported by the store.

use std::collections::VecDeque;

use thiserror::Error;
use understory_schema::{EntryKind, SchemaDiagnostic};

/// A non-fatal problem. The offending item is skipped or treated as hidden;
/// everything else proceeds.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Diagnostic {
    /// A schema problem found during resolution.
    #[error(transparent)]
    Schema(#[from] SchemaDiagnostic),
    /// A registration asked for a different kind at a taken path. The
    /// existing entry stays authoritative.
    #[error("type conflict at `{path}`: registered as `{existing}`, requested `{requested}`")]
    TypeConflict {
        /// The contested path.
        path: String,
        /// Kind of the existing entry.
        existing: EntryKind,
        /// Kind the later registration declared.
        requested: EntryKind,
    },
    /// A render predicate read its own path.
    #[error("render predicate of `{path}` reads its own path; treated as hidden")]
    SelfReferentialPredicate {
        /// Path owning the predicate.
        path: String,
    },
    /// Render predicates depend on each other's visibility in a loop.
    #[error("render predicate of `{path}` is part of a visibility cycle; treated as hidden")]
    VisibilityCycle {
        /// Path owning the predicate.
        path: String,
    },
}

impl Diagnostic {
    /// Returns the path the diagnostic refers to.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Schema(d) => d.path(),
            Self::TypeConflict { path, .. }
            | Self::SelfReferentialPredicate { path }
            | Self::VisibilityCycle { path } => path,
        }
    }
}

/// Bounded log of recent diagnostics. Every entry is also emitted as a
/// `tracing` warning.
#[derive(Debug)]
pub(crate) struct DiagnosticLog {
    entries: VecDeque<Diagnostic>,
    capacity: usize,
    record: bool,
}

impl DiagnosticLog {
    pub(crate) fn new(capacity: usize, record: bool) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            record,
        }
    }

    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(path = diagnostic.path(), "{diagnostic}");
        if !self.record || self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(diagnostic);
    }

    pub(crate) fn take(&mut self) -> Vec<Diagnostic> {
        self.entries.drain(..).collect()
    }
}
