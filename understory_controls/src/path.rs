// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Path interning.
//!
//! The store, the dependency graph and the visibility resolver are keyed by
//! compact [`PathId`]s rather than owned strings. Ids are never recycled: a
//! path that is removed and registered again gets its old id back.

use hashbrown::HashMap;
use smallvec::SmallVec;

/// A compact, interned path identifier.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub(crate) struct PathId(u32);

/// Interns dot-separated paths.
#[derive(Clone, Debug, Default)]
pub(crate) struct PathTable {
    names: Vec<String>,
    ids: HashMap<String, PathId>,
}

impl PathTable {
    /// Interns `path` and returns its id.
    pub(crate) fn intern(&mut self, path: &str) -> PathId {
        if let Some(&id) = self.ids.get(path) {
            return id;
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "a panel never holds anywhere near u32::MAX paths"
        )]
        let id = PathId(self.names.len() as u32);
        self.names.push(path.to_owned());
        self.ids.insert(path.to_owned(), id);
        id
    }

    /// Returns the id of an already interned path.
    pub(crate) fn lookup(&self, path: &str) -> Option<PathId> {
        self.ids.get(path).copied()
    }

    /// Returns the path for an id.
    pub(crate) fn path(&self, id: PathId) -> &str {
        self.names
            .get(id.0 as usize)
            .map_or("", String::as_str)
    }

    /// Returns the ids of the interned ancestors of `path`, nearest first.
    pub(crate) fn ancestors(&self, path: &str) -> SmallVec<[PathId; 4]> {
        let mut out = SmallVec::new();
        let mut rest = path;
        while let Some(i) = rest.rfind('.') {
            rest = &rest[..i];
            if let Some(id) = self.lookup(rest) {
                out.push(id);
            }
        }
        out
    }
}

/// Iterates the ancestor paths of `path`, nearest first.
pub(crate) fn ancestor_paths(path: &str) -> impl Iterator<Item = &str> {
    path.char_indices()
        .rev()
        .filter(|(_, c)| *c == '.')
        .map(move |(i, _)| &path[..i])
}

/// Returns `true` if `path` lies strictly below `folder`.
pub(crate) fn is_descendant(path: &str, folder: &str) -> bool {
    path.len() > folder.len() + 1
        && path.starts_with(folder)
        && path.as_bytes()[folder.len()] == b'.'
}
