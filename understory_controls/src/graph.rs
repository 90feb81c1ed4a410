// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Read-dependency graph for render predicates.

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::path::PathId;

/// What a predicate read from a path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum ReadKind {
    /// The reader-visible value.
    Value,
    /// The effective visibility.
    Visibility,
}

impl ReadKind {
    fn index(self) -> usize {
        match self {
            Self::Value => 0,
            Self::Visibility => 1,
        }
    }
}

type Edges = HashMap<PathId, SmallVec<[PathId; 4]>>;

/// "A read B" edges, per read kind.
///
/// Edges are stored in both directions so that both "what did A read?" and
/// "who read B?" are direct lookups. Cycles are allowed; the resolver detects
/// them with [`reaches`](Self::reaches).
#[derive(Clone, Debug, Default)]
pub(crate) struct DependencyGraph {
    forward: [Edges; 2],
    reverse: [Edges; 2],
}

impl DependencyGraph {
    /// Returns `true` if the graph holds no edges.
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.forward.iter().all(HashMap::is_empty)
    }

    /// Adds `from` read `to`. Returns `false` if the edge already existed.
    pub(crate) fn add_dependency(&mut self, from: PathId, to: PathId, kind: ReadKind) -> bool {
        let fwd = self.forward[kind.index()].entry(from).or_default();
        if fwd.contains(&to) {
            return false;
        }
        fwd.push(to);
        self.reverse[kind.index()].entry(to).or_default().push(from);
        true
    }

    /// Removes one edge. Returns `true` if it existed.
    pub(crate) fn remove_dependency(&mut self, from: PathId, to: PathId, kind: ReadKind) -> bool {
        let ch = kind.index();
        let Some(fwd) = self.forward[ch].get_mut(&from) else {
            return false;
        };
        let Some(pos) = fwd.iter().position(|&k| k == to) else {
            return false;
        };
        fwd.swap_remove(pos);
        if fwd.is_empty() {
            self.forward[ch].remove(&from);
        }
        if let Some(rev) = self.reverse[ch].get_mut(&to) {
            if let Some(pos) = rev.iter().position(|&k| k == from) {
                rev.swap_remove(pos);
            }
            if rev.is_empty() {
                self.reverse[ch].remove(&to);
            }
        }
        true
    }

    /// Replaces every `kind` edge out of `from` with `to`.
    ///
    /// Returns `true` if the edge set changed.
    pub(crate) fn replace_dependencies(
        &mut self,
        from: PathId,
        kind: ReadKind,
        to: &[PathId],
    ) -> bool {
        let old: SmallVec<[PathId; 4]> = self.dependencies(from, kind).collect();
        let unchanged = old.len() == to.len() && old.iter().all(|dep| to.contains(dep));
        if unchanged {
            return false;
        }
        for dep in old.iter().filter(|dep| !to.contains(dep)) {
            self.remove_dependency(from, *dep, kind);
        }
        for dep in to {
            self.add_dependency(from, *dep, kind);
        }
        true
    }

    /// Removes every edge touching `key`.
    pub(crate) fn remove_key(&mut self, key: PathId) {
        for kind in [ReadKind::Value, ReadKind::Visibility] {
            let ch = kind.index();
            for dep in self.forward[ch].remove(&key).unwrap_or_default() {
                if let Some(rev) = self.reverse[ch].get_mut(&dep) {
                    rev.retain(|k| *k != key);
                    if rev.is_empty() {
                        self.reverse[ch].remove(&dep);
                    }
                }
            }
            for dependent in self.reverse[ch].remove(&key).unwrap_or_default() {
                if let Some(fwd) = self.forward[ch].get_mut(&dependent) {
                    fwd.retain(|k| *k != key);
                    if fwd.is_empty() {
                        self.forward[ch].remove(&dependent);
                    }
                }
            }
        }
    }

    /// What `key` read.
    pub(crate) fn dependencies(&self, key: PathId, kind: ReadKind) -> impl Iterator<Item = PathId> + '_ {
        self.forward[kind.index()]
            .get(&key)
            .into_iter()
            .flat_map(|deps| deps.iter().copied())
    }

    /// Who read `key`.
    pub(crate) fn dependents(&self, key: PathId, kind: ReadKind) -> impl Iterator<Item = PathId> + '_ {
        self.reverse[kind.index()]
            .get(&key)
            .into_iter()
            .flat_map(|deps| deps.iter().copied())
    }

    /// Returns `true` if `target` is reachable from any of `starts` along
    /// `kind` edges (a start equal to `target` counts).
    pub(crate) fn reaches(&self, starts: &[PathId], target: PathId, kind: ReadKind) -> bool {
        let mut visited = HashSet::new();
        let mut stack: Vec<PathId> = starts.to_vec();
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(self.dependencies(current, kind));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathTable;

    fn ids(n: usize) -> Vec<PathId> {
        let mut table = PathTable::default();
        (0..n).map(|i| table.intern(&format!("p{i}"))).collect()
    }

    #[test]
    fn edges_are_bidirectional_per_kind() {
        let p = ids(3);
        let mut g = DependencyGraph::default();
        assert!(g.add_dependency(p[1], p[0], ReadKind::Value));
        assert!(!g.add_dependency(p[1], p[0], ReadKind::Value));
        assert!(g.add_dependency(p[2], p[0], ReadKind::Visibility));

        assert_eq!(g.dependents(p[0], ReadKind::Value).collect::<Vec<_>>(), [p[1]]);
        assert_eq!(g.dependents(p[0], ReadKind::Visibility).collect::<Vec<_>>(), [p[2]]);
        assert_eq!(g.dependencies(p[1], ReadKind::Visibility).count(), 0);
    }

    #[test]
    fn replace_diffs_the_edge_set() {
        let p = ids(4);
        let mut g = DependencyGraph::default();
        assert!(g.replace_dependencies(p[0], ReadKind::Value, &[p[1], p[2]]));
        assert!(!g.replace_dependencies(p[0], ReadKind::Value, &[p[2], p[1]]));
        assert!(g.replace_dependencies(p[0], ReadKind::Value, &[p[3]]));

        assert_eq!(g.dependents(p[1], ReadKind::Value).count(), 0);
        assert_eq!(g.dependents(p[3], ReadKind::Value).collect::<Vec<_>>(), [p[0]]);
    }

    #[test]
    fn remove_key_drops_both_directions() {
        let p = ids(3);
        let mut g = DependencyGraph::default();
        g.add_dependency(p[1], p[0], ReadKind::Value);
        g.add_dependency(p[0], p[2], ReadKind::Visibility);
        g.remove_key(p[0]);
        assert!(g.is_empty());
        assert_eq!(g.dependents(p[2], ReadKind::Visibility).count(), 0);
    }

    #[test]
    fn reachability_finds_cycles() {
        let p = ids(3);
        let mut g = DependencyGraph::default();
        g.add_dependency(p[1], p[0], ReadKind::Visibility);
        g.add_dependency(p[2], p[1], ReadKind::Visibility);
        // Would p0 reading p2 close a loop? p2 -> p1 -> p0.
        assert!(g.reaches(&[p[2]], p[0], ReadKind::Visibility));
        assert!(!g.reaches(&[p[0]], p[2], ReadKind::Visibility));
        assert!(!g.reaches(&[p[2]], p[0], ReadKind::Value));
    }
}
