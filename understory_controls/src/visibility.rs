// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lazy render-predicate evaluation.
//!
//! Every predicate runs against a recording accessor. The paths it reads
//! become edges in a [`DependencyGraph`]: value reads on one channel, chained
//! visibility reads on the other. A later change only dirties the predicates
//! that read the changed path, and a visibility flip only dirties predicates
//! that read that visibility. Nothing else is evaluated again.
//!
//! Self reads and visibility cycles are caught while evaluating (an entry
//! already on the evaluation stack is requested again) or from the graph (a
//! cached result closes a loop back to the evaluating predicate). Either way
//! the predicate resolves to hidden and a [`Diagnostic`] is produced.

use std::cell::RefCell;
use std::mem;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use understory_schema::{RenderPredicate, SnapshotAccess, Value};

use crate::diagnostic::Diagnostic;
use crate::graph::{DependencyGraph, ReadKind};
use crate::path::{PathId, PathTable};

/// The store contents a predicate may read.
pub(crate) trait ValueSource {
    /// Reader-visible value (`None` when absent or disabled).
    fn reader_value(&self, path: &str) -> Option<Value>;
    /// Returns `true` if an entry or folder exists at `path`.
    fn contains(&self, path: &str) -> bool;
}

#[derive(Debug, Default)]
pub(crate) struct VisibilityResolver {
    predicates: HashMap<PathId, RenderPredicate>,
    results: HashMap<PathId, bool>,
    dirty: HashSet<PathId>,
    graph: DependencyGraph,
    /// Predicates that read a path the table had never seen.
    reads_missing: HashSet<PathId>,
    flipped: Vec<PathId>,
    evaluations: u64,
}

impl VisibilityResolver {
    /// Installs, replaces or clears the predicate of `id`.
    pub(crate) fn set_predicate(&mut self, id: PathId, predicate: Option<RenderPredicate>) {
        match predicate {
            Some(predicate) => {
                if self.predicates.get(&id) == Some(&predicate) {
                    return;
                }
                self.predicates.insert(id, predicate);
                self.dirty.insert(id);
            }
            None => {
                if self.predicates.remove(&id).is_none() {
                    return;
                }
                self.forget_reads(id);
                self.dirty.remove(&id);
                if self.results.remove(&id) == Some(false) {
                    self.flipped.push(id);
                    self.dirty_dependents(id, ReadKind::Visibility);
                }
            }
        }
    }

    /// A path was registered.
    pub(crate) fn path_added(&mut self, id: PathId, predicate: Option<RenderPredicate>) {
        self.dirty_dependents(id, ReadKind::Value);
        self.dirty_dependents(id, ReadKind::Visibility);
        self.dirty.extend(self.reads_missing.iter().copied());
        if let Some(predicate) = predicate {
            self.predicates.insert(id, predicate);
            self.dirty.insert(id);
        }
    }

    /// A path was removed.
    pub(crate) fn path_removed(&mut self, id: PathId) {
        self.dirty_dependents(id, ReadKind::Value);
        self.dirty_dependents(id, ReadKind::Visibility);
        self.predicates.remove(&id);
        self.results.remove(&id);
        self.dirty.remove(&id);
        self.reads_missing.remove(&id);
        self.graph.remove_key(id);
    }

    /// The reader-visible value of `id` changed.
    pub(crate) fn value_changed(&mut self, id: PathId) {
        self.dirty_dependents(id, ReadKind::Value);
    }

    /// Own predicate result of `id`; `true` without a predicate.
    pub(crate) fn own(&self, id: PathId) -> bool {
        !self.predicates.contains_key(&id) || self.results.get(&id).copied().unwrap_or(true)
    }

    /// Effective visibility: `path` and every ancestor pass their predicates.
    pub(crate) fn is_visible(&self, paths: &PathTable, path: &str) -> bool {
        paths.lookup(path).is_none_or(|id| self.own(id))
            && paths.ancestors(path).into_iter().all(|id| self.own(id))
    }

    /// Total predicate evaluations so far.
    pub(crate) fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Returns `true` if a refresh has work to do.
    pub(crate) fn needs_refresh(&self) -> bool {
        !self.dirty.is_empty() || !self.flipped.is_empty()
    }

    /// Re-evaluates dirty predicates until results settle.
    ///
    /// Returns the ids whose own result changed since the last refresh.
    pub(crate) fn refresh(
        &mut self,
        paths: &PathTable,
        source: &dyn ValueSource,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<PathId> {
        if !self.needs_refresh() {
            return Vec::new();
        }
        let state = PassState {
            results: mem::take(&mut self.results),
            dirty: mem::take(&mut self.dirty),
            graph: mem::take(&mut self.graph),
            reads_missing: mem::take(&mut self.reads_missing),
            flipped: mem::take(&mut self.flipped),
            stack: Vec::new(),
            diagnostics: Vec::new(),
            evaluations: 0,
        };
        let pass = Pass {
            paths,
            source,
            predicates: &self.predicates,
            state: RefCell::new(state),
        };
        pass.run();
        let state = pass.state.into_inner();

        self.results = state.results;
        self.dirty = state.dirty;
        self.graph = state.graph;
        self.reads_missing = state.reads_missing;
        self.evaluations += state.evaluations;
        diagnostics.extend(state.diagnostics);

        let mut flipped = state.flipped;
        flipped.sort_unstable();
        flipped.dedup();
        flipped
    }

    fn dirty_dependents(&mut self, id: PathId, kind: ReadKind) {
        self.dirty.extend(self.graph.dependents(id, kind));
    }

    fn forget_reads(&mut self, id: PathId) {
        self.graph.replace_dependencies(id, ReadKind::Value, &[]);
        self.graph.replace_dependencies(id, ReadKind::Visibility, &[]);
        self.reads_missing.remove(&id);
    }
}

#[derive(Debug)]
struct Frame {
    id: PathId,
    value_reads: SmallVec<[PathId; 4]>,
    visibility_reads: SmallVec<[PathId; 4]>,
    self_read: bool,
    missing: bool,
    cyclic: bool,
}

impl Frame {
    fn new(id: PathId) -> Self {
        Self {
            id,
            value_reads: SmallVec::new(),
            visibility_reads: SmallVec::new(),
            self_read: false,
            missing: false,
            cyclic: false,
        }
    }
}

#[derive(Debug)]
struct PassState {
    results: HashMap<PathId, bool>,
    dirty: HashSet<PathId>,
    graph: DependencyGraph,
    reads_missing: HashSet<PathId>,
    flipped: Vec<PathId>,
    stack: Vec<Frame>,
    diagnostics: Vec<Diagnostic>,
    evaluations: u64,
}

/// One refresh. Predicates receive `&Pass` as their accessor.
///
/// The state sits in a `RefCell` that is never borrowed while a predicate
/// runs, so predicates may recurse into the accessor freely.
struct Pass<'a> {
    paths: &'a PathTable,
    source: &'a dyn ValueSource,
    predicates: &'a HashMap<PathId, RenderPredicate>,
    state: RefCell<PassState>,
}

impl Pass<'_> {
    fn run(&self) {
        let limit = self.predicates.len() + 1;
        for _ in 0..limit {
            let mut batch: Vec<PathId> = self.state.borrow().dirty.iter().copied().collect();
            if batch.is_empty() {
                return;
            }
            batch.sort_unstable();
            for id in batch {
                if self.state.borrow().dirty.contains(&id) {
                    self.own(id);
                }
            }
        }
        let mut state = self.state.borrow_mut();
        if !state.dirty.is_empty() {
            tracing::warn!(
                pending = state.dirty.len(),
                "render predicates did not settle; keeping last results"
            );
            state.dirty.clear();
        }
    }

    /// Own result of `id`, evaluating it first when dirty.
    fn own(&self, id: PathId) -> bool {
        let Some(predicate) = self.predicates.get(&id) else {
            self.state.borrow_mut().dirty.remove(&id);
            return true;
        };
        {
            let mut state = self.state.borrow_mut();
            if let Some(pos) = state.stack.iter().position(|f| f.id == id) {
                for frame in &mut state.stack[pos..] {
                    frame.cyclic = true;
                }
                return false;
            }
            if !state.dirty.contains(&id) {
                return state.results.get(&id).copied().unwrap_or(true);
            }
        }
        self.evaluate(id, predicate)
    }

    fn evaluate(&self, id: PathId, predicate: &RenderPredicate) -> bool {
        {
            let mut state = self.state.borrow_mut();
            state.stack.push(Frame::new(id));
            state.evaluations += 1;
        }
        let raw = predicate.evaluate(self);

        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        let Some(frame) = state.stack.pop() else {
            return false;
        };
        state
            .graph
            .replace_dependencies(id, ReadKind::Value, &frame.value_reads);
        state
            .graph
            .replace_dependencies(id, ReadKind::Visibility, &frame.visibility_reads);
        if frame.missing {
            state.reads_missing.insert(id);
        } else {
            state.reads_missing.remove(&id);
        }

        let cyclic = frame.cyclic
            || state
                .graph
                .reaches(&frame.visibility_reads, id, ReadKind::Visibility);
        let path = self.paths.path(id);
        let diagnostic = if frame.self_read {
            Some(Diagnostic::SelfReferentialPredicate {
                path: path.to_owned(),
            })
        } else if cyclic {
            Some(Diagnostic::VisibilityCycle {
                path: path.to_owned(),
            })
        } else {
            None
        };
        // Once per pass, even if a cycle member is evaluated again.
        if let Some(diagnostic) = diagnostic {
            if !state.diagnostics.contains(&diagnostic) {
                state.diagnostics.push(diagnostic);
            }
        }

        let result = raw && !frame.self_read && !cyclic;
        state.dirty.remove(&id);
        let previous = state.results.insert(id, result).unwrap_or(true);
        if previous != result {
            state.flipped.push(id);
            let dependents: SmallVec<[PathId; 4]> =
                state.graph.dependents(id, ReadKind::Visibility).collect();
            state.dirty.extend(dependents);
        }
        tracing::trace!(path, result, "evaluated render predicate");
        result
    }

    fn record(&self, id: Option<PathId>, kind: ReadKind) {
        let mut state = self.state.borrow_mut();
        let Some(frame) = state.stack.last_mut() else {
            return;
        };
        let Some(id) = id else {
            frame.missing = true;
            return;
        };
        if id == frame.id {
            match kind {
                ReadKind::Value => frame.self_read = true,
                // Resolved by the stack check in `own`.
                ReadKind::Visibility => {}
            }
            return;
        }
        let reads = match kind {
            ReadKind::Value => &mut frame.value_reads,
            ReadKind::Visibility => &mut frame.visibility_reads,
        };
        if !reads.contains(&id) {
            reads.push(id);
        }
    }
}

impl SnapshotAccess for Pass<'_> {
    fn get(&self, path: &str) -> Option<Value> {
        self.record(self.paths.lookup(path), ReadKind::Value);
        self.source.reader_value(path)
    }

    fn is_visible(&self, path: &str) -> bool {
        let target = self.paths.lookup(path);
        self.record(target, ReadKind::Visibility);
        let ancestors = self.paths.ancestors(path);
        for &ancestor in &ancestors {
            self.record(Some(ancestor), ReadKind::Visibility);
        }
        if !self.source.contains(path) {
            return false;
        }
        target.into_iter().chain(ancestors).all(|id| self.own(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Values(HashMap<String, Value>);

    impl ValueSource for Values {
        fn reader_value(&self, path: &str) -> Option<Value> {
            self.0.get(path).cloned()
        }
        fn contains(&self, path: &str) -> bool {
            self.0.contains_key(path)
        }
    }

    struct Fixture {
        paths: PathTable,
        values: Values,
        resolver: VisibilityResolver,
        diagnostics: Vec<Diagnostic>,
    }

    impl Fixture {
        fn new(entries: &[(&str, Value)]) -> Self {
            let mut paths = PathTable::default();
            let mut values = Values::default();
            for (path, value) in entries {
                paths.intern(path);
                values.0.insert((*path).to_owned(), value.clone());
            }
            Self {
                paths,
                values,
                resolver: VisibilityResolver::default(),
                diagnostics: Vec::new(),
            }
        }

        fn id(&self, path: &str) -> PathId {
            self.paths.lookup(path).unwrap()
        }

        fn predicate(&mut self, path: &str, p: impl Fn(&dyn SnapshotAccess) -> bool + 'static) {
            let id = self.id(path);
            self.resolver.set_predicate(id, Some(RenderPredicate::new(p)));
        }

        fn write(&mut self, path: &str, value: Value) {
            self.values.0.insert(path.to_owned(), value);
            let id = self.id(path);
            self.resolver.value_changed(id);
        }

        fn refresh(&mut self) -> Vec<String> {
            let flipped =
                self.resolver
                    .refresh(&self.paths, &self.values, &mut self.diagnostics);
            flipped
                .into_iter()
                .map(|id| self.paths.path(id).to_owned())
                .collect()
        }

        fn visible(&self, path: &str) -> bool {
            self.resolver.is_visible(&self.paths, path)
        }
    }

    #[test]
    fn only_readers_are_reevaluated() {
        let mut fx = Fixture::new(&[("a", json!(true)), ("b", json!(1)), ("c", json!(0))]);
        fx.predicate("b", |s| s.get("a") == Some(json!(true)));
        fx.refresh();
        assert_eq!(fx.resolver.evaluations(), 1);

        fx.write("c", json!(5));
        assert!(fx.refresh().is_empty());
        assert_eq!(fx.resolver.evaluations(), 1, "unread path caused work");

        fx.write("a", json!(false));
        assert_eq!(fx.refresh(), ["b"]);
        assert_eq!(fx.resolver.evaluations(), 2);
        assert!(!fx.visible("b"));
    }

    #[test]
    fn chained_visibility_propagates() {
        let mut fx = Fixture::new(&[("a", json!(true)), ("b", json!(1)), ("c", json!(2))]);
        fx.predicate("b", |s| s.get("a") == Some(json!(true)));
        fx.predicate("c", |s| s.is_visible("b"));
        fx.refresh();
        assert!(fx.visible("c"));

        fx.write("a", json!(false));
        assert_eq!(fx.refresh(), ["b", "c"]);
        assert!(!fx.visible("b"));
        assert!(!fx.visible("c"));
    }

    #[test]
    fn ancestors_hide_descendants() {
        let mut fx = Fixture::new(&[("show", json!(false)), ("f", json!(null)), ("f.x", json!(1))]);
        fx.predicate("f", |s| s.get("show") == Some(json!(true)));
        fx.refresh();
        assert!(!fx.visible("f.x"));

        fx.write("show", json!(true));
        fx.refresh();
        assert!(fx.visible("f.x"));
    }

    #[test]
    fn self_reads_are_hidden_with_a_diagnostic() {
        let mut fx = Fixture::new(&[("a", json!(1))]);
        fx.predicate("a", |s| s.get("a").is_some());
        fx.refresh();
        assert!(!fx.visible("a"));
        assert_eq!(
            fx.diagnostics,
            [Diagnostic::SelfReferentialPredicate { path: "a".into() }]
        );
    }

    #[test]
    fn cycles_terminate_hidden() {
        let mut fx = Fixture::new(&[("a", json!(1)), ("b", json!(2)), ("t", json!(0))]);
        fx.predicate("a", |s| s.is_visible("b"));
        fx.predicate("b", |s| {
            let _ = s.get("t");
            s.is_visible("a")
        });
        fx.refresh();
        assert!(!fx.visible("a"));
        assert!(!fx.visible("b"));
        assert!(fx
            .diagnostics
            .iter()
            .all(|d| matches!(d, Diagnostic::VisibilityCycle { .. })));
        assert_eq!(fx.diagnostics.len(), 2);

        // Re-evaluating one side alone still sees the loop through the graph.
        fx.diagnostics.clear();
        fx.write("t", json!(1));
        fx.refresh();
        assert!(!fx.visible("b"));
        assert_eq!(
            fx.diagnostics,
            [Diagnostic::VisibilityCycle { path: "b".into() }]
        );
    }

    #[test]
    fn clearing_a_hiding_predicate_flips() {
        let mut fx = Fixture::new(&[("a", json!(1))]);
        fx.predicate("a", |_| false);
        fx.refresh();
        let id = fx.id("a");
        fx.resolver.set_predicate(id, None);
        assert_eq!(fx.refresh(), ["a"]);
        assert!(fx.visible("a"));
    }

    #[test]
    fn missing_reads_retry_on_registration() {
        let mut fx = Fixture::new(&[("a", json!(1))]);
        fx.predicate("a", |s| s.get("late").is_some());
        fx.refresh();
        assert!(!fx.visible("a"));

        let late = fx.paths.intern("late");
        fx.values.0.insert("late".into(), json!(true));
        fx.resolver.path_added(late, None);
        assert_eq!(fx.refresh(), ["a"]);
        assert!(fx.visible("a"));
    }
}
