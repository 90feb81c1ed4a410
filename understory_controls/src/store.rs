// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The reactive store.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use hashbrown::HashMap;
use understory_schema::{
    Action, CallbackContext, ControlPlugin, EntryKind, FolderSettings, InputCallback,
    InputCallbacks, PluginRegistry, ResolvedEntry, ResolvedSchema, Schema, Settings,
    SnapshotAccess, Value, parent_path, resolve_schema,
};

use crate::changes::{ChangeLog, Changes};
use crate::config::StoreConfig;
use crate::diagnostic::{Diagnostic, DiagnosticLog};
use crate::entry::{Entry, FolderEntry};
use crate::error::StoreError;
use crate::ownership::{OwnerId, Registration};
use crate::path::{PathId, PathTable, ancestor_paths, is_descendant};
use crate::subscribe::Subscribers;
use crate::visibility::{ValueSource, VisibilityResolver};

/// A shared handle to a control store.
///
/// Cloning is cheap and yields a handle to the same store. Stores are
/// single-threaded: every mutation settles visibility and notifies
/// subscribers before it returns. Callbacks run after the store's internal
/// borrows are released, so they may call back into the store.
///
/// Render predicates are different: they run while the store is settling
/// and must read through the accessor they are given.
///
/// ```rust
/// use serde_json::json;
/// use understory_controls::Store;
/// use understory_schema::{Schema, input};
///
/// let store = Store::new();
/// let resolved = store.resolve_schema(
///     &Schema::new().with("speed", input(2).setting("min", 0).setting("max", 5)),
///     None,
/// );
/// store.add_data(&resolved.entries, false);
///
/// store.set_value_at_path("speed", json!(4), true).unwrap();
/// assert_eq!(store.value("speed"), Some(json!(4)));
///
/// let err = store.set_value_at_path("speed", json!(9), true).unwrap_err();
/// assert!(err.to_string().contains("outside"));
/// assert_eq!(store.value("speed"), Some(json!(4)));
/// ```
#[derive(Clone)]
pub struct Store(pub(crate) Rc<StoreInner>);

pub(crate) struct StoreInner {
    config: StoreConfig,
    registry: RefCell<PluginRegistry>,
    pub(crate) state: RefCell<StoreState>,
    pub(crate) subscribers: RefCell<Subscribers>,
    diagnostics: RefCell<DiagnosticLog>,
    next_owner: Cell<u64>,
}

/// A callback queued by a mutation, run once the mutation settled.
struct PendingCall {
    callback: InputCallback,
    value: Value,
    path: String,
    initial: bool,
    from_panel: bool,
}

/// Everything a mutation wants to happen after its borrows end.
#[derive(Default)]
pub(crate) struct Effects {
    pub(crate) changes: ChangeLog,
    pub(crate) diagnostics: Vec<Diagnostic>,
    calls: Vec<PendingCall>,
}

impl Effects {
    pub(crate) fn call(
        &mut self,
        callback: InputCallback,
        path: &str,
        value: Value,
        initial: bool,
        from_panel: bool,
    ) {
        self.calls.push(PendingCall {
            callback,
            value,
            path: path.to_owned(),
            initial,
            from_panel,
        });
    }
}

/// Result of [`Store::add_data`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddDataReport {
    /// Paths that took a reference; a type conflict leaves a path unclaimed.
    pub claimed: Vec<String>,
    /// Paths that did not exist before.
    pub inserted: Vec<String>,
}

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    paths: PathTable,
    entries: HashMap<PathId, Entry>,
    folders: HashMap<PathId, FolderEntry>,
    callbacks: HashMap<PathId, InputCallbacks>,
    resolver: VisibilityResolver,
    visible_cache: Option<Vec<String>>,
    next_seq: u64,
    pub(crate) owners: HashMap<OwnerId, Registration>,
}

thread_local! {
    static DEFAULT_STORE: Store = Store::new();
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.try_borrow();
        let mut s = f.debug_struct("Store");
        if let Ok(state) = state {
            s.field("entries", &state.entries.len())
                .field("folders", &state.folders.len());
        }
        s.field("config", &self.0.config).finish_non_exhaustive()
    }
}

impl Store {
    /// Creates an empty store with the built-in plugins.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates an empty store with the built-in plugins and `config`.
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_registry(config, PluginRegistry::with_builtins())
    }

    /// Creates an empty store with a custom plugin registry.
    #[must_use]
    pub fn with_registry(config: StoreConfig, registry: PluginRegistry) -> Self {
        let diagnostics = DiagnosticLog::new(config.diagnostic_capacity, config.record_diagnostics);
        Self(Rc::new(StoreInner {
            config,
            registry: RefCell::new(registry),
            state: RefCell::new(StoreState::default()),
            subscribers: RefCell::new(Subscribers::default()),
            diagnostics: RefCell::new(diagnostics),
            next_owner: Cell::new(0),
        }))
    }

    /// The calling thread's default store, created on first use.
    #[must_use]
    pub fn default_store() -> Self {
        DEFAULT_STORE.with(Clone::clone)
    }

    /// Returns `true` if both handles point at the same store.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.0.config
    }

    /// Registers a custom plugin. It takes part in inference after the
    /// plugins already registered.
    pub fn register_plugin<P: ControlPlugin + 'static>(&self, plugin: P) {
        self.0.registry.borrow_mut().register(plugin);
    }

    /// A snapshot of the plugin registry.
    #[must_use]
    pub fn registry(&self) -> PluginRegistry {
        self.0.registry.borrow().clone()
    }

    /// Resolves `schema` with this store's plugins.
    #[must_use]
    pub fn resolve_schema(&self, schema: &Schema, root: Option<&str>) -> ResolvedSchema {
        resolve_schema(&self.0.registry.borrow(), schema, root)
    }

    pub(crate) fn next_owner(&self) -> u64 {
        let id = self.0.next_owner.get() + 1;
        self.0.next_owner.set(id);
        id
    }

    /// Runs `f` against the state, settles visibility, then dispatches
    /// diagnostics, callbacks and notifications with no borrow held.
    pub(crate) fn mutate<R>(
        &self,
        f: impl FnOnce(&mut StoreState, &Context<'_>, &mut Effects) -> R,
    ) -> R {
        let mut effects = Effects::default();
        let result = {
            let registry = self.0.registry.borrow();
            let cx = Context {
                registry: &registry,
                config: &self.0.config,
            };
            let mut state = self.0.state.borrow_mut();
            let result = f(&mut state, &cx, &mut effects);
            state.settle(&mut effects);
            result
        };
        self.dispatch(effects);
        result
    }

    /// Borrows the state for reading. `None` while a mutation holds it,
    /// which only happens when a render predicate reads a captured handle.
    pub(crate) fn read(&self) -> Option<Ref<'_, StoreState>> {
        let state = self.0.state.try_borrow().ok();
        if state.is_none() {
            tracing::warn!("store read while settling; render predicates should use their accessor");
        }
        state
    }

    fn read_for(&self, path: &str) -> Result<Ref<'_, StoreState>, StoreError> {
        self.read().ok_or_else(|| StoreError::Settling(path.to_owned()))
    }

    fn dispatch(&self, effects: Effects) {
        if !effects.diagnostics.is_empty() {
            let mut log = self.0.diagnostics.borrow_mut();
            for diagnostic in effects.diagnostics {
                log.push(diagnostic);
            }
        }
        for call in effects.calls {
            let cx = CallbackContext {
                path: &call.path,
                initial: call.initial,
                from_panel: call.from_panel,
                access: self,
            };
            (call.callback)(&call.value, &cx);
        }
        if effects.changes.is_empty() {
            return;
        }
        let (general, by_path) = self.0.subscribers.borrow().woken(&effects.changes);
        for watcher in general {
            watcher.notify(self);
        }
        for (watcher, event) in by_path {
            watcher.notify(&event);
        }
    }

    /// Returns a copy of the entry at `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Entry> {
        self.read()?.entry(path).cloned()
    }

    /// The reader-visible value at `path`: `None` when absent, disabled or
    /// valueless.
    ///
    /// Reads made while the store is settling, from a render predicate that
    /// captured this handle, see an empty store.
    #[must_use]
    pub fn value(&self, path: &str) -> Option<Value> {
        self.read()?.reader_value(path)
    }

    /// Copies of every entry, in registration order.
    #[must_use]
    pub fn data(&self) -> Vec<Entry> {
        let Some(state) = self.read() else {
            return Vec::new();
        };
        let mut entries: Vec<Entry> = state.entries.values().cloned().collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }

    /// Every entry path, in registration order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.data().into_iter().map(|e| e.path).collect()
    }

    /// Number of registrations holding `path`; zero when absent.
    #[must_use]
    pub fn ref_count(&self, path: &str) -> usize {
        self.read()
            .and_then(|state| state.entry(path).map(|e| e.ref_count))
            .unwrap_or(0)
    }

    /// Returns `true` if the input's value is left out of hook results.
    #[must_use]
    pub fn is_transient(&self, path: &str) -> bool {
        let Some(state) = self.read() else {
            return false;
        };
        state
            .paths
            .lookup(path)
            .and_then(|id| state.callbacks.get(&id))
            .is_some_and(|c| c.transient)
    }

    /// Display representation of the value at `path`.
    pub fn format_value(&self, path: &str) -> Result<String, StoreError> {
        let state = self.read_for(path)?;
        let entry = state.require(path)?;
        let registry = self.0.registry.borrow();
        let plugin = input_plugin(&registry, entry)?;
        let value = entry.value.clone().unwrap_or(Value::Null);
        Ok(plugin.format(&value, &entry.settings))
    }

    /// Sanitizes and commits a value.
    ///
    /// Equal values are a no-op. On rejection the committed value is kept and
    /// the error carries both the rejected and the committed value.
    pub fn set_value_at_path(
        &self,
        path: &str,
        value: impl Into<Value>,
        from_panel: bool,
    ) -> Result<(), StoreError> {
        let value = value.into();
        self.mutate(|state, cx, fx| state.write_value(cx, path, value, from_panel, fx))
    }

    /// Writes several values in one mutation.
    ///
    /// Each path is written independently: a rejected value does not prevent
    /// the others. The first error is returned.
    pub fn set<I, K, V>(&self, values: I, from_panel: bool) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.mutate(|state, cx, fx| {
            let mut first = None;
            for (path, value) in values {
                let result = state.write_value(cx, path.as_ref(), value.into(), from_panel, fx);
                if let Err(e) = result {
                    first.get_or_insert(e);
                }
            }
            first.map_or(Ok(()), Err)
        })
    }

    /// Merges `partial` into the settings at `path` and fits the live value
    /// into them. If the value cannot be fitted, nothing changes.
    pub fn set_settings_at_path(&self, path: &str, partial: Settings) -> Result<(), StoreError> {
        self.mutate(|state, cx, fx| state.write_settings(cx, path, partial, fx))
    }

    /// Disables or re-enables an input. Readers see no value while it is
    /// disabled; the stored value is kept.
    pub fn disable_input_at_path(&self, path: &str, disabled: bool) -> Result<(), StoreError> {
        self.mutate(|state, _, fx| {
            let id = state.require_id(path)?;
            let Some(entry) = state.entries.get_mut(&id) else {
                return Err(StoreError::UnknownPath(path.to_owned()));
            };
            if entry.meta.disabled == disabled {
                return Ok(());
            }
            entry.meta.disabled = disabled;
            fx.changes.record(path, Changes::DISABLED);
            state.resolver.value_changed(id);
            tracing::trace!(path, disabled, "input disabled state changed");
            Ok(())
        })
    }

    /// Returns `true` if the entry or folder at `path` exists and is visible.
    #[must_use]
    pub fn is_visible(&self, path: &str) -> bool {
        let Some(state) = self.read() else {
            return false;
        };
        state.contains(path) && state.resolver.is_visible(&state.paths, path)
    }

    /// Visible paths in display order.
    ///
    /// Siblings are ordered by `order`, then registration order. A folder
    /// precedes its visible descendants and is only listed if it has one.
    /// The list is cached until structure, order or visibility changes.
    #[must_use]
    pub fn visible_paths(&self) -> Vec<String> {
        let Ok(mut state) = self.0.state.try_borrow_mut() else {
            return Vec::new();
        };
        if let Some(cached) = &state.visible_cache {
            return cached.clone();
        }
        let visible = state.compute_visible();
        state.visible_cache = Some(visible.clone());
        visible
    }

    /// Registers resolved entries, taking one reference per claimed path.
    ///
    /// Existing paths of the same kind keep their live value. Their metadata
    /// is replaced only when `overwrite` is set, and the live value is then
    /// fitted into the new settings. A different kind is a
    /// [`Diagnostic::TypeConflict`] and the path is left unclaimed.
    pub fn add_data(&self, entries: &[(String, ResolvedEntry)], overwrite: bool) -> AddDataReport {
        self.mutate(|state, cx, fx| state.add_data(cx, entries, overwrite, fx))
    }

    /// Drops one reference from each path. Paths reaching zero are removed,
    /// along with folders left empty. Returns the removed entry paths.
    pub fn remove_data<S: AsRef<str>>(&self, paths: &[S]) -> Vec<String> {
        self.mutate(|state, _, fx| state.remove_data(paths, fx))
    }

    /// Settings of the folder at `path`.
    #[must_use]
    pub fn folder_settings(&self, path: &str) -> Option<FolderSettings> {
        let state = self.read()?;
        let id = state.paths.lookup(path)?;
        state.folders.get(&id).map(|f| f.settings.clone())
    }

    /// Sets the settings of the folder at `path`.
    ///
    /// The first registration to declare settings wins; later calls are
    /// ignored unless `force` is set. Returns `true` if the settings were
    /// applied.
    pub fn set_folder_settings(&self, path: &str, settings: FolderSettings, force: bool) -> bool {
        self.mutate(|state, _, fx| state.write_folder_settings(path, settings, force, fx))
    }

    /// Calls the `onEditStart` handler at `path` with the current value.
    pub fn emit_on_edit_start(&self, path: &str) -> Result<(), StoreError> {
        self.emit_edit(path, |c| c.on_edit_start.clone())
    }

    /// Calls the `onEditEnd` handler at `path` with the current value.
    pub fn emit_on_edit_end(&self, path: &str) -> Result<(), StoreError> {
        self.emit_edit(path, |c| c.on_edit_end.clone())
    }

    fn emit_edit(
        &self,
        path: &str,
        pick: impl Fn(&InputCallbacks) -> Option<InputCallback>,
    ) -> Result<(), StoreError> {
        self.mutate(|state, _, fx| {
            let id = state.require_id(path)?;
            let entry = state.require(path)?;
            let Some(callback) = state.callbacks.get(&id).and_then(pick) else {
                return Ok(());
            };
            let value = entry.value.clone().unwrap_or(Value::Null);
            fx.call(callback, path, value, false, true);
            Ok(())
        })
    }

    /// Runs the button at `path`. Disabled buttons do nothing.
    pub fn click_button(&self, path: &str) -> Result<(), StoreError> {
        let callback = {
            let state = self.read_for(path)?;
            let entry = state.require(path)?;
            match &entry.action {
                Some(Action::Button(callback)) if !entry.meta.disabled => Some(Rc::clone(callback)),
                Some(Action::Button(_)) => None,
                _ => return Err(not_an(entry, "button")),
            }
        };
        if let Some(callback) = callback {
            callback(self);
        }
        Ok(())
    }

    /// Runs the action labelled `label` of the button group at `path`.
    pub fn click_group_action(&self, path: &str, label: &str) -> Result<(), StoreError> {
        let callback = {
            let state = self.read_for(path)?;
            let entry = state.require(path)?;
            let Some(Action::ButtonGroup(actions)) = &entry.action else {
                return Err(not_an(entry, "button group"));
            };
            actions
                .iter()
                .find(|(l, _)| l == label)
                .map(|(_, callback)| Rc::clone(callback))
                .ok_or_else(|| StoreError::UnknownAction {
                    path: path.to_owned(),
                    label: label.to_owned(),
                })?
        };
        callback(self);
        Ok(())
    }

    /// Samples the monitor at `path`.
    pub fn poll_monitor(&self, path: &str) -> Result<Value, StoreError> {
        let source = {
            let state = self.read_for(path)?;
            let entry = state.require(path)?;
            let Some(Action::Monitor(source)) = &entry.action else {
                return Err(not_an(entry, "monitor"));
            };
            Rc::clone(source)
        };
        Ok(source())
    }

    /// Drains the recorded diagnostics, oldest first.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.0.diagnostics.borrow_mut().take()
    }

    /// Total render predicate evaluations, for instrumentation.
    #[must_use]
    pub fn predicate_evaluations(&self) -> u64 {
        self.read().map_or(0, |state| state.resolver.evaluations())
    }
}

impl SnapshotAccess for Store {
    fn get(&self, path: &str) -> Option<Value> {
        self.value(path)
    }

    fn is_visible(&self, path: &str) -> bool {
        Self::is_visible(self, path)
    }
}

/// Read-only collaborators of a mutation.
pub(crate) struct Context<'a> {
    registry: &'a PluginRegistry,
    config: &'a StoreConfig,
}

fn not_an(entry: &Entry, expected: &'static str) -> StoreError {
    StoreError::WrongKind {
        path: entry.path.clone(),
        kind: entry.kind.clone(),
        expected,
    }
}

fn input_plugin<'r>(
    registry: &'r PluginRegistry,
    entry: &Entry,
) -> Result<&'r Arc<dyn ControlPlugin>, StoreError> {
    let EntryKind::Input(tag) = &entry.kind else {
        return Err(not_an(entry, "value input"));
    };
    registry.get(tag).ok_or_else(|| StoreError::MissingPlugin {
        path: entry.path.clone(),
        tag: tag.clone(),
    })
}

/// Reads for render predicates.
struct Snapshot<'a> {
    paths: &'a PathTable,
    entries: &'a HashMap<PathId, Entry>,
    folders: &'a HashMap<PathId, FolderEntry>,
}

impl ValueSource for Snapshot<'_> {
    fn reader_value(&self, path: &str) -> Option<Value> {
        let id = self.paths.lookup(path)?;
        self.entries.get(&id)?.reader_value().cloned()
    }

    fn contains(&self, path: &str) -> bool {
        self.paths
            .lookup(path)
            .is_some_and(|id| self.entries.contains_key(&id) || self.folders.contains_key(&id))
    }
}

impl StoreState {
    pub(crate) fn entry(&self, path: &str) -> Option<&Entry> {
        self.entries.get(&self.paths.lookup(path)?)
    }

    fn reader_value(&self, path: &str) -> Option<Value> {
        self.entry(path)?.reader_value().cloned()
    }

    fn contains(&self, path: &str) -> bool {
        self.paths
            .lookup(path)
            .is_some_and(|id| self.entries.contains_key(&id) || self.folders.contains_key(&id))
    }

    fn require(&self, path: &str) -> Result<&Entry, StoreError> {
        self.entry(path)
            .ok_or_else(|| StoreError::UnknownPath(path.to_owned()))
    }

    fn require_id(&self, path: &str) -> Result<PathId, StoreError> {
        self.paths
            .lookup(path)
            .filter(|id| self.entries.contains_key(id))
            .ok_or_else(|| StoreError::UnknownPath(path.to_owned()))
    }

    pub(crate) fn callbacks_of(&self, path: &str) -> Option<&InputCallbacks> {
        self.callbacks.get(&self.paths.lookup(path)?)
    }

    /// Installs the callbacks a registration declared for `path`.
    pub(crate) fn install_callbacks(&mut self, path: &str, callbacks: InputCallbacks) {
        let Some(id) = self.paths.lookup(path) else {
            return;
        };
        if !self.entries.contains_key(&id) {
            return;
        }
        if callbacks.is_empty() && !callbacks.transient {
            self.callbacks.remove(&id);
        } else {
            self.callbacks.insert(id, callbacks);
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn value_channel(&self, id: PathId) -> Changes {
        if self.callbacks.get(&id).is_some_and(|c| c.transient) {
            Changes::TRANSIENT_VALUES
        } else {
            Changes::VALUES
        }
    }

    fn write_value(
        &mut self,
        cx: &Context<'_>,
        path: &str,
        value: Value,
        from_panel: bool,
        fx: &mut Effects,
    ) -> Result<(), StoreError> {
        let id = self.require_id(path)?;
        let channel = self.value_channel(id);
        let Some(entry) = self.entries.get_mut(&id) else {
            return Err(StoreError::UnknownPath(path.to_owned()));
        };
        let plugin = input_plugin(cx.registry, entry)?;
        let previous = entry.value.clone().unwrap_or(Value::Null);
        let sanitized = match plugin.sanitize(&value, &entry.settings, entry.value.as_ref()) {
            Ok(sanitized) => sanitized,
            Err(reason) => {
                tracing::trace!(path, %reason, "value rejected");
                return Err(StoreError::Sanitize {
                    path: path.to_owned(),
                    rejected: value,
                    previous,
                    reason,
                });
            }
        };
        if sanitized == previous {
            return Ok(());
        }
        entry.value = Some(sanitized.clone());
        let reader_changed = !entry.meta.disabled;
        fx.changes.record(path, channel);
        if let Some(callback) = self.callbacks.get(&id).and_then(|c| c.on_change.clone()) {
            fx.call(callback, path, sanitized, false, from_panel);
        }
        if reader_changed {
            self.resolver.value_changed(id);
        }
        tracing::trace!(path, from_panel, "value committed");
        Ok(())
    }

    fn write_settings(
        &mut self,
        cx: &Context<'_>,
        path: &str,
        partial: Settings,
        fx: &mut Effects,
    ) -> Result<(), StoreError> {
        let id = self.require_id(path)?;
        let channel = self.value_channel(id);
        let Some(entry) = self.entries.get_mut(&id) else {
            return Err(StoreError::UnknownPath(path.to_owned()));
        };
        let mut merged = entry.settings.clone();
        merged.extend(partial);
        if merged == entry.settings {
            return Ok(());
        }
        let fitted = match &entry.kind {
            EntryKind::Input(_) => {
                let plugin = input_plugin(cx.registry, entry)?;
                let current = entry.value.clone().unwrap_or(Value::Null);
                match plugin.fit(&current, &merged) {
                    Ok(fitted) => (fitted != current).then_some(fitted),
                    Err(reason) => {
                        return Err(StoreError::Sanitize {
                            path: path.to_owned(),
                            rejected: current.clone(),
                            previous: current,
                            reason,
                        });
                    }
                }
            }
            _ => None,
        };
        entry.settings = merged;
        fx.changes.record(path, Changes::SETTINGS);
        if let Some(fitted) = fitted {
            entry.value = Some(fitted.clone());
            fx.changes.record(path, channel);
            if !entry.meta.disabled {
                self.resolver.value_changed(id);
            }
            if let Some(callback) = self.callbacks.get(&id).and_then(|c| c.on_change.clone()) {
                fx.call(callback, path, fitted, false, false);
            }
        }
        tracing::trace!(path, "settings updated");
        Ok(())
    }

    pub(crate) fn write_folder_settings(
        &mut self,
        path: &str,
        settings: FolderSettings,
        force: bool,
        fx: &mut Effects,
    ) -> bool {
        let Some(id) = self.paths.lookup(path) else {
            return false;
        };
        let Some(folder) = self.folders.get_mut(&id) else {
            return false;
        };
        if folder.explicit && !force {
            return false;
        }
        folder.explicit = true;
        if folder.settings == settings {
            return true;
        }
        self.resolver.set_predicate(id, settings.render.clone());
        folder.settings = settings;
        self.visible_cache = None;
        fx.changes.record(path, Changes::SETTINGS);
        true
    }

    pub(crate) fn add_data(
        &mut self,
        cx: &Context<'_>,
        entries: &[(String, ResolvedEntry)],
        overwrite: bool,
        fx: &mut Effects,
    ) -> AddDataReport {
        let mut report = AddDataReport::default();
        for (path, resolved) in entries {
            let id = self.paths.intern(path);
            if self.entries.contains_key(&id) {
                if self.merge_existing(cx, id, path, resolved, overwrite, fx) {
                    report.claimed.push(path.clone());
                }
                continue;
            }
            if let Some(conflict) = self.structural_conflict(id, path, resolved) {
                fx.diagnostics.push(conflict);
                continue;
            }
            self.insert(cx, id, path, resolved, fx);
            report.claimed.push(path.clone());
            report.inserted.push(path.clone());
        }
        report
    }

    /// Takes a reference on an existing entry. Returns `false` on a type
    /// conflict.
    fn merge_existing(
        &mut self,
        cx: &Context<'_>,
        id: PathId,
        path: &str,
        resolved: &ResolvedEntry,
        overwrite: bool,
        fx: &mut Effects,
    ) -> bool {
        let channel = self.value_channel(id);
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        if entry.kind != resolved.kind {
            fx.diagnostics.push(Diagnostic::TypeConflict {
                path: path.to_owned(),
                existing: entry.kind.clone(),
                requested: resolved.kind.clone(),
            });
            return false;
        }
        entry.ref_count += 1;
        entry.action.clone_from(&resolved.action);
        if !overwrite || entry.same_metadata(resolved) {
            return true;
        }

        let disabled = entry.meta.disabled;
        entry.settings.clone_from(&resolved.settings);
        entry.meta.clone_from(&resolved.meta);
        entry.meta.disabled = disabled;
        if entry.render != resolved.render {
            entry.render.clone_from(&resolved.render);
            self.resolver.set_predicate(id, resolved.render.clone());
        }
        fx.changes.record(path, Changes::SETTINGS);
        self.visible_cache = None;

        if let (Some(current), Ok(plugin)) = (entry.value.clone(), input_plugin(cx.registry, entry)) {
            let next = plugin
                .fit(&current, &entry.settings)
                .unwrap_or_else(|_| resolved.value.clone().unwrap_or(Value::Null));
            if next != current {
                entry.value = Some(next);
                fx.changes.record(path, channel);
                if !entry.meta.disabled {
                    self.resolver.value_changed(id);
                }
            }
        }
        true
    }

    /// A path cannot be both a folder and an entry.
    fn structural_conflict(
        &self,
        id: PathId,
        path: &str,
        resolved: &ResolvedEntry,
    ) -> Option<Diagnostic> {
        if self.folders.contains_key(&id) {
            return Some(Diagnostic::TypeConflict {
                path: path.to_owned(),
                existing: EntryKind::Folder,
                requested: resolved.kind.clone(),
            });
        }
        ancestor_paths(path).find_map(|ancestor| {
            let entry = self.entry(ancestor)?;
            Some(Diagnostic::TypeConflict {
                path: ancestor.to_owned(),
                existing: entry.kind.clone(),
                requested: EntryKind::Folder,
            })
        })
    }

    fn insert(
        &mut self,
        cx: &Context<'_>,
        id: PathId,
        path: &str,
        resolved: &ResolvedEntry,
        fx: &mut Effects,
    ) {
        let ancestors: Vec<&str> = ancestor_paths(path).collect();
        for ancestor in ancestors.into_iter().rev() {
            let folder_id = self.paths.intern(ancestor);
            if let Some(folder) = self.folders.get_mut(&folder_id) {
                folder.descendants += 1;
                continue;
            }
            let seq = self.next_seq();
            let settings = cx.config.default_folder.clone();
            self.resolver.path_added(folder_id, settings.render.clone());
            self.folders.insert(
                folder_id,
                FolderEntry {
                    settings,
                    explicit: false,
                    seq,
                    descendants: 1,
                },
            );
            fx.changes.record(ancestor, Changes::STRUCTURE);
        }
        let seq = self.next_seq();
        self.entries
            .insert(id, Entry::from_resolved(path, resolved, seq));
        self.resolver.path_added(id, resolved.render.clone());
        self.visible_cache = None;
        fx.changes.record(path, Changes::STRUCTURE);
        tracing::debug!(path, kind = %resolved.kind, "entry registered");
    }

    pub(crate) fn remove_data<S: AsRef<str>>(&mut self, paths: &[S], fx: &mut Effects) -> Vec<String> {
        let mut removed = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let Some(id) = self.paths.lookup(path) else {
                continue;
            };
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            entry.ref_count = entry.ref_count.saturating_sub(1);
            if entry.ref_count > 0 {
                continue;
            }
            self.entries.remove(&id);
            self.callbacks.remove(&id);
            self.resolver.path_removed(id);
            self.visible_cache = None;
            fx.changes.record(path, Changes::STRUCTURE);
            tracing::debug!(path, "entry removed");
            self.prune_folders(path, fx);
            removed.push(path.to_owned());
        }
        removed
    }

    fn prune_folders(&mut self, path: &str, fx: &mut Effects) {
        for ancestor in ancestor_paths(path) {
            let Some(folder_id) = self.paths.lookup(ancestor) else {
                continue;
            };
            let Some(folder) = self.folders.get_mut(&folder_id) else {
                continue;
            };
            folder.descendants = folder.descendants.saturating_sub(1);
            if folder.descendants == 0 {
                self.folders.remove(&folder_id);
                self.resolver.path_removed(folder_id);
                fx.changes.record(ancestor, Changes::STRUCTURE);
                tracing::debug!(path = ancestor, "empty folder pruned");
            }
        }
    }

    /// Brings visibility results up to date and reports flips.
    fn settle(&mut self, fx: &mut Effects) {
        if !self.resolver.needs_refresh() {
            return;
        }
        let snapshot = Snapshot {
            paths: &self.paths,
            entries: &self.entries,
            folders: &self.folders,
        };
        let flipped = self
            .resolver
            .refresh(&self.paths, &snapshot, &mut fx.diagnostics);
        if flipped.is_empty() {
            return;
        }
        self.visible_cache = None;
        for id in flipped {
            let path = self.paths.path(id);
            if !self.contains(path) {
                continue;
            }
            fx.changes.record(path, Changes::VISIBILITY);
            if !self.folders.contains_key(&id) {
                continue;
            }
            let below = self
                .entries
                .values()
                .map(|e| e.path.as_str())
                .chain(self.folders.keys().map(|f| self.paths.path(*f)))
                .filter(|p| is_descendant(p, path));
            for descendant in below {
                fx.changes.record(descendant, Changes::VISIBILITY);
            }
        }
    }

    fn compute_visible(&self) -> Vec<String> {
        // (order, seq, path, is folder), grouped by parent path.
        let mut children: HashMap<&str, Vec<(i32, u64, &str, bool)>> = HashMap::new();
        for entry in self.entries.values() {
            children
                .entry(parent_path(&entry.path))
                .or_default()
                .push((entry.meta.order, entry.seq, entry.path.as_str(), false));
        }
        for (id, folder) in &self.folders {
            let path = self.paths.path(*id);
            children
                .entry(parent_path(path))
                .or_default()
                .push((folder.settings.order, folder.seq, path, true));
        }
        for list in children.values_mut() {
            list.sort_unstable_by_key(|&(order, seq, _, _)| (order, seq));
        }
        let mut out = Vec::new();
        self.collect_visible("", &children, &mut out);
        out
    }

    fn collect_visible(
        &self,
        parent: &str,
        children: &HashMap<&str, Vec<(i32, u64, &str, bool)>>,
        out: &mut Vec<String>,
    ) -> bool {
        let Some(list) = children.get(parent) else {
            return false;
        };
        let mut any = false;
        for &(_, _, path, is_folder) in list {
            let shown = self.paths.lookup(path).is_some_and(|id| self.resolver.own(id));
            if !shown {
                continue;
            }
            if is_folder {
                let mark = out.len();
                out.push(path.to_owned());
                if self.collect_visible(path, children, out) {
                    any = true;
                } else {
                    out.truncate(mark);
                }
            } else {
                out.push(path.to_owned());
                any = true;
            }
        }
        any
    }
}
