// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The declarative schema model.
//!
//! A [`Schema`] is an ordered list of `key → item` pairs. Items are bare JSON
//! values (type inferred), [`InputOptions`] (explicit settings and
//! callbacks), nested [`Folder`]s, or the transient action items
//! ([`Button`], [`ButtonGroup`], [`Monitor`]).

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::kind::TypeTag;
use crate::value::{Settings, Value};

/// Read access to a store snapshot, handed to predicates and callbacks.
///
/// Paths are always full dot-separated paths.
pub trait SnapshotAccess {
    /// Returns the reader-visible value at `path` (`None` when absent or
    /// disabled).
    fn get(&self, path: &str) -> Option<Value>;

    /// Returns `true` if the entry at `path` is currently visible.
    fn is_visible(&self, path: &str) -> bool;
}

/// A deferred visibility rule.
///
/// Evaluated against a [`SnapshotAccess`]; the paths it reads become its
/// dependencies.
///
/// Read through the accessor only. Predicates run while the store is being
/// updated: a store handle captured by the closure reads as empty there, is
/// not tracked as a dependency, and must not be written to.
#[derive(Clone)]
pub struct RenderPredicate(Rc<dyn Fn(&dyn SnapshotAccess) -> bool>);

impl RenderPredicate {
    /// Wraps a predicate closure.
    pub fn new(predicate: impl Fn(&dyn SnapshotAccess) -> bool + 'static) -> Self {
        Self(Rc::new(predicate))
    }

    /// Runs the predicate.
    #[must_use]
    pub fn evaluate(&self, access: &dyn SnapshotAccess) -> bool {
        (self.0)(access)
    }
}

impl PartialEq for RenderPredicate {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for RenderPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderPredicate").finish_non_exhaustive()
    }
}

/// Context passed to input callbacks.
#[derive(Clone, Copy)]
pub struct CallbackContext<'a> {
    /// Full path of the input.
    pub path: &'a str,
    /// `true` for the call made when the path is first registered.
    pub initial: bool,
    /// `true` when the change came from panel interaction.
    pub from_panel: bool,
    /// Read access to the rest of the store.
    pub access: &'a dyn SnapshotAccess,
}

impl fmt::Debug for CallbackContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackContext")
            .field("path", &self.path)
            .field("initial", &self.initial)
            .field("from_panel", &self.from_panel)
            .finish_non_exhaustive()
    }
}

/// `onChange`, `onEditStart` and `onEditEnd` handlers.
pub type InputCallback = Rc<dyn Fn(&Value, &CallbackContext<'_>)>;

/// Button handlers.
pub type ActionCallback = Rc<dyn Fn(&dyn SnapshotAccess)>;

/// Produces the current value of a monitor.
pub type MonitorSource = Rc<dyn Fn() -> Value>;

/// Display metadata common to every item.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decoration {
    /// Display label; defaults to the key.
    pub label: Option<String>,
    /// Tooltip text.
    pub hint: Option<String>,
    /// Sibling sort order; ties keep declaration order.
    pub order: i32,
    /// Visibility rule; absent means always visible.
    pub render: Option<RenderPredicate>,
}

/// Display settings of a folder.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FolderSettings {
    /// Start collapsed.
    pub collapsed: bool,
    /// Accent color.
    pub color: Option<String>,
    /// Sibling sort order.
    pub order: i32,
    /// Visibility rule for the folder and everything below it.
    #[serde(skip)]
    pub render: Option<RenderPredicate>,
}

/// A value input with explicit options.
///
/// Keys that are not input metadata become plugin settings.
///
/// ```rust
/// use serde_json::json;
/// use understory_schema::input;
///
/// let speed = input(1.0)
///     .setting("min", json!(0))
///     .setting("max", json!(10))
///     .label("Speed")
///     .order(-1);
/// # let _ = speed;
/// ```
#[derive(Clone, Default)]
pub struct InputOptions {
    pub(crate) value: Value,
    pub(crate) type_tag: Option<TypeTag>,
    pub(crate) settings: Settings,
    pub(crate) decoration: Decoration,
    pub(crate) disabled: bool,
    pub(crate) optional: bool,
    pub(crate) transient: Option<bool>,
    pub(crate) on_change: Option<InputCallback>,
    pub(crate) on_edit_start: Option<InputCallback>,
    pub(crate) on_edit_end: Option<InputCallback>,
}

/// Shorthand for [`InputOptions::new`].
pub fn input(value: impl Into<Value>) -> InputOptions {
    InputOptions::new(value)
}

const META_KEYS: [&str; 7] = [
    "label",
    "hint",
    "order",
    "disabled",
    "optional",
    "type",
    "transient",
];

impl InputOptions {
    /// Creates options around an initial value.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Reads a JSON schema entry.
    ///
    /// An object with a `value` key (or an `image` or `options` key) is an
    /// options object: `label`, `hint`, `order`, `disabled`, `optional`,
    /// `type` and `transient` become metadata, every other key a setting.
    /// Anything else is a bare value.
    #[must_use]
    pub fn from_json(raw: Value) -> Self {
        let map = match raw {
            Value::Object(map)
                if ["value", "image", "options"]
                    .iter()
                    .any(|k| map.contains_key(*k)) =>
            {
                map
            }
            bare => return Self::new(bare),
        };
        let mut options = Self::default();
        for (key, value) in map {
            if !META_KEYS.contains(&key.as_str()) {
                if key == "value" {
                    options.value = value;
                } else {
                    options.settings.insert(key, value);
                }
                continue;
            }
            match (key.as_str(), value) {
                ("label", Value::String(s)) => options.decoration.label = Some(s),
                ("hint", Value::String(s)) => options.decoration.hint = Some(s),
                ("order", Value::Number(n)) => {
                    options.decoration.order = n
                        .as_i64()
                        .and_then(|o| i32::try_from(o).ok())
                        .unwrap_or_default();
                }
                ("disabled", Value::Bool(b)) => options.disabled = b,
                ("optional", Value::Bool(b)) => options.optional = b,
                ("type", Value::String(s)) => options.type_tag = Some(TypeTag::new(s)),
                ("transient", Value::Bool(b)) => options.transient = Some(b),
                (key, value) => {
                    tracing::debug!(key, %value, "ignoring malformed input metadata");
                }
            }
        }
        options
    }

    /// Bypasses type inference.
    #[must_use]
    pub fn with_type(mut self, tag: impl Into<TypeTag>) -> Self {
        self.type_tag = Some(tag.into());
        self
    }

    /// Adds one plugin setting.
    #[must_use]
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Merges plugin settings.
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings.extend(settings);
        self
    }

    /// Sets the display label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.decoration.label = Some(label.into());
        self
    }

    /// Sets the tooltip text.
    #[must_use]
    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.decoration.hint = Some(hint.into());
        self
    }

    /// Sets the sibling sort order.
    #[must_use]
    pub fn order(mut self, order: i32) -> Self {
        self.decoration.order = order;
        self
    }

    /// Starts disabled.
    #[must_use]
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Marks the input as optional (the renderer offers a toggle).
    #[must_use]
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Shows the input only while `predicate` holds.
    ///
    /// See [`RenderPredicate`] for what the predicate may read.
    #[must_use]
    pub fn render(mut self, predicate: impl Fn(&dyn SnapshotAccess) -> bool + 'static) -> Self {
        self.decoration.render = Some(RenderPredicate::new(predicate));
        self
    }

    /// Called after every committed change, and once on first registration.
    #[must_use]
    pub fn on_change(mut self, f: impl Fn(&Value, &CallbackContext<'_>) + 'static) -> Self {
        self.on_change = Some(Rc::new(f));
        self
    }

    /// Called when an interactive edit starts.
    #[must_use]
    pub fn on_edit_start(mut self, f: impl Fn(&Value, &CallbackContext<'_>) + 'static) -> Self {
        self.on_edit_start = Some(Rc::new(f));
        self
    }

    /// Called when an interactive edit ends.
    #[must_use]
    pub fn on_edit_end(mut self, f: impl Fn(&Value, &CallbackContext<'_>) + 'static) -> Self {
        self.on_edit_end = Some(Rc::new(f));
        self
    }

    /// Whether the value is left out of hook results.
    ///
    /// Defaults to `true` when an `on_change` handler is set.
    #[must_use]
    pub fn transient(mut self, transient: bool) -> Self {
        self.transient = Some(transient);
        self
    }
}

impl fmt::Debug for InputOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputOptions")
            .field("value", &self.value)
            .field("type_tag", &self.type_tag)
            .field("settings", &self.settings)
            .field("decoration", &self.decoration)
            .field("disabled", &self.disabled)
            .field("optional", &self.optional)
            .field("transient", &self.transient)
            .field("on_change", &self.on_change.is_some())
            .finish_non_exhaustive()
    }
}

/// A nested group of items.
#[derive(Clone, Debug, Default)]
pub struct Folder {
    pub(crate) schema: Schema,
    pub(crate) settings: FolderSettings,
}

/// Shorthand for a [`Folder`] around `schema`.
pub fn folder(schema: Schema) -> Folder {
    Folder {
        schema,
        settings: FolderSettings::default(),
    }
}

impl Folder {
    /// Replaces the display settings.
    #[must_use]
    pub fn with_settings(mut self, settings: FolderSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Starts collapsed.
    #[must_use]
    pub fn collapsed(mut self, collapsed: bool) -> Self {
        self.settings.collapsed = collapsed;
        self
    }

    /// Sets the sibling sort order.
    #[must_use]
    pub fn order(mut self, order: i32) -> Self {
        self.settings.order = order;
        self
    }

    /// Hides the folder and its contents while `predicate` is false.
    ///
    /// See [`RenderPredicate`] for what the predicate may read.
    #[must_use]
    pub fn render(mut self, predicate: impl Fn(&dyn SnapshotAccess) -> bool + 'static) -> Self {
        self.settings.render = Some(RenderPredicate::new(predicate));
        self
    }
}

/// A single action.
#[derive(Clone)]
pub struct Button {
    pub(crate) on_click: ActionCallback,
    pub(crate) decoration: Decoration,
    pub(crate) disabled: bool,
}

/// Shorthand for a [`Button`].
pub fn button(on_click: impl Fn(&dyn SnapshotAccess) + 'static) -> Button {
    Button {
        on_click: Rc::new(on_click),
        decoration: Decoration::default(),
        disabled: false,
    }
}

impl Button {
    /// Sets the display label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.decoration.label = Some(label.into());
        self
    }

    /// Sets the sibling sort order.
    #[must_use]
    pub fn order(mut self, order: i32) -> Self {
        self.decoration.order = order;
        self
    }

    /// Greys the button out.
    #[must_use]
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Shows the button only while `predicate` holds.
    ///
    /// See [`RenderPredicate`] for what the predicate may read.
    #[must_use]
    pub fn render(mut self, predicate: impl Fn(&dyn SnapshotAccess) -> bool + 'static) -> Self {
        self.decoration.render = Some(RenderPredicate::new(predicate));
        self
    }
}

impl fmt::Debug for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Button")
            .field("decoration", &self.decoration)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

/// A row of labelled actions.
#[derive(Clone, Default)]
pub struct ButtonGroup {
    pub(crate) actions: Vec<(String, ActionCallback)>,
    pub(crate) decoration: Decoration,
}

/// Shorthand for an empty [`ButtonGroup`].
pub fn button_group() -> ButtonGroup {
    ButtonGroup::default()
}

impl ButtonGroup {
    /// Appends an action.
    #[must_use]
    pub fn action(
        mut self,
        label: impl Into<String>,
        on_click: impl Fn(&dyn SnapshotAccess) + 'static,
    ) -> Self {
        let on_click: ActionCallback = Rc::new(on_click);
        self.actions.push((label.into(), on_click));
        self
    }

    /// Sets the display label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.decoration.label = Some(label.into());
        self
    }

    /// Sets the sibling sort order.
    #[must_use]
    pub fn order(mut self, order: i32) -> Self {
        self.decoration.order = order;
        self
    }
}

impl fmt::Debug for ButtonGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.actions.iter().map(|(l, _)| l.as_str()).collect();
        f.debug_struct("ButtonGroup")
            .field("actions", &labels)
            .field("decoration", &self.decoration)
            .finish()
    }
}

/// A read-only view onto an externally computed value.
#[derive(Clone)]
pub struct Monitor {
    pub(crate) source: MonitorSource,
    pub(crate) graph: bool,
    pub(crate) interval_ms: u64,
    pub(crate) decoration: Decoration,
}

/// Shorthand for a [`Monitor`] polling `source`.
pub fn monitor(source: impl Fn() -> Value + 'static) -> Monitor {
    Monitor {
        source: Rc::new(source),
        graph: false,
        interval_ms: 30,
        decoration: Decoration::default(),
    }
}

impl Monitor {
    /// Plots the values instead of printing them.
    #[must_use]
    pub fn graph(mut self, graph: bool) -> Self {
        self.graph = graph;
        self
    }

    /// Polling interval hint for the renderer.
    #[must_use]
    pub fn interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Sets the display label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.decoration.label = Some(label.into());
        self
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("graph", &self.graph)
            .field("interval_ms", &self.interval_ms)
            .field("decoration", &self.decoration)
            .finish_non_exhaustive()
    }
}

/// One schema item.
#[derive(Clone, Debug)]
pub enum SchemaItem {
    /// A bare value or a JSON options object.
    Value(Value),
    /// An input with explicit options.
    Input(InputOptions),
    /// A nested folder.
    Folder(Folder),
    /// An action button.
    Button(Button),
    /// A row of actions.
    ButtonGroup(ButtonGroup),
    /// A read-only monitor.
    Monitor(Monitor),
}

impl From<Value> for SchemaItem {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<InputOptions> for SchemaItem {
    fn from(options: InputOptions) -> Self {
        Self::Input(options)
    }
}

impl From<Folder> for SchemaItem {
    fn from(folder: Folder) -> Self {
        Self::Folder(folder)
    }
}

impl From<Button> for SchemaItem {
    fn from(button: Button) -> Self {
        Self::Button(button)
    }
}

impl From<ButtonGroup> for SchemaItem {
    fn from(group: ButtonGroup) -> Self {
        Self::ButtonGroup(group)
    }
}

impl From<Monitor> for SchemaItem {
    fn from(monitor: Monitor) -> Self {
        Self::Monitor(monitor)
    }
}

/// An ordered list of schema items.
///
/// ```rust
/// use serde_json::json;
/// use understory_schema::{Schema, folder, input};
///
/// let schema = Schema::new()
///     .with("speed", json!(1))
///     .with("tint", json!("#ff0000"))
///     .with("advanced", folder(Schema::new().with("damping", input(0.5).order(1))));
/// assert_eq!(schema.len(), 3);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Schema {
    items: Vec<(String, SchemaItem)>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a JSON object; each member becomes a [`SchemaItem::Value`].
    ///
    /// Returns `None` if `raw` is not an object.
    #[must_use]
    pub fn from_json(raw: Value) -> Option<Self> {
        match raw {
            Value::Object(map) => Some(map.into_iter().collect()),
            _ => None,
        }
    }

    /// Appends an item.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, item: impl Into<SchemaItem>) -> Self {
        self.push(key, item);
        self
    }

    /// Appends an item in place.
    pub fn push(&mut self, key: impl Into<String>, item: impl Into<SchemaItem>) {
        self.items.push((key.into(), item.into()));
    }

    /// Returns the number of top-level items.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the schema has no items.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates items in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaItem)> + '_ {
        self.items.iter().map(|(k, item)| (k.as_str(), item))
    }
}

impl<K: Into<String>, I: Into<SchemaItem>> FromIterator<(K, I)> for Schema {
    fn from_iter<T: IntoIterator<Item = (K, I)>>(iter: T) -> Self {
        Self {
            items: iter
                .into_iter()
                .map(|(k, item)| (k.into(), item.into()))
                .collect(),
        }
    }
}
