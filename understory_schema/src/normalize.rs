// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-item normalization into store-ready entries.

use std::fmt;

use crate::error::SchemaDiagnostic;
use crate::kind::EntryKind;
use crate::registry::PluginRegistry;
use crate::schema::{
    ActionCallback, Button, ButtonGroup, Decoration, InputCallback, InputOptions, Monitor,
    MonitorSource, RenderPredicate,
};
use crate::value::{Settings, Value};

/// Display metadata of a resolved entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntryMeta {
    /// Display label.
    pub label: String,
    /// Tooltip text.
    pub hint: Option<String>,
    /// Sibling sort order.
    pub order: i32,
    /// Initial disabled state.
    pub disabled: bool,
    /// Whether the renderer offers an enable toggle.
    pub optional: bool,
}

/// The behavior behind an action entry.
#[derive(Clone)]
pub enum Action {
    /// A single button.
    Button(ActionCallback),
    /// Labelled buttons.
    ButtonGroup(Vec<(String, ActionCallback)>),
    /// A monitor source.
    Monitor(MonitorSource),
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Button(_) => f.write_str("Button"),
            Self::ButtonGroup(actions) => f
                .debug_tuple("ButtonGroup")
                .field(&actions.iter().map(|(l, _)| l.as_str()).collect::<Vec<_>>())
                .finish(),
            Self::Monitor(_) => f.write_str("Monitor"),
        }
    }
}

/// A normalized schema leaf, ready to be stored.
#[derive(Clone, Debug)]
pub struct ResolvedEntry {
    /// Control kind.
    pub kind: EntryKind,
    /// Normalized initial value; `None` for actions.
    pub value: Option<Value>,
    /// Completed plugin settings.
    pub settings: Settings,
    /// Display metadata.
    pub meta: EntryMeta,
    /// Visibility rule.
    pub render: Option<RenderPredicate>,
    /// Action behavior, for buttons and monitors.
    pub action: Option<Action>,
}

impl ResolvedEntry {
    /// Returns `true` if `other` declares the same kind, settings and display
    /// metadata. Values and callbacks are not compared.
    #[must_use]
    pub fn same_metadata(&self, other: &Self) -> bool {
        self.kind == other.kind && self.settings == other.settings && self.meta == other.meta
    }
}

/// Callbacks extracted from an input declaration.
#[derive(Clone, Default)]
pub struct InputCallbacks {
    /// Change handler.
    pub on_change: Option<InputCallback>,
    /// Edit-start handler.
    pub on_edit_start: Option<InputCallback>,
    /// Edit-end handler.
    pub on_edit_end: Option<InputCallback>,
    /// Whether the value is left out of hook results.
    pub transient: bool,
}

impl InputCallbacks {
    /// Returns `true` if no handler is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.on_change.is_none() && self.on_edit_start.is_none() && self.on_edit_end.is_none()
    }
}

impl fmt::Debug for InputCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputCallbacks")
            .field("on_change", &self.on_change.is_some())
            .field("on_edit_start", &self.on_edit_start.is_some())
            .field("on_edit_end", &self.on_edit_end.is_some())
            .field("transient", &self.transient)
            .finish()
    }
}

/// Normalizes one input declared under `key` at `path`.
///
/// An explicit type must name a registered plugin; otherwise the registry
/// infers one. The initial value is fitted into the completed settings.
pub fn normalize_input(
    registry: &PluginRegistry,
    path: &str,
    key: &str,
    options: &InputOptions,
) -> Result<(ResolvedEntry, InputCallbacks), SchemaDiagnostic> {
    let plugin = match &options.type_tag {
        Some(tag) => registry
            .get(tag)
            .ok_or_else(|| SchemaDiagnostic::UnknownType {
                path: path.to_owned(),
                tag: tag.to_string(),
            })?,
        None => registry
            .infer(&options.value, &options.settings)
            .ok_or_else(|| SchemaDiagnostic::UnrecognizedInput {
                path: path.to_owned(),
                value: options.value.clone(),
            })?,
    };
    let normalized = plugin.normalize(options.value.clone(), options.settings.clone());
    let value = plugin
        .fit(&normalized.value, &normalized.settings)
        .map_err(|reason| SchemaDiagnostic::InvalidInitialValue {
            path: path.to_owned(),
            reason,
        })?;

    let decoration = &options.decoration;
    let entry = ResolvedEntry {
        kind: EntryKind::Input(plugin.type_tag()),
        value: Some(value),
        settings: normalized.settings,
        meta: EntryMeta {
            label: decoration.label.clone().unwrap_or_else(|| key.to_owned()),
            hint: decoration.hint.clone(),
            order: decoration.order,
            disabled: options.disabled,
            optional: options.optional,
        },
        render: decoration.render.clone(),
        action: None,
    };
    let callbacks = InputCallbacks {
        on_change: options.on_change.clone(),
        on_edit_start: options.on_edit_start.clone(),
        on_edit_end: options.on_edit_end.clone(),
        transient: options.transient.unwrap_or(options.on_change.is_some()),
    };
    Ok((entry, callbacks))
}

fn action_entry(
    kind: EntryKind,
    key: &str,
    decoration: &Decoration,
    settings: Settings,
    disabled: bool,
    action: Action,
) -> ResolvedEntry {
    ResolvedEntry {
        kind,
        value: None,
        settings,
        meta: EntryMeta {
            label: decoration.label.clone().unwrap_or_else(|| key.to_owned()),
            hint: decoration.hint.clone(),
            order: decoration.order,
            disabled,
            optional: false,
        },
        render: decoration.render.clone(),
        action: Some(action),
    }
}

pub(crate) fn button_entry(key: &str, button: &Button) -> ResolvedEntry {
    action_entry(
        EntryKind::Button,
        key,
        &button.decoration,
        Settings::new(),
        button.disabled,
        Action::Button(button.on_click.clone()),
    )
}

pub(crate) fn button_group_entry(key: &str, group: &ButtonGroup) -> ResolvedEntry {
    let mut settings = Settings::new();
    settings.insert(
        "actions".into(),
        Value::Array(
            group
                .actions
                .iter()
                .map(|(label, _)| Value::String(label.clone()))
                .collect(),
        ),
    );
    action_entry(
        EntryKind::ButtonGroup,
        key,
        &group.decoration,
        settings,
        false,
        Action::ButtonGroup(group.actions.clone()),
    )
}

pub(crate) fn monitor_entry(key: &str, monitor: &Monitor) -> ResolvedEntry {
    let mut settings = Settings::new();
    settings.insert("graph".into(), Value::Bool(monitor.graph));
    settings.insert("interval".into(), Value::from(monitor.interval_ms));
    action_entry(
        EntryKind::Monitor,
        key,
        &monitor.decoration,
        settings,
        false,
        Action::Monitor(monitor.source.clone()),
    )
}
