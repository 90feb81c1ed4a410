// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ordered plugin registry.
//!
//! This module provides [`PluginRegistry`], the table the normalizer consults
//! to infer the type of an input.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::builtin;
use crate::kind::TypeTag;
use crate::plugin::ControlPlugin;
use crate::value::{Settings, Value};

/// An ordered table of control plugins keyed by type tag.
///
/// Inference walks the plugins in registration order and the first match wins.
/// Registering a plugin under an existing tag replaces it in place, keeping
/// its position in the inference order.
///
/// Cloning is cheap: plugins are shared.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use understory_schema::{PluginRegistry, Settings, TypeTag};
///
/// let registry = PluginRegistry::with_builtins();
///
/// let mut settings = Settings::new();
/// settings.insert("min".into(), json!(0));
/// settings.insert("max".into(), json!(10));
///
/// // A pair of numbers with bounds is an interval, not a 2D vector.
/// let plugin = registry.infer(&json!([2, 4]), &settings).unwrap();
/// assert_eq!(plugin.type_tag(), TypeTag::INTERVAL);
///
/// let plugin = registry.infer(&json!({ "x": 1, "y": 2 }), &Settings::new()).unwrap();
/// assert_eq!(plugin.type_tag(), TypeTag::VECTOR2D);
/// ```
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn ControlPlugin>>,
    by_tag: HashMap<TypeTag, usize>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in plugins in inference order:
    /// select, image, number, color, string, boolean, interval, vector3d,
    /// vector2d.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for plugin in builtin::all() {
            registry.register_shared(plugin);
        }
        registry
    }

    /// Appends a plugin (or replaces the one with the same tag).
    pub fn register<P: ControlPlugin + 'static>(&mut self, plugin: P) {
        self.register_shared(Arc::new(plugin));
    }

    /// Appends a shared plugin (or replaces the one with the same tag).
    pub fn register_shared(&mut self, plugin: Arc<dyn ControlPlugin>) {
        let tag = plugin.type_tag();
        if let Some(&index) = self.by_tag.get(&tag) {
            tracing::debug!(%tag, "replacing control plugin");
            self.plugins[index] = plugin;
        } else {
            self.by_tag.insert(tag, self.plugins.len());
            self.plugins.push(plugin);
        }
    }

    /// Returns the number of registered plugins.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns `true` if no plugins are registered.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Looks up a plugin by tag.
    #[must_use]
    pub fn get(&self, tag: &TypeTag) -> Option<&Arc<dyn ControlPlugin>> {
        self.by_tag.get(tag).map(|&index| &self.plugins[index])
    }

    /// Returns the first plugin recognizing the input shape.
    #[must_use]
    pub fn infer(&self, value: &Value, settings: &Settings) -> Option<&Arc<dyn ControlPlugin>> {
        self.plugins.iter().find(|p| p.matches(value, settings))
    }

    /// Returns the tags in inference order.
    pub fn tags(&self) -> impl Iterator<Item = TypeTag> + '_ {
        self.plugins.iter().map(|p| p.type_tag())
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("tags", &self.tags().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
