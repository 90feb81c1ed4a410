// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The control plugin contract.
//!
//! A plugin owns one value type. The core only uses the matching, normalizing,
//! sanitizing, fitting and formatting capabilities; the [`RenderToken`] is
//! carried through untouched for the renderer.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::SanitizeError;
use crate::kind::TypeTag;
use crate::value::{Settings, Value};

/// A value together with its completed settings.
#[derive(Clone, Debug, PartialEq)]
pub struct Normalized {
    /// The normalized initial value.
    pub value: Value,
    /// Plugin defaults merged with the user settings.
    pub settings: Settings,
}

/// An opaque handle the renderer associates with a plugin (a widget
/// constructor, a component id, …). The core never inspects it.
#[derive(Clone)]
pub struct RenderToken(Arc<dyn Any + Send + Sync>);

impl RenderToken {
    /// Wraps a renderer-defined value.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(token: T) -> Self {
        Self(Arc::new(token))
    }

    /// Downcasts to the renderer-defined value.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for RenderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderToken").finish_non_exhaustive()
    }
}

/// A control type.
///
/// Plugins are consulted in registration order; the first whose
/// [`matches`](Self::matches) accepts an input owns it.
///
/// # Example
///
/// ```rust
/// use understory_schema::{
///     ControlPlugin, Normalized, PluginRegistry, SanitizeError, Settings, TypeTag, Value,
/// };
///
/// #[derive(Debug)]
/// struct Percent;
///
/// impl ControlPlugin for Percent {
///     fn type_tag(&self) -> TypeTag {
///         TypeTag::from_static("percent")
///     }
///
///     fn matches(&self, _value: &Value, settings: &Settings) -> bool {
///         settings.contains_key("percent")
///     }
///
///     fn normalize(&self, value: Value, mut settings: Settings) -> Normalized {
///         settings.remove("percent");
///         Normalized { value, settings }
///     }
///
///     fn sanitize(
///         &self,
///         value: &Value,
///         _settings: &Settings,
///         _previous: Option<&Value>,
///     ) -> Result<Value, SanitizeError> {
///         match value.as_f64() {
///             Some(v) if (0.0..=100.0).contains(&v) => Ok(value.clone()),
///             _ => Err(SanitizeError::invalid("expected a percentage")),
///         }
///     }
///
///     fn format(&self, value: &Value, _settings: &Settings) -> String {
///         format!("{value}%")
///     }
/// }
///
/// let mut registry = PluginRegistry::with_builtins();
/// registry.register(Percent);
/// assert!(registry.get(&TypeTag::from_static("percent")).is_some());
/// ```
pub trait ControlPlugin: fmt::Debug + Send + Sync {
    /// The tag stored on entries owned by this plugin.
    fn type_tag(&self) -> TypeTag;

    /// Returns `true` if this plugin recognizes the input shape.
    fn matches(&self, value: &Value, settings: &Settings) -> bool;

    /// Completes the settings with defaults and brings the initial value into
    /// its canonical shape.
    fn normalize(&self, value: Value, settings: Settings) -> Normalized;

    /// Validates a candidate value against `settings`.
    ///
    /// `previous` is the committed value, if any, for plugins whose result
    /// depends on it (for example locked vector ratios).
    fn sanitize(
        &self,
        value: &Value,
        settings: &Settings,
        previous: Option<&Value>,
    ) -> Result<Value, SanitizeError>;

    /// Produces the display representation of a value.
    fn format(&self, value: &Value, settings: &Settings) -> String;

    /// Brings an already committed value inside new settings.
    ///
    /// Used when settings change under a live value and for initial values.
    /// Defaults to [`sanitize`](Self::sanitize).
    fn fit(&self, value: &Value, settings: &Settings) -> Result<Value, SanitizeError> {
        self.sanitize(value, settings, None)
    }

    /// Renderer handle for this plugin.
    fn render_token(&self) -> Option<RenderToken> {
        None
    }
}
