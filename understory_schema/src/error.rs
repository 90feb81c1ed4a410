// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sanitization failures and schema diagnostics.

use serde_json::Value;
use thiserror::Error;

/// A candidate value violates the constraints of its control type.
///
/// Returned by [`ControlPlugin::sanitize`](crate::ControlPlugin::sanitize).
/// The store pairs it with the rejected and last-good values so a renderer can
/// revert an optimistic display.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SanitizeError {
    /// The value does not have the shape the control expects.
    #[error("expected {expected}")]
    WrongShape {
        /// Human-readable description of the accepted shape.
        expected: &'static str,
    },
    /// A numeric value (or component) lies outside its bounds.
    #[error("{value} is outside [{min}, {max}]")]
    OutOfRange {
        /// The offending number.
        value: f64,
        /// Lower bound (`-inf` when unbounded).
        min: f64,
        /// Upper bound (`inf` when unbounded).
        max: f64,
    },
    /// A select value is not one of the declared options.
    #[error("value is not one of the declared options")]
    NotAnOption,
    /// Plugin-specific rejection.
    #[error("{0}")]
    Invalid(String),
}

impl SanitizeError {
    /// Shorthand for [`SanitizeError::WrongShape`].
    #[must_use]
    pub fn wrong_shape(expected: &'static str) -> Self {
        Self::WrongShape { expected }
    }

    /// Shorthand for [`SanitizeError::Invalid`].
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// A non-fatal problem found while resolving a schema.
///
/// The offending entry is skipped; the rest of the schema proceeds.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SchemaDiagnostic {
    /// A schema key was the empty string.
    #[error("empty key under `{parent}`; the entry was skipped")]
    EmptyKey {
        /// Path of the enclosing folder (empty at the root).
        parent: String,
    },
    /// A short key was already mapped from a different path.
    #[error("duplicate key `{key}` at `{path}`; `{existing}` already uses it")]
    DuplicateKey {
        /// The short key.
        key: String,
        /// The dropped path.
        path: String,
        /// The path that keeps the key.
        existing: String,
    },
    /// No registered plugin recognizes the input shape.
    #[error("unrecognized input at `{path}`: {value}")]
    UnrecognizedInput {
        /// Path of the input.
        path: String,
        /// The raw value.
        value: Value,
    },
    /// An explicit `type` names no registered plugin.
    #[error("unknown input type `{tag}` at `{path}`")]
    UnknownType {
        /// Path of the input.
        path: String,
        /// The requested tag.
        tag: String,
    },
    /// The initial value cannot be brought inside the declared settings.
    #[error("initial value of `{path}` rejected: {reason}")]
    InvalidInitialValue {
        /// Path of the input.
        path: String,
        /// Why the plugin rejected it.
        reason: SanitizeError,
    },
}

impl SchemaDiagnostic {
    /// Returns the path (or parent path) the diagnostic refers to.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::EmptyKey { parent } => parent,
            Self::DuplicateKey { path, .. }
            | Self::UnrecognizedInput { path, .. }
            | Self::UnknownType { path, .. }
            | Self::InvalidInitialValue { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_name_the_path() {
        let d = SchemaDiagnostic::DuplicateKey {
            key: "x".into(),
            path: "b.x".into(),
            existing: "a.x".into(),
        };
        assert_eq!(d.to_string(), "duplicate key `x` at `b.x`; `a.x` already uses it");
        assert_eq!(d.path(), "b.x");

        let d = SchemaDiagnostic::UnrecognizedInput {
            path: "n".into(),
            value: json!(null),
        };
        assert_eq!(d.to_string(), "unrecognized input at `n`: null");
    }

    #[test]
    fn out_of_range_message() {
        let e = SanitizeError::OutOfRange {
            value: 999.0,
            min: 0.0,
            max: 10.0,
        };
        assert_eq!(e.to_string(), "999 is outside [0, 10]");
    }
}
