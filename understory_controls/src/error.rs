// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use thiserror::Error;
use understory_schema::{EntryKind, SanitizeError, TypeTag, Value};

/// A store operation failed. The store is unchanged.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum StoreError {
    /// No entry is registered at the path.
    #[error("no entry at `{0}`")]
    UnknownPath(String),
    /// The operation needs a different kind of entry.
    #[error("`{path}` is a {kind}, not a {expected}")]
    WrongKind {
        /// The path.
        path: String,
        /// Its kind.
        kind: EntryKind,
        /// What the operation needs.
        expected: &'static str,
    },
    /// The plugin rejected a candidate value.
    ///
    /// Carries the rejected and the last committed value so a renderer can
    /// revert an optimistic display.
    #[error("rejected value for `{path}`: {reason}")]
    Sanitize {
        /// The path.
        path: String,
        /// The candidate value.
        rejected: Value,
        /// The value still committed.
        previous: Value,
        /// Why the plugin rejected it.
        reason: SanitizeError,
    },
    /// The entry's plugin is no longer registered.
    #[error("no plugin registered for `{tag}` (at `{path}`)")]
    MissingPlugin {
        /// The path.
        path: String,
        /// The entry's tag.
        tag: TypeTag,
    },
    /// A button group has no action with the label.
    #[error("`{path}` has no action labelled `{label}`")]
    UnknownAction {
        /// The button group path.
        path: String,
        /// The requested label.
        label: String,
    },
    /// The store was used from inside one of its own mutations, as when a
    /// render predicate calls the store handle it captured.
    #[error("`{0}` was used while the store is settling")]
    Settling(String),
}

/// A [`Controls`](crate::Controls) operation failed.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ControlsError {
    /// The key is neither a short key of this handle nor a stored path.
    #[error("unknown control key `{0}`")]
    UnknownKey(String),
    /// The underlying store rejected the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A [`StoreConfig`](crate::StoreConfig) could not be read.
#[derive(Debug, Error)]
#[error("invalid store configuration: {0}")]
pub struct ConfigError(#[from] serde_json::Error);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sanitize_errors_name_the_path() {
        let e = StoreError::Sanitize {
            path: "a.x".into(),
            rejected: json!(999),
            previous: json!(1),
            reason: SanitizeError::OutOfRange {
                value: 999.0,
                min: 0.0,
                max: 10.0,
            },
        };
        assert_eq!(
            e.to_string(),
            "rejected value for `a.x`: 999 is outside [0, 10]"
        );
    }

    #[test]
    fn store_errors_pass_through_controls() {
        let e = ControlsError::from(StoreError::UnknownPath("p".into()));
        assert_eq!(e.to_string(), "no entry at `p`");
    }
}
