// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Control kind identification.
//!
//! [`TypeTag`] names the plugin that owns a value input; [`EntryKind`] adds
//! the structural markers (folders, buttons, monitors) that never hold a
//! persisted value.

use std::borrow::Cow;
use std::fmt;

/// Identifies the plugin owning a value input (`number`, `color`, custom tags, …).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(Cow<'static, str>);

impl TypeTag {
    /// Built-in select (enumeration) input.
    pub const SELECT: Self = Self::from_static("select");
    /// Built-in image input.
    pub const IMAGE: Self = Self::from_static("image");
    /// Built-in number input.
    pub const NUMBER: Self = Self::from_static("number");
    /// Built-in color input.
    pub const COLOR: Self = Self::from_static("color");
    /// Built-in string input.
    pub const STRING: Self = Self::from_static("string");
    /// Built-in boolean input.
    pub const BOOLEAN: Self = Self::from_static("boolean");
    /// Built-in interval (`[lo, hi]` inside `[min, max]`) input.
    pub const INTERVAL: Self = Self::from_static("interval");
    /// Built-in three-component vector input.
    pub const VECTOR3D: Self = Self::from_static("vector3d");
    /// Built-in two-component vector input.
    pub const VECTOR2D: Self = Self::from_static("vector2d");

    /// Creates a tag from a static string.
    #[must_use]
    pub const fn from_static(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    /// Creates a tag from an owned or borrowed string.
    #[must_use]
    pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeTag").field(&self.as_str()).finish()
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&'static str> for TypeTag {
    fn from(tag: &'static str) -> Self {
        Self::from_static(tag)
    }
}

/// The kind of a stored entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A value input owned by the plugin with this tag.
    Input(TypeTag),
    /// A single action button.
    Button,
    /// A row of labelled action buttons.
    ButtonGroup,
    /// A read-only view onto an externally computed value.
    Monitor,
    /// A namespace node grouping the paths below it.
    Folder,
}

impl EntryKind {
    /// Returns the tag used in diagnostics and by renderers.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Input(tag) => tag.as_str(),
            Self::Button => "button",
            Self::ButtonGroup => "buttonGroup",
            Self::Monitor => "monitor",
            Self::Folder => "folder",
        }
    }

    /// Returns `true` for value inputs.
    #[must_use]
    #[inline]
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input(_))
    }

    /// Returns the plugin tag for value inputs.
    #[must_use]
    pub fn type_tag(&self) -> Option<&TypeTag> {
        match self {
            Self::Input(tag) => Some(tag),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
