// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Schema: declarative control schemas for tweak panels.
//!
//! This crate turns a nested, heterogeneous schema of "controls" (numbers,
//! colors, vectors, selects, folders, buttons, …) into the flat, typed,
//! path-keyed entries a reactive store consumes. It knows nothing about
//! stores or rendering.
//!
//! ## Core Concepts
//!
//! ### Plugins
//!
//! Every value input is owned by a [`ControlPlugin`], identified by a
//! [`TypeTag`]. A plugin recognizes input shapes, completes settings with
//! defaults, validates candidate values and formats values for display. The
//! [`PluginRegistry`] holds plugins in inference order; the first plugin whose
//! matcher accepts an input owns it. Custom plugins are appended after the
//! built-ins.
//!
//! ### Schemas
//!
//! A [`Schema`] is an ordered list of keyed [`SchemaItem`]s: bare JSON values,
//! [`InputOptions`], nested [`Folder`]s, and the action items [`Button`],
//! [`ButtonGroup`] and [`Monitor`].
//!
//! ### Resolution
//!
//! [`resolve_schema`] flattens a schema into [`ResolvedEntry`] values keyed by
//! dot-separated paths. Malformed items never abort resolution: they are
//! skipped and reported as [`SchemaDiagnostic`]s.
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use understory_schema::{EntryKind, PluginRegistry, Schema, TypeTag, input, resolve_schema};
//!
//! let registry = PluginRegistry::with_builtins();
//! let schema = Schema::new()
//!     .with("radius", input(4).setting("min", 0).setting("max", 10))
//!     .with("fill", json!("#336699"))
//!     .with("", json!(1));
//!
//! let resolved = resolve_schema(&registry, &schema, None);
//!
//! let radius = resolved.entry("radius").unwrap();
//! assert_eq!(radius.kind, EntryKind::Input(TypeTag::NUMBER));
//! assert_eq!(radius.settings["max"], json!(10));
//!
//! let fill = resolved.entry("fill").unwrap();
//! assert_eq!(fill.kind, EntryKind::Input(TypeTag::COLOR));
//!
//! // The empty key was skipped with a diagnostic.
//! assert_eq!(resolved.diagnostics.len(), 1);
//! ```
//!
//! ## Built-in types
//!
//! | Tag | Recognized shape |
//! |-----|------------------|
//! | `select` | settings carry `options` |
//! | `image` | settings carry `image` |
//! | `number` | a JSON number |
//! | `color` | hex, `rgb()`/`rgba()` string, or `{r, g, b, a?}` |
//! | `string` | a string |
//! | `boolean` | a bool |
//! | `interval` | `[lo, hi]` with `min` and `max` settings |
//! | `vector3d` | `[x, y, z]` or `{x, y, z}` |
//! | `vector2d` | `[x, y]` or `{x, y}` |

mod builtin;
mod error;
mod kind;
mod normalize;
mod plugin;
mod registry;
mod resolve;
mod schema;
mod value;

pub use builtin::{
    BooleanPlugin, ColorPlugin, ImagePlugin, IntervalPlugin, NumberPlugin, SelectPlugin,
    StringPlugin, VectorPlugin, labelled_options,
};
pub use error::{SanitizeError, SchemaDiagnostic};
pub use kind::{EntryKind, TypeTag};
pub use normalize::{Action, EntryMeta, InputCallbacks, ResolvedEntry, normalize_input};
pub use plugin::{ControlPlugin, Normalized, RenderToken};
pub use registry::PluginRegistry;
pub use resolve::{MappedPath, ResolvedSchema, join_path, parent_path, resolve_schema};
pub use schema::{
    ActionCallback, Button, ButtonGroup, CallbackContext, Decoration, Folder, FolderSettings,
    InputCallback, InputOptions, Monitor, MonitorSource, RenderPredicate, Schema, SchemaItem,
    SnapshotAccess, button, button_group, folder, input, monitor,
};
pub use value::{
    Settings, Value, as_f64, decimals_of, number_array, number_value, parse_f64, round_to,
    setting_f64, setting_flag,
};
