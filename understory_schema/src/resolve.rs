// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Schema tree flattening.
//!
//! [`resolve_schema`] walks a [`Schema`] depth-first and produces the flat,
//! declaration-ordered `path → entry` list the store consumes, the short-key
//! mapping used by hook handles, and every folder it passed through.

use hashbrown::HashMap;

use crate::error::SchemaDiagnostic;
use crate::normalize::{
    InputCallbacks, ResolvedEntry, button_entry, button_group_entry, monitor_entry,
    normalize_input,
};
use crate::registry::PluginRegistry;
use crate::schema::{FolderSettings, InputOptions, Schema, SchemaItem};

/// Where a short key points, plus the callbacks declared with it.
#[derive(Clone, Debug)]
pub struct MappedPath {
    /// Full path of the entry.
    pub path: String,
    /// Callbacks (empty for actions).
    pub callbacks: InputCallbacks,
}

/// The flattened result of a schema.
#[derive(Clone, Debug, Default)]
pub struct ResolvedSchema {
    /// Entries by full path, in declaration order.
    pub entries: Vec<(String, ResolvedEntry)>,
    /// Short key to path and callbacks, in declaration order.
    pub mapped_paths: Vec<(String, MappedPath)>,
    /// Every folder path visited, with its declared settings.
    pub folders: Vec<(String, FolderSettings)>,
    /// Problems found; the offending items were skipped.
    pub diagnostics: Vec<SchemaDiagnostic>,
}

impl ResolvedSchema {
    /// Returns the full path a short key maps to.
    #[must_use]
    pub fn path_of(&self, key: &str) -> Option<&str> {
        self.mapped_paths
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, mapped)| mapped.path.as_str())
    }

    /// Returns the entry at `path`.
    #[must_use]
    pub fn entry(&self, path: &str) -> Option<&ResolvedEntry> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, entry)| entry)
    }

    /// Iterates entry paths in declaration order.
    pub fn paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(p, _)| p.as_str())
    }
}

/// Joins a parent path and a key with `.`.
#[must_use]
pub fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_owned()
    } else {
        format!("{parent}.{key}")
    }
}

/// Returns the parent path of `path` (empty at the root).
#[must_use]
pub fn parent_path(path: &str) -> &str {
    path.rfind('.').map_or("", |i| &path[..i])
}

struct Walk<'a> {
    registry: &'a PluginRegistry,
    key_paths: HashMap<String, String>,
    out: ResolvedSchema,
}

impl Walk<'_> {
    fn folder(&mut self, schema: &Schema, prefix: &str) {
        for (key, item) in schema.iter() {
            if key.is_empty() {
                self.out.diagnostics.push(SchemaDiagnostic::EmptyKey {
                    parent: prefix.to_owned(),
                });
                continue;
            }
            let path = join_path(prefix, key);
            if let SchemaItem::Folder(folder) = item {
                if !self.out.folders.iter().any(|(p, _)| *p == path) {
                    self.out.folders.push((path.clone(), folder.settings.clone()));
                }
                self.folder(&folder.schema, &path);
                continue;
            }
            if let Some(existing) = self.key_paths.get(key) {
                self.out.diagnostics.push(SchemaDiagnostic::DuplicateKey {
                    key: key.to_owned(),
                    path,
                    existing: existing.clone(),
                });
                continue;
            }
            let resolved = match item {
                SchemaItem::Value(raw) => {
                    normalize_input(self.registry, &path, key, &InputOptions::from_json(raw.clone()))
                }
                SchemaItem::Input(options) => normalize_input(self.registry, &path, key, options),
                SchemaItem::Button(b) => Ok((button_entry(key, b), InputCallbacks::default())),
                SchemaItem::ButtonGroup(g) => {
                    Ok((button_group_entry(key, g), InputCallbacks::default()))
                }
                SchemaItem::Monitor(m) => Ok((monitor_entry(key, m), InputCallbacks::default())),
                SchemaItem::Folder(_) => continue,
            };
            match resolved {
                Ok((entry, callbacks)) => {
                    self.key_paths.insert(key.to_owned(), path.clone());
                    self.out.entries.push((path.clone(), entry));
                    self.out
                        .mapped_paths
                        .push((key.to_owned(), MappedPath { path, callbacks }));
                }
                Err(diagnostic) => self.out.diagnostics.push(diagnostic),
            }
        }
    }
}

/// Flattens `schema` under the optional `root` folder path.
///
/// Problems never abort the walk: empty keys, duplicate short keys (the
/// first declaration wins), unrecognized shapes and unfit initial values are
/// recorded in [`ResolvedSchema::diagnostics`] and the item is skipped.
///
/// ```rust
/// use serde_json::json;
/// use understory_schema::{PluginRegistry, Schema, folder, resolve_schema};
///
/// let registry = PluginRegistry::with_builtins();
/// let schema = Schema::new()
///     .with("a", json!(1))
///     .with("f", folder(Schema::new().with("b", json!(true))));
///
/// let resolved = resolve_schema(&registry, &schema, Some("panel"));
/// assert_eq!(resolved.paths().collect::<Vec<_>>(), ["panel.a", "panel.f.b"]);
/// assert_eq!(resolved.path_of("b"), Some("panel.f.b"));
/// assert!(resolved.diagnostics.is_empty());
/// ```
pub fn resolve_schema(
    registry: &PluginRegistry,
    schema: &Schema,
    root: Option<&str>,
) -> ResolvedSchema {
    let mut walk = Walk {
        registry,
        key_paths: HashMap::new(),
        out: ResolvedSchema::default(),
    };
    walk.folder(schema, root.unwrap_or(""));
    tracing::trace!(
        entries = walk.out.entries.len(),
        diagnostics = walk.out.diagnostics.len(),
        "resolved schema"
    );
    walk.out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_parent() {
        assert_eq!(join_path("", "a"), "a");
        assert_eq!(join_path("a.b", "c"), "a.b.c");
        assert_eq!(parent_path("a.b.c"), "a.b");
        assert_eq!(parent_path("a"), "");
    }
}
