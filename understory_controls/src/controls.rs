// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use serde_json::Map;
use understory_schema::{FolderSettings, Schema, Value};

use crate::changes::Changes;
use crate::error::ControlsError;
use crate::ownership::{Acquire, OwnerId};
use crate::store::Store;
use crate::subscribe::Subscription;

/// Options for [`use_controls`].
#[derive(Clone, Debug, Default)]
pub struct ControlsOptions {
    store: Option<Store>,
    folder_settings: Option<FolderSettings>,
    deps: Vec<Value>,
}

impl ControlsOptions {
    /// Default options: the thread's default store, no folder settings, no
    /// dependencies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers into `store` instead of the default store.
    #[must_use]
    pub fn store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    /// Settings for the registration's folder.
    #[must_use]
    pub fn folder_settings(mut self, settings: FolderSettings) -> Self {
        self.folder_settings = Some(settings);
        self
    }

    /// The dependency list. A handle only re-registers its schema when
    /// [`Controls::redeclare`] receives a different list.
    #[must_use]
    pub fn deps<I, V>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }
}

/// Registers `schema` (under `folder`, if given) and returns a handle to its
/// values. The registration lasts until the handle is dropped.
///
/// ```rust
/// use serde_json::json;
/// use understory_controls::{ControlsOptions, Store, use_controls};
/// use understory_schema::Schema;
///
/// let store = Store::new();
/// let schema = Schema::new().with("speed", json!(1.5)).with("on", json!(true));
/// let controls = use_controls(
///     Some("panel"),
///     &schema,
///     ControlsOptions::new().store(store.clone()),
/// );
///
/// assert_eq!(controls.values()["speed"], json!(1.5));
/// controls.set([("speed", json!(2))]).unwrap();
/// assert_eq!(store.value("panel.speed"), Some(json!(2)));
/// assert!(controls.get("nope").is_err());
///
/// drop(controls);
/// assert!(store.paths().is_empty());
/// ```
pub fn use_controls(folder: Option<&str>, schema: &Schema, options: ControlsOptions) -> Controls {
    let store = options.store.unwrap_or_else(Store::default_store);
    let owner = store.new_owner();
    let mut controls = Controls {
        store,
        owner,
        root: folder.filter(|f| !f.is_empty()).map(str::to_owned),
        folder_settings: options.folder_settings,
        keys: Vec::new(),
    };
    controls.declare(schema, &options.deps);
    controls
}

/// A live registration and its short-key view of the store.
#[derive(Debug)]
pub struct Controls {
    store: Store,
    owner: OwnerId,
    root: Option<String>,
    folder_settings: Option<FolderSettings>,
    /// Short key to full path, for claimed paths only.
    keys: Vec<(String, String)>,
}

impl Controls {
    fn declare(&mut self, schema: &Schema, deps: &[Value]) -> Acquire {
        let resolved = self.store.resolve_schema(schema, self.root.as_deref());
        let root = self.root.as_deref().zip(self.folder_settings.as_ref());
        let outcome = self.store.acquire(self.owner, deps, &resolved, root);
        if let Acquire::Registered { claimed, .. } = &outcome {
            self.keys = resolved
                .mapped_paths
                .iter()
                .filter(|(_, mapped)| claimed.contains(&mapped.path))
                .map(|(key, mapped)| (key.clone(), mapped.path.clone()))
                .collect();
        }
        outcome
    }

    /// Re-declares the schema, as on a re-render.
    ///
    /// With unchanged `deps` only callbacks are refreshed; otherwise the
    /// schema is registered again and the previous claim released.
    pub fn redeclare(&mut self, schema: &Schema, deps: &[Value]) -> Acquire {
        self.declare(schema, deps)
    }

    /// Values of the non-transient, enabled inputs, by short key.
    #[must_use]
    pub fn values(&self) -> Map<String, Value> {
        collect_values(&self.store, &self.keys)
    }

    /// The reader-visible value of a short key or full path.
    pub fn get(&self, key: &str) -> Result<Option<Value>, ControlsError> {
        let path = self.resolve_key(key)?;
        Ok(self.store.value(&path))
    }

    /// Writes values by short key or full path.
    ///
    /// Every key is resolved before anything is written, so an unknown key
    /// writes nothing.
    pub fn set<I, K, V>(&self, values: I) -> Result<(), ControlsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let writes = values
            .into_iter()
            .map(|(key, value)| Ok((self.resolve_key(key.as_ref())?, value.into())))
            .collect::<Result<Vec<(String, Value)>, ControlsError>>()?;
        self.store.set(writes, false)?;
        Ok(())
    }

    /// Calls `callback` with [`values`](Self::values) whenever they change.
    ///
    /// The subscription sees the keys declared when it was created.
    pub fn subscribe(&self, callback: impl Fn(&Map<String, Value>) + 'static) -> Subscription {
        let keys = self.keys.clone();
        self.store.subscribe(
            Changes::VALUES | Changes::DISABLED | Changes::STRUCTURE,
            move |store| collect_values(store, &keys),
            callback,
        )
    }

    /// Full path of a short key.
    #[must_use]
    pub fn path_of(&self, key: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, path)| path.as_str())
    }

    /// The store this handle registered into.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// This handle's owner identity.
    #[must_use]
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Ends the registration. Equivalent to dropping the handle.
    pub fn unmount(self) {
        drop(self);
    }

    fn resolve_key(&self, key: &str) -> Result<String, ControlsError> {
        if let Some(path) = self.path_of(key) {
            return Ok(path.to_owned());
        }
        if self.store.get(key).is_some() {
            return Ok(key.to_owned());
        }
        Err(ControlsError::UnknownKey(key.to_owned()))
    }
}

impl Drop for Controls {
    fn drop(&mut self) {
        self.store.release(self.owner);
    }
}

fn collect_values(store: &Store, keys: &[(String, String)]) -> Map<String, Value> {
    keys.iter()
        .filter(|(_, path)| !store.is_transient(path))
        .filter_map(|(key, path)| Some((key.clone(), store.value(path)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use understory_schema::input;

    #[test]
    fn transient_inputs_are_left_out() {
        let store = Store::new();
        let schema = Schema::new()
            .with("a", json!(1))
            .with("b", input(2).on_change(|_, _| {}))
            .with("c", input(3).on_change(|_, _| {}).transient(false));
        let controls = use_controls(None, &schema, ControlsOptions::new().store(store.clone()));
        let values = controls.values();
        assert_eq!(values.keys().collect::<Vec<_>>(), ["a", "c"]);
        assert_eq!(controls.get("b").unwrap(), Some(json!(2)));
    }

    #[test]
    fn unknown_keys_write_nothing() {
        let store = Store::new();
        let schema = Schema::new().with("a", json!(1));
        let controls = use_controls(None, &schema, ControlsOptions::new().store(store.clone()));
        let err = controls.set([("a", json!(5)), ("zz", json!(1))]).unwrap_err();
        assert_eq!(err, ControlsError::UnknownKey("zz".into()));
        assert_eq!(store.value("a"), Some(json!(1)));
    }

    #[test]
    fn full_paths_are_accepted() {
        let store = Store::new();
        let schema = Schema::new().with("a", json!(1));
        let controls = use_controls(Some("f"), &schema, ControlsOptions::new().store(store.clone()));
        assert_eq!(controls.path_of("a"), Some("f.a"));
        assert_eq!(controls.get("f.a").unwrap(), Some(json!(1)));
    }

    #[test]
    fn unmount_releases() {
        let store = Store::new();
        let controls = use_controls(
            None,
            &Schema::new().with("a", json!(1)),
            ControlsOptions::new().store(store.clone()),
        );
        assert!(store.is_registered(controls.owner()));
        let owner = controls.owner();
        controls.unmount();
        assert!(!store.is_registered(owner));
        assert_eq!(store.ref_count("a"), 0);
    }
}
