// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Registration lifetimes and reference counting.
//!
//! An owner registers a resolved schema with [`Store::acquire`] and gives it
//! back with [`Store::release`]. Every path the registration claims holds one
//! reference; a path leaves the store when its last reference is released.
//! Re-acquiring with equal dependencies only refreshes callbacks.

use std::mem;

use understory_schema::{FolderSettings, ResolvedSchema, Value};

use crate::diagnostic::Diagnostic;
use crate::path::is_descendant;
use crate::store::{Store, StoreState};

/// Identifies a registration owner. Obtained from [`Store::new_owner`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

#[derive(Debug)]
pub(crate) struct Registration {
    deps: Vec<Value>,
    claimed: Vec<String>,
}

/// Outcome of [`Store::acquire`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Acquire {
    /// The dependencies matched the active registration. Reference counts
    /// are untouched; callbacks were replaced.
    Unchanged,
    /// The schema was registered.
    Registered {
        /// Paths this registration holds a reference on.
        claimed: Vec<String>,
        /// Paths created by this registration.
        inserted: Vec<String>,
    },
}

impl Store {
    /// Allocates a fresh owner identity.
    #[must_use]
    pub fn new_owner(&self) -> OwnerId {
        OwnerId(self.next_owner())
    }

    /// Registers `resolved` on behalf of `owner`.
    ///
    /// With the same `deps` as the owner's active registration this is a
    /// no-op for reference counts. Otherwise the new schema is added first
    /// and the previous claim released afterwards, so paths both declare
    /// keep their live values. Previous paths whose shape changes (another
    /// input type, or an entry turning into a folder and back) are released
    /// before the new schema is added instead. `root` names the
    /// registration's folder and the settings it declares for it.
    ///
    /// Newly inserted inputs with an `onChange` handler have it called once
    /// with `initial` set.
    ///
    /// ```rust
    /// use serde_json::json;
    /// use understory_controls::{Acquire, Store};
    /// use understory_schema::Schema;
    ///
    /// let store = Store::new();
    /// let schema = Schema::new().with("x", json!(1));
    /// let resolved = store.resolve_schema(&schema, None);
    ///
    /// let a = store.new_owner();
    /// let b = store.new_owner();
    /// store.acquire(a, &[], &resolved, None);
    /// store.acquire(b, &[], &resolved, None);
    /// assert_eq!(store.ref_count("x"), 2);
    /// assert_eq!(store.acquire(a, &[], &resolved, None), Acquire::Unchanged);
    /// assert_eq!(store.ref_count("x"), 2);
    ///
    /// store.release(a);
    /// store.release(b);
    /// assert!(store.get("x").is_none());
    /// ```
    pub fn acquire(
        &self,
        owner: OwnerId,
        deps: &[Value],
        resolved: &ResolvedSchema,
        root: Option<(&str, &FolderSettings)>,
    ) -> Acquire {
        self.mutate(|state, cx, fx| {
            let unchanged = state
                .owners
                .get(&owner)
                .filter(|r| r.deps == deps)
                .map(|r| r.claimed.clone());
            if let Some(claimed) = unchanged {
                for (_, mapped) in &resolved.mapped_paths {
                    if claimed.contains(&mapped.path) {
                        state.install_callbacks(&mapped.path, mapped.callbacks.clone());
                    }
                }
                return Acquire::Unchanged;
            }

            fx.diagnostics
                .extend(resolved.diagnostics.iter().cloned().map(Diagnostic::from));
            let mut previous = state.owners.remove(&owner);
            if let Some(previous) = &mut previous {
                let live: &StoreState = state;
                let (reshaped, kept): (Vec<String>, Vec<String>) =
                    mem::take(&mut previous.claimed)
                        .into_iter()
                        .partition(|path| changes_shape(live, path, resolved));
                previous.claimed = kept;
                if !reshaped.is_empty() {
                    tracing::debug!(
                        owner = owner.0,
                        reshaped = reshaped.len(),
                        "released reshaped paths ahead of registration"
                    );
                    state.remove_data(&reshaped, fx);
                }
            }
            let report = state.add_data(cx, &resolved.entries, previous.is_some(), fx);
            for (_, mapped) in &resolved.mapped_paths {
                if report.claimed.contains(&mapped.path) {
                    state.install_callbacks(&mapped.path, mapped.callbacks.clone());
                }
            }
            if let Some((path, settings)) = root {
                state.write_folder_settings(path, settings.clone(), false, fx);
            }
            for (path, settings) in &resolved.folders {
                state.write_folder_settings(path, settings.clone(), false, fx);
            }
            if let Some(previous) = previous {
                state.remove_data(&previous.claimed, fx);
            }

            for path in &report.inserted {
                let Some(entry) = state.entry(path) else {
                    continue;
                };
                let callback = state.callbacks_of(path).and_then(|c| c.on_change.clone());
                if let Some(callback) = callback {
                    let value = entry.value.clone().unwrap_or(Value::Null);
                    fx.call(callback, path, value, true, false);
                }
            }

            tracing::debug!(
                owner = owner.0,
                claimed = report.claimed.len(),
                inserted = report.inserted.len(),
                "registration acquired"
            );
            state.owners.insert(
                owner,
                Registration {
                    deps: deps.to_vec(),
                    claimed: report.claimed.clone(),
                },
            );
            Acquire::Registered {
                claimed: report.claimed,
                inserted: report.inserted,
            }
        })
    }

    /// Releases every path `owner` claimed. Returns the entry paths that
    /// left the store.
    pub fn release(&self, owner: OwnerId) -> Vec<String> {
        self.mutate(|state, _, fx| {
            let Some(registration) = state.owners.remove(&owner) else {
                return Vec::new();
            };
            let removed = state.remove_data(&registration.claimed, fx);
            tracing::debug!(owner = owner.0, removed = removed.len(), "registration released");
            removed
        })
    }

    /// Returns `true` while `owner` holds a registration.
    #[must_use]
    pub fn is_registered(&self, owner: OwnerId) -> bool {
        self.read()
            .is_some_and(|state| state.owners.contains_key(&owner))
    }
}

/// Returns `true` if `path`, claimed by an earlier registration, cannot be
/// carried over into `resolved`: the kind differs, or one of the two is now
/// a folder of the other.
fn changes_shape(state: &StoreState, path: &str, resolved: &ResolvedSchema) -> bool {
    resolved.entries.iter().any(|(next, entry)| {
        if next == path {
            state.entry(path).is_some_and(|live| live.kind != entry.kind)
        } else {
            is_descendant(next, path) || is_descendant(path, next)
        }
    })
}
