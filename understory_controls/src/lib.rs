// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Controls: a reactive, reference-counted store for tweak-panel
//! controls.
//!
//! Schemas resolved by `understory_schema` are registered into a [`Store`],
//! a flat table of path-keyed entries with values, settings, visibility rules
//! and reference counts. Any number of independent callers can register
//! overlapping schemas; a path stays as long as one registration holds it.
//!
//! - **Store** ([`Store`]): get, set, settings and disable operations, all
//!   validated by the entry's plugin. Rejected writes leave the value alone
//!   and return the rejected and committed values.
//! - **Visibility**: render predicates are evaluated lazily. The paths a
//!   predicate reads become its dependencies; only changes to those paths
//!   evaluate it again. Self reads and cycles resolve to hidden with a
//!   [`Diagnostic`].
//! - **Subscriptions** ([`Store::subscribe`], [`Store::subscribe_path`]):
//!   observers choose the [`Changes`] channels they care about and are only
//!   woken when those channels change. A [`Subscription`] unsubscribes on
//!   drop.
//! - **Ownership** ([`Store::acquire`], [`Store::release`]): registrations
//!   are keyed by [`OwnerId`] and a dependency list. Re-declaring with the
//!   same dependencies is free.
//! - **Hooks** ([`use_controls`]): the usual entry point. It resolves a
//!   schema under a folder, registers it, and returns a [`Controls`] handle
//!   keyed by short names.
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use understory_controls::{ControlsOptions, Store, use_controls};
//! use understory_schema::{Schema, folder, input};
//!
//! let store = Store::new();
//! let schema = Schema::new()
//!     .with("mode", input("fast").setting("options", json!(["fast", "exact"])))
//!     .with(
//!         "tuning",
//!         folder(Schema::new().with(
//!             "iterations",
//!             input(8)
//!                 .setting("min", 1)
//!                 .setting("max", 64)
//!                 .render(|s| s.get("mode") == Some(json!("exact"))),
//!         )),
//!     );
//!
//! let controls = use_controls(None, &schema, ControlsOptions::new().store(store.clone()));
//!
//! // The only input of `tuning` is hidden, so the folder is too.
//! assert_eq!(store.visible_paths(), ["mode"]);
//!
//! controls.set([("mode", json!("exact"))]).unwrap();
//! assert_eq!(store.visible_paths(), ["mode", "tuning", "tuning.iterations"]);
//! assert_eq!(controls.values()["iterations"], json!(8));
//! ```
//!
//! ## Threading
//!
//! Stores are `Rc`-based and single-threaded. [`Store::default_store`] is a
//! per-thread default; pass an explicit store through [`ControlsOptions`] to
//! isolate registrations, as tests do.
//!
//! ## Logging
//!
//! Diagnostics are emitted as `tracing` warnings, registrations at `debug`
//! and writes and predicate evaluations at `trace`. No subscriber is
//! installed.

mod changes;
mod config;
mod controls;
mod diagnostic;
mod entry;
mod error;
mod graph;
mod ownership;
mod path;
mod store;
mod subscribe;
mod visibility;

pub use changes::Changes;
pub use config::StoreConfig;
pub use controls::{Controls, ControlsOptions, use_controls};
pub use diagnostic::Diagnostic;
pub use entry::Entry;
pub use error::{ConfigError, ControlsError, StoreError};
pub use ownership::{Acquire, OwnerId};
pub use store::{AddDataReport, Store};
pub use subscribe::{PathEvent, Subscription};
