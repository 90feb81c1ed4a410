// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change subscriptions.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;

use crate::changes::{ChangeLog, Changes};
use crate::store::{Store, StoreInner};

/// What a path subscription is told.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathEvent {
    /// The changed path.
    pub path: String,
    /// Channels touched at that path by the mutation.
    pub changes: Changes,
}

pub(crate) struct Watcher {
    channels: Changes,
    active: Cell<bool>,
    run: Box<dyn Fn(&Store)>,
}

pub(crate) struct PathWatcher {
    channels: Changes,
    active: Cell<bool>,
    run: Box<dyn Fn(&PathEvent)>,
}

/// Subscribers of one store.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    general: Vec<(u64, Rc<Watcher>)>,
    by_path: HashMap<String, Vec<(u64, Rc<PathWatcher>)>>,
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("general", &self.general.len())
            .field("paths", &self.by_path.len())
            .finish_non_exhaustive()
    }
}

impl Subscribers {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn len(&self) -> usize {
        self.general.len() + self.by_path.values().map(Vec::len).sum::<usize>()
    }

    fn remove(&mut self, id: u64, path: Option<&str>) {
        match path {
            None => {
                if let Some(pos) = self.general.iter().position(|(i, _)| *i == id) {
                    let (_, watcher) = self.general.remove(pos);
                    watcher.active.set(false);
                }
            }
            Some(path) => {
                let Some(list) = self.by_path.get_mut(path) else {
                    return;
                };
                if let Some(pos) = list.iter().position(|(i, _)| *i == id) {
                    let (_, watcher) = list.remove(pos);
                    watcher.active.set(false);
                }
                if list.is_empty() {
                    self.by_path.remove(path);
                }
            }
        }
    }

    /// Collects the watchers a change log wakes, in subscription order.
    ///
    /// Watchers are cloned out so that the caller can run them without
    /// holding the subscriber table.
    pub(crate) fn woken(
        &self,
        log: &ChangeLog,
    ) -> (Vec<Rc<Watcher>>, Vec<(Rc<PathWatcher>, PathEvent)>) {
        let union = log.union();
        let general = self
            .general
            .iter()
            .filter(|(_, w)| w.channels.intersects(union))
            .map(|(_, w)| Rc::clone(w))
            .collect();
        let mut by_path = Vec::new();
        for (path, changes) in log.iter() {
            let Some(list) = self.by_path.get(path) else {
                continue;
            };
            for (_, watcher) in list {
                if watcher.channels.intersects(changes) {
                    by_path.push((
                        Rc::clone(watcher),
                        PathEvent {
                            path: path.to_owned(),
                            changes,
                        },
                    ));
                }
            }
        }
        (general, by_path)
    }
}

impl Watcher {
    pub(crate) fn notify(&self, store: &Store) {
        if self.active.get() {
            (self.run)(store);
        }
    }
}

impl PathWatcher {
    pub(crate) fn notify(&self, event: &PathEvent) {
        if self.active.get() {
            (self.run)(event);
        }
    }
}

/// Keeps a subscription alive. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    store: Weak<StoreInner>,
    id: u64,
    path: Option<String>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner
                .subscribers
                .borrow_mut()
                .remove(self.id, self.path.as_deref());
        }
    }
}

impl Store {
    /// Calls `callback` with the selected projection whenever a mutation
    /// touching `channels` changes it, as decided by `equality`.
    ///
    /// The selector runs once immediately to seed the comparison; the
    /// callback does not.
    pub fn subscribe_with<T, S, C, E>(
        &self,
        channels: Changes,
        selector: S,
        callback: C,
        equality: E,
    ) -> Subscription
    where
        T: Clone + 'static,
        S: Fn(&Self) -> T + 'static,
        C: Fn(&T) + 'static,
        E: Fn(&T, &T) -> bool + 'static,
    {
        let last = RefCell::new(selector(self));
        let run = move |store: &Self| {
            let next = selector(store);
            if equality(&last.borrow(), &next) {
                return;
            }
            last.replace(next.clone());
            callback(&next);
        };
        let watcher = Rc::new(Watcher {
            channels,
            active: Cell::new(true),
            run: Box::new(run),
        });
        let id = {
            let mut subscribers = self.0.subscribers.borrow_mut();
            let id = subscribers.next_id();
            subscribers.general.push((id, watcher));
            id
        };
        Subscription {
            store: Rc::downgrade(&self.0),
            id,
            path: None,
        }
    }

    /// [`subscribe_with`](Self::subscribe_with) using `==`.
    ///
    /// ```rust
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    ///
    /// use serde_json::json;
    /// use understory_controls::{Changes, Store};
    /// use understory_schema::Schema;
    ///
    /// let store = Store::new();
    /// let resolved = store.resolve_schema(&Schema::new().with("n", json!(1)), None);
    /// store.add_data(&resolved.entries, false);
    ///
    /// let seen = Rc::new(Cell::new(0.0));
    /// let sink = Rc::clone(&seen);
    /// let _sub = store.subscribe(
    ///     Changes::VALUES,
    ///     |s| s.value("n").and_then(|v| v.as_f64()).unwrap_or_default(),
    ///     move |n| sink.set(*n),
    /// );
    /// store.set_value_at_path("n", json!(3), false).unwrap();
    /// assert_eq!(seen.get(), 3.0);
    /// ```
    pub fn subscribe<T, S, C>(&self, channels: Changes, selector: S, callback: C) -> Subscription
    where
        T: Clone + PartialEq + 'static,
        S: Fn(&Self) -> T + 'static,
        C: Fn(&T) + 'static,
    {
        self.subscribe_with(channels, selector, callback, PartialEq::eq)
    }

    /// Calls `callback` whenever a mutation touches `channels` at exactly
    /// `path`. Only watchers of changed paths are consulted.
    pub fn subscribe_path(
        &self,
        path: impl Into<String>,
        channels: Changes,
        callback: impl Fn(&PathEvent) + 'static,
    ) -> Subscription {
        let path = path.into();
        let watcher = Rc::new(PathWatcher {
            channels,
            active: Cell::new(true),
            run: Box::new(callback),
        });
        let id = {
            let mut subscribers = self.0.subscribers.borrow_mut();
            let id = subscribers.next_id();
            subscribers
                .by_path
                .entry(path.clone())
                .or_default()
                .push((id, watcher));
            id
        };
        Subscription {
            store: Rc::downgrade(&self.0),
            id,
            path: Some(path),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.0.subscribers.borrow().len()
    }
}
