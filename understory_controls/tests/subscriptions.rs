// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for change channels and subscriptions.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{Map, json};
use understory_controls::{
    Changes, Controls, ControlsOptions, PathEvent, Store, Subscription, use_controls,
};
use understory_schema::{Schema, Settings, Value, folder, input};

fn register(store: &Store, schema: &Schema) -> Controls {
    use_controls(None, schema, ControlsOptions::new().store(store.clone()))
}

/// Counts every wake on `channels`, whatever the projection.
fn wake_counter(store: &Store, channels: Changes) -> (Rc<Cell<u32>>, Subscription) {
    let wakes = Rc::new(Cell::new(0));
    let sink = Rc::clone(&wakes);
    let sub = store.subscribe_with(channels, |_| (), move |_| sink.set(sink.get() + 1), |_, _| false);
    (wakes, sub)
}

fn path_events(
    store: &Store,
    path: &str,
    channels: Changes,
) -> (Rc<RefCell<Vec<PathEvent>>>, Subscription) {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let sub = store.subscribe_path(path, channels, move |e| sink.borrow_mut().push(e.clone()));
    (events, sub)
}

#[test]
fn subscribers_only_wake_on_their_channels() {
    let store = Store::new();
    let _c = register(&store, &Schema::new().with("n", input(1).setting("max", 10)));
    let (settings, _s1) = wake_counter(&store, Changes::SETTINGS);
    let (values, _s2) = wake_counter(&store, Changes::VALUES);

    store.set_value_at_path("n", json!(2), false).unwrap();
    assert_eq!((settings.get(), values.get()), (0, 1));

    let mut partial = Settings::new();
    partial.insert("max".into(), json!(20));
    store.set_settings_at_path("n", partial).unwrap();
    assert_eq!((settings.get(), values.get()), (1, 1));

    store.disable_input_at_path("n", true).unwrap();
    assert_eq!((settings.get(), values.get()), (1, 1));
}

#[test]
fn unchanged_projections_do_not_call_back() {
    let store = Store::new();
    let _c = register(&store, &Schema::new().with("a", json!(1)).with("b", json!(1)));
    let calls = Rc::new(Cell::new(0));
    let sink = Rc::clone(&calls);
    let _sub = store.subscribe(
        Changes::VALUES,
        |s| s.value("a"),
        move |_| sink.set(sink.get() + 1),
    );

    store.set_value_at_path("b", json!(2), false).unwrap();
    assert_eq!(calls.get(), 0);
    store.set_value_at_path("a", json!(2), false).unwrap();
    assert_eq!(calls.get(), 1);
}

#[test]
fn path_subscriptions_see_their_path_only() {
    let store = Store::new();
    let _c = register(&store, &Schema::new().with("a", json!(1)).with("b", json!(1)));
    let (events, _sub) = path_events(&store, "a", Changes::all());

    store.set_value_at_path("b", json!(2), false).unwrap();
    assert!(events.borrow().is_empty());

    store.set([("a", json!(5)), ("b", json!(3))], false).unwrap();
    assert_eq!(
        *events.borrow(),
        [PathEvent {
            path: "a".into(),
            changes: Changes::VALUES,
        }]
    );
}

#[test]
fn structure_events_bracket_a_registration() {
    let store = Store::new();
    let (events, _sub) = path_events(&store, "late", Changes::STRUCTURE);

    let controls = register(&store, &Schema::new().with("late", json!(1)));
    drop(controls);

    let changes: Vec<Changes> = events.borrow().iter().map(|e| e.changes).collect();
    assert_eq!(changes, [Changes::STRUCTURE, Changes::STRUCTURE]);
}

#[test]
fn dropping_a_subscription_unsubscribes() {
    let store = Store::new();
    let _c = register(&store, &Schema::new().with("a", json!(1)));
    let (wakes, first) = wake_counter(&store, Changes::VALUES);
    let (_events, second) = path_events(&store, "a", Changes::VALUES);
    assert_eq!(store.subscription_count(), 2);

    drop(first);
    assert_eq!(store.subscription_count(), 1);
    store.set_value_at_path("a", json!(2), false).unwrap();
    assert_eq!(wakes.get(), 0);

    drop(second);
    assert_eq!(store.subscription_count(), 0);
}

#[test]
fn subscriptions_may_outlive_the_store() {
    let store = Store::new();
    let (_wakes, sub) = wake_counter(&store, Changes::all());
    drop(store);
    drop(sub);
}

#[test]
fn on_change_may_write_back_into_the_store() {
    let store = Store::new();
    let handle = store.clone();
    let schema = Schema::new()
        .with(
            "x",
            input(1).on_change(move |v, cx| {
                if !cx.initial {
                    handle.set_value_at_path("mirror", v.clone(), false).unwrap();
                }
            }),
        )
        .with("mirror", json!(0));
    let _c = register(&store, &schema);
    let (events, _sub) = path_events(&store, "mirror", Changes::VALUES);

    store.set_value_at_path("x", json!(3), true).unwrap();
    assert_eq!(store.value("mirror"), Some(json!(3)));
    assert_eq!(events.borrow().len(), 1);
}

#[test]
fn transient_inputs_use_their_own_channel() {
    let store = Store::new();
    let _c = register(
        &store,
        &Schema::new()
            .with("t", input(1).on_change(|_, _| {}))
            .with("v", json!(1)),
    );
    assert!(store.is_transient("t"));
    let (values, _s1) = wake_counter(&store, Changes::VALUES);
    let (transient, _s2) = wake_counter(&store, Changes::TRANSIENT_VALUES);

    store.set_value_at_path("t", json!(2), true).unwrap();
    assert_eq!((values.get(), transient.get()), (0, 1));

    store.set_value_at_path("v", json!(2), true).unwrap();
    assert_eq!((values.get(), transient.get()), (1, 1));
}

#[test]
fn visibility_flips_are_reported_per_path() {
    let store = Store::new();
    let _c = register(
        &store,
        &Schema::new()
            .with("gate", json!(true))
            .with("x", input(1).render(|s| s.get("gate") == Some(json!(true))))
            .with(
                "f",
                folder(Schema::new().with("y", json!(1)))
                    .render(|s| s.get("gate") == Some(json!(true))),
            ),
    );
    let (x_events, _s1) = path_events(&store, "x", Changes::VISIBILITY);
    let (y_events, _s2) = path_events(&store, "f.y", Changes::VISIBILITY);

    store.set_value_at_path("gate", json!(false), true).unwrap();
    assert_eq!(x_events.borrow().len(), 1);
    assert_eq!(y_events.borrow().len(), 1, "folder flips reach descendants");
    assert!(!store.is_visible("f.y"));
}

#[test]
fn controls_subscriptions_skip_transient_inputs() {
    let store = Store::new();
    let controls = register(
        &store,
        &Schema::new()
            .with("a", json!(1))
            .with("t", input(1).on_change(|_, _| {})),
    );
    let seen: Rc<RefCell<Vec<Map<String, Value>>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let _sub = controls.subscribe(move |values| sink.borrow_mut().push(values.clone()));

    controls.set([("a", json!(2))]).unwrap();
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(seen.borrow()[0]["a"], json!(2));

    controls.set([("t", json!(5))]).unwrap();
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(controls.get("t").unwrap(), Some(json!(5)));
}
