// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the `Store` read and write operations.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use understory_controls::{Store, StoreError};
use understory_schema::{
    ControlPlugin, EntryKind, InputOptions, Normalized, SanitizeError, Schema, Settings, TypeTag,
    Value, button, button_group, input, monitor, setting_f64,
};

fn store_with(schema: &Schema) -> Store {
    let store = Store::new();
    let resolved = store.resolve_schema(schema, None);
    assert!(resolved.diagnostics.is_empty(), "{:?}", resolved.diagnostics);
    store.add_data(&resolved.entries, false);
    store
}

fn bounded(value: i64, min: i64, max: i64) -> InputOptions {
    input(value).setting("min", min).setting("max", max)
}

/// Accepts numbers up to the `limit` setting and never clamps.
#[derive(Debug)]
struct Budget;

impl ControlPlugin for Budget {
    fn type_tag(&self) -> TypeTag {
        TypeTag::from_static("budget")
    }

    fn matches(&self, _value: &Value, settings: &Settings) -> bool {
        settings.contains_key("limit")
    }

    fn normalize(&self, value: Value, settings: Settings) -> Normalized {
        Normalized { value, settings }
    }

    fn sanitize(
        &self,
        value: &Value,
        settings: &Settings,
        _previous: Option<&Value>,
    ) -> Result<Value, SanitizeError> {
        let limit = setting_f64(settings, "limit").unwrap_or(f64::INFINITY);
        let v = value
            .as_f64()
            .ok_or_else(|| SanitizeError::wrong_shape("a number"))?;
        if v > limit {
            return Err(SanitizeError::OutOfRange {
                value: v,
                min: f64::NEG_INFINITY,
                max: limit,
            });
        }
        Ok(value.clone())
    }

    fn format(&self, value: &Value, _settings: &Settings) -> String {
        format!("${value}")
    }
}

#[test]
fn rejected_writes_round_trip() {
    let store = store_with(&Schema::new().with("n", bounded(5, 0, 10)));

    let err = store.set_value_at_path("n", json!(999), true).unwrap_err();
    let StoreError::Sanitize {
        path,
        rejected,
        previous,
        reason,
    } = err
    else {
        panic!("expected a sanitize error");
    };
    assert_eq!(path, "n");
    assert_eq!(rejected, json!(999));
    assert_eq!(previous, json!(5));
    assert!(matches!(reason, SanitizeError::OutOfRange { .. }));
    assert_eq!(store.value("n"), Some(json!(5)), "value must be kept");

    store.set_value_at_path("n", json!(7), true).unwrap();
    assert_eq!(store.value("n"), Some(json!(7)));
}

#[test]
fn numeric_strings_are_parsed() {
    let store = store_with(&Schema::new().with("n", bounded(5, 0, 10)));
    store.set_value_at_path("n", json!("3"), true).unwrap();
    assert_eq!(store.value("n"), Some(json!(3)));
}

#[test]
fn unknown_paths_and_wrong_kinds() {
    let store = store_with(&Schema::new().with("go", button(|_| {})));
    assert_eq!(
        store.set_value_at_path("nope", json!(1), false),
        Err(StoreError::UnknownPath("nope".into()))
    );
    let err = store.set_value_at_path("go", json!(1), false).unwrap_err();
    assert!(matches!(err, StoreError::WrongKind { kind: EntryKind::Button, .. }));
    assert!(store.get("nope").is_none());
}

#[test]
fn settings_changes_fit_the_live_value() {
    let store = store_with(&Schema::new().with("n", bounded(8, 0, 10)));
    let mut partial = Settings::new();
    partial.insert("max".into(), json!(5));
    store.set_settings_at_path("n", partial).unwrap();

    let entry = store.get("n").unwrap();
    assert_eq!(entry.settings["max"], json!(5));
    assert_eq!(entry.value, Some(json!(5)));
}

#[test]
fn unfittable_settings_are_rolled_back() {
    let store = Store::new();
    store.register_plugin(Budget);
    let schema = Schema::new().with("b", input(5).with_type("budget").setting("limit", 10));
    let resolved = store.resolve_schema(&schema, None);
    store.add_data(&resolved.entries, false);
    assert_eq!(
        store.get("b").unwrap().kind,
        EntryKind::Input(TypeTag::from_static("budget"))
    );

    let mut partial = Settings::new();
    partial.insert("limit".into(), json!(2));
    let err = store.set_settings_at_path("b", partial).unwrap_err();
    assert!(matches!(err, StoreError::Sanitize { .. }));

    let entry = store.get("b").unwrap();
    assert_eq!(entry.settings["limit"], json!(10), "settings must roll back");
    assert_eq!(entry.value, Some(json!(5)));
    assert_eq!(store.format_value("b").unwrap(), "$5");
}

#[test]
fn disabled_inputs_read_as_absent() {
    let store = store_with(&Schema::new().with("n", bounded(5, 0, 10)));
    store.disable_input_at_path("n", true).unwrap();
    assert_eq!(store.value("n"), None);
    let entry = store.get("n").unwrap();
    assert!(entry.is_disabled());
    assert_eq!(entry.value, Some(json!(5)), "stored value is kept");

    store.disable_input_at_path("n", false).unwrap();
    assert_eq!(store.value("n"), Some(json!(5)));
}

#[test]
fn bulk_writes_are_best_effort() {
    let store = store_with(
        &Schema::new()
            .with("a", bounded(1, 0, 10))
            .with("b", bounded(1, 0, 10)),
    );
    let err = store
        .set([("a", json!(99)), ("b", json!(4))], false)
        .unwrap_err();
    assert!(matches!(err, StoreError::Sanitize { ref path, .. } if path == "a"));
    assert_eq!(store.value("a"), Some(json!(1)));
    assert_eq!(store.value("b"), Some(json!(4)));
}

#[test]
fn data_keeps_registration_order() {
    let store = store_with(
        &Schema::new()
            .with("z", json!(1))
            .with("a", json!(true))
            .with("m", json!("text")),
    );
    assert_eq!(store.paths(), ["z", "a", "m"]);
    let kinds: Vec<_> = store.data().into_iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        [
            EntryKind::Input(TypeTag::NUMBER),
            EntryKind::Input(TypeTag::BOOLEAN),
            EntryKind::Input(TypeTag::STRING),
        ]
    );
}

#[test]
fn format_uses_the_plugin() {
    let store = store_with(&Schema::new().with("w", input(5).setting("suffix", "px")));
    assert_eq!(store.format_value("w").unwrap(), "5.0px");
}

#[test]
fn actions_run_outside_the_value_model() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let (l1, l2, l3) = (Rc::clone(&log), Rc::clone(&log), Rc::clone(&log));
    let store = store_with(
        &Schema::new()
            .with("reset", button(move |_| l1.borrow_mut().push("reset")))
            .with(
                "zoom",
                button_group()
                    .action("in", move |_| l2.borrow_mut().push("in"))
                    .action("out", move |_| l3.borrow_mut().push("out")),
            )
            .with("fps", monitor(|| json!(60))),
    );

    store.click_button("reset").unwrap();
    store.click_group_action("zoom", "out").unwrap();
    assert_eq!(*log.borrow(), ["reset", "out"]);
    assert!(matches!(
        store.click_group_action("zoom", "sideways"),
        Err(StoreError::UnknownAction { .. })
    ));
    assert_eq!(store.poll_monitor("fps").unwrap(), json!(60));
    assert_eq!(store.value("reset"), None);
    assert_eq!(store.get("zoom").unwrap().settings["actions"], json!(["in", "out"]));
}

#[test]
fn edit_callbacks_fire_on_request() {
    let store = Store::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let (start, end) = (Rc::clone(&seen), Rc::clone(&seen));
    let schema = Schema::new().with(
        "n",
        input(3)
            .on_edit_start(move |v, cx| start.borrow_mut().push(("start", v.clone(), cx.from_panel)))
            .on_edit_end(move |v, cx| end.borrow_mut().push(("end", v.clone(), cx.from_panel))),
    );
    let resolved = store.resolve_schema(&schema, None);
    let owner = store.new_owner();
    store.acquire(owner, &[], &resolved, None);

    store.emit_on_edit_start("n").unwrap();
    store.set_value_at_path("n", json!(4), true).unwrap();
    store.emit_on_edit_end("n").unwrap();
    assert_eq!(
        *seen.borrow(),
        [("start", json!(3), true), ("end", json!(4), true)]
    );
}

#[test]
fn default_store_is_per_thread() {
    let a = Store::default_store();
    let b = Store::default_store();
    assert!(a.ptr_eq(&b));
    let other = std::thread::spawn(|| {
        let c = Store::default_store();
        c.paths().len()
    })
    .join()
    .unwrap();
    assert_eq!(other, 0);
    assert!(!Store::new().ptr_eq(&a));
}
