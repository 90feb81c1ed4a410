// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use serde_json::{Map, json};

use crate::error::SanitizeError;
use crate::kind::TypeTag;
use crate::plugin::{ControlPlugin, Normalized};
use crate::value::{Settings, Value};

/// One entry of a select's option list.
#[derive(Clone, Debug, PartialEq)]
struct SelectOption {
    key: String,
    value: Value,
}

fn display_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn normalized_entry(item: &Value) -> Option<SelectOption> {
    let map = item.as_object()?;
    if map.len() != 2 {
        return None;
    }
    let key = map.get("key")?.as_str()?;
    let value = map.get("value")?;
    Some(SelectOption {
        key: key.to_owned(),
        value: value.clone(),
    })
}

/// Accepts a plain array, a `label → value` object or an already normalized
/// `[{key, value}]` list.
fn read_options(settings: &Settings) -> Vec<SelectOption> {
    match settings.get("options") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                normalized_entry(item).unwrap_or_else(|| SelectOption {
                    key: display_key(item),
                    value: item.clone(),
                })
            })
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(key, value)| SelectOption {
                key: key.clone(),
                value: value.clone(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn write_options(options: &[SelectOption]) -> Value {
    Value::Array(
        options
            .iter()
            .map(|o| json!({ "key": o.key, "value": o.value }))
            .collect(),
    )
}

/// An enumeration over `options`.
///
/// The normalized `options` setting is always a `[{key, value}]` list. An
/// initial value that is not among the options is prepended to them.
#[derive(Copy, Clone, Debug, Default)]
pub struct SelectPlugin;

impl ControlPlugin for SelectPlugin {
    fn type_tag(&self) -> TypeTag {
        TypeTag::SELECT
    }

    fn matches(&self, _value: &Value, settings: &Settings) -> bool {
        matches!(
            settings.get("options"),
            Some(Value::Array(_) | Value::Object(_))
        )
    }

    fn normalize(&self, value: Value, mut settings: Settings) -> Normalized {
        let mut options = read_options(&settings);
        let value = match value {
            Value::Null if !options.is_empty() => options[0].value.clone(),
            value => value,
        };
        if !options.iter().any(|o| o.value == value) {
            options.insert(
                0,
                SelectOption {
                    key: display_key(&value),
                    value: value.clone(),
                },
            );
        }
        settings.insert("options".into(), write_options(&options));
        Normalized { value, settings }
    }

    fn sanitize(
        &self,
        value: &Value,
        settings: &Settings,
        _previous: Option<&Value>,
    ) -> Result<Value, SanitizeError> {
        read_options(settings)
            .into_iter()
            .find(|o| o.value == *value)
            .map(|o| o.value)
            .ok_or(SanitizeError::NotAnOption)
    }

    fn fit(&self, value: &Value, settings: &Settings) -> Result<Value, SanitizeError> {
        let options = read_options(settings);
        if options.iter().any(|o| o.value == *value) {
            return Ok(value.clone());
        }
        options
            .into_iter()
            .next()
            .map(|o| o.value)
            .ok_or(SanitizeError::NotAnOption)
    }

    fn format(&self, value: &Value, settings: &Settings) -> String {
        read_options(settings)
            .into_iter()
            .find(|o| o.value == *value)
            .map(|o| o.key)
            .unwrap_or_default()
    }
}

/// Convenience for building `label → value` option maps.
#[must_use]
pub fn labelled_options<'a>(pairs: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
    Value::Object(
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect::<Map<_, _>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(options: Value) -> Settings {
        let mut s = Settings::new();
        s.insert("options".into(), options);
        s
    }

    #[test]
    fn array_options_are_keyed_by_display() {
        let n = SelectPlugin.normalize(json!("b"), settings(json!(["a", "b", 3])));
        assert_eq!(
            n.settings["options"],
            json!([
                { "key": "a", "value": "a" },
                { "key": "b", "value": "b" },
                { "key": "3", "value": 3 }
            ])
        );
        assert_eq!(SelectPlugin.format(&json!(3), &n.settings), "3");
    }

    #[test]
    fn missing_initial_value_is_prepended() {
        let n = SelectPlugin.normalize(json!("z"), settings(json!(["a", "b"])));
        let options = n.settings["options"].as_array().unwrap();
        assert_eq!(options.len(), 3);
        assert_eq!(options[0]["value"], json!("z"));
    }

    #[test]
    fn labelled_options_keep_labels() {
        let opts = labelled_options([("Small", json!(1)), ("Large", json!(10))]);
        let n = SelectPlugin.normalize(Value::Null, settings(opts));
        assert_eq!(n.value, json!(1));
        assert_eq!(SelectPlugin.format(&json!(10), &n.settings), "Large");
    }

    #[test]
    fn sanitize_and_fit() {
        let n = SelectPlugin.normalize(json!(1), settings(json!([1, 2])));
        assert_eq!(SelectPlugin.sanitize(&json!(2), &n.settings, None), Ok(json!(2)));
        assert_eq!(
            SelectPlugin.sanitize(&json!(5), &n.settings, None),
            Err(SanitizeError::NotAnOption)
        );

        let narrowed = settings(json!([7, 8]));
        assert_eq!(SelectPlugin.fit(&json!(1), &narrowed), Ok(json!(7)));
        assert_eq!(SelectPlugin.fit(&json!(8), &narrowed), Ok(json!(8)));
    }
}
