// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! String, boolean and image inputs.

use crate::error::SanitizeError;
use crate::kind::TypeTag;
use crate::plugin::{ControlPlugin, Normalized};
use crate::value::{Settings, Value};

/// Free text. Settings: `rows` (multi-line height), `editable`.
#[derive(Copy, Clone, Debug, Default)]
pub struct StringPlugin;

impl ControlPlugin for StringPlugin {
    fn type_tag(&self) -> TypeTag {
        TypeTag::STRING
    }

    fn matches(&self, value: &Value, _settings: &Settings) -> bool {
        value.is_string()
    }

    fn normalize(&self, value: Value, mut settings: Settings) -> Normalized {
        settings
            .entry("editable")
            .or_insert(Value::Bool(true));
        Normalized { value, settings }
    }

    fn sanitize(
        &self,
        value: &Value,
        _settings: &Settings,
        _previous: Option<&Value>,
    ) -> Result<Value, SanitizeError> {
        if value.is_string() {
            Ok(value.clone())
        } else {
            Err(SanitizeError::wrong_shape("a string"))
        }
    }

    fn format(&self, value: &Value, _settings: &Settings) -> String {
        value.as_str().unwrap_or_default().to_owned()
    }
}

/// A toggle.
#[derive(Copy, Clone, Debug, Default)]
pub struct BooleanPlugin;

impl ControlPlugin for BooleanPlugin {
    fn type_tag(&self) -> TypeTag {
        TypeTag::BOOLEAN
    }

    fn matches(&self, value: &Value, _settings: &Settings) -> bool {
        value.is_boolean()
    }

    fn normalize(&self, value: Value, settings: Settings) -> Normalized {
        Normalized { value, settings }
    }

    fn sanitize(
        &self,
        value: &Value,
        _settings: &Settings,
        _previous: Option<&Value>,
    ) -> Result<Value, SanitizeError> {
        match value {
            Value::Bool(_) => Ok(value.clone()),
            _ => Err(SanitizeError::wrong_shape("a boolean")),
        }
    }

    fn format(&self, value: &Value, _settings: &Settings) -> String {
        match value.as_bool() {
            Some(true) => "true".into(),
            Some(false) => "false".into(),
            None => String::new(),
        }
    }
}

/// An image reference (URL or data URL), or `null` for none.
///
/// Declared as `{ "image": <url or null> }`; the `image` key is consumed
/// during normalization and becomes the value.
#[derive(Copy, Clone, Debug, Default)]
pub struct ImagePlugin;

impl ControlPlugin for ImagePlugin {
    fn type_tag(&self) -> TypeTag {
        TypeTag::IMAGE
    }

    fn matches(&self, _value: &Value, settings: &Settings) -> bool {
        settings.contains_key("image")
    }

    fn normalize(&self, value: Value, mut settings: Settings) -> Normalized {
        let image = settings.remove("image").unwrap_or(Value::Null);
        let value = if value.is_null() { image } else { value };
        Normalized { value, settings }
    }

    fn sanitize(
        &self,
        value: &Value,
        _settings: &Settings,
        _previous: Option<&Value>,
    ) -> Result<Value, SanitizeError> {
        match value {
            Value::String(_) | Value::Null => Ok(value.clone()),
            _ => Err(SanitizeError::wrong_shape("an image url or null")),
        }
    }

    fn format(&self, value: &Value, _settings: &Settings) -> String {
        value.as_str().unwrap_or_default().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_defaults_to_editable() {
        let n = StringPlugin.normalize(json!("hi"), Settings::new());
        assert_eq!(n.settings["editable"], json!(true));
        assert!(StringPlugin.sanitize(&json!(3), &n.settings, None).is_err());
    }

    #[test]
    fn boolean_rejects_truthy_values() {
        assert_eq!(
            BooleanPlugin.sanitize(&json!(1), &Settings::new(), None),
            Err(SanitizeError::wrong_shape("a boolean"))
        );
        assert_eq!(BooleanPlugin.format(&json!(true), &Settings::new()), "true");
    }

    #[test]
    fn image_consumes_its_key() {
        let mut settings = Settings::new();
        settings.insert("image".into(), json!("a.png"));
        assert!(ImagePlugin.matches(&Value::Null, &settings));

        let n = ImagePlugin.normalize(Value::Null, settings);
        assert_eq!(n.value, json!("a.png"));
        assert!(!n.settings.contains_key("image"));
        assert_eq!(
            ImagePlugin.sanitize(&Value::Null, &n.settings, None),
            Ok(Value::Null)
        );
        assert!(ImagePlugin.sanitize(&json!(4), &n.settings, None).is_err());
    }
}
