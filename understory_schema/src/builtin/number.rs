// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Number input, plus the numeric constraint logic shared by vectors and
//! intervals.

use crate::error::SanitizeError;
use crate::kind::TypeTag;
use crate::plugin::{ControlPlugin, Normalized};
use crate::value::{
    Settings, Value, decimals_of, number_value, parse_f64, round_to, setting_f64,
};

/// Numeric bounds and grid read from a settings map.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct NumberConstraints {
    pub(crate) min: f64,
    pub(crate) max: f64,
    step: Option<f64>,
    pad: Option<u32>,
    anchor: f64,
}

impl NumberConstraints {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        let step = setting_f64(settings, "step").filter(|s| *s > 0.0);
        let pad = settings
            .get("pad")
            .and_then(Value::as_u64)
            .map(|p| u32::try_from(p).unwrap_or(10).min(10));
        Self {
            min: setting_f64(settings, "min").unwrap_or(f64::NEG_INFINITY),
            max: setting_f64(settings, "max").unwrap_or(f64::INFINITY),
            step,
            pad,
            anchor: setting_f64(settings, "initialValue").unwrap_or(0.0),
        }
    }

    /// Rejects out-of-range values, then snaps to the step grid.
    pub(crate) fn check(&self, value: f64) -> Result<f64, SanitizeError> {
        if value < self.min || value > self.max {
            return Err(SanitizeError::OutOfRange {
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(self.snap(value))
    }

    /// Clamps into range, then snaps to the step grid.
    pub(crate) fn clamp(&self, value: f64) -> f64 {
        self.snap(self.bound(value))
    }

    fn bound(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    fn snap(&self, value: f64) -> f64 {
        let mut out = value;
        if let Some(step) = self.step {
            out = self.anchor + ((value - self.anchor) / step).round() * step;
        }
        if let Some(pad) = self.pad.or_else(|| self.step.map(decimals_of)) {
            out = round_to(out, pad);
        }
        // Snapping may step just past a bound.
        self.bound(out)
    }

    pub(crate) fn pad(&self) -> u32 {
        self.pad
            .or_else(|| self.step.map(decimals_of))
            .unwrap_or(0)
    }
}

/// Step inferred from the magnitude of an initial value.
pub(crate) fn default_step(value: f64) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return 0.01;
    }
    10_f64.powf(value.abs().log10().floor()) / 10.0
}

/// Fills `step`, `pad` and `initialValue` into numeric settings.
pub(crate) fn complete_number_settings(value: f64, settings: &mut Settings) {
    let step = setting_f64(settings, "step")
        .filter(|s| *s > 0.0)
        .unwrap_or_else(|| default_step(value));
    settings.insert("step".into(), number_value(step));
    if !settings.get("pad").is_some_and(Value::is_u64) {
        settings.insert("pad".into(), Value::from(decimals_of(step)));
    }
    settings.insert("initialValue".into(), number_value(value));
}

/// Plain numbers with optional `min`, `max`, `step`, `pad` and `suffix`.
#[derive(Copy, Clone, Debug, Default)]
pub struct NumberPlugin;

impl ControlPlugin for NumberPlugin {
    fn type_tag(&self) -> TypeTag {
        TypeTag::NUMBER
    }

    fn matches(&self, value: &Value, _settings: &Settings) -> bool {
        value.is_number()
    }

    fn normalize(&self, value: Value, mut settings: Settings) -> Normalized {
        let Some(initial) = parse_f64(&value) else {
            return Normalized { value, settings };
        };
        complete_number_settings(initial, &mut settings);
        Normalized {
            value: number_value(initial),
            settings,
        }
    }

    fn sanitize(
        &self,
        value: &Value,
        settings: &Settings,
        _previous: Option<&Value>,
    ) -> Result<Value, SanitizeError> {
        let v = parse_f64(value).ok_or(SanitizeError::wrong_shape("a number"))?;
        let checked = NumberConstraints::from_settings(settings).check(v)?;
        Ok(number_value(checked))
    }

    fn fit(&self, value: &Value, settings: &Settings) -> Result<Value, SanitizeError> {
        let v = parse_f64(value).ok_or(SanitizeError::wrong_shape("a number"))?;
        Ok(number_value(
            NumberConstraints::from_settings(settings).clamp(v),
        ))
    }

    fn format(&self, value: &Value, settings: &Settings) -> String {
        let pad = NumberConstraints::from_settings(settings).pad() as usize;
        let suffix = settings.get("suffix").and_then(Value::as_str).unwrap_or("");
        match parse_f64(value) {
            Some(v) => format!("{v:.pad$}{suffix}"),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalized(value: Value, settings: Value) -> Normalized {
        NumberPlugin.normalize(value, settings.as_object().cloned().unwrap())
    }

    #[test]
    fn step_is_inferred_from_magnitude() {
        assert_eq!(default_step(0.0), 0.01);
        assert_eq!(default_step(1.0), 0.1);
        assert_eq!(default_step(5.0), 0.1);
        assert_eq!(default_step(0.5), 0.01);
        assert_eq!(default_step(250.0), 10.0);
    }

    #[test]
    fn normalize_completes_settings() {
        let n = normalized(json!(1), json!({ "min": 0, "max": 10 }));
        assert_eq!(n.value, json!(1));
        assert_eq!(n.settings["step"], json!(0.1));
        assert_eq!(n.settings["pad"], json!(1));
        assert_eq!(n.settings["initialValue"], json!(1));
        assert_eq!(n.settings["min"], json!(0));
    }

    #[test]
    fn sanitize_rejects_out_of_range() {
        let n = normalized(json!(1), json!({ "min": 0, "max": 10 }));
        let err = NumberPlugin
            .sanitize(&json!(999), &n.settings, Some(&n.value))
            .unwrap_err();
        assert_eq!(
            err,
            SanitizeError::OutOfRange {
                value: 999.0,
                min: 0.0,
                max: 10.0
            }
        );
        assert!(NumberPlugin.sanitize(&json!("x"), &n.settings, None).is_err());
    }

    #[test]
    fn sanitize_snaps_to_grid_and_parses_strings() {
        let n = normalized(json!(1), json!({ "min": 0, "max": 10, "step": 0.5 }));
        assert_eq!(
            NumberPlugin.sanitize(&json!(2.2), &n.settings, None),
            Ok(json!(2))
        );
        assert_eq!(
            NumberPlugin.sanitize(&json!("3.4"), &n.settings, None),
            Ok(json!(3.5))
        );
        assert_eq!(
            NumberPlugin.sanitize(&json!(5), &n.settings, None),
            Ok(json!(5))
        );
    }

    #[test]
    fn normalize_leaves_non_numbers_for_fit_to_reject() {
        let n = normalized(json!("abc"), json!({ "min": 0 }));
        assert_eq!(n.value, json!("abc"));
        assert!(!n.settings.contains_key("initialValue"));
        assert!(NumberPlugin.fit(&n.value, &n.settings).is_err());

        let n = normalized(json!("5"), json!({}));
        assert_eq!(n.value, json!(5));
        assert_eq!(n.settings["initialValue"], json!(5));
    }

    #[test]
    fn fit_clamps() {
        let n = normalized(json!(1), json!({ "min": 0, "max": 10 }));
        assert_eq!(NumberPlugin.fit(&json!(12), &n.settings), Ok(json!(10)));
        assert_eq!(NumberPlugin.fit(&json!(-4), &n.settings), Ok(json!(0)));
    }

    #[test]
    fn format_uses_pad_and_suffix() {
        let n = normalized(json!(1), json!({ "suffix": "px", "pad": 2 }));
        assert_eq!(NumberPlugin.format(&json!(1.5), &n.settings), "1.50px");
    }
}
