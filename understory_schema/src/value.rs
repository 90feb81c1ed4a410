// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value and settings representation.
//!
//! Control values are heterogeneous (numbers, strings, `{x, y}` records, RGBA
//! objects, option lists), so they are carried as [`serde_json::Value`]. This
//! module provides the [`Settings`] alias and the numeric helpers shared by
//! the built-in plugins.

use serde_json::{Map, Number};
use smallvec::SmallVec;

pub use serde_json::Value;

/// Type-specific constraints of a control (`min`, `max`, `step`, `options`, …).
///
/// Keys keep their declaration order.
pub type Settings = Map<String, Value>;

/// Reads a JSON number as `f64`.
#[must_use]
pub fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

/// Reads a JSON number, or a string that parses as one.
///
/// Text fields hand their content over as strings, so sanitizers accept both.
#[must_use]
pub fn parse_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(_) => as_f64(value),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Builds a JSON number from an `f64`, preferring the integer representation
/// when the value is integral.
///
/// `serde_json` distinguishes `5` from `5.0`; normalizing here keeps value
/// comparisons stable no matter which path produced the number.
#[must_use]
pub fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "only integral values inside the i64 range take this branch"
        )]
        let integral = value as i64;
        return Value::Number(Number::from(integral));
    }
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// Reads an optional numeric setting.
#[must_use]
pub fn setting_f64(settings: &Settings, key: &str) -> Option<f64> {
    settings.get(key).and_then(as_f64)
}

/// Reads an optional boolean setting, defaulting to `false`.
#[must_use]
pub fn setting_flag(settings: &Settings, key: &str) -> bool {
    settings.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Extracts exactly `len` numbers from a JSON array.
#[must_use]
pub fn number_array(value: &Value, len: usize) -> Option<SmallVec<[f64; 4]>> {
    let items = value.as_array()?;
    if items.len() != len {
        return None;
    }
    items.iter().map(as_f64).collect()
}

/// Number of decimals needed to display `step` without losing precision.
#[must_use]
pub fn decimals_of(step: f64) -> u32 {
    if step <= 0.0 || !step.is_finite() {
        return 0;
    }
    let mut decimals = 0;
    let mut scaled = step;
    while decimals < 10 && (scaled - scaled.round()).abs() > 1e-9 {
        scaled *= 10.0;
        decimals += 1;
    }
    decimals
}

/// Rounds `value` to `decimals` places.
#[must_use]
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(i32::try_from(decimals).unwrap_or(10));
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integral_floats_compare_equal_to_integers() {
        assert_eq!(number_value(5.0), json!(5));
        assert_eq!(number_value(-3.0), json!(-3));
        assert_eq!(number_value(0.5), json!(0.5));
        assert_eq!(number_value(f64::NAN), Value::Null);
    }

    #[test]
    fn parse_accepts_numeric_strings() {
        assert_eq!(parse_f64(&json!(" 4.5 ")), Some(4.5));
        assert_eq!(parse_f64(&json!(2)), Some(2.0));
        assert_eq!(parse_f64(&json!("abc")), None);
        assert_eq!(parse_f64(&json!(true)), None);
    }

    #[test]
    fn decimals_follow_the_step() {
        assert_eq!(decimals_of(1.0), 0);
        assert_eq!(decimals_of(0.1), 1);
        assert_eq!(decimals_of(0.01), 2);
        assert_eq!(decimals_of(0.25), 2);
        assert_eq!(decimals_of(10.0), 0);
    }

    #[test]
    fn number_arrays_require_exact_length() {
        assert_eq!(
            number_array(&json!([1, 2]), 2).map(|v| v.to_vec()),
            Some(vec![1.0, 2.0])
        );
        assert!(number_array(&json!([1, 2, 3]), 2).is_none());
        assert!(number_array(&json!([1, "2"]), 2).is_none());
    }
}
