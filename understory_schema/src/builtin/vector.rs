// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vector and interval inputs.

use serde_json::Map;
use smallvec::SmallVec;

use super::number::{NumberConstraints, complete_number_settings};
use crate::error::SanitizeError;
use crate::kind::TypeTag;
use crate::plugin::{ControlPlugin, Normalized};
use crate::value::{Settings, Value, as_f64, number_array, number_value, setting_flag};

type Components = SmallVec<[f64; 4]>;

/// Container shape of a vector value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Shape {
    Array,
    Object,
}

/// Fixed-size numeric vectors, written as `[x, y(, z)]` or `{x, y(, z)}`.
///
/// Each axis gets its own numeric settings under its name (`x`, `y`, `z`),
/// inheriting the global `min`/`max`/`step`/`pad`. With `lock` set, editing
/// one component scales the others by the same ratio.
#[derive(Clone, Debug)]
pub struct VectorPlugin {
    tag: TypeTag,
    axes: &'static [&'static str],
}

impl VectorPlugin {
    /// Two components, `x` and `y`.
    pub const VECTOR2D: Self = Self {
        tag: TypeTag::VECTOR2D,
        axes: &["x", "y"],
    };

    /// Three components, `x`, `y` and `z`.
    pub const VECTOR3D: Self = Self {
        tag: TypeTag::VECTOR3D,
        axes: &["x", "y", "z"],
    };

    fn components(&self, value: &Value) -> Option<(Components, Shape)> {
        match value {
            Value::Array(_) => number_array(value, self.axes.len()).map(|c| (c, Shape::Array)),
            Value::Object(map) if map.len() == self.axes.len() => self
                .axes
                .iter()
                .map(|axis| map.get(*axis).and_then(as_f64))
                .collect::<Option<Components>>()
                .map(|c| (c, Shape::Object)),
            _ => None,
        }
    }

    /// Like [`components`](Self::components), but an object naming only some
    /// axes takes the rest from `previous`.
    fn components_or_partial(&self, value: &Value, previous: Option<&[f64]>) -> Option<Components> {
        if let Some((c, _)) = self.components(value) {
            return Some(c);
        }
        let (map, previous) = (value.as_object()?, previous?);
        if map.is_empty() || map.keys().any(|k| !self.axes.contains(&k.as_str())) {
            return None;
        }
        self.axes
            .iter()
            .zip(previous)
            .map(|(axis, prev)| match map.get(*axis) {
                Some(v) => as_f64(v),
                None => Some(*prev),
            })
            .collect()
    }

    fn axis_constraints(&self, settings: &Settings, axis: &str) -> NumberConstraints {
        match settings.get(axis).and_then(Value::as_object) {
            Some(axis_settings) => NumberConstraints::from_settings(axis_settings),
            None => NumberConstraints::from_settings(settings),
        }
    }

    fn emit(&self, components: &[f64], shape: Shape) -> Value {
        match shape {
            Shape::Array => Value::Array(components.iter().copied().map(number_value).collect()),
            Shape::Object => Value::Object(
                self.axes
                    .iter()
                    .zip(components)
                    .map(|(axis, c)| ((*axis).to_owned(), number_value(*c)))
                    .collect::<Map<_, _>>(),
            ),
        }
    }
}

fn shape_of(settings: &Settings) -> Shape {
    match settings.get("format").and_then(Value::as_str) {
        Some("object") => Shape::Object,
        _ => Shape::Array,
    }
}

/// Scales every component by the ratio of the first edited one.
fn apply_lock(components: &mut [f64], previous: &[f64]) {
    let edited = components
        .iter()
        .zip(previous)
        .position(|(c, p)| c != p && *p != 0.0);
    let Some(index) = edited else {
        return;
    };
    let ratio = components[index] / previous[index];
    for (i, (c, p)) in components.iter_mut().zip(previous).enumerate() {
        if i != index {
            *c = p * ratio;
        }
    }
}

impl ControlPlugin for VectorPlugin {
    fn type_tag(&self) -> TypeTag {
        self.tag.clone()
    }

    fn matches(&self, value: &Value, _settings: &Settings) -> bool {
        self.components(value).is_some()
    }

    fn normalize(&self, value: Value, mut settings: Settings) -> Normalized {
        let Some((components, shape)) = self.components(&value) else {
            return Normalized { value, settings };
        };
        for (axis, component) in self.axes.iter().zip(&components) {
            let mut axis_settings = settings
                .get(*axis)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            for key in ["min", "max", "step", "pad"] {
                if let (false, Some(global)) = (axis_settings.contains_key(key), settings.get(key)) {
                    axis_settings.insert(key.into(), global.clone());
                }
            }
            complete_number_settings(*component, &mut axis_settings);
            settings.insert((*axis).into(), Value::Object(axis_settings));
        }
        settings.entry("lock").or_insert(Value::Bool(false));
        let format = match shape {
            Shape::Array => "array",
            Shape::Object => "object",
        };
        settings.insert("format".into(), Value::from(format));
        Normalized {
            value: self.emit(&components, shape),
            settings,
        }
    }

    fn sanitize(
        &self,
        value: &Value,
        settings: &Settings,
        previous: Option<&Value>,
    ) -> Result<Value, SanitizeError> {
        let previous = previous.and_then(|p| self.components(p)).map(|(c, _)| c);
        let mut components = self
            .components_or_partial(value, previous.as_deref())
            .ok_or(SanitizeError::wrong_shape("a vector"))?;
        if let (true, Some(previous)) = (setting_flag(settings, "lock"), previous.as_deref()) {
            apply_lock(&mut components, previous);
        }
        for (axis, c) in self.axes.iter().zip(components.iter_mut()) {
            *c = self.axis_constraints(settings, axis).check(*c)?;
        }
        Ok(self.emit(&components, shape_of(settings)))
    }

    fn fit(&self, value: &Value, settings: &Settings) -> Result<Value, SanitizeError> {
        let (mut components, _) = self
            .components(value)
            .ok_or(SanitizeError::wrong_shape("a vector"))?;
        for (axis, c) in self.axes.iter().zip(components.iter_mut()) {
            *c = self.axis_constraints(settings, axis).clamp(*c);
        }
        Ok(self.emit(&components, shape_of(settings)))
    }

    fn format(&self, value: &Value, settings: &Settings) -> String {
        let Some((components, _)) = self.components(value) else {
            return String::new();
        };
        self.axes
            .iter()
            .zip(&components)
            .map(|(axis, c)| {
                let pad = self.axis_constraints(settings, axis).pad() as usize;
                format!("{c:.pad$}")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A `[lo, hi]` range inside the `min`/`max` settings.
#[derive(Copy, Clone, Debug, Default)]
pub struct IntervalPlugin;

impl IntervalPlugin {
    fn bounds(value: &Value) -> Result<(f64, f64), SanitizeError> {
        let pair = number_array(value, 2).ok_or(SanitizeError::wrong_shape("a [lo, hi] pair"))?;
        Ok((pair[0], pair[1]))
    }
}

impl ControlPlugin for IntervalPlugin {
    fn type_tag(&self) -> TypeTag {
        TypeTag::INTERVAL
    }

    fn matches(&self, value: &Value, settings: &Settings) -> bool {
        number_array(value, 2).is_some()
            && settings.get("min").and_then(as_f64).is_some()
            && settings.get("max").and_then(as_f64).is_some()
    }

    fn normalize(&self, value: Value, settings: Settings) -> Normalized {
        let value = match number_array(&value, 2) {
            Some(pair) => Value::Array(pair.into_iter().map(number_value).collect()),
            None => value,
        };
        Normalized { value, settings }
    }

    fn sanitize(
        &self,
        value: &Value,
        settings: &Settings,
        _previous: Option<&Value>,
    ) -> Result<Value, SanitizeError> {
        let (lo, hi) = Self::bounds(value)?;
        let constraints = NumberConstraints::from_settings(settings);
        let (lo, hi) = (constraints.check(lo)?, constraints.check(hi)?);
        if lo > hi {
            return Err(SanitizeError::invalid("lower bound exceeds upper bound"));
        }
        Ok(Value::Array(vec![number_value(lo), number_value(hi)]))
    }

    fn fit(&self, value: &Value, settings: &Settings) -> Result<Value, SanitizeError> {
        let (lo, hi) = Self::bounds(value)?;
        let constraints = NumberConstraints::from_settings(settings);
        let hi = constraints.clamp(hi);
        let lo = constraints.clamp(lo).min(hi);
        Ok(Value::Array(vec![number_value(lo), number_value(hi)]))
    }

    fn format(&self, value: &Value, _settings: &Settings) -> String {
        match Self::bounds(value) {
            Ok((lo, hi)) => format!("[{lo}, {hi}]"),
            Err(_) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(value: Value) -> Settings {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn shapes_are_matched_by_arity() {
        let empty = Settings::new();
        assert!(VectorPlugin::VECTOR2D.matches(&json!([1, 2]), &empty));
        assert!(VectorPlugin::VECTOR2D.matches(&json!({ "x": 1, "y": 2 }), &empty));
        assert!(!VectorPlugin::VECTOR2D.matches(&json!([1, 2, 3]), &empty));
        assert!(!VectorPlugin::VECTOR2D.matches(&json!({ "x": 1, "z": 2 }), &empty));
        assert!(VectorPlugin::VECTOR3D.matches(&json!({ "x": 1, "y": 2, "z": 3 }), &empty));
    }

    #[test]
    fn axes_inherit_global_settings() {
        let n = VectorPlugin::VECTOR2D.normalize(
            json!({ "x": 1, "y": 2 }),
            settings(json!({ "min": 0, "max": 10, "y": { "max": 5 } })),
        );
        assert_eq!(n.settings["format"], json!("object"));
        assert_eq!(n.settings["lock"], json!(false));
        assert_eq!(n.settings["x"]["max"], json!(10));
        assert_eq!(n.settings["y"]["max"], json!(5));
        assert_eq!(n.settings["y"]["min"], json!(0));

        let err = VectorPlugin::VECTOR2D
            .sanitize(&json!({ "x": 1, "y": 7 }), &n.settings, Some(&n.value))
            .unwrap_err();
        assert!(matches!(err, SanitizeError::OutOfRange { max, .. } if max == 5.0));
    }

    #[test]
    fn partial_objects_fill_from_previous() {
        let n = VectorPlugin::VECTOR3D.normalize(json!([1, 2, 3]), Settings::new());
        let out = VectorPlugin::VECTOR3D.sanitize(&json!({ "y": 4 }), &n.settings, Some(&n.value));
        assert_eq!(out, Ok(json!([1, 4, 3])));
    }

    #[test]
    fn lock_keeps_ratios() {
        let n = VectorPlugin::VECTOR2D.normalize(json!([1, 2]), settings(json!({ "lock": true, "step": 0.5 })));
        let out = VectorPlugin::VECTOR2D.sanitize(&json!([2, 2]), &n.settings, Some(&n.value));
        assert_eq!(out, Ok(json!([2, 4])));
    }

    #[test]
    fn fit_clamps_components() {
        let s = settings(json!({ "x": { "min": 0, "max": 1 }, "y": { "min": 0, "max": 1 } }));
        assert_eq!(VectorPlugin::VECTOR2D.fit(&json!([3, -1]), &s), Ok(json!([1, 0])));
    }

    #[test]
    fn interval_bounds() {
        let s = settings(json!({ "min": 0, "max": 10 }));
        assert!(IntervalPlugin.matches(&json!([2, 4]), &s));
        assert!(!IntervalPlugin.matches(&json!([2, 4]), &Settings::new()));
        assert_eq!(IntervalPlugin.sanitize(&json!([1, 3]), &s, None), Ok(json!([1, 3])));
        assert!(IntervalPlugin.sanitize(&json!([4, 3]), &s, None).is_err());
        assert!(IntervalPlugin.sanitize(&json!([-1, 3]), &s, None).is_err());
        assert_eq!(IntervalPlugin.fit(&json!([-5, 20]), &s), Ok(json!([0, 10])));
        assert_eq!(IntervalPlugin.format(&json!([1, 3]), &s), "[1, 3]");
    }
}
