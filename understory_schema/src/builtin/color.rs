// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use serde_json::{Map, json};

use crate::error::SanitizeError;
use crate::kind::TypeTag;
use crate::plugin::{ControlPlugin, Normalized};
use crate::value::{Settings, Value, as_f64, number_value, round_to, setting_flag};

#[derive(Copy, Clone, Debug, PartialEq)]
struct Rgba {
    r: u8,
    g: u8,
    b: u8,
    a: f64,
}

/// How a color value is written back.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ColorFormat {
    Hex,
    Rgb,
    Object,
}

impl ColorFormat {
    fn as_str(self) -> &'static str {
        match self {
            Self::Hex => "hex",
            Self::Rgb => "rgb",
            Self::Object => "object",
        }
    }

    fn from_settings(settings: &Settings) -> Self {
        match settings.get("format").and_then(Value::as_str) {
            Some("rgb") => Self::Rgb,
            Some("object") => Self::Object,
            _ => Self::Hex,
        }
    }
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn parse_hex(s: &str) -> Option<(Rgba, bool)> {
    let digits = s.strip_prefix('#')?.as_bytes();
    let nibbles: Option<Vec<u8>> = digits.iter().map(|&c| hex_digit(c)).collect();
    let n = nibbles?;
    let (channels, has_alpha): (Vec<u8>, bool) = match n.len() {
        3 | 4 => (n.iter().map(|d| d * 17).collect(), n.len() == 4),
        6 | 8 => (n.chunks(2).map(|p| p[0] * 16 + p[1]).collect(), n.len() == 8),
        _ => return None,
    };
    let a = if has_alpha {
        round_to(f64::from(channels[3]) / 255.0, 3)
    } else {
        1.0
    };
    Some((
        Rgba {
            r: channels[0],
            g: channels[1],
            b: channels[2],
            a,
        },
        has_alpha,
    ))
}

fn channel(v: f64) -> Option<u8> {
    if !(0.0..=255.0).contains(&v) {
        return None;
    }
    #[expect(clippy::cast_possible_truncation, reason = "range checked above")]
    let c = v.round() as u8;
    Some(c)
}

fn alpha(v: f64) -> Option<f64> {
    (0.0..=1.0).contains(&v).then_some(v)
}

fn parse_rgb_fn(s: &str) -> Option<(Rgba, bool)> {
    let s = s.trim();
    let inner = s
        .strip_prefix("rgba(")
        .or_else(|| s.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let parts: Vec<f64> = inner
        .split(',')
        .map(|p| p.trim().parse::<f64>().ok())
        .collect::<Option<_>>()?;
    let (r, g, b) = match parts.as_slice() {
        [r, g, b] | [r, g, b, _] => (channel(*r)?, channel(*g)?, channel(*b)?),
        _ => return None,
    };
    let (a, has_alpha) = match parts.get(3) {
        Some(a) => (alpha(*a)?, true),
        None => (1.0, false),
    };
    Some((Rgba { r, g, b, a }, has_alpha))
}

fn parse_object(map: &Map<String, Value>) -> Option<(Rgba, bool)> {
    let component = |key: &str| map.get(key).and_then(as_f64).and_then(channel);
    let rgba = Rgba {
        r: component("r")?,
        g: component("g")?,
        b: component("b")?,
        a: match map.get("a") {
            Some(a) => alpha(as_f64(a)?)?,
            None => 1.0,
        },
    };
    Some((rgba, map.contains_key("a")))
}

fn parse_color(value: &Value) -> Option<(Rgba, bool, ColorFormat)> {
    match value {
        Value::String(s) if s.starts_with('#') => {
            parse_hex(s).map(|(c, a)| (c, a, ColorFormat::Hex))
        }
        Value::String(s) => parse_rgb_fn(s).map(|(c, a)| (c, a, ColorFormat::Rgb)),
        Value::Object(map) => parse_object(map).map(|(c, a)| (c, a, ColorFormat::Object)),
        _ => None,
    }
}

fn to_hex(c: Rgba, has_alpha: bool) -> String {
    if has_alpha {
        let a = channel(c.a * 255.0).unwrap_or(255);
        format!("#{:02x}{:02x}{:02x}{a:02x}", c.r, c.g, c.b)
    } else {
        format!("#{:02x}{:02x}{:02x}", c.r, c.g, c.b)
    }
}

fn emit(c: Rgba, has_alpha: bool, format: ColorFormat) -> Value {
    match format {
        ColorFormat::Hex => Value::String(to_hex(c, has_alpha)),
        ColorFormat::Rgb if has_alpha => {
            Value::String(format!("rgba({}, {}, {}, {})", c.r, c.g, c.b, c.a))
        }
        ColorFormat::Rgb => Value::String(format!("rgb({}, {}, {})", c.r, c.g, c.b)),
        ColorFormat::Object if has_alpha => {
            json!({ "r": c.r, "g": c.g, "b": c.b, "a": number_value(c.a) })
        }
        ColorFormat::Object => json!({ "r": c.r, "g": c.g, "b": c.b }),
    }
}

/// Colors written as hex strings, `rgb()`/`rgba()` strings or `{r, g, b, a?}`
/// objects.
///
/// Normalization records the declared `format` and `hasAlpha`; committed
/// values are written back in that format.
#[derive(Copy, Clone, Debug, Default)]
pub struct ColorPlugin;

impl ControlPlugin for ColorPlugin {
    fn type_tag(&self) -> TypeTag {
        TypeTag::COLOR
    }

    fn matches(&self, value: &Value, _settings: &Settings) -> bool {
        parse_color(value).is_some()
    }

    fn normalize(&self, value: Value, mut settings: Settings) -> Normalized {
        let Some((color, has_alpha, format)) = parse_color(&value) else {
            return Normalized { value, settings };
        };
        let format = match settings.get("format") {
            Some(Value::String(_)) => ColorFormat::from_settings(&settings),
            _ => format,
        };
        let has_alpha = settings
            .get("hasAlpha")
            .and_then(Value::as_bool)
            .unwrap_or(has_alpha);
        settings.insert("format".into(), Value::from(format.as_str()));
        settings.insert("hasAlpha".into(), Value::Bool(has_alpha));
        Normalized {
            value: emit(color, has_alpha, format),
            settings,
        }
    }

    fn sanitize(
        &self,
        value: &Value,
        settings: &Settings,
        _previous: Option<&Value>,
    ) -> Result<Value, SanitizeError> {
        let (color, _, _) = parse_color(value).ok_or(SanitizeError::wrong_shape("a color"))?;
        let has_alpha = setting_flag(settings, "hasAlpha");
        let color = if has_alpha { color } else { Rgba { a: 1.0, ..color } };
        Ok(emit(color, has_alpha, ColorFormat::from_settings(settings)))
    }

    fn format(&self, value: &Value, settings: &Settings) -> String {
        parse_color(value)
            .map(|(c, _, _)| to_hex(c, setting_flag(settings, "hasAlpha")))
            .unwrap_or_default()
    }
}
