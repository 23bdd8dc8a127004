// Loosely-typed configuration value for constructing and retuning a control loop
// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

/// A configuration value with the recognized loop fields, each already coerced to a number.
///
/// `None` means the field was absent. [`LoopParams::from_config`](crate::params::LoopParams::from_config)
/// turns absent fields into NaN, while [`LoopParams::apply`](crate::params::LoopParams::apply)
/// leaves the corresponding parameter untouched.
///
/// With the `serde` feature, every field deserializes leniently: numbers pass through, booleans
/// become 1 or 0, `null` and blank strings become 0, numeric strings are parsed, and anything else
/// becomes NaN. The descriptive parameter names are accepted as aliases of the short ones.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoopConfig {
    /// Target value
    #[cfg_attr(feature = "serde", serde(default, with = "coerce"))]
    pub setpoint: Option<f64>,

    /// Non-zero enables the loop
    #[cfg_attr(feature = "serde", serde(default, with = "coerce", alias = "enabled"))]
    pub enable: Option<f64>,

    /// Proportional band
    #[cfg_attr(
        feature = "serde",
        serde(default, with = "coerce", alias = "proportional_band")
    )]
    pub pb: Option<f64>,

    /// Integral time in seconds
    #[cfg_attr(
        feature = "serde",
        serde(default, with = "coerce", alias = "integral_time")
    )]
    pub ti: Option<f64>,

    /// Derivative time in seconds
    #[cfg_attr(
        feature = "serde",
        serde(default, with = "coerce", alias = "derivative_time")
    )]
    pub td: Option<f64>,

    /// Steady-state power at the setpoint
    #[cfg_attr(feature = "serde", serde(default, with = "coerce"))]
    pub integral_default: Option<f64>,

    /// Derivative smoothing factor
    #[cfg_attr(
        feature = "serde",
        serde(default, with = "coerce", alias = "smoothing_factor")
    )]
    pub smooth_factor: Option<f64>,

    /// Longest accepted sample interval in seconds
    #[cfg_attr(feature = "serde", serde(default, with = "coerce"))]
    pub max_interval: Option<f64>,

    /// Output used when the loop is disabled or the power is invalid
    #[cfg_attr(
        feature = "serde",
        serde(default, with = "coerce", alias = "disabled_output")
    )]
    pub disabled_op: Option<f64>,
}

/// Errors raised while reading a [`LoopConfig`] from text.
#[cfg(feature = "serde")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The text is not a JSON object with the expected shape
    #[error("malformed loop configuration: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(feature = "serde")]
impl LoopConfig {
    /// Parses a JSON object, coercing every recognized field to a number. Unrecognized fields
    /// are ignored.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parses an already-decoded JSON value
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Lenient number coercion for configuration fields
#[cfg(feature = "serde")]
mod coerce {
    use core::fmt;

    use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
    use serde::{Deserializer, Serializer};

    /// Coerces text the way a loosely-typed configuration front-end would: surrounding whitespace
    /// is ignored, blank text is zero, unparsable text is NaN.
    pub(super) fn coerce_str(text: &str) -> f64 {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            0.0
        } else {
            trimmed.parse().unwrap_or(f64::NAN)
        }
    }

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(number) => serializer.serialize_some(number),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        deserializer.deserialize_any(NumberVisitor).map(Some)
    }

    struct NumberVisitor;

    impl<'de> Visitor<'de> for NumberVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a value coercible to a number")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<f64, E> {
            Ok(if v { 1.0 } else { 0.0 })
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            Ok(coerce_str(v))
        }

        fn visit_unit<E: de::Error>(self) -> Result<f64, E> {
            Ok(0.0)
        }

        fn visit_none<E: de::Error>(self) -> Result<f64, E> {
            Ok(0.0)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<f64, D::Error> {
            deserializer.deserialize_any(self)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<f64, A::Error> {
            while seq.next_element::<IgnoredAny>()?.is_some() {}
            Ok(f64::NAN)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<f64, A::Error> {
            while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
            Ok(f64::NAN)
        }
    }

}
