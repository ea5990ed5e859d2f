use std::fmt;

use serde_json::Value;
use tracing::debug;

/// A scalar as scraped from a page or API payload, before coercion.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RawValue {
    #[default]
    Missing,
    Text(String),
    Int(i64),
    Float(f64),
}

impl RawValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            RawValue::Missing => true,
            RawValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for RawValue {
    fn from(text: &str) -> Self {
        RawValue::Text(text.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(text: String) -> Self {
        RawValue::Text(text)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        RawValue::Int(value.into())
    }
}

impl From<u32> for RawValue {
    fn from(value: u32) -> Self {
        RawValue::Int(value.into())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Float(value)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(text) => RawValue::Text(text.clone()),
            Value::Number(number) => number
                .as_i64()
                .map(RawValue::Int)
                .or_else(|| number.as_f64().map(RawValue::Float))
                .unwrap_or_default(),
            Value::Bool(flag) => RawValue::Int(*flag as i64),
            Value::Null | Value::Array(_) | Value::Object(_) => RawValue::Missing,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Missing => f.write_str("<missing>"),
            RawValue::Text(text) => write!(f, "{text:?}"),
            RawValue::Int(value) => write!(f, "{value}"),
            RawValue::Float(value) => write!(f, "{value}"),
        }
    }
}

/// Anything that may hold an integer.
pub trait IntCandidate {
    fn to_int(&self) -> Option<i64>;
}

impl IntCandidate for str {
    fn to_int(&self) -> Option<i64> {
        let text = self.trim();
        let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        text.parse().ok()
    }
}

impl IntCandidate for String {
    fn to_int(&self) -> Option<i64> {
        self.as_str().to_int()
    }
}

macro_rules! int_candidate {
    ($($ty:ty),*) => {
        $(impl IntCandidate for $ty {
            fn to_int(&self) -> Option<i64> {
                i64::try_from(*self).ok()
            }
        })*
    };
}

int_candidate!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl IntCandidate for f64 {
    fn to_int(&self) -> Option<i64> {
        // Truncates toward zero; out-of-range values are rejected rather than saturated.
        let truncated = self.trunc();
        (truncated.is_finite() && truncated.abs() < i64::MAX as f64).then_some(truncated as i64)
    }
}

impl IntCandidate for f32 {
    fn to_int(&self) -> Option<i64> {
        f64::from(*self).to_int()
    }
}

impl IntCandidate for bool {
    fn to_int(&self) -> Option<i64> {
        Some(*self as i64)
    }
}

impl<T: IntCandidate + ?Sized> IntCandidate for &T {
    fn to_int(&self) -> Option<i64> {
        (**self).to_int()
    }
}

impl<T: IntCandidate> IntCandidate for Option<T> {
    fn to_int(&self) -> Option<i64> {
        self.as_ref()?.to_int()
    }
}

impl IntCandidate for Value {
    fn to_int(&self) -> Option<i64> {
        RawValue::from(self).to_int()
    }
}

impl IntCandidate for RawValue {
    fn to_int(&self) -> Option<i64> {
        match self {
            RawValue::Missing => None,
            RawValue::Text(text) => text.to_int(),
            RawValue::Int(value) => Some(*value),
            RawValue::Float(value) => value.to_int(),
        }
    }
}

/// Best-effort integer conversion; never fails, falls back to `default_value`.
///
/// Strings must be whole numbers: `"12.3"` is not an integer here.
pub fn try_int<C: IntCandidate + ?Sized>(candidate: &C, default_value: i64) -> i64 {
    match candidate.to_int() {
        Some(value) => value,
        None => {
            debug!(default_value, "not an integer, using default");
            default_value
        }
    }
}
