//! Dynamic parameter and cell values

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{NativeType, RowSet};

/// Accepted naive date-time layouts, tried in order
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A value bound to a parameter, a table-valued parameter cell or a result cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int64(i64),
    Int32(i32),
    Int16(i16),
    Byte(u8),
    Bool(bool),
    String(String),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Decimal(Decimal),
    Float(f64),
    Binary(Vec<u8>),
    Guid(Uuid),
    Table(RowSet),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type label used in error messages
    pub fn type_label(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int64(_) => "Int64",
            Value::Int32(_) => "Int32",
            Value::Int16(_) => "Int16",
            Value::Byte(_) => "Byte",
            Value::Bool(_) => "Bool",
            Value::String(_) => "String",
            Value::DateTime(_) => "DateTime",
            Value::DateTimeOffset(_) => "DateTimeOffset",
            Value::Decimal(_) => "Decimal",
            Value::Float(_) => "Float",
            Value::Binary(_) => "Binary",
            Value::Guid(_) => "Guid",
            Value::Table(_) => "Table",
        }
    }

    /// Exact type compatibility with a native type.
    ///
    /// Null matches every type; nullability is checked separately. `Object`
    /// accepts any value and `Xml` is carried as a string.
    pub fn matches(&self, target: NativeType) -> bool {
        match (self, target) {
            (Value::Null, _) | (_, NativeType::Object) => true,
            (Value::Int64(_), NativeType::Int64)
            | (Value::Int32(_), NativeType::Int32)
            | (Value::Int16(_), NativeType::Int16)
            | (Value::Byte(_), NativeType::Byte)
            | (Value::Bool(_), NativeType::Bool)
            | (Value::String(_), NativeType::String)
            | (Value::String(_), NativeType::Xml)
            | (Value::DateTime(_), NativeType::DateTime)
            | (Value::DateTimeOffset(_), NativeType::DateTimeOffset)
            | (Value::Decimal(_), NativeType::Decimal)
            | (Value::Float(_), NativeType::Float)
            | (Value::Binary(_), NativeType::Binary)
            | (Value::Guid(_), NativeType::Guid)
            | (Value::Table(_), NativeType::Table) => true,
            _ => false,
        }
    }

    /// Best-effort conversion to a native type; `None` when no safe
    /// conversion exists.
    pub fn coerce_to(&self, target: NativeType) -> Option<Value> {
        if self.matches(target) {
            return Some(self.clone());
        }
        match target {
            NativeType::Int64 => self.to_i64_exact().map(Value::Int64),
            NativeType::Int32 => self
                .to_i64_exact()
                .and_then(|v| i32::try_from(v).ok())
                .map(Value::Int32),
            NativeType::Int16 => self
                .to_i64_exact()
                .and_then(|v| i16::try_from(v).ok())
                .map(Value::Int16),
            NativeType::Byte => self
                .to_i64_exact()
                .and_then(|v| u8::try_from(v).ok())
                .map(Value::Byte),
            NativeType::Bool => self.to_bool().map(Value::Bool),
            NativeType::String | NativeType::Xml => match self {
                Value::Binary(_) | Value::Table(_) => None,
                _ => self.text().map(|text| Value::String(text.into_owned())),
            },
            NativeType::DateTime => match self {
                Value::String(s) => parse_date_time(s).map(Value::DateTime),
                Value::DateTimeOffset(d) => Some(Value::DateTime(d.naive_utc())),
                _ => None,
            },
            NativeType::DateTimeOffset => match self {
                Value::String(s) => parse_date_time_offset(s).map(Value::DateTimeOffset),
                Value::DateTime(d) => Some(Value::DateTimeOffset(d.and_utc().fixed_offset())),
                _ => None,
            },
            NativeType::Decimal => match self {
                Value::Int64(v) => Some(Decimal::from(*v)),
                Value::Int32(v) => Some(Decimal::from(*v)),
                Value::Int16(v) => Some(Decimal::from(*v)),
                Value::Byte(v) => Some(Decimal::from(*v)),
                Value::Float(v) => Decimal::try_from(*v).ok(),
                Value::String(s) => s.trim().parse::<Decimal>().ok(),
                _ => None,
            }
            .map(Value::Decimal),
            NativeType::Float => match self {
                Value::Int64(v) => Some(*v as f64),
                Value::Int32(v) => Some(f64::from(*v)),
                Value::Int16(v) => Some(f64::from(*v)),
                Value::Byte(v) => Some(f64::from(*v)),
                Value::Decimal(d) => d.to_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .map(Value::Float),
            NativeType::Binary => match self {
                Value::String(s) => {
                    let trimmed = s.trim();
                    let digits = trimmed
                        .strip_prefix("0x")
                        .or_else(|| trimmed.strip_prefix("0X"))
                        .unwrap_or(trimmed);
                    hex::decode(digits).ok().map(Value::Binary)
                }
                _ => None,
            },
            NativeType::Guid => match self {
                Value::String(s) => Uuid::parse_str(s.trim()).ok().map(Value::Guid),
                _ => None,
            },
            NativeType::Table | NativeType::Object => None,
        }
    }

    /// String form used by pattern and length checks
    pub fn text(&self) -> Option<Cow<'_, str>> {
        let owned = match self {
            Value::Null | Value::Table(_) => return None,
            Value::String(s) => return Some(Cow::Borrowed(s)),
            Value::Int64(v) => v.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::Int16(v) => v.to_string(),
            Value::Byte(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            Value::DateTime(d) => d.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Value::DateTimeOffset(d) => d.to_rfc3339(),
            Value::Decimal(d) => d.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Binary(bytes) => hex::encode(bytes),
            Value::Guid(g) => g.hyphenated().to_string(),
        };
        Some(Cow::Owned(owned))
    }

    /// Length measured against a maximum length constraint: characters for
    /// text, bytes for binary values.
    pub fn measured_length(&self) -> Option<usize> {
        match self {
            Value::Binary(bytes) => Some(bytes.len()),
            _ => self.text().map(|text| text.chars().count()),
        }
    }

    /// Integer coercion used by numeric range checks; fractional values are
    /// rounded.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Value::Float(v) => float_to_i64(v.round()),
            Value::Decimal(d) => d.round().to_i64(),
            Value::String(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().and_then(|v| float_to_i64(v.round())))
            }
            _ => self.to_i64_exact(),
        }
    }

    fn to_i64_exact(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int16(v) => Some(i64::from(*v)),
            Value::Byte(v) => Some(i64::from(*v)),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Float(v) if v.fract() == 0.0 => float_to_i64(*v),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int64(_) | Value::Int32(_) | Value::Int16(_) | Value::Byte(_) => {
                self.to_i64_exact().map(|v| v != 0)
            }
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
                    Some(true)
                } else if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Converts to `T`, coercing where a safe conversion exists
    pub fn to<T: FromValue>(&self) -> Option<T> {
        T::from_value(self)
    }

    /// JSON rendering; decimals, dates, GUIDs and binary values become strings
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null => Json::Null,
            Value::Int64(v) => Json::from(*v),
            Value::Int32(v) => Json::from(*v),
            Value::Int16(v) => Json::from(*v),
            Value::Byte(v) => Json::from(*v),
            Value::Bool(v) => Json::Bool(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Table(rows) => rows.to_json(),
            other => other
                .text()
                .map(|text| Json::String(text.into_owned()))
                .unwrap_or(Json::Null),
        }
    }

    /// Value for a parsed JSON scalar; nested arrays and objects are kept as
    /// their JSON text.
    pub fn from_json(json: &serde_json::Value) -> Value {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(v) => Value::Bool(*v),
            Json::Number(n) => match n.as_i64() {
                Some(v) => Value::Int64(v),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            Json::String(s) => Value::String(s.clone()),
            nested => Value::String(nested.to_string()),
        }
    }
}

fn float_to_i64(v: f64) -> Option<i64> {
    if v.is_finite() && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

fn parse_date_time(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(with_offset.naive_utc());
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn parse_date_time_offset(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .or_else(|| parse_date_time(s).map(|naive| naive.and_utc().fixed_offset()))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Table(rows) => write!(f, "{} ({} rows)", rows.type_name(), rows.len()),
            other => match other.text() {
                Some(text) => f.write_str(&text),
                None => Ok(()),
            },
        }
    }
}

/// Conversion out of a [`Value`]
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! from_value_via {
    ($ty:ty, $native:ident, $variant:ident) => {
        impl FromValue for $ty {
            fn from_value(value: &Value) -> Option<Self> {
                match value.coerce_to(NativeType::$native)? {
                    Value::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

from_value_via!(i64, Int64, Int64);
from_value_via!(i32, Int32, Int32);
from_value_via!(i16, Int16, Int16);
from_value_via!(u8, Byte, Byte);
from_value_via!(bool, Bool, Bool);
from_value_via!(String, String, String);
from_value_via!(NaiveDateTime, DateTime, DateTime);
from_value_via!(DateTime<FixedOffset>, DateTimeOffset, DateTimeOffset);
from_value_via!(Decimal, Decimal, Decimal);
from_value_via!(f64, Float, Float);
from_value_via!(Vec<u8>, Binary, Binary);
from_value_via!(Uuid, Guid, Guid);
from_value_via!(RowSet, Table, Table);

impl FromValue for f32 {
    fn from_value(value: &Value) -> Option<Self> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

macro_rules! value_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    };
}

value_from!(i64, Int64);
value_from!(i32, Int32);
value_from!(i16, Int16);
value_from!(u8, Byte);
value_from!(bool, Bool);
value_from!(String, String);
value_from!(NaiveDateTime, DateTime);
value_from!(DateTime<FixedOffset>, DateTimeOffset);
value_from!(Decimal, Decimal);
value_from!(f64, Float);
value_from!(Vec<u8>, Binary);
value_from!(Uuid, Guid);
value_from!(RowSet, Table);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::String(v.clone())
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTimeOffset(v.fixed_offset())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
