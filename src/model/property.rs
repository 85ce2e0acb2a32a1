//! Property values stored on shapes

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::stencil::PropertyType;

const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// One property value. Complex values are kept in their string encoding,
/// list values parsed from strings are kept as JSON arrays.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum PropertyValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(NaiveDateTime),
    Json(Value),
}

impl PropertyValue {
    /// Null and the empty string
    pub fn is_empty(&self) -> bool {
        match self {
            PropertyValue::Null => true,
            PropertyValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Adjust a value read from JSON to what a property of `kind` stores:
    /// date strings become dates, object values on complex properties become strings.
    pub fn coerce(self, kind: PropertyType) -> PropertyValue {
        match (kind, self) {
            (PropertyType::Date, PropertyValue::String(s)) => parse_date(&s).map_or(PropertyValue::String(s), PropertyValue::Date),
            (k, PropertyValue::Json(v)) if k.is_complex() => PropertyValue::String(v.to_string()),
            (_, value) => value,
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => PropertyValue::Null,
            Value::Bool(b) => PropertyValue::Bool(b),
            Value::Number(n) => n.as_f64().map_or(PropertyValue::Null, PropertyValue::Number),
            Value::String(s) => PropertyValue::String(s),
            other => PropertyValue::Json(other),
        }
    }
}

impl From<PropertyValue> for Value {
    fn from(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Null => Value::Null,
            PropertyValue::Bool(b) => Value::Bool(b),
            // whole numbers print without a fraction
            PropertyValue::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => Value::from(n as i64),
            PropertyValue::Number(n) => Value::from(n),
            PropertyValue::String(s) => Value::String(s),
            PropertyValue::Date(d) => Value::String(d.format(DATE_TIME_FORMATS[0]).to_string()),
            PropertyValue::Json(v) => v,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Number(n)
    }
}

impl From<NaiveDateTime> for PropertyValue {
    fn from(d: NaiveDateTime) -> Self {
        PropertyValue::Date(d)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => Ok(()),
            PropertyValue::String(s) => f.write_str(s),
            other => write!(f, "{}", Value::from(other.clone())),
        }
    }
}
