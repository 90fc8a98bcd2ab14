//! Tagged JSON encoding for snapshot values
//!
//! Plain JSON cannot tell a timestamp from a string, so values whose type
//! is not a JSON primitive are written under a reserved wrapper key:
//!
//! ```json
//! {"__jsonclass__": ["datetime", "2024-05-01T12:00:00"]}
//! ```
//!
//! The set of supported kinds is closed: `datetime`, `date`, `time` and
//! `set`. Decoding never fails; a wrapper with an unknown tag or an
//! unreadable representation is kept as the raw object and logged.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde_json::json;

use crate::error::LookoutError;

/// Reserved object key marking a tagged value
pub const CLASS_KEY: &str = "__jsonclass__";

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// A snapshot value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Set(BTreeSet<String>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Name of the wrapper tag for kinds that need one
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Value::DateTime(_) => Some("datetime"),
            Value::Date(_) => Some("date"),
            Value::Time(_) => Some("time"),
            Value::Set(_) => Some("set"),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

/// Encode a value to JSON, wrapping non-primitive kinds
pub fn encode(value: &Value) -> crate::Result<serde_json::Value> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Integer(i) => json!(i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| LookoutError::Codec(format!("cannot encode float {}", f)))?,
        Value::String(s) => json!(s),
        Value::Array(items) => serde_json::Value::Array(
            items.iter().map(encode).collect::<crate::Result<Vec<_>>>()?,
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key.clone(), encode(item)?);
            }
            serde_json::Value::Object(out)
        }
        Value::DateTime(dt) => wrap("datetime", json!(format_datetime(dt))),
        Value::Date(d) => wrap("date", json!(d.format(DATE_FORMAT).to_string())),
        Value::Time(t) => wrap("time", json!(format_time(t))),
        Value::Set(items) => wrap("set", json!(items)),
    })
}

/// Decode JSON produced by [`encode`]
pub fn decode(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::Array(items.into_iter().map(decode).collect()),
        serde_json::Value::Object(map) => {
            if map.contains_key(CLASS_KEY) {
                match unwrap_tagged(&map) {
                    Ok(value) => return value,
                    Err(e) => {
                        tracing::warn!("Keeping raw tagged value: {}", e);
                    }
                }
            }
            Value::Object(map.into_iter().map(|(k, v)| (k, decode(v))).collect())
        }
    }
}

/// Format a timestamp the way it is stored: seconds precision, with
/// microseconds appended only when present
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.nanosecond() == 0 {
        dt.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

fn format_time(t: &NaiveTime) -> String {
    if t.nanosecond() == 0 {
        t.format("%H:%M:%S").to_string()
    } else {
        t.format("%H:%M:%S%.6f").to_string()
    }
}

/// Parse a stored timestamp; `T` or a space may separate date and time
pub fn parse_datetime(repr: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(repr, fmt).ok())
}

fn wrap(tag: &str, repr: serde_json::Value) -> serde_json::Value {
    json!({ CLASS_KEY: [tag, repr] })
}

fn unwrap_tagged(map: &serde_json::Map<String, serde_json::Value>) -> Result<Value, String> {
    let parts = map
        .get(CLASS_KEY)
        .and_then(|v| v.as_array())
        .filter(|parts| parts.len() == 2)
        .ok_or_else(|| format!("{} must be a two-element array", CLASS_KEY))?;
    let tag = parts[0]
        .as_str()
        .ok_or_else(|| "tag is not a string".to_string())?;
    let repr = &parts[1];

    match tag {
        "datetime" => repr_str(repr)
            .and_then(|s| parse_datetime(s).ok_or_else(|| format!("bad datetime {:?}", s)))
            .map(Value::DateTime),
        "date" => repr_str(repr)
            .and_then(|s| {
                NaiveDate::parse_from_str(s, DATE_FORMAT)
                    .ok()
                    .or_else(|| parse_datetime(s).map(|dt| dt.date()))
                    .ok_or_else(|| format!("bad date {:?}", s))
            })
            .map(Value::Date),
        "time" => repr_str(repr)
            .and_then(|s| {
                NaiveTime::parse_from_str(s, TIME_FORMAT)
                    .ok()
                    .or_else(|| parse_datetime(s).map(|dt| dt.time()))
                    .ok_or_else(|| format!("bad time {:?}", s))
            })
            .map(Value::Time),
        "set" => {
            let items = repr
                .as_array()
                .ok_or_else(|| "set repr is not an array".to_string())?;
            items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| format!("set member {} is not a string", item))
                })
                .collect::<Result<BTreeSet<_>, _>>()
                .map(Value::Set)
        }
        other => Err(format!("unknown tag {:?}", other)),
    }
}

fn repr_str(repr: &serde_json::Value) -> Result<&str, String> {
    repr.as_str()
        .ok_or_else(|| format!("repr {} is not a string", repr))
}
