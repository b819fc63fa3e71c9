//! Tagged value types that flow between SQL synthesis, the DB gateway and
//! JSON reshaping. Kept deliberately small: the core only ever needs to move
//! strings, numbers, bools, datetimes and null through the pipeline.

use serde::Serialize;
use serde_json::Value as Json;

/// A parameter bound into a parameterized SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Str(v)
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Float(v)
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Bool(v)
    }
}

/// A single cell in a row returned by the DB gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 text, passed through verbatim; the gateway collaborator owns
    /// any driver-specific datetime decoding.
    DateTime(String),
    Null,
}

impl Value {
    pub fn into_json(self) -> Json {
        match self {
            Value::String(s) => Json::String(s),
            Value::Int(i) => Json::Number(i.into()),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Bool(b) => Json::Bool(b),
            Value::DateTime(s) => Json::String(s),
            Value::Null => Json::Null,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::DateTime(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// A row returned by the DB gateway: column name (backend identifier) to
/// value, preserving the order the driver returned columns in.
pub type Row = Vec<(String, Value)>;

pub fn row_get<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
    row.iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(column))
        .map(|(_, v)| v)
}
