use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Column metadata as reported by the analytical engine.
///
/// `type_text` carries the engine's own spelling of the column type
/// (`BIGINT`, `DECIMAL(18,3)`, `VARCHAR[]`, `STRUCT(a INTEGER)`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineColumn {
    pub name: String,
    pub type_text: String,
}

impl EngineColumn {
    pub fn new(name: impl Into<String>, type_text: impl Into<String>) -> Self {
        EngineColumn {
            name: name.into(),
            type_text: type_text.into(),
        }
    }
}

/// A single cell produced by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Interval { months: i32, days: i32, micros: i64 },
    Uuid(Uuid),
    Json(JsonValue),
    List(Vec<EngineValue>),
}

impl EngineValue {
    pub fn is_null(&self) -> bool {
        matches!(self, EngineValue::Null)
    }
}

impl From<&str> for EngineValue {
    fn from(value: &str) -> Self {
        EngineValue::Text(value.to_string())
    }
}

impl From<i64> for EngineValue {
    fn from(value: i64) -> Self {
        EngineValue::Int64(value)
    }
}

impl From<bool> for EngineValue {
    fn from(value: bool) -> Self {
        EngineValue::Bool(value)
    }
}
