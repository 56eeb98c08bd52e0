use chrono::{DateTime, NaiveDateTime, NaiveTime, Timelike, Utc};
use pgwire::api::results::DataRowEncoder;
use pgwire::error::PgWireResult;

use crate::value::EngineValue;

/// Encode one cell into the row encoder. Results are always textual; a
/// `Null` encodes as the wire NULL marker (no bytes).
pub fn encode_value(encoder: &mut DataRowEncoder, value: &EngineValue) -> PgWireResult<()> {
    encoder.encode_field(&text_value(value))
}

/// Textual form of an engine value, matching what a Postgres server would
/// print for the equivalent type.
pub fn text_value(value: &EngineValue) -> Option<String> {
    match value {
        EngineValue::Null => None,
        EngineValue::Bool(b) => Some(if *b { "t" } else { "f" }.to_string()),
        EngineValue::Int16(v) => Some(v.to_string()),
        EngineValue::Int32(v) => Some(v.to_string()),
        EngineValue::Int64(v) => Some(v.to_string()),
        EngineValue::Float32(v) => Some(v.to_string()),
        EngineValue::Float64(v) => Some(v.to_string()),
        EngineValue::Decimal(d) => Some(d.to_string()),
        EngineValue::Text(s) => Some(s.clone()),
        EngineValue::Bytes(b) => Some(format_bytea(b)),
        EngineValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        EngineValue::Time(t) => Some(format_time(t)),
        EngineValue::Timestamp(ts) => Some(format_timestamp(ts)),
        EngineValue::TimestampTz(ts) => Some(format_timestamptz(ts)),
        EngineValue::Interval {
            months,
            days,
            micros,
        } => Some(format!("{months} months {days} days {micros} microseconds")),
        EngineValue::Uuid(u) => Some(u.to_string()),
        EngineValue::Json(v) => serde_json::to_string(v).ok(),
        EngineValue::List(items) => Some(format_array(items)),
    }
}

fn format_bytea(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn format_time(t: &NaiveTime) -> String {
    let base = t.format("%H:%M:%S").to_string();
    with_fraction(base, t.nanosecond() / 1_000)
}

fn format_timestamp(ts: &NaiveDateTime) -> String {
    let base = ts.format("%Y-%m-%d %H:%M:%S").to_string();
    with_fraction(base, ts.and_utc().timestamp_subsec_micros())
}

fn format_timestamptz(ts: &DateTime<Utc>) -> String {
    let mut out = with_fraction(
        ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        ts.timestamp_subsec_micros(),
    );
    out.push_str("+00");
    out
}

fn with_fraction(mut base: String, micros: u32) -> String {
    if micros == 0 {
        return base;
    }
    let mut frac = format!(".{micros:06}");
    while frac.ends_with('0') {
        frac.pop();
    }
    base.push_str(&frac);
    base
}

/// Postgres array literal: `{a,b,c}` with CSV-style member escaping.
fn format_array(items: &[EngineValue]) -> String {
    let members: Vec<String> = items.iter().map(array_member).collect();
    format!("{{{}}}", members.join(","))
}

fn array_member(value: &EngineValue) -> String {
    match text_value(value) {
        None => "NULL".to_string(),
        Some(text) => {
            let needs_quoting = text.is_empty()
                || text.eq_ignore_ascii_case("null")
                || text.chars().any(|c| {
                    matches!(c, ',' | '"' | '\\' | '{' | '}') || c.is_whitespace()
                });
            if needs_quoting {
                let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{escaped}\"")
            } else {
                text
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_bool_and_null() {
        assert_eq!(text_value(&EngineValue::Bool(true)).as_deref(), Some("t"));
        assert_eq!(text_value(&EngineValue::Bool(false)).as_deref(), Some("f"));
        assert_eq!(text_value(&EngineValue::Null), None);
    }

    #[test]
    fn test_decimal_and_bytes() {
        let d = Decimal::from_str("123.450").unwrap();
        assert_eq!(text_value(&EngineValue::Decimal(d)).as_deref(), Some("123.450"));
        assert_eq!(
            text_value(&EngineValue::Bytes(vec![0xde, 0xad, 0x01])).as_deref(),
            Some("\\xdead01")
        );
    }

    #[test]
    fn test_timestamp_fraction_trimming() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_micro_opt(10, 30, 0, 500_000)
            .unwrap();
        assert_eq!(
            text_value(&EngineValue::Timestamp(ts)).as_deref(),
            Some("2024-03-01 10:30:00.5")
        );

        let whole = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(
            text_value(&EngineValue::Timestamp(whole)).as_deref(),
            Some("2024-03-01 10:30:00")
        );
    }

    #[test]
    fn test_interval_form() {
        let v = EngineValue::Interval {
            months: 2,
            days: 14,
            micros: 3_000_000,
        };
        assert_eq!(
            text_value(&v).as_deref(),
            Some("2 months 14 days 3000000 microseconds")
        );
    }

    #[test]
    fn test_array_escaping() {
        let v = EngineValue::List(vec![
            EngineValue::Text("plain".into()),
            EngineValue::Text("with space".into()),
            EngineValue::Text("qu\"ote".into()),
            EngineValue::Null,
            EngineValue::Text(String::new()),
        ]);
        assert_eq!(
            text_value(&v).as_deref(),
            Some("{plain,\"with space\",\"qu\\\"ote\",NULL,\"\"}")
        );
    }
}
