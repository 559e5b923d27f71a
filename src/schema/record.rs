//! Long-format measurement records
//!
//! The wearable export is a flat table of `{date_time, kind, data}` rows, one
//! row per reading, mixing accelerometer axes with counter signals. Field
//! values arrive in several shapes (numbers, numeric strings, one-element
//! lists, `"7h30m"` durations), so records keep their raw JSON values and
//! are interpreted on demand.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Naive timestamp layouts accepted besides RFC 3339 (interpreted as UTC)
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Measurement kinds the pipeline consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    AccX,
    AccY,
    AccZ,
    SleepTotal,
    Step,
    /// Packed activity row: `[step, calories, sleep_light, sleep_deep, awake]`
    Activity,
    /// Any other measurement (heart rate, SpO2, ...); ignored
    Other,
}

impl RecordKind {
    pub fn parse(kind: &str) -> Self {
        match kind.trim() {
            "acx" => RecordKind::AccX,
            "acy" => RecordKind::AccY,
            "acz" => RecordKind::AccZ,
            "sleep_total" | "Total sleep" => RecordKind::SleepTotal,
            "step" | "Pedometer" => RecordKind::Step,
            "activity" => RecordKind::Activity,
            _ => RecordKind::Other,
        }
    }

    pub fn is_consumed(&self) -> bool {
        !matches!(self, RecordKind::Other)
    }
}

/// One row of the measurement table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Timestamp string, or epoch milliseconds (`time` in device exports)
    #[serde(alias = "time")]
    pub date_time: Value,
    /// Measurement kind (acx, acy, acz, sleep_total, step, activity, ...)
    pub kind: String,
    /// Reading value
    #[serde(default)]
    pub data: Value,
}

impl RawRecord {
    pub fn new(date_time: impl Into<Value>, kind: impl Into<String>, data: impl Into<Value>) -> Self {
        Self {
            date_time: date_time.into(),
            kind: kind.into(),
            data: data.into(),
        }
    }

    pub fn record_kind(&self) -> RecordKind {
        RecordKind::parse(&self.kind)
    }

    /// Interpret `date_time` as a UTC instant
    pub fn timestamp(&self) -> Result<DateTime<Utc>, String> {
        match &self.date_time {
            Value::String(s) => parse_timestamp(s),
            Value::Number(n) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .ok_or_else(|| format!("epoch milliseconds out of range: {}", n)),
            other => Err(format!("unsupported timestamp value {}", other)),
        }
    }

    /// Interpret `data` as a single reading.
    ///
    /// Packed activity rows yield their step count (first element).
    pub fn value(&self) -> Result<f64, String> {
        match (self.record_kind(), &self.data) {
            (RecordKind::Activity, Value::Array(items)) => match items.first() {
                Some(step) => parse_value(step),
                None => Err("empty activity row".to_string()),
            },
            (RecordKind::Activity, other) => Err(format!("activity row is not a list: {}", other)),
            (_, data) => parse_value(data),
        }
    }
}

/// Parse an RFC 3339 or naive `YYYY-MM-DD HH:MM:SS[.f]` timestamp
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("unrecognized timestamp '{}'", s))
}

/// Convert an `"XhYm"` duration (as written by the companion app) to minutes.
/// `"Xh"` and `"Ym"` are accepted too.
pub fn parse_duration_minutes(s: &str) -> Option<f64> {
    let s = s.trim();
    let (hours, rest) = match s.split_once('h') {
        Some((h, rest)) => (h.trim().parse::<u32>().ok()?, rest.trim()),
        None => (0, s),
    };
    let minutes = match rest.strip_suffix('m') {
        Some(m) => m.trim().parse::<u32>().ok()?,
        None if rest.is_empty() && s.contains('h') => 0,
        None => return None,
    };
    let total = hours.checked_mul(60)?.checked_add(minutes)?;
    Some(f64::from(total))
}

fn parse_value(value: &Value) -> Result<f64, String> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .or_else(|| parse_duration_minutes(s)),
        Value::Array(items) if items.len() == 1 => return parse_value(&items[0]),
        Value::Null => return Err("missing value".to_string()),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(format!("non-finite value {}", v)),
        None => Err(format!("non-numeric value {}", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_record_kind_parse() {
        assert_eq!(RecordKind::parse("acx"), RecordKind::AccX);
        assert_eq!(RecordKind::parse("sleep_total"), RecordKind::SleepTotal);
        assert_eq!(RecordKind::parse("Pedometer"), RecordKind::Step);
        assert_eq!(RecordKind::parse("hr"), RecordKind::Other);
        assert!(!RecordKind::parse("spo2").is_consumed());
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 22, 15, 30).unwrap();

        let naive = RawRecord::new("2024-03-01 22:15:30", "acx", 1.0);
        assert_eq!(naive.timestamp().unwrap(), expected);

        let rfc = RawRecord::new("2024-03-01T23:15:30+01:00", "acx", 1.0);
        assert_eq!(rfc.timestamp().unwrap(), expected);

        let fractional = RawRecord::new("2024-03-01 22:15:30.250", "acx", 1.0);
        assert_eq!(
            fractional.timestamp().unwrap(),
            expected + chrono::Duration::milliseconds(250)
        );

        let millis = RawRecord::new(expected.timestamp_millis(), "acx", 1.0);
        assert_eq!(millis.timestamp().unwrap(), expected);

        assert!(RawRecord::new("yesterday", "acx", 1.0).timestamp().is_err());
        assert!(RawRecord::new(json!(true), "acx", 1.0).timestamp().is_err());
    }

    #[test]
    fn test_value_shapes() {
        let at = "2024-03-01 00:00:00";
        assert_eq!(RawRecord::new(at, "acx", -0.25).value().unwrap(), -0.25);
        assert_eq!(RawRecord::new(at, "acx", "1.5").value().unwrap(), 1.5);
        assert_eq!(RawRecord::new(at, "hr", json!([72])).value().unwrap(), 72.0);
        assert_eq!(RawRecord::new(at, "sleep_total", "7h30m").value().unwrap(), 450.0);
        assert_eq!(
            RawRecord::new(at, "activity", json!([120, 35.5, 10, 20, 3])).value().unwrap(),
            120.0
        );

        assert!(RawRecord::new(at, "acx", "abc").value().is_err());
        assert!(RawRecord::new(at, "acx", "NaN").value().is_err());
        assert!(RawRecord::new(at, "acx", json!([1, 2])).value().is_err());
        assert!(RawRecord::new(at, "acx", Value::Null).value().is_err());
        assert!(RawRecord::new(at, "activity", 3).value().is_err());
    }

    #[test]
    fn test_duration_minutes() {
        assert_eq!(parse_duration_minutes("7h30m"), Some(450.0));
        assert_eq!(parse_duration_minutes("0h5m"), Some(5.0));
        assert_eq!(parse_duration_minutes("2h"), Some(120.0));
        assert_eq!(parse_duration_minutes("45m"), Some(45.0));
        assert_eq!(parse_duration_minutes("h30m"), None);
        assert_eq!(parse_duration_minutes("7x"), None);
        assert_eq!(parse_duration_minutes("99999999h0m"), None);
        assert_eq!(parse_duration_minutes("71582788h16m"), None);
        assert_eq!(parse_duration_minutes("71582788h0m"), Some(4_294_967_280.0));
    }

    #[test]
    fn test_oversized_duration_is_rejected() {
        let record = RawRecord::new("2024-03-01 00:00:00", "sleep_total", "99999999h0m");
        assert!(record.value().is_err());
    }

    #[test]
    fn test_deserialize_time_alias() {
        let record: RawRecord =
            serde_json::from_str(r#"{"time": 1709330130000, "kind": "acy", "data": 0.5}"#).unwrap();
        assert_eq!(record.record_kind(), RecordKind::AccY);
        assert_eq!(
            record.timestamp().unwrap(),
            Utc.timestamp_opt(1_709_330_130, 0).unwrap()
        );
    }
}
