//! Adapter for converting measurement records into a typed session
//!
//! Records that cannot be interpreted are skipped and reported through the
//! observer; a single bad row never aborts the batch.

use crate::error::ComputeError;
use crate::observer::{Observer, PipelineEvent, Stage};
use crate::schema::record::{RawRecord, RecordKind};
use crate::types::{ChannelSample, SessionInput, SleepReading, StepReading};
use chrono::{DateTime, Duration, Utc};

/// Adapter for converting raw records to session input
#[derive(Debug, Clone, Default)]
pub struct RecordAdapter {
    time_offset: Duration,
}

impl RecordAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift every record timestamp by a fixed offset, for device clocks
    /// known to disagree with the reference clock
    pub fn with_time_offset_ms(offset_ms: i64) -> Self {
        Self {
            time_offset: Duration::milliseconds(offset_ms),
        }
    }

    /// Parse a JSON string containing an array of records
    pub fn parse_array(json: &str) -> Result<Vec<RawRecord>, ComputeError> {
        let records: Vec<RawRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (newline-delimited JSON) containing records
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawRecord>, ComputeError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Build a session from records.
    ///
    /// Unknown kinds are ignored. Malformed records are skipped with a
    /// `RecordSkipped` event. Samples of each signal are stably sorted by time.
    pub fn to_session(&self, records: &[RawRecord], observer: &dyn Observer) -> SessionInput {
        let mut session = SessionInput::default();
        let mut accepted = 0;

        for (index, record) in records.iter().enumerate() {
            let kind = record.record_kind();
            if !kind.is_consumed() {
                continue;
            }
            let (timestamp, value) = match self.interpret(index, record) {
                Ok(parsed) => parsed,
                Err(e) => {
                    observer.observe(&PipelineEvent::RecordSkipped {
                        record: index,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match kind {
                RecordKind::AccX => session.x.push(ChannelSample::new(timestamp, value)),
                RecordKind::AccY => session.y.push(ChannelSample::new(timestamp, value)),
                RecordKind::AccZ => session.z.push(ChannelSample::new(timestamp, value)),
                RecordKind::SleepTotal => session.sleep.push(SleepReading {
                    timestamp,
                    cumulative_minutes: value,
                }),
                RecordKind::Step | RecordKind::Activity => session.steps.push(StepReading {
                    timestamp,
                    step_count: value,
                }),
                RecordKind::Other => continue,
            }
            accepted += 1;
        }

        session.x.sort_by_key(|s| s.timestamp);
        session.y.sort_by_key(|s| s.timestamp);
        session.z.sort_by_key(|s| s.timestamp);
        session.sleep.sort_by_key(|r| r.timestamp);
        session.steps.sort_by_key(|r| r.timestamp);

        observer.observe(&PipelineEvent::StageCompleted {
            stage: Stage::Ingest,
            count: accepted,
        });
        session
    }

    /// Check every consumed record without building a session
    pub fn validate_records(&self, records: &[RawRecord]) -> Vec<ValidationResult> {
        records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.record_kind().is_consumed())
            .filter_map(|(index, record)| {
                self.interpret(index, record)
                    .err()
                    .map(|error| ValidationResult {
                        index,
                        kind: record.kind.clone(),
                        error,
                    })
            })
            .collect()
    }

    fn interpret(
        &self,
        index: usize,
        record: &RawRecord,
    ) -> Result<(DateTime<Utc>, f64), ComputeError> {
        let malformed = |reason: String| ComputeError::DataFormat {
            record: index,
            reason,
        };
        let timestamp = record.timestamp().map_err(malformed)?;
        let value = record.value().map_err(malformed)?;
        Ok((timestamp + self.time_offset, value))
    }
}

/// A record that failed validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub kind: String,
    pub error: ComputeError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RecordingObserver;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_ndjson() -> &'static str {
        r#"{"date_time": "2024-03-01 08:00:00.200", "kind": "acx", "data": 0.1}
{"date_time": "2024-03-01 08:00:00.000", "kind": "acx", "data": 0.2}
{"date_time": "2024-03-01 08:00:00.000", "kind": "acy", "data": "0.3"}

{"date_time": "2024-03-01 08:00:00.000", "kind": "acz", "data": [0.4]}
{"date_time": "2024-03-01 08:00:00.000", "kind": "hr", "data": [72]}
{"date_time": "2024-03-01 09:00:00", "kind": "sleep_total", "data": "0h45m"}
{"date_time": "2024-03-01 09:30:00", "kind": "step", "data": 18}
{"date_time": "not a time", "kind": "acx", "data": 0.5}
{"date_time": "2024-03-01 08:00:01", "kind": "acy", "data": "n/a"}"#
    }

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let records = RecordAdapter::parse_ndjson(sample_ndjson()).unwrap();
        assert_eq!(records.len(), 9);
        assert_eq!(records[4].kind, "hr");
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let result = RecordAdapter::parse_ndjson("{\"kind\": \"acx\"\nnot json");
        match result {
            Err(ComputeError::ParseError(msg)) => assert!(msg.contains("line 1")),
            other => panic!("expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_array() {
        let json = r#"[{"time": 1709280000000, "kind": "acz", "data": 1.0}]"#;
        let records = RecordAdapter::parse_array(json).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_kind(), RecordKind::AccZ);
    }

    #[test]
    fn test_to_session_sorts_and_skips() {
        let records = RecordAdapter::parse_ndjson(sample_ndjson()).unwrap();
        let observer = RecordingObserver::new();
        let session = RecordAdapter::new().to_session(&records, &observer);

        let base = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        assert_eq!(session.x.len(), 2);
        assert_eq!(session.x[0], ChannelSample::new(base, 0.2));
        assert_eq!(session.x[1].value, 0.1);
        assert_eq!(session.y, vec![ChannelSample::new(base, 0.3)]);
        assert_eq!(session.z, vec![ChannelSample::new(base, 0.4)]);
        assert_eq!(session.sleep.len(), 1);
        assert_eq!(session.sleep[0].cumulative_minutes, 45.0);
        assert_eq!(session.steps[0].step_count, 18.0);

        assert_eq!(observer.skipped_records(), 2);
        let events = observer.events();
        assert!(events.contains(&PipelineEvent::StageCompleted {
            stage: Stage::Ingest,
            count: 6,
        }));
    }

    #[test]
    fn test_time_offset_applied() {
        let records = vec![RawRecord::new("2024-03-01 08:00:00", "acx", 1.0)];
        let adapter = RecordAdapter::with_time_offset_ms(-3_600_000);
        let session = adapter.to_session(&records, &RecordingObserver::new());
        assert_eq!(
            session.x[0].timestamp,
            Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_activity_rows_feed_steps() {
        let records = vec![RawRecord::new(
            "2024-03-01 08:00:00",
            "activity",
            json!([42, 10.5, 0, 0, 1]),
        )];
        let session = RecordAdapter::new().to_session(&records, &RecordingObserver::new());
        assert_eq!(session.steps.len(), 1);
        assert_eq!(session.steps[0].step_count, 42.0);
    }

    #[test]
    fn test_validate_records() {
        let records = RecordAdapter::parse_ndjson(sample_ndjson()).unwrap();
        let results = RecordAdapter::new().validate_records(&records);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].index, 7);
        assert!(matches!(
            results[0].error,
            ComputeError::DataFormat { record: 7, .. }
        ));
        assert_eq!(results[1].kind, "acy");
    }
}
