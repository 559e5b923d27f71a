//! Core types for the Synheart Actigraph pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw per-axis channels, synchronized triples, the resampled
//! accelerometer stream, time intervals, and the categorized activity timeline.

use crate::error::ComputeError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Accelerometer axis label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

/// One scalar reading on one axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl ChannelSample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Time-ordered samples for a single axis
pub type Channel = Vec<ChannelSample>;

/// Index-aligned reading across all three axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncedTriple {
    pub timestamp_x: DateTime<Utc>,
    pub timestamp_y: DateTime<Utc>,
    pub timestamp_z: DateTime<Utc>,
    pub value_x: f64,
    pub value_y: f64,
    pub value_z: f64,
}

impl SyncedTriple {
    pub fn from_samples(x: ChannelSample, y: ChannelSample, z: ChannelSample) -> Self {
        Self {
            timestamp_x: x.timestamp,
            timestamp_y: y.timestamp,
            timestamp_z: z.timestamp,
            value_x: x.value,
            value_y: y.value,
            value_z: z.value,
        }
    }
}

/// Sample on the evenly spaced synthetic grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResampledSample {
    pub timestamp: DateTime<Utc>,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
}

impl ResampledSample {
    /// Euclidean norm of the three axes
    pub fn magnitude(&self) -> f64 {
        (self.ax * self.ax + self.ay * self.ay + self.az * self.az).sqrt()
    }
}

/// Row of the resampled accelerometer table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelerometerRow {
    pub timestamp: DateTime<Utc>,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    /// Euclidean norm of (ax, ay, az)
    pub magnitude: f64,
    /// Index of the classification bucket (epoch seconds / bucket seconds)
    pub bin_index: i64,
}

/// Closed time range [start, end]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeInterval {
    /// Create an interval, swapping the bounds if they arrive reversed
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// True when the interval covers a single instant
    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }

    /// Closed containment test
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Acceleration-derived activity category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Rest,
    #[serde(rename = "low active", alias = "low_active")]
    LowActive,
    #[serde(rename = "high active", alias = "high_active")]
    HighActive,
}

impl ActivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Rest => "rest",
            ActivityLevel::LowActive => "low active",
            ActivityLevel::HighActive => "high active",
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, ActivityLevel::Rest)
    }
}

/// Final timeline category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Rest,
    #[serde(rename = "low active", alias = "low_active")]
    LowActive,
    #[serde(rename = "high active", alias = "high_active")]
    HighActive,
    Sleep,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Rest => "rest",
            Category::LowActive => "low active",
            Category::HighActive => "high active",
            Category::Sleep => "sleep",
        }
    }
}

impl From<ActivityLevel> for Category {
    fn from(level: ActivityLevel) -> Self {
        match level {
            ActivityLevel::Rest => Category::Rest,
            ActivityLevel::LowActive => Category::LowActive,
            ActivityLevel::HighActive => Category::HighActive,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified bucket or run of merged buckets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityWindow {
    #[serde(alias = "start_time")]
    pub start: DateTime<Utc>,
    #[serde(alias = "end_time")]
    pub end: DateTime<Utc>,
    pub category: ActivityLevel,
}

impl ActivityWindow {
    pub fn interval(&self) -> TimeInterval {
        TimeInterval::new(self.start, self.end)
    }
}

/// One row of the categorized timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub category: Category,
}

impl TimelineEntry {
    pub fn interval(&self) -> TimeInterval {
        TimeInterval::new(self.start_time, self.end_time)
    }
}

/// Ordered, non-overlapping activity timeline
pub type CategorizedTimeline = Vec<TimelineEntry>;

/// Baseline magnitude band observed during sleep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub lower_threshold: f64,
    pub upper_threshold: f64,
}

/// Cumulative sleep-duration counter reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepReading {
    pub timestamp: DateTime<Utc>,
    pub cumulative_minutes: f64,
}

/// Step counter reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepReading {
    pub timestamp: DateTime<Utc>,
    pub step_count: f64,
}

/// Everything the core needs for one recording session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionInput {
    pub x: Channel,
    pub y: Channel,
    pub z: Channel,
    #[serde(default)]
    pub sleep: Vec<SleepReading>,
    #[serde(default)]
    pub steps: Vec<StepReading>,
}

/// Producer metadata attached to session reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Complete output of one processed session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub producer: Producer,
    pub computed_at_utc: String,
    pub thresholds: Thresholds,
    pub accelerometer: Vec<AccelerometerRow>,
    pub windows: Vec<ActivityWindow>,
    pub timeline: CategorizedTimeline,
}

impl SessionReport {
    /// Serialize to compact JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Seconds elapsed from `from` to `to`, with microsecond precision
pub(crate) fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}

/// Convert fractional seconds to a chrono duration (microsecond resolution)
pub(crate) fn duration_from_secs(secs: f64) -> Duration {
    Duration::microseconds((secs * 1_000_000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_interval_new_orders_bounds() {
        let a = Utc.timestamp_opt(100, 0).unwrap();
        let b = Utc.timestamp_opt(50, 0).unwrap();
        let interval = TimeInterval::new(a, b);
        assert_eq!(interval.start, b);
        assert_eq!(interval.end, a);
        assert!(interval.contains(a));
        assert!(interval.contains(b));
    }

    #[test]
    fn test_magnitude() {
        let sample = ResampledSample {
            timestamp: Utc.timestamp_opt(0, 0).unwrap(),
            ax: 3.0,
            ay: 4.0,
            az: 12.0,
        };
        assert!((sample.magnitude() - 13.0).abs() < 1e-12);
    }

    #[test]
    fn test_seconds_between_subsecond() {
        let a = Utc.timestamp_opt(10, 0).unwrap();
        let b = Utc.timestamp_opt(10, 250_000_000).unwrap();
        assert!((seconds_between(a, b) - 0.25).abs() < 1e-9);
        assert!((seconds_between(b, a) + 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&Category::HighActive).unwrap();
        assert_eq!(json, "\"high active\"");
        assert_eq!(serde_json::to_string(&ActivityLevel::LowActive).unwrap(), "\"low active\"");
        assert_eq!(
            serde_json::from_str::<Category>("\"low_active\"").unwrap(),
            Category::LowActive
        );
        assert_eq!(Category::from(ActivityLevel::LowActive), Category::LowActive);
        assert_eq!(Category::LowActive.as_str(), "low active");
    }

    #[test]
    fn test_window_table_row() {
        let window: ActivityWindow = serde_json::from_str(
            r#"{"start_time": "2024-03-01T08:00:00Z", "end_time": "2024-03-01T08:05:00Z", "category": "low active"}"#,
        )
        .unwrap();
        assert_eq!(window.category, ActivityLevel::LowActive);
        assert_eq!(window.interval().duration(), Duration::minutes(5));
    }
}
