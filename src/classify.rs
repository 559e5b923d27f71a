//! Acceleration-based activity classification
//!
//! Magnitudes are binned into fixed windows on a wall-clock grid. Each bucket
//! is classified by the share of its samples that fall outside the baseline
//! band observed during sleep, and contiguous buckets of the same category
//! are merged into windows.

use crate::config::ClassifierConfig;
use crate::error::ComputeError;
use crate::observer::{Observer, PipelineEvent, Stage};
use crate::types::{AccelerometerRow, ActivityLevel, ActivityWindow, Thresholds, TimeInterval};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Classifies resampled magnitudes into activity windows
#[derive(Debug, Clone, Default)]
pub struct ActivityWindowClassifier {
    config: ClassifierConfig,
}

impl ActivityWindowClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Derive the baseline magnitude band from samples inside sleep intervals.
    ///
    /// A fixed threshold record in the configuration takes precedence.
    pub fn thresholds(
        &self,
        rows: &[AccelerometerRow],
        sleep: &[TimeInterval],
        observer: &dyn Observer,
    ) -> Result<Thresholds, ComputeError> {
        if let Some(fixed) = self.config.thresholds {
            return Ok(fixed);
        }

        let mut magnitudes: Vec<f64> = rows
            .iter()
            .filter(|r| sleep.iter().any(|s| s.contains(r.timestamp)))
            .map(|r| r.magnitude)
            .filter(|m| m.is_finite())
            .collect();

        if magnitudes.is_empty() {
            return Err(ComputeError::InsufficientData(
                "no accelerometer samples fall inside a sleep interval".to_string(),
            ));
        }

        magnitudes.sort_by(f64::total_cmp);
        let (lo, hi) = self.config.quantiles;
        let thresholds = Thresholds {
            lower_threshold: quantile(&magnitudes, lo),
            upper_threshold: quantile(&magnitudes, hi),
        };

        observer.observe(&PipelineEvent::ThresholdsDerived {
            lower: thresholds.lower_threshold,
            upper: thresholds.upper_threshold,
            samples: magnitudes.len(),
        });
        Ok(thresholds)
    }

    /// Classify a single bucket of magnitudes
    pub fn bin_categorize(&self, magnitudes: &[f64], thresholds: &Thresholds) -> ActivityLevel {
        if magnitudes.is_empty() {
            return ActivityLevel::Rest;
        }
        let outliers = magnitudes
            .iter()
            .filter(|&&m| m < thresholds.lower_threshold || m > thresholds.upper_threshold)
            .count();
        let percentage = outliers as f64 * 100.0 / magnitudes.len() as f64;

        if percentage > self.config.high_cutoff_pct {
            ActivityLevel::HighActive
        } else if percentage > self.config.low_cutoff_pct {
            ActivityLevel::LowActive
        } else {
            ActivityLevel::Rest
        }
    }

    /// Bin, classify and merge the accelerometer table into windows
    pub fn categorize(
        &self,
        rows: &[AccelerometerRow],
        thresholds: &Thresholds,
        observer: &dyn Observer,
    ) -> Vec<ActivityWindow> {
        let width = Duration::minutes(i64::from(self.config.bin_minutes));

        let mut buckets: BTreeMap<DateTime<Utc>, Vec<f64>> = BTreeMap::new();
        for row in rows {
            buckets
                .entry(time_bin(row.timestamp, self.config.bin_minutes))
                .or_default()
                .push(row.magnitude);
        }

        let windows: Vec<ActivityWindow> = buckets
            .iter()
            .map(|(start, magnitudes)| ActivityWindow {
                start: *start,
                end: *start + width,
                category: self.bin_categorize(magnitudes, thresholds),
            })
            .collect();

        let merged = merge_windows(&windows);
        observer.observe(&PipelineEvent::StageCompleted {
            stage: Stage::Classify,
            count: merged.len(),
        });
        merged
    }
}

/// Floor a timestamp to the start of its `bin_minutes` bucket (epoch-aligned)
pub fn time_bin(timestamp: DateTime<Utc>, bin_minutes: u32) -> DateTime<Utc> {
    let width = i64::from(bin_minutes.max(1)) * 60;
    let floored = timestamp.timestamp().div_euclid(width) * width;
    DateTime::from_timestamp(floored, 0).unwrap_or(timestamp)
}

/// Merge consecutive windows sharing a category with no gap between them
pub fn merge_windows(windows: &[ActivityWindow]) -> Vec<ActivityWindow> {
    let mut merged: Vec<ActivityWindow> = Vec::with_capacity(windows.len());
    for window in windows {
        match merged.last_mut() {
            Some(current) if current.category == window.category && current.end == window.start => {
                current.end = window.end;
            }
            _ => merged.push(*window),
        }
    }
    merged
}

/// Linear-interpolation quantile of sorted data
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn band() -> Thresholds {
        Thresholds {
            lower_threshold: 0.9,
            upper_threshold: 1.1,
        }
    }

    fn bucket(outside: usize, total: usize) -> Vec<f64> {
        (0..total).map(|i| if i < outside { 2.0 } else { 1.0 }).collect()
    }

    fn row(secs: i64, magnitude: f64) -> AccelerometerRow {
        AccelerometerRow {
            timestamp: base() + Duration::seconds(secs),
            ax: magnitude,
            ay: 0.0,
            az: 0.0,
            magnitude,
            bin_index: 0,
        }
    }

    #[test]
    fn test_bin_categorize_cutoffs() {
        let classifier = ActivityWindowClassifier::default();
        assert_eq!(classifier.bin_categorize(&bucket(0, 100), &band()), ActivityLevel::Rest);
        assert_eq!(
            classifier.bin_categorize(&bucket(100, 100), &band()),
            ActivityLevel::HighActive
        );
        assert_eq!(
            classifier.bin_categorize(&bucket(7, 100), &band()),
            ActivityLevel::LowActive
        );
        // boundaries are exclusive
        assert_eq!(classifier.bin_categorize(&bucket(5, 100), &band()), ActivityLevel::Rest);
        assert_eq!(
            classifier.bin_categorize(&bucket(10, 100), &band()),
            ActivityLevel::LowActive
        );
    }

    #[test]
    fn test_below_lower_threshold_counts_as_outlier() {
        let classifier = ActivityWindowClassifier::default();
        let magnitudes = vec![0.1; 20];
        assert_eq!(
            classifier.bin_categorize(&magnitudes, &band()),
            ActivityLevel::HighActive
        );
    }

    #[test]
    fn test_time_bin_floors_to_grid() {
        let t = base() + Duration::seconds(7 * 60 + 42);
        assert_eq!(time_bin(t, 5), base() + Duration::minutes(5));
        assert_eq!(time_bin(base(), 5), base());
        assert_eq!(time_bin(t, 15), base());
    }

    #[test]
    fn test_merge_windows_requires_contiguity() {
        let w = |start: i64, end: i64, category| ActivityWindow {
            start: base() + Duration::minutes(start),
            end: base() + Duration::minutes(end),
            category,
        };
        let windows = vec![
            w(0, 5, ActivityLevel::Rest),
            w(5, 10, ActivityLevel::Rest),
            w(15, 20, ActivityLevel::Rest),
            w(20, 25, ActivityLevel::HighActive),
            w(25, 30, ActivityLevel::Rest),
        ];
        let merged = merge_windows(&windows);
        assert_eq!(
            merged,
            vec![
                w(0, 10, ActivityLevel::Rest),
                w(15, 20, ActivityLevel::Rest),
                w(20, 25, ActivityLevel::HighActive),
                w(25, 30, ActivityLevel::Rest),
            ]
        );
    }

    #[test]
    fn test_categorize_buckets() {
        let classifier = ActivityWindowClassifier::default();
        let mut rows = Vec::new();
        // two quiet buckets, then one busy bucket
        for i in 0..600 {
            rows.push(row(i, 1.0));
        }
        for i in 600..900 {
            rows.push(row(i, if i % 2 == 0 { 3.0 } else { 1.0 }));
        }

        let windows = classifier.categorize(&rows, &band(), &NoopObserver);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start, base());
        assert_eq!(windows[0].end, base() + Duration::minutes(10));
        assert_eq!(windows[0].category, ActivityLevel::Rest);
        assert_eq!(windows[1].category, ActivityLevel::HighActive);
        assert_eq!(windows[1].end, base() + Duration::minutes(15));
    }

    #[test]
    fn test_thresholds_from_sleep_samples() {
        let classifier = ActivityWindowClassifier::default();
        let rows: Vec<AccelerometerRow> = (0..=100).map(|i| row(i, i as f64)).collect();
        let sleep = vec![TimeInterval::new(base(), base() + Duration::seconds(100))];

        let t = classifier.thresholds(&rows, &sleep, &NoopObserver).unwrap();
        assert!((t.lower_threshold - 2.5).abs() < 1e-9);
        assert!((t.upper_threshold - 97.5).abs() < 1e-9);
    }

    #[test]
    fn test_thresholds_only_use_sleep_rows() {
        let classifier = ActivityWindowClassifier::default();
        let rows = vec![row(0, 1.0), row(10, 1.0), row(20, 50.0)];
        let sleep = vec![TimeInterval::new(base(), base() + Duration::seconds(10))];
        let t = classifier.thresholds(&rows, &sleep, &NoopObserver).unwrap();
        assert_eq!(t.upper_threshold, 1.0);
    }

    #[test]
    fn test_thresholds_need_sleep_samples() {
        let classifier = ActivityWindowClassifier::default();
        let rows = vec![row(0, 1.0)];
        let result = classifier.thresholds(&rows, &[], &NoopObserver);
        assert!(matches!(result, Err(ComputeError::InsufficientData(_))));
    }

    #[test]
    fn test_fixed_thresholds_override() {
        let classifier = ActivityWindowClassifier::new(ClassifierConfig {
            thresholds: Some(band()),
            ..Default::default()
        });
        let t = classifier.thresholds(&[], &[], &NoopObserver).unwrap();
        assert_eq!(t, band());
    }
}
