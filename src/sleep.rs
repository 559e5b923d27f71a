//! Sleep and step signal reconciliation
//!
//! The wearable reports sleep as a cumulative minutes counter that resets
//! between nights. Each counter increase is turned into a candidate sleep
//! interval ending at the reading; candidate intervals are merged, and any
//! span shortly before a step-count increase is removed since physical steps
//! rule out sleep.

use crate::config::SleepConfig;
use crate::interval::{merge_or_empty, subtract};
use crate::observer::{Observer, PipelineEvent, Stage};
use crate::types::{
    duration_from_secs, seconds_between, SleepReading, StepReading, TimeInterval,
};

/// Builds sleep intervals from counter readings
#[derive(Debug, Clone, Default)]
pub struct SleepSignalReconciler {
    config: SleepConfig,
}

impl SleepSignalReconciler {
    pub fn new(config: SleepConfig) -> Self {
        Self { config }
    }

    /// Merged candidate sleep intervals from the cumulative counter.
    ///
    /// Accounting restarts (baseline zero) when the gap since the previous
    /// reading exceeds `reset_gap_hours` or the counter decreases.
    pub fn candidate_intervals(&self, readings: &[SleepReading]) -> Vec<TimeInterval> {
        let reset_secs = self.config.reset_gap_hours * 3600.0;
        let readings = changes_only(readings, |r| r.cumulative_minutes);

        let mut intervals = Vec::with_capacity(readings.len());
        let mut previous: Option<&SleepReading> = None;
        for reading in &readings {
            let baseline = match previous {
                Some(p) if seconds_between(p.timestamp, reading.timestamp) <= reset_secs => {
                    p.cumulative_minutes
                }
                _ => 0.0,
            };
            let minutes = if reading.cumulative_minutes > baseline {
                reading.cumulative_minutes - baseline
            } else {
                reading.cumulative_minutes
            };
            previous = Some(reading);

            if minutes > 0.0 {
                let start = reading.timestamp - duration_from_secs(minutes * 60.0);
                intervals.push(TimeInterval::new(start, reading.timestamp));
            }
        }

        merge_or_empty(&intervals)
    }

    /// Merged spans that cannot be sleep: the lookback window before each
    /// reading that reports steps
    pub fn step_intervals(&self, steps: &[StepReading]) -> Vec<TimeInterval> {
        let lookback = duration_from_secs(self.config.step_lookback_minutes * 60.0);
        let intervals: Vec<TimeInterval> = changes_only(steps, |s| s.step_count)
            .iter()
            .filter(|s| s.step_count > 0.0)
            .map(|s| TimeInterval::new(s.timestamp - lookback, s.timestamp))
            .filter(|i| !i.is_degenerate())
            .collect();
        merge_or_empty(&intervals)
    }

    /// Candidate sleep with step-invalidated spans removed.
    ///
    /// Pieces left touching after the subtraction are joined again, so the
    /// result is always a minimal disjoint set.
    pub fn sleep_intervals(
        &self,
        sleep: &[SleepReading],
        steps: &[StepReading],
        observer: &dyn Observer,
    ) -> Vec<TimeInterval> {
        let candidates = self.candidate_intervals(sleep);
        let invalidated = self.step_intervals(steps);
        let result = merge_or_empty(&subtract(&candidates, &invalidated));

        observer.observe(&PipelineEvent::StageCompleted {
            stage: Stage::SleepCandidates,
            count: result.len(),
        });
        result
    }
}

/// Drop non-finite readings and readings repeating the previous value
fn changes_only<T: Copy>(readings: &[T], value: impl Fn(&T) -> f64) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(readings.len());
    for reading in readings.iter().filter(|r| value(*r).is_finite()) {
        if out.last().map_or(true, |last| value(last) != value(reading)) {
            out.push(*reading);
        }
    }
    out
}
