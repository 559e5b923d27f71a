//! Pipeline observation
//!
//! Every stage reports progress and diagnostics through an [`Observer`] passed
//! in by the caller instead of consulting process-wide verbosity flags.
//! [`TracingObserver`] forwards events to `tracing`; [`NoopObserver`] drops them.

use chrono::{DateTime, Utc};
use std::cell::RefCell;

/// Pipeline stage identifiers used in progress events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Align,
    Resample,
    SleepCandidates,
    Classify,
    Reconcile,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Align => "align",
            Stage::Resample => "resample",
            Stage::SleepCandidates => "sleep_candidates",
            Stage::Classify => "classify",
            Stage::Reconcile => "reconcile",
        }
    }
}

/// Diagnostic emitted by a pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Aligner enlarged its look-ahead window at `index`
    WindowGrown { index: usize, window: usize },
    /// Aligner discarded unmatched samples at `index`
    SamplesDropped {
        index: usize,
        x: usize,
        y: usize,
        z: usize,
    },
    /// Trailing samples the aligner never examines
    TailDiscarded { x: usize, y: usize, z: usize },
    /// Resampler started a new cadence run
    RunStarted {
        index: usize,
        timestamp: DateTime<Utc>,
    },
    /// Input record skipped as malformed
    RecordSkipped { record: usize, reason: String },
    /// Baseline thresholds derived from sleep-time magnitudes
    ThresholdsDerived { lower: f64, upper: f64, samples: usize },
    /// A stage finished and produced `count` items
    StageCompleted { stage: Stage, count: usize },
}

/// Receiver for pipeline diagnostics
pub trait Observer {
    fn observe(&self, event: &PipelineEvent);
}

/// Observer that discards all events
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn observe(&self, _event: &PipelineEvent) {}
}

/// Observer that logs events through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn observe(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::WindowGrown { index, window } => {
                tracing::debug!(index, window, "match window increased");
            }
            PipelineEvent::SamplesDropped { index, x, y, z } => {
                tracing::debug!(index, x, y, z, "dropped unmatched samples");
            }
            PipelineEvent::TailDiscarded { x, y, z } => {
                tracing::debug!(x, y, z, "discarded trailing samples");
            }
            PipelineEvent::RunStarted { index, timestamp } => {
                tracing::trace!(index, %timestamp, "new resampling run");
            }
            PipelineEvent::RecordSkipped { record, reason } => {
                tracing::warn!(record, "skipping malformed record: {}", reason);
            }
            PipelineEvent::ThresholdsDerived {
                lower,
                upper,
                samples,
            } => {
                tracing::info!(lower, upper, samples, "derived sleep magnitude thresholds");
            }
            PipelineEvent::StageCompleted { stage, count } => {
                tracing::debug!(stage = stage.as_str(), count, "stage completed");
            }
        }
    }
}

/// Observer that keeps every event in memory, useful for reports and tests
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<PipelineEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events observed so far
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.borrow().clone()
    }

    /// Number of skipped records observed so far
    pub fn skipped_records(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, PipelineEvent::RecordSkipped { .. }))
            .count()
    }
}

impl Observer for RecordingObserver {
    fn observe(&self, event: &PipelineEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_collects_events() {
        let observer = RecordingObserver::new();
        observer.observe(&PipelineEvent::WindowGrown { index: 3, window: 8 });
        observer.observe(&PipelineEvent::RecordSkipped {
            record: 7,
            reason: "bad timestamp".to_string(),
        });

        let events = observer.events();
        assert_eq!(events.len(), 2);
        assert_eq!(observer.skipped_records(), 1);
        assert_eq!(events[0], PipelineEvent::WindowGrown { index: 3, window: 8 });
    }

    #[test]
    fn test_tracing_observer_accepts_all_events() {
        let observer = TracingObserver;
        observer.observe(&PipelineEvent::TailDiscarded { x: 6, y: 6, z: 6 });
        observer.observe(&PipelineEvent::StageCompleted {
            stage: Stage::Align,
            count: 10,
        });
    }
}
