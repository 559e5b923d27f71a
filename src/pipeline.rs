//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Actigraph.
//! It runs one recording session from raw channels to the categorized timeline.

use crate::align::ChannelAligner;
use crate::classify::{merge_windows, ActivityWindowClassifier};
use crate::config::PipelineConfig;
use crate::error::ComputeError;
use crate::observer::Observer;
use crate::resample::{accelerometer_table, GapAwareResampler};
use crate::schema::{RawRecord, RecordAdapter};
use crate::sleep::SleepSignalReconciler;
use crate::timeline::reconcile;
use crate::types::{
    ActivityWindow, CategorizedTimeline, Producer, SessionInput, SessionReport, SleepReading,
    StepReading,
};
use crate::{PRODUCER_NAME, VERSION};
use chrono::Utc;
use uuid::Uuid;

/// Process one session with the default configuration.
///
/// # Example
/// ```ignore
/// let report = process_session(&input, &TracingObserver)?;
/// println!("{}", report.to_json()?);
/// ```
pub fn process_session(
    input: &SessionInput,
    observer: &dyn Observer,
) -> Result<SessionReport, ComputeError> {
    ActivityProcessor::new().process(input, observer)
}

/// Configured processor for recording sessions.
///
/// Sessions share no state; one processor can handle any number of them,
/// from any number of threads.
pub struct ActivityProcessor {
    config: PipelineConfig,
    aligner: ChannelAligner,
    resampler: GapAwareResampler,
    classifier: ActivityWindowClassifier,
    sleep: SleepSignalReconciler,
    instance_id: String,
}

impl Default for ActivityProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self::build(PipelineConfig::default())
    }

    /// Create a processor from a validated configuration
    pub fn with_config(config: PipelineConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Use a fixed producer instance id instead of a random one
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    fn build(config: PipelineConfig) -> Self {
        Self {
            aligner: ChannelAligner::new(config.aligner.clone()),
            resampler: GapAwareResampler::new(config.resampler.clone()),
            classifier: ActivityWindowClassifier::new(config.classifier.clone()),
            sleep: SleepSignalReconciler::new(config.sleep.clone()),
            instance_id: Uuid::new_v4().to_string(),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline on one session.
    ///
    /// Pipeline stages:
    /// 1. ChannelAligner - Reconcile the three axes into index-aligned triples
    /// 2. GapAwareResampler - Fan out onto the 0.1s grid, resetting on gaps
    /// 3. SleepSignalReconciler - Sleep candidates minus step-invalidated spans
    /// 4. ActivityWindowClassifier - Thresholds, bucket classification, window merge
    /// 5. reconcile - Final timeline, verified before it is returned
    pub fn process(
        &self,
        input: &SessionInput,
        observer: &dyn Observer,
    ) -> Result<SessionReport, ComputeError> {
        let aligned = self.aligner.align(&input.x, &input.y, &input.z, observer)?;
        let samples = self.resampler.resample(&aligned.triples(), observer);
        let accelerometer = accelerometer_table(&samples, self.config.classifier.bin_minutes);

        let sleep = self
            .sleep
            .sleep_intervals(&input.sleep, &input.steps, observer);
        let thresholds = self.classifier.thresholds(&accelerometer, &sleep, observer)?;
        let windows = self.classifier.categorize(&accelerometer, &thresholds, observer);
        let timeline = reconcile(&windows, &sleep, observer)?;

        Ok(SessionReport {
            session_id: Uuid::new_v4().to_string(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            thresholds,
            accelerometer,
            windows,
            timeline,
        })
    }

    /// Reconcile a previously classified window table with sleep and step
    /// readings, skipping the accelerometer stages.
    ///
    /// Windows may arrive in any order; touching windows that share a
    /// category are merged before reconciliation.
    ///
    /// # Errors
    /// `DataFormat` for a window without positive length or for two windows
    /// that overlap.
    pub fn reconcile_windows(
        &self,
        windows: &[ActivityWindow],
        sleep: &[SleepReading],
        steps: &[StepReading],
        observer: &dyn Observer,
    ) -> Result<CategorizedTimeline, ComputeError> {
        if let Some((record, w)) = windows.iter().enumerate().find(|(_, w)| w.end <= w.start) {
            return Err(ComputeError::DataFormat {
                record,
                reason: format!("window [{}, {}] has no positive length", w.start, w.end),
            });
        }

        let mut sorted = windows.to_vec();
        sorted.sort_by_key(|w| (w.start, w.end));
        if let Some(pair) = sorted.windows(2).find(|p| p[1].start < p[0].end) {
            let record = windows.iter().position(|w| *w == pair[1]).unwrap_or(0);
            return Err(ComputeError::DataFormat {
                record,
                reason: format!(
                    "window starting at {} overlaps the window ending at {}",
                    pair[1].start, pair[0].end
                ),
            });
        }

        let windows = merge_windows(&sorted);
        let sleep = self.sleep.sleep_intervals(sleep, steps, observer);
        reconcile(&windows, &sleep, observer)
    }

    /// Build a session from measurement records and process it
    pub fn process_records(
        &self,
        records: &[RawRecord],
        adapter: &RecordAdapter,
        observer: &dyn Observer,
    ) -> Result<SessionReport, ComputeError> {
        let input = adapter.to_session(records, observer);
        self.process(&input, observer)
    }
}
