//! Gap-aware resampling onto a fixed 0.1s cadence
//!
//! Every aligned sample fans out into five rows spaced 0.1s apart, each
//! carrying the source sample's values unchanged. Rows are laid out relative
//! to the start of the current run; an inter-sample gap larger than
//! `gap_reset_secs` starts a new run.

use crate::config::ResamplerConfig;
use crate::observer::{Observer, PipelineEvent, Stage};
use crate::types::{seconds_between, AccelerometerRow, ResampledSample, SyncedTriple};
use chrono::{DateTime, Duration, Utc};
use std::ops::Range;

/// Output rows produced per aligned sample
pub const FAN_OUT: usize = 5;

/// Spacing of the synthetic grid in milliseconds
pub const CADENCE_MS: i64 = 100;

/// Offset of the first row of a run before the run's start time
const LEAD_MS: i64 = 400;

/// Time span allotted to one source sample
const SLOT_MS: i64 = 500;

/// Converts aligned triples into a fixed-cadence sample stream
#[derive(Debug, Clone, Default)]
pub struct GapAwareResampler {
    config: ResamplerConfig,
}

impl GapAwareResampler {
    pub fn new(config: ResamplerConfig) -> Self {
        Self { config }
    }

    /// Split the aligned stream into runs with no gap above the reset threshold
    pub fn runs(&self, triples: &[SyncedTriple]) -> Vec<Range<usize>> {
        let mut runs = Vec::new();
        let mut start = 0;
        for i in 1..triples.len() {
            let gap = seconds_between(triples[i - 1].timestamp_x, triples[i].timestamp_x);
            if gap > self.config.gap_reset_secs {
                runs.push(start..i);
                start = i;
            }
        }
        if !triples.is_empty() {
            runs.push(start..triples.len());
        }
        runs
    }

    /// Resample the aligned stream
    pub fn resample(
        &self,
        triples: &[SyncedTriple],
        observer: &dyn Observer,
    ) -> Vec<ResampledSample> {
        let mut out = Vec::with_capacity(triples.len() * FAN_OUT);

        for run in self.runs(triples) {
            let run_start = triples[run.start].timestamp_x;
            observer.observe(&PipelineEvent::RunStarted {
                index: run.start,
                timestamp: run_start,
            });

            for (offset, triple) in triples[run.clone()].iter().enumerate() {
                let base = slot_start(run_start, offset);
                out.extend((0..FAN_OUT as i64).map(|k| ResampledSample {
                    timestamp: base + Duration::milliseconds(k * CADENCE_MS),
                    ax: triple.value_x,
                    ay: triple.value_y,
                    az: triple.value_z,
                }));
            }
        }

        observer.observe(&PipelineEvent::StageCompleted {
            stage: Stage::Resample,
            count: out.len(),
        });
        out
    }
}

/// First synthetic timestamp for the sample `offset` positions into its run
fn slot_start(run_start: DateTime<Utc>, offset: usize) -> DateTime<Utc> {
    run_start - Duration::milliseconds(LEAD_MS) + Duration::milliseconds(SLOT_MS * offset as i64)
}

/// Build the accelerometer table: magnitude plus bucket index per row
pub fn accelerometer_table(samples: &[ResampledSample], bin_minutes: u32) -> Vec<AccelerometerRow> {
    let bin_secs = i64::from(bin_minutes.max(1)) * 60;
    samples
        .iter()
        .map(|s| AccelerometerRow {
            timestamp: s.timestamp,
            ax: s.ax,
            ay: s.ay,
            az: s.az,
            magnitude: s.magnitude(),
            bin_index: s.timestamp.timestamp().div_euclid(bin_secs),
        })
        .collect()
}
