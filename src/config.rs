//! Pipeline configuration
//!
//! All tunables of the alignment, resampling, classification and sleep stages.
//! Configuration round-trips through JSON; fields missing from a document fall
//! back to their defaults.

use crate::error::ComputeError;
use crate::types::Thresholds;
use serde::{Deserialize, Serialize};

/// Default look-ahead window of the channel aligner
pub const DEFAULT_MATCH_WINDOW: usize = 6;

/// Default classification bucket width in minutes
pub const DEFAULT_BIN_MINUTES: u32 = 5;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub aligner: AlignerConfig,
    pub resampler: ResamplerConfig,
    pub classifier: ClassifierConfig,
    pub sleep: SleepConfig,
}

/// Channel aligner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    /// Initial look-ahead window (samples per channel)
    pub window: usize,
    /// Tolerance for the direct same-index match (seconds)
    pub direct_tolerance_secs: f64,
    /// Tolerance for candidates found by look-ahead search (seconds)
    pub search_tolerance_secs: f64,
    /// Samples added to the window after a failed search
    pub window_growth: usize,
    /// Largest window the search may grow to. `None` grows until the window
    /// covers every remaining sample.
    pub max_window: Option<usize>,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_MATCH_WINDOW,
            direct_tolerance_secs: 0.5,
            search_tolerance_secs: 0.4,
            window_growth: 2,
            max_window: None,
        }
    }
}

/// Gap-aware resampler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResamplerConfig {
    /// Inter-sample gap (seconds) above which a new run starts
    pub gap_reset_secs: f64,
}

impl Default for ResamplerConfig {
    fn default() -> Self {
        Self { gap_reset_secs: 1.0 }
    }
}

/// Activity classifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Bucket width in minutes
    pub bin_minutes: u32,
    /// Outlier percentage above which a bucket is "low active"
    pub low_cutoff_pct: f64,
    /// Outlier percentage above which a bucket is "high active"
    pub high_cutoff_pct: f64,
    /// Quantiles of sleep-time magnitude forming the baseline band
    pub quantiles: (f64, f64),
    /// Previously persisted thresholds; skips derivation from sleep data
    pub thresholds: Option<Thresholds>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            bin_minutes: DEFAULT_BIN_MINUTES,
            low_cutoff_pct: 5.0,
            high_cutoff_pct: 10.0,
            quantiles: (0.025, 0.975),
            thresholds: None,
        }
    }
}

/// Sleep/step reconciliation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepConfig {
    /// Gap between counter readings that restarts sleep accounting (hours)
    pub reset_gap_hours: f64,
    /// Window before a step increase that cannot be sleep (minutes)
    pub step_lookback_minutes: f64,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            reset_gap_hours: 12.0,
            step_lookback_minutes: 10.0,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ComputeError> {
        let a = &self.aligner;
        if a.window == 0 {
            return Err(invalid("aligner.window must be at least 1"));
        }
        if a.window_growth == 0 {
            return Err(invalid("aligner.window_growth must be at least 1"));
        }
        if !(a.direct_tolerance_secs >= 0.0) || !(a.search_tolerance_secs >= 0.0) {
            return Err(invalid("aligner tolerances must be non-negative"));
        }
        if let Some(max) = a.max_window {
            if max < a.window {
                return Err(invalid("aligner.max_window is smaller than aligner.window"));
            }
        }

        if !(self.resampler.gap_reset_secs > 0.0) {
            return Err(invalid("resampler.gap_reset_secs must be positive"));
        }

        let c = &self.classifier;
        if c.bin_minutes == 0 {
            return Err(invalid("classifier.bin_minutes must be at least 1"));
        }
        if !(c.low_cutoff_pct >= 0.0) || c.low_cutoff_pct > c.high_cutoff_pct {
            return Err(invalid(
                "classifier cutoffs must satisfy 0 <= low_cutoff_pct <= high_cutoff_pct",
            ));
        }
        let (lo, hi) = c.quantiles;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(invalid("classifier.quantiles must lie in [0, 1] and be ordered"));
        }
        if let Some(t) = c.thresholds {
            if t.lower_threshold > t.upper_threshold {
                return Err(invalid("classifier.thresholds lower exceeds upper"));
            }
        }

        if !(self.sleep.reset_gap_hours > 0.0) {
            return Err(invalid("sleep.reset_gap_hours must be positive"));
        }
        if !(self.sleep.step_lookback_minutes >= 0.0) {
            return Err(invalid("sleep.step_lookback_minutes must be non-negative"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> ComputeError {
    ComputeError::Configuration(msg.to_string())
}
