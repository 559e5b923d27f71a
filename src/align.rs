//! Cross-channel timestamp alignment
//!
//! The three accelerometer axes are sampled on independent clocks, each with
//! jitter, drift and the occasional missing or duplicated tick. The aligner
//! walks the three channels in lock-step and, whenever the same-index
//! timestamps disagree, searches a small look-ahead window for the cheapest
//! set of samples to discard so that the channels agree again.

use crate::config::AlignerConfig;
use crate::error::ComputeError;
use crate::observer::{Observer, PipelineEvent, Stage};
use crate::types::{seconds_between, Axis, Channel, ChannelSample, SyncedTriple};
use chrono::DateTime;

/// Three equal-length, index-aligned channels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedChannels {
    pub x: Channel,
    pub y: Channel,
    pub z: Channel,
}

impl AlignedChannels {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Zip the channels into synchronized triples
    pub fn triples(&self) -> Vec<SyncedTriple> {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((x, y), z)| SyncedTriple::from_samples(*x, *y, *z))
            .collect()
    }
}

/// Offsets chosen by the look-ahead search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MatchOffsets {
    x: usize,
    y: usize,
    z: usize,
}

/// Reconciles three per-axis streams into index-aligned channels
#[derive(Debug, Clone, Default)]
pub struct ChannelAligner {
    config: AlignerConfig,
}

impl ChannelAligner {
    pub fn new(config: AlignerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    /// Align three channels.
    ///
    /// Unmatched samples are dropped. The last `window` samples of the
    /// shortest channel are never examined and are discarded together with
    /// the corresponding tails of the other two channels.
    ///
    /// # Errors
    /// * `Configuration` if any channel is empty
    /// * `AlignmentExhaustion` if the look-ahead window outgrows
    ///   `max_window` (or every remaining sample) without finding a match
    pub fn align(
        &self,
        x: &[ChannelSample],
        y: &[ChannelSample],
        z: &[ChannelSample],
        observer: &dyn Observer,
    ) -> Result<AlignedChannels, ComputeError> {
        for (axis, channel) in [(Axis::X, x), (Axis::Y, y), (Axis::Z, z)] {
            if channel.is_empty() {
                return Err(ComputeError::Configuration(format!(
                    "accelerometer channel {} is empty",
                    axis.as_str()
                )));
            }
        }

        // Index 0 of each working channel is a shared sentinel so that the
        // walk always has a matching predecessor; it is never emitted.
        let mut xs = with_sentinel(x);
        let mut ys = with_sentinel(y);
        let mut zs = with_sentinel(z);

        let mut window = self.config.window;
        let mut a = 1;

        while a + window < xs.len() && a + window < ys.len() && a + window < zs.len() {
            if !agree(&xs[a], &ys[a], &zs[a], self.config.direct_tolerance_secs) {
                let offsets = loop {
                    let found = find_match(
                        lookahead(&xs, a, window),
                        lookahead(&ys, a, window),
                        lookahead(&zs, a, window),
                        self.config.search_tolerance_secs,
                    );
                    if let Some(offsets) = found {
                        break offsets;
                    }

                    let covers_all =
                        a + window >= xs.len() && a + window >= ys.len() && a + window >= zs.len();
                    let next = window + self.config.window_growth;
                    let over_limit = self.config.max_window.map_or(false, |max| next > max);
                    if covers_all || over_limit {
                        return Err(ComputeError::AlignmentExhaustion {
                            index: a - 1,
                            timestamp: xs[a].timestamp,
                            window,
                        });
                    }

                    window = next;
                    observer.observe(&PipelineEvent::WindowGrown { index: a - 1, window });
                };

                xs.drain(a..a + offsets.x);
                ys.drain(a..a + offsets.y);
                zs.drain(a..a + offsets.z);
                observer.observe(&PipelineEvent::SamplesDropped {
                    index: a - 1,
                    x: offsets.x,
                    y: offsets.y,
                    z: offsets.z,
                });
            }
            a += 1;
        }

        observer.observe(&PipelineEvent::TailDiscarded {
            x: xs.len() - a,
            y: ys.len() - a,
            z: zs.len() - a,
        });

        xs.truncate(a);
        ys.truncate(a);
        zs.truncate(a);
        xs.remove(0);
        ys.remove(0);
        zs.remove(0);

        observer.observe(&PipelineEvent::StageCompleted {
            stage: Stage::Align,
            count: xs.len(),
        });

        Ok(AlignedChannels {
            x: xs,
            y: ys,
            z: zs,
        })
    }
}

fn with_sentinel(channel: &[ChannelSample]) -> Vec<ChannelSample> {
    let sentinel = ChannelSample::new(
        DateTime::from_timestamp(1, 0).unwrap_or_default(),
        f64::NAN,
    );
    let mut out = Vec::with_capacity(channel.len() + 1);
    out.push(sentinel);
    out.extend_from_slice(channel);
    out
}

fn lookahead(channel: &[ChannelSample], start: usize, window: usize) -> &[ChannelSample] {
    let end = (start + window).min(channel.len());
    &channel[start..end]
}

/// True when all three timestamps agree pairwise within `tolerance` seconds
fn agree(x: &ChannelSample, y: &ChannelSample, z: &ChannelSample, tolerance: f64) -> bool {
    let xy = seconds_between(x.timestamp, y.timestamp).abs();
    let yz = seconds_between(y.timestamp, z.timestamp).abs();
    let xz = seconds_between(x.timestamp, z.timestamp).abs();
    xy.max(yz).max(xz) <= tolerance
}

/// Cheapest valid offset triple within the look-ahead slices.
///
/// Candidates are ranked by total discarded samples, then by generation order
/// (x outermost, z innermost).
fn find_match(
    x: &[ChannelSample],
    y: &[ChannelSample],
    z: &[ChannelSample],
    tolerance: f64,
) -> Option<MatchOffsets> {
    let (ny, nz) = (y.len(), z.len());
    (0..x.len())
        .flat_map(|i| (0..ny).flat_map(move |j| (0..nz).map(move |k| (i, j, k))))
        .enumerate()
        .filter(|&(_, (i, j, k))| agree(&x[i], &y[j], &z[k], tolerance))
        .min_by_key(|&(seq, (i, j, k))| (i + j + k, seq))
        .map(|(_, (i, j, k))| MatchOffsets { x: i, y: j, z: k })
}
