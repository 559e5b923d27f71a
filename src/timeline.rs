//! Final timeline reconciliation
//!
//! Combines classified activity windows with sleep intervals into a single
//! partition of the classified span:
//!
//! 1. sleep = (sleep - active windows) clipped to the classified span
//! 2. awake rest = rest windows - sleep
//! 3. timeline = active windows + sleep + awake rest, ordered by start
//!
//! The categories are mutually exclusive by construction; each subtraction is
//! checked anyway and the final timeline is verified before it is returned.

use crate::error::ComputeError;
use crate::interval::{intersect, merge_or_empty, subtract};
use crate::observer::{Observer, PipelineEvent, Stage};
use crate::types::{
    ActivityLevel, ActivityWindow, CategorizedTimeline, Category, TimeInterval, TimelineEntry,
};

/// Reconcile activity windows with sleep intervals into a categorized timeline.
///
/// The result is gapless only within each contiguous classified span: where
/// the windows themselves leave a gap (missing accelerometer data), the
/// timeline keeps that gap and consecutive entries do not touch. Sleep falling
/// inside such a gap is dropped.
pub fn reconcile(
    windows: &[ActivityWindow],
    sleep: &[TimeInterval],
    observer: &dyn Observer,
) -> Result<CategorizedTimeline, ComputeError> {
    let span = merge_or_empty(&windows.iter().map(ActivityWindow::interval).collect::<Vec<_>>());

    let active: Vec<&ActivityWindow> = windows.iter().filter(|w| w.category.is_active()).collect();
    let active_set = merge_or_empty(&active.iter().map(|w| w.interval()).collect::<Vec<_>>());
    let rest_set: Vec<TimeInterval> = windows
        .iter()
        .filter(|w| w.category == ActivityLevel::Rest)
        .map(ActivityWindow::interval)
        .collect();

    let sleep = merge_or_empty(sleep);
    let final_sleep = intersect(&subtract(&sleep, &active_set), &span);
    ensure_exclusive(&final_sleep, &active_set, "sleep overlaps an active window")?;

    let awake_rest = subtract(&rest_set, &final_sleep);
    ensure_exclusive(&awake_rest, &final_sleep, "awake rest overlaps sleep")?;

    let mut timeline: CategorizedTimeline = active
        .iter()
        .map(|w| entry(w.interval(), w.category.into()))
        .chain(final_sleep.iter().map(|i| entry(*i, Category::Sleep)))
        .chain(awake_rest.iter().map(|i| entry(*i, Category::Rest)))
        .filter(|e| !e.interval().is_degenerate())
        .collect();
    timeline.sort_by_key(|e| (e.start_time, e.end_time));

    verify_timeline(&timeline, &span)?;

    observer.observe(&PipelineEvent::StageCompleted {
        stage: Stage::Reconcile,
        count: timeline.len(),
    });
    Ok(timeline)
}

/// Check that a timeline is ordered, non-overlapping, free of adjacent
/// duplicate categories and covers exactly `span`.
pub fn verify_timeline(
    timeline: &[TimelineEntry],
    span: &[TimeInterval],
) -> Result<(), ComputeError> {
    for (index, e) in timeline.iter().enumerate() {
        if e.end_time < e.start_time {
            return Err(violation(index, e, "entry ends before it starts"));
        }
    }

    for (index, pair) in timeline.windows(2).enumerate() {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.start_time < prev.end_time {
            return Err(violation(index + 1, next, "entry overlaps its predecessor"));
        }
        if next.start_time == prev.end_time && next.category == prev.category {
            return Err(violation(
                index + 1,
                next,
                &format!("entry repeats adjacent category '{}'", next.category),
            ));
        }
    }

    let covered = merge_or_empty(&timeline.iter().map(TimelineEntry::interval).collect::<Vec<_>>());
    if covered != span {
        let index = covered
            .iter()
            .zip(span)
            .position(|(c, s)| c != s)
            .unwrap_or_else(|| covered.len().min(span.len()));
        let timestamp = covered
            .get(index)
            .or_else(|| span.get(index))
            .map(|i| i.start)
            .unwrap_or_default();
        return Err(ComputeError::InvariantViolation {
            index,
            timestamp,
            detail: "timeline does not cover the classified span".to_string(),
        });
    }

    Ok(())
}

fn entry(interval: TimeInterval, category: Category) -> TimelineEntry {
    TimelineEntry {
        start_time: interval.start,
        end_time: interval.end,
        category,
    }
}

fn violation(index: usize, e: &TimelineEntry, detail: &str) -> ComputeError {
    ComputeError::InvariantViolation {
        index,
        timestamp: e.start_time,
        detail: detail.to_string(),
    }
}

/// Fail if `a` shares any span of positive length with `b`
fn ensure_exclusive(
    a: &[TimeInterval],
    b: &[TimeInterval],
    detail: &str,
) -> Result<(), ComputeError> {
    match intersect(a, b).first() {
        None => Ok(()),
        Some(shared) => {
            let index = a.iter().position(|i| i.end > shared.start).unwrap_or(0);
            Err(ComputeError::InvariantViolation {
                index,
                timestamp: shared.start,
                detail: detail.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn w(start: i64, end: i64, category: ActivityLevel) -> ActivityWindow {
        ActivityWindow {
            start: t(start),
            end: t(end),
            category,
        }
    }

    fn e(start: i64, end: i64, category: Category) -> TimelineEntry {
        TimelineEntry {
            start_time: t(start),
            end_time: t(end),
            category,
        }
    }

    fn iv(start: i64, end: i64) -> TimeInterval {
        TimeInterval::new(t(start), t(end))
    }

    fn assert_gapless(timeline: &[TimelineEntry]) {
        for pair in timeline.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
            assert_ne!(pair[0].category, pair[1].category);
        }
    }

    #[test]
    fn test_reconcile_partitions_span() {
        let windows = vec![
            w(0, 10, ActivityLevel::Rest),
            w(10, 15, ActivityLevel::HighActive),
            w(15, 30, ActivityLevel::Rest),
        ];
        let sleep = vec![iv(-60, 12), iv(20, 25)];

        let timeline = reconcile(&windows, &sleep, &NoopObserver).unwrap();
        assert_eq!(
            timeline,
            vec![
                e(0, 10, Category::Sleep),
                e(10, 15, Category::HighActive),
                e(15, 20, Category::Rest),
                e(20, 25, Category::Sleep),
                e(25, 30, Category::Rest),
            ]
        );
        assert_gapless(&timeline);
    }

    #[test]
    fn test_reconcile_without_sleep_keeps_windows() {
        let windows = vec![
            w(0, 5, ActivityLevel::LowActive),
            w(5, 15, ActivityLevel::Rest),
            w(15, 20, ActivityLevel::HighActive),
            w(20, 25, ActivityLevel::LowActive),
        ];
        let timeline = reconcile(&windows, &[], &NoopObserver).unwrap();
        assert_eq!(
            timeline,
            vec![
                e(0, 5, Category::LowActive),
                e(5, 15, Category::Rest),
                e(15, 20, Category::HighActive),
                e(20, 25, Category::LowActive),
            ]
        );
        assert_gapless(&timeline);
    }

    #[test]
    fn test_sleep_never_overrides_activity() {
        let windows = vec![
            w(0, 5, ActivityLevel::Rest),
            w(5, 10, ActivityLevel::LowActive),
            w(10, 20, ActivityLevel::Rest),
        ];
        let sleep = vec![iv(0, 20)];
        let timeline = reconcile(&windows, &sleep, &NoopObserver).unwrap();
        assert_eq!(
            timeline,
            vec![
                e(0, 5, Category::Sleep),
                e(5, 10, Category::LowActive),
                e(10, 20, Category::Sleep),
            ]
        );
    }

    #[test]
    fn test_reconcile_with_data_gap() {
        let windows = vec![w(0, 5, ActivityLevel::Rest), w(30, 35, ActivityLevel::Rest)];
        let sleep = vec![iv(2, 32)];
        let timeline = reconcile(&windows, &sleep, &NoopObserver).unwrap();
        assert_eq!(
            timeline,
            vec![
                e(0, 2, Category::Rest),
                e(2, 5, Category::Sleep),
                e(30, 32, Category::Sleep),
                e(32, 35, Category::Rest),
            ]
        );
        assert_gapless(&timeline[..2]);
        assert_gapless(&timeline[2..]);
        assert!(timeline[1].end_time < timeline[2].start_time);
    }

    #[test]
    fn test_touching_sleep_pieces_form_one_entry() {
        let windows = vec![w(0, 15, ActivityLevel::Rest)];
        let sleep = vec![iv(0, 5), iv(5, 10)];
        let timeline = reconcile(&windows, &sleep, &NoopObserver).unwrap();
        assert_eq!(
            timeline,
            vec![e(0, 10, Category::Sleep), e(10, 15, Category::Rest)]
        );
    }

    #[test]
    fn test_reconcile_empty() {
        assert!(reconcile(&[], &[iv(0, 10)], &NoopObserver).unwrap().is_empty());
    }

    #[test]
    fn test_verify_rejects_overlap() {
        let timeline = vec![e(0, 10, Category::Rest), e(5, 15, Category::Sleep)];
        let result = verify_timeline(&timeline, &[iv(0, 15)]);
        match result {
            Err(ComputeError::InvariantViolation { index, timestamp, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(timestamp, t(5));
            }
            other => panic!("expected InvariantViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_rejects_gap_and_duplicates() {
        let gap = vec![e(0, 10, Category::Rest), e(12, 15, Category::Sleep)];
        assert!(verify_timeline(&gap, &[iv(0, 15)]).is_err());

        let duplicate = vec![e(0, 10, Category::Rest), e(10, 15, Category::Rest)];
        assert!(verify_timeline(&duplicate, &[iv(0, 15)]).is_err());

        let good = vec![e(0, 10, Category::Rest), e(10, 15, Category::Sleep)];
        assert!(verify_timeline(&good, &[iv(0, 15)]).is_ok());
    }
}
