//! Interval set algebra
//!
//! Pure operations over collections of closed [`TimeInterval`]s. Every
//! function returns a new set; inputs are never modified.

use crate::error::ComputeError;
use crate::types::TimeInterval;

/// Merge overlapping or touching intervals into a minimal sorted disjoint set.
///
/// # Errors
/// Returns `Configuration` for an empty input, which has no defined merge.
pub fn merge(intervals: &[TimeInterval]) -> Result<Vec<TimeInterval>, ComputeError> {
    if intervals.is_empty() {
        return Err(ComputeError::Configuration(
            "cannot merge an empty interval set".to_string(),
        ));
    }

    let mut sorted = intervals.to_vec();
    sorted.sort_by_key(|i| (i.start, i.end));

    let mut merged: Vec<TimeInterval> = Vec::with_capacity(sorted.len());
    for interval in sorted {
        match merged.last_mut() {
            Some(acc) if acc.end >= interval.start => {
                acc.end = acc.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }
    Ok(merged)
}

/// Merge, treating an empty input as an empty result
pub fn merge_or_empty(intervals: &[TimeInterval]) -> Vec<TimeInterval> {
    merge(intervals).unwrap_or_default()
}

/// True unless one interval ends strictly before the other starts
pub fn overlaps(a: &TimeInterval, b: &TimeInterval) -> bool {
    !(a.end < b.start || a.start > b.end)
}

/// Remove every span covered by `sub` from `base`.
///
/// Both inputs must be sorted and internally disjoint. Output intervals that
/// end up adjacent are not re-merged.
pub fn subtract(base: &[TimeInterval], sub: &[TimeInterval]) -> Vec<TimeInterval> {
    let mut out = Vec::with_capacity(base.len());
    let mut bases = base.iter().copied();
    let mut subs = sub.iter().copied().peekable();

    let Some(mut current) = bases.next() else {
        return out;
    };

    loop {
        let Some(&s) = subs.peek() else {
            out.push(current);
            out.extend(bases);
            return out;
        };

        if !overlaps(&current, &s) {
            if current.end < s.start {
                out.push(current);
                match bases.next() {
                    Some(next) => current = next,
                    None => return out,
                }
            } else {
                subs.next();
            }
            continue;
        }

        if current.start < s.start {
            out.push(TimeInterval::new(current.start, s.start));
        }

        if current.end > s.end {
            current = TimeInterval::new(s.end, current.end);
            subs.next();
        } else {
            match bases.next() {
                Some(next) => current = next,
                None => return out,
            }
        }
    }
}

/// Spans covered by both sets. Inputs must be sorted and internally disjoint;
/// single-instant intersections are omitted.
pub fn intersect(a: &[TimeInterval], b: &[TimeInterval]) -> Vec<TimeInterval> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let start = a[i].start.max(b[j].start);
        let end = a[i].end.min(b[j].end);
        if start < end {
            out.push(TimeInterval::new(start, end));
        }
        if a[i].end <= b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}
