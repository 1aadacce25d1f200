//! Wall-clock helpers and date ranges.
//!
//! All persisted dates are epoch milliseconds (UTC).

use serde::{Deserialize, Serialize};

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Whether `candidate` is at or after `reference`. A missing candidate is
/// never after anything.
pub fn is_after_or_same(candidate: Option<i64>, reference: i64) -> bool {
    matches!(candidate, Some(candidate) if candidate >= reference)
}

/// A half-open `[start, end)` range over epoch-millisecond dates; either
/// bound may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive lower bound.
    pub start: Option<i64>,
    /// Exclusive upper bound.
    pub end: Option<i64>,
}

impl DateRange {
    /// A range with the given bounds.
    pub fn new(start: Option<i64>, end: Option<i64>) -> Self {
        Self { start, end }
    }

    /// Shift both bounds by `delta` milliseconds.
    pub fn shift(self, delta: i64) -> Self {
        Self {
            start: self.start.map(|v| v + delta),
            end: self.end.map(|v| v + delta),
        }
    }

    /// Intersect two ranges, keeping the tighter bound on each side.
    pub fn intersect(self, other: DateRange) -> Self {
        Self {
            start: max_option(self.start, other.start),
            end: min_option(self.end, other.end),
        }
    }
}

fn max_option(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

fn min_option(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
