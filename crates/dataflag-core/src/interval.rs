//! Time intervals and query ranges.
//!
//! Flag intervals are half-open `[start, end)` in UNIX seconds. A flag with no
//! end is ongoing. Overlap rules:
//!
//! ```text
//! bounded flag [a, b)   vs range [c, d)     a < d && c < b
//! open flag    [s, ..)  vs range [c, d)     s <= d
//! any flag              vs range [c, ..)    end is None || end > c
//! any flag              vs instant t        start <= t && (end is None || t < end)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{DataFlagError, Result};

/// The time span covered by a flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub end: Option<f64>,
}

impl Interval {
    /// Validated constructor. Both bounds must be finite and ordered.
    pub fn new(start: f64, end: Option<f64>) -> Result<Self> {
        let finite = start.is_finite() && end.map_or(true, f64::is_finite);
        let ordered = end.map_or(true, |e| start <= e);
        if !finite || !ordered {
            return Err(DataFlagError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn bounded(start: f64, end: f64) -> Result<Self> {
        Self::new(start, Some(end))
    }

    /// An interval with no end ("ongoing").
    pub fn open(start: f64) -> Result<Self> {
        Self::new(start, None)
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// End bound with open intervals mapped to +inf.
    pub fn end_or_inf(&self) -> f64 {
        self.end.unwrap_or(f64::INFINITY)
    }

    /// Whether `other` lies entirely within this interval.
    pub fn covers(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end_or_inf() <= self.end_or_inf()
    }
}

/// A query over time: a single instant or a span.
///
/// Built only through the validated constructors, so bounds are never NaN
/// and a finite lower bound never exceeds the upper one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange(Bounds);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Bounds {
    Instant(f64),
    Span { start: f64, end: Option<f64> },
}

impl TimeRange {
    /// The single instant `t`, which must be finite.
    pub fn instant(t: f64) -> Result<Self> {
        if !t.is_finite() {
            return Err(DataFlagError::InvalidInterval {
                start: t,
                end: Some(t),
            });
        }
        Ok(TimeRange(Bounds::Instant(t)))
    }

    /// Half-open span `[start, end)`.
    pub fn span(start: f64, end: f64) -> Result<Self> {
        let interval = Interval::bounded(start, end)?;
        Ok(TimeRange(Bounds::Span {
            start: interval.start,
            end: interval.end,
        }))
    }

    /// Everything from `start` onwards.
    pub fn since(start: f64) -> Result<Self> {
        let interval = Interval::open(start)?;
        Ok(TimeRange(Bounds::Span {
            start: interval.start,
            end: None,
        }))
    }

    /// Everything before `end`.
    pub fn until(end: f64) -> Result<Self> {
        if !end.is_finite() {
            return Err(DataFlagError::InvalidInterval {
                start: f64::NEG_INFINITY,
                end: Some(end),
            });
        }
        Ok(TimeRange(Bounds::Span {
            start: f64::NEG_INFINITY,
            end: Some(end),
        }))
    }

    /// Every flag, regardless of its interval.
    pub fn all() -> Self {
        TimeRange(Bounds::Span {
            start: f64::NEG_INFINITY,
            end: None,
        })
    }

    pub fn is_instant(&self) -> bool {
        matches!(self.0, Bounds::Instant(_))
    }

    /// Flags must end after this to be candidates.
    pub(crate) fn lower(&self) -> f64 {
        match self.0 {
            Bounds::Instant(t) => t,
            Bounds::Span { start, .. } => start,
        }
    }

    /// Flags must start at or before this to be candidates.
    pub(crate) fn upper(&self) -> f64 {
        match self.0 {
            Bounds::Instant(t) => t,
            Bounds::Span { end, .. } => end.unwrap_or(f64::INFINITY),
        }
    }

    /// Exact overlap test against a flag interval.
    pub fn overlaps(&self, flag: &Interval) -> bool {
        match self.0 {
            Bounds::Instant(t) => flag.start <= t && flag.end.map_or(true, |e| t < e),
            Bounds::Span { start, end: None } => flag.end.map_or(true, |e| e > start),
            Bounds::Span {
                start,
                end: Some(end),
            } => match flag.end {
                Some(flag_end) => flag.start < end && start < flag_end,
                None => flag.start <= end,
            },
        }
    }
}
