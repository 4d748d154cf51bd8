//! Timebox partitioning.
//!
//! A table run covers `[bookmark, now]`. Without historical batching that is
//! one [`Window`]; with batching the range is cut at every [`Frequency`] step
//! from the bookmark, and `now` is always the last boundary, so the windows
//! are contiguous, never overlap, and cover the range exactly.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Months, Utc};

/// One unit of extraction work. The bookmark advances to `end` once every
/// bite of the window has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// `true` when the window has no width (bookmark == now).
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

/// Step between historical batch boundaries, e.g. `D`, `6H`, `2W`, `month`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequency {
    pub count: u32,
    pub unit: FrequencyUnit,
}

impl Default for Frequency {
    fn default() -> Self {
        Self {
            count: 1,
            unit: FrequencyUnit::Day,
        }
    }
}

impl Frequency {
    pub fn new(count: u32, unit: FrequencyUnit) -> Self {
        Self { count, unit }
    }

    /// Advance `ts` by one step. `None` on overflow.
    fn step(&self, ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let n = i64::from(self.count);
        match self.unit {
            FrequencyUnit::Minute => ts.checked_add_signed(Duration::minutes(n)),
            FrequencyUnit::Hour => ts.checked_add_signed(Duration::hours(n)),
            FrequencyUnit::Day => ts.checked_add_signed(Duration::days(n)),
            FrequencyUnit::Week => ts.checked_add_signed(Duration::weeks(n)),
            FrequencyUnit::Month => ts.checked_add_months(Months::new(self.count)),
        }
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, alias) = s.split_at(split);

        let count = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<u32>()
                .map_err(|_| format!("invalid frequency multiple in {:?}", s))?
        };
        if count == 0 {
            return Err(format!("frequency multiple must be > 0 in {:?}", s));
        }

        let unit = match alias {
            "T" | "min" | "minute" | "minutes" => FrequencyUnit::Minute,
            "H" | "h" | "hour" | "hours" => FrequencyUnit::Hour,
            "D" | "d" | "day" | "days" => FrequencyUnit::Day,
            "W" | "w" | "week" | "weeks" => FrequencyUnit::Week,
            "M" | "MS" | "month" | "months" => FrequencyUnit::Month,
            other => {
                return Err(format!(
                    "unknown frequency {:?}: expected T, H, D, W or M (optionally with a multiple)",
                    other
                ))
            }
        };

        Ok(Self { count, unit })
    }
}

/// Boundary points from `start` to `end` inclusive, stepping by `freq`.
///
/// The first point is always `start` and the last is always `end`. When
/// `start >= end` the result is the single point `start`.
pub fn historical_boundaries(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    freq: Frequency,
) -> Vec<DateTime<Utc>> {
    let mut points = vec![start];
    if start >= end {
        return points;
    }

    let mut cursor = start;
    while let Some(next) = freq.step(cursor) {
        if next >= end {
            break;
        }
        points.push(next);
        cursor = next;
    }
    points.push(end);
    points
}

/// Partition `[last_run, now]` into the windows a table run will process.
///
/// Returns at least one window whenever `last_run <= now`. A historical
/// batch that yields a single boundary collapses to the plain
/// `[last_run, now]` window rather than producing nothing. A bookmark ahead
/// of `now` yields no windows, so it is never moved backwards.
pub fn extract_windows(
    last_run: DateTime<Utc>,
    now: DateTime<Utc>,
    historical_batch: bool,
    frequency: Option<Frequency>,
) -> Vec<Window> {
    if last_run > now {
        return Vec::new();
    }
    if historical_batch {
        let points = historical_boundaries(last_run, now, frequency.unwrap_or_default());
        if points.len() > 1 {
            return points
                .windows(2)
                .map(|pair| Window::new(pair[0], pair[1]))
                .collect();
        }
    }
    vec![Window::new(last_run, now)]
}
