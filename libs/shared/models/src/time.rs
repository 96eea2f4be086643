use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Offset applied wherever wall-clock strings enter or leave the system.
/// Stored instants are always UTC; only parsing, formatting and the daily
/// projection below ever look at the local calendar.
pub const CANONICAL_OFFSET_MINUTES: i32 = 330;

pub fn canonical_offset() -> FixedOffset {
    FixedOffset::east_opt(CANONICAL_OFFSET_MINUTES * 60).expect("offset is within +/-24h")
}

#[derive(Debug, Clone, Error)]
#[error("start time must be before end time")]
pub struct InvalidWindow;

/// Half-open interval `[start_time, end_time)` over absolute instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Result<Self, InvalidWindow> {
        if start_time >= end_time {
            return Err(InvalidWindow);
        }
        Ok(Self { start_time, end_time })
    }

    /// Half-open intersection test. Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start_time <= instant && instant < self.end_time
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// True once the whole window lies strictly in the past.
    pub fn ends_before(&self, instant: DateTime<Utc>) -> bool {
        self.end_time < instant
    }

    /// Reuse this window's wall-clock time-of-day (in the canonical offset)
    /// on another calendar date. This is how a single availability window
    /// becomes a repeating daily pattern.
    pub fn project_onto(&self, date: NaiveDate) -> TimeWindow {
        TimeWindow {
            start_time: project_instant(self.start_time, date),
            end_time: project_instant(self.end_time, date),
        }
    }
}

fn project_instant(instant: DateTime<Utc>, date: NaiveDate) -> DateTime<Utc> {
    let local = instant.with_timezone(&canonical_offset());
    to_utc(date.and_time(local.time()))
}

fn to_utc(local: NaiveDateTime) -> DateTime<Utc> {
    canonical_offset()
        .from_local_datetime(&local)
        .single()
        .expect("fixed offset mapping is unambiguous")
        .with_timezone(&Utc)
}

/// Parse an external timestamp string. Values carrying an explicit offset are
/// honoured; naive wall-clock values are interpreted in the canonical offset.
pub fn parse_canonical(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M"))
        .map_err(|_| format!("unrecognised timestamp: {}", value))?;
    Ok(to_utc(naive))
}

/// Calendar date of an instant in the canonical offset.
pub fn canonical_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&canonical_offset()).date_naive()
}

/// First instant of a canonical calendar date, as UTC.
pub fn canonical_day_start(date: NaiveDate) -> DateTime<Utc> {
    to_utc(date.and_hms_opt(0, 0, 0).expect("midnight is a valid time"))
}

/// "9:00 AM" style label in the canonical offset.
pub fn format_canonical_time(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&canonical_offset())
        .format("%-I:%M %p")
        .to_string()
}

/// "Tuesday, June 4" style label in the canonical offset.
pub fn format_canonical_day(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&canonical_offset())
        .format("%A, %B %-d")
        .to_string()
}
