//! Wall-clock sampling — the evaluation instant, decomposed the way the
//! five cron fields need it.

use chrono::{Datelike, Timelike};

/// One evaluation instant, broken into the five cron components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    /// Minute (0-59).
    pub minute: u32,
    /// Hour (0-23).
    pub hour: u32,
    /// Day of month (1-31).
    pub day_of_month: u32,
    /// Month (1-12).
    pub month: u32,
    /// Day of week (0-6, Sunday = 0).
    pub weekday: u32,
}

impl WallClock {
    /// Sample the local wall-clock components of a date-time value.
    pub fn sample<T: Datelike + Timelike>(t: &T) -> Self {
        Self {
            minute: t.minute(),
            hour: t.hour(),
            day_of_month: t.day(),
            month: t.month(),
            weekday: t.weekday().num_days_from_sunday(),
        }
    }
}

/// Stable per-minute identity for a date-time value: `YYYY-MM-DDTHH:mm`,
/// zero-padded, local components, no seconds, no timezone marker.
///
/// Two samples within the same calendar minute yield the same key — this is
/// the sole dedup token that keeps a minute from double-firing.
pub fn minute_key<T: Datelike + Timelike>(t: &T) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}",
        t.year(),
        t.month(),
        t.day(),
        t.hour(),
        t.minute()
    )
}
