//! Cron expression parsing and matching.
//!
//! Field order and ranges are standard POSIX cron: minute 0-59, hour 0-23,
//! day-of-month 1-31, month 1-12, day-of-week 0-6 (Sunday = 0).

use chrono::{DateTime, Duration, Local, Timelike};

use crate::clock::WallClock;

/// Split a cron expression on whitespace. `Some` iff exactly 5 fields.
///
/// No per-field validation happens here — malformed clauses are tolerated
/// and rejected later by [`field_matches`], which treats anything it cannot
/// parse as non-matching.
pub fn parse_cron_parts(expr: &str) -> Option<Vec<&str>> {
    let parts: Vec<&str> = expr.split_whitespace().collect();
    if parts.len() == 5 { Some(parts) } else { None }
}

/// Check whether a full 5-field expression matches a wall-clock instant.
/// A wrong field count matches nothing.
pub fn cron_matches(expr: &str, at: &WallClock) -> bool {
    let Some(parts) = parse_cron_parts(expr) else {
        return false;
    };
    field_matches(parts[0], at.minute as i64, 0, 59)
        && field_matches(parts[1], at.hour as i64, 0, 23)
        && field_matches(parts[2], at.day_of_month as i64, 1, 31)
        && field_matches(parts[3], at.month as i64, 1, 12)
        && field_matches(parts[4], at.weekday as i64, 0, 6)
}

/// Evaluate one cron field against a concrete value.
///
/// `*` matches everything; otherwise the field is a comma-separated list of
/// clauses and a match on any clause matches the field.
pub fn field_matches(field: &str, value: i64, min: i64, max: i64) -> bool {
    let field = field.trim();
    if field == "*" {
        return true;
    }
    field
        .split(',')
        .any(|clause| clause_matches(clause.trim(), value, min, max))
}

/// Evaluate a single clause: `A`, `A-B`, `*/N`, `A-B/N`, or `A/N`.
///
/// A clause that fails to parse is skipped: it does not match, and it does
/// not stop the remaining comma alternatives. Every malformed-input decision
/// funnels through here, so a stricter save-time validator can be layered on
/// top without touching match semantics.
fn clause_matches(clause: &str, value: i64, min: i64, max: i64) -> bool {
    if let Some((range, step)) = clause.split_once('/') {
        let Ok(step) = step.trim().parse::<i64>() else {
            return false;
        };
        if step <= 0 {
            return false;
        }
        let (start, end) = if range.is_empty() || range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            match (a.parse::<i64>(), b.parse::<i64>()) {
                (Ok(a), Ok(b)) => (a, b),
                _ => return false,
            }
        } else {
            // Bare start: "A/N" steps from A to the field maximum.
            match range.parse::<i64>() {
                Ok(a) => (a, max),
                Err(_) => return false,
            }
        };
        value >= start && value <= end && (value - start) % step == 0
    } else if let Some((a, b)) = clause.split_once('-') {
        match (a.parse::<i64>(), b.parse::<i64>()) {
            (Ok(start), Ok(end)) => value >= start && value <= end,
            _ => false,
        }
    } else {
        clause.parse::<i64>().is_ok_and(|n| n == value)
    }
}

/// Walk forward minute-by-minute to the next instant the expression matches.
///
/// Preview-only helper for `upcoming`/`check` output — the driver never uses
/// this to decide firing, so preview and firing agree by construction.
/// Bounded at a little over a year so a yearly expression still resolves.
pub fn next_match(expr: &str, after: DateTime<Local>) -> Option<DateTime<Local>> {
    parse_cron_parts(expr)?;

    let mut candidate = after + Duration::minutes(1);
    candidate = candidate.with_second(0).unwrap_or(candidate);
    candidate = candidate.with_nanosecond(0).unwrap_or(candidate);

    for _ in 0..(366 * 24 * 60) {
        if cron_matches(expr, &WallClock::sample(&candidate)) {
            return Some(candidate);
        }
        candidate += Duration::minutes(1);
    }
    None
}
