//! # Loomflow Cron
//!
//! Lightweight cron expression matcher for schedule triggers.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Clauses: *, N, A-B, A,B,C, */N, A-B/N, A/N
//! Example: "30 14 * * 1-5" = weekdays at 14:30
//!
//! No cron crate dependency — the matcher answers one question only:
//! does this expression match this wall-clock minute? The driver asks it
//! once per minute; there is no precomputed schedule table, so trigger
//! config edits take effect within one tick.
//!
//! Unsupported by contract: `?`, month/day names (JAN, MON), a seconds
//! field, and `L`/`W`/`#`. A clause the matcher cannot parse never matches;
//! it is skipped without error so the remaining comma alternatives still
//! get their chance. The whole silent-skip policy lives in `clause_matches`.

pub mod clock;
pub mod expr;

pub use clock::{WallClock, minute_key};
pub use expr::{cron_matches, field_matches, next_match, parse_cron_parts};
