// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time handling.

use chrono::{DateTime, Utc};

/// Current time as epoch seconds.
pub fn now_epoch() -> i64 {
    Utc::now().timestamp()
}

/// Parse a Strava RFC3339 timestamp (e.g. `2024-05-04T15:30:00Z`) into UTC.
pub fn parse_rfc3339_utc(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}
