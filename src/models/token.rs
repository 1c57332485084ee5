// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth token record and its two persisted facets.

use serde::{Deserialize, Serialize};

/// Access half of a token record (one document per athlete).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessFacet {
    /// Strava athlete ID (also used as document ID)
    pub athlete_id: u64,
    pub access_token: String,
    /// Absolute expiry, epoch seconds
    pub expires_at: i64,
}

/// Refresh half of a token record (one document per athlete).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshFacet {
    pub athlete_id: u64,
    pub refresh_token: String,
}

/// Logical token record for one athlete.
///
/// The refresh token lives in a separately stored facet and is only read
/// when a refresh is actually needed, so it starts out as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub athlete_id: u64,
    pub access_token: String,
    pub expires_at: i64,
    pub refresh_token: Option<String>,
}

impl TokenRecord {
    /// True if the access token is still usable at `now` with `margin_secs` to spare.
    pub fn is_valid_at(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at > now.saturating_add(margin_secs)
    }

    pub fn access_facet(&self) -> AccessFacet {
        AccessFacet {
            athlete_id: self.athlete_id,
            access_token: self.access_token.clone(),
            expires_at: self.expires_at,
        }
    }
}

impl From<AccessFacet> for TokenRecord {
    fn from(facet: AccessFacet) -> Self {
        Self {
            athlete_id: facet.athlete_id,
            access_token: facet.access_token,
            expires_at: facet.expires_at,
            refresh_token: None,
        }
    }
}
