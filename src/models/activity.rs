// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava activity model as returned by the API.

use serde::{Deserialize, Serialize};

/// The parts of a detailed Strava activity needed for annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Start date/time (ISO 8601, UTC)
    pub start_date: String,
    /// `[lat, lng]` when the activity has a recorded location, otherwise empty
    #[serde(default)]
    pub start_latlng: Vec<f64>,
    /// Current description; `None` when never set
    #[serde(default)]
    pub description: Option<String>,
}

impl Activity {
    /// Start coordinates, if the activity has exactly one lat/lng pair.
    pub fn start_coordinates(&self) -> Option<(f64, f64)> {
        match self.start_latlng.as_slice() {
            [lat, lng] => Some((*lat, *lng)),
            _ => None,
        }
    }
}
