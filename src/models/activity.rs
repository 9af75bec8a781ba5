// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Garmin Connect activity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Activity summary as listed by Garmin Connect.
///
/// The raw track is downloaded lazily through the activity source, so it is
/// not part of this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Garmin activity ID
    pub activity_id: u64,
    /// Activity name/title
    pub name: Option<String>,
    /// Garmin activity type code, kept as raw JSON because upstream data is
    /// not guaranteed to be an integer
    pub type_id: serde_json::Value,
    /// Start date/time (UTC)
    pub start_time: DateTime<Utc>,
}

impl Activity {
    pub fn new(activity_id: u64, type_id: i64, start_time: DateTime<Utc>) -> Self {
        Self {
            activity_id,
            name: None,
            type_id: serde_json::Value::from(type_id),
            start_time,
        }
    }
}
