// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! FitTrackee workout model.

use crate::time_utils::parse_workout_date;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Workout as returned by the FitTrackee API.
///
/// Every value is populated by the server. The two `present_*` flags are
/// annotations for the current run and never come from (or go to) the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workout {
    /// FitTrackee workout ID (short UUID string)
    pub id: String,
    /// FitTrackee sport ID
    pub sport_id: i64,
    /// Start date/time as sent by the server (RFC 2822)
    pub workout_date: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Distance in km
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub ascent: Option<f64>,
    #[serde(default)]
    pub descent: Option<f64>,
    #[serde(default)]
    pub ave_speed: Option<f64>,
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub max_alt: Option<f64>,
    #[serde(default)]
    pub min_alt: Option<f64>,
    /// Durations are `H:MM:SS` strings
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub moving: Option<String>,
    #[serde(default)]
    pub pauses: Option<String>,
    /// `[min_lat, min_lng, max_lat, max_lng]`
    #[serde(default)]
    pub bounds: Option<Vec<f64>>,
    #[serde(default)]
    pub segments: Vec<WorkoutSegment>,
    /// Static map reference
    #[serde(default)]
    pub map: Option<String>,
    #[serde(default)]
    pub with_gpx: bool,
    #[serde(default)]
    pub records: Vec<serde_json::Value>,
    #[serde(default)]
    pub weather_start: Option<serde_json::Value>,
    #[serde(default)]
    pub weather_end: Option<serde_json::Value>,
    #[serde(default)]
    pub user: Option<serde_json::Value>,
    #[serde(default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub modification_date: Option<String>,

    /// Fields this client does not know about, kept only so they can be reported.
    #[serde(flatten)]
    pub unknown_fields: BTreeMap<String, serde_json::Value>,

    #[serde(skip)]
    pub present_on_destination: bool,
    #[serde(skip)]
    pub present_on_source: bool,
}

impl Workout {
    /// Parsed start timestamp.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        parse_workout_date(&self.workout_date)
    }

    pub fn mark_present_on_destination(&mut self) {
        self.present_on_destination = true;
    }

    pub fn mark_present_on_source(&mut self) {
        self.present_on_source = true;
    }

    /// Log (at debug level) any response fields that were not mapped.
    pub(crate) fn flag_unknown_fields(&self) {
        if !self.unknown_fields.is_empty() {
            let keys: Vec<&str> = self.unknown_fields.keys().map(String::as_str).collect();
            tracing::debug!(workout_id = %self.id, fields = ?keys, "Ignoring unknown workout fields");
        }
    }
}

/// One GPX segment of a workout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutSegment {
    #[serde(default)]
    pub segment_id: Option<i64>,
    #[serde(default)]
    pub workout_id: Option<String>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub moving: Option<String>,
    #[serde(default)]
    pub pauses: Option<String>,
    #[serde(default)]
    pub ascent: Option<f64>,
    #[serde(default)]
    pub descent: Option<f64>,
    #[serde(default)]
    pub ave_speed: Option<f64>,
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub max_alt: Option<f64>,
    #[serde(default)]
    pub min_alt: Option<f64>,
}

/// FitTrackee sport definition (`GET /api/sports`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sport {
    pub id: i64,
    pub label: String,
    #[serde(default)]
    pub is_active: bool,
}
