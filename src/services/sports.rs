// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Garmin activity type → FitTrackee sport mapping.
//!
//! The mapping is product knowledge, not an algorithm, so it lives in two
//! static tables: Garmin type ids grouped by sport, and sport → FitTrackee id.

use crate::error::{Result, SyncError};

/// FitTrackee sport categories this tool uploads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SportGroup {
    CyclingRoad,
    MountainBiking,
    MountainBikingElectric,
    CyclingVirtual,
    Running,
    Hiking,
    Walking,
    Snowshoes,
    SkiingAlpine,
    SkiingCrossCountry,
    Mountaineering,
    OpenWaterSwimming,
    Trail,
    Rowing,
}

impl SportGroup {
    /// FitTrackee sport ID for this group.
    pub fn fittrackee_id(self) -> i64 {
        match FITTRACKEE_SPORT_IDS.iter().find(|(group, _)| *group == self) {
            Some((_, id)) => *id,
            None => DEFAULT_SPORT_ID,
        }
    }
}

/// Sport used when a Garmin type is not in the table.
pub const DEFAULT_GROUP: SportGroup = SportGroup::CyclingRoad;

/// FitTrackee id of [`DEFAULT_GROUP`].
pub const DEFAULT_SPORT_ID: i64 = 1;

/// Garmin activity type ids per sport group.
pub const GARMIN_TYPE_GROUPS: &[(SportGroup, &[i64])] = &[
    // cycling, road_cycling, track_cycling, recumbent_cycling, hand_cycling
    (SportGroup::CyclingRoad, &[2, 10, 21, 22, 197]),
    // mountain_biking, cyclocross, downhill_biking, gravel_cycling
    (SportGroup::MountainBiking, &[5, 19, 20, 143]),
    // e_bike_mountain
    (SportGroup::MountainBikingElectric, &[175]),
    // indoor_cycling, virtual_ride, e_bike_fitness, indoor_hand_cycling
    (SportGroup::CyclingVirtual, &[25, 152, 176, 198]),
    // running, street, track, treadmill, virtual, obstacle, indoor, ultra
    (SportGroup::Running, &[1, 7, 8, 18, 153, 154, 156, 181]),
    (SportGroup::Hiking, &[3]),
    // walking, casual_walking, speed_walking
    (SportGroup::Walking, &[9, 15, 16]),
    // snow_shoe_ws
    (SportGroup::Snowshoes, &[167]),
    // resort_skiing_snowboarding_ws, resort_skiing, resort_snowboarding
    (SportGroup::SkiingAlpine, &[172, 251, 252]),
    // skating_ws, backcountry (ws), skate_skiing_ws, cross_country_skiing_ws,
    // backcountry_skiing, backcountry_snowboarding
    (
        SportGroup::SkiingCrossCountry,
        &[168, 169, 170, 171, 203, 204],
    ),
    (SportGroup::Mountaineering, &[37]),
    (SportGroup::OpenWaterSwimming, &[28]),
    (SportGroup::Trail, &[6]),
    // indoor_rowing, rowing_v2
    (SportGroup::Rowing, &[32, 237]),
];

/// FitTrackee sport id per group.
pub const FITTRACKEE_SPORT_IDS: &[(SportGroup, i64)] = &[
    (SportGroup::CyclingRoad, 1),
    (SportGroup::Hiking, 3),
    (SportGroup::MountainBiking, 4),
    (SportGroup::Running, 5),
    (SportGroup::Walking, 6),
    (SportGroup::MountainBikingElectric, 7),
    (SportGroup::Trail, 8),
    (SportGroup::SkiingAlpine, 9),
    (SportGroup::SkiingCrossCountry, 10),
    (SportGroup::Rowing, 11),
    (SportGroup::Snowshoes, 12),
    (SportGroup::CyclingVirtual, 13),
    (SportGroup::Mountaineering, 14),
    (SportGroup::OpenWaterSwimming, 16),
];

/// Look up the sport group for a Garmin type id.
pub fn group_for_garmin_type(garmin_type_id: i64) -> Option<SportGroup> {
    GARMIN_TYPE_GROUPS
        .iter()
        .find(|(_, ids)| ids.contains(&garmin_type_id))
        .map(|(group, _)| *group)
}

/// Map a Garmin activity type id to a FitTrackee sport id.
///
/// Total: unknown types fall back to road cycling.
pub fn fittrackee_sport_for(garmin_type_id: i64) -> i64 {
    match group_for_garmin_type(garmin_type_id) {
        Some(group) => {
            tracing::debug!(garmin_type_id, sport = ?group, "Matched Garmin activity type");
            group.fittrackee_id()
        }
        None => {
            tracing::warn!(
                garmin_type_id,
                fallback = ?DEFAULT_GROUP,
                "No FitTrackee sport for Garmin activity type, using fallback"
            );
            DEFAULT_SPORT_ID
        }
    }
}

/// Map a raw JSON type id (as found in Garmin responses).
///
/// Anything that is not an integer is an `InvalidInput`.
pub fn fittrackee_sport_for_json(value: &serde_json::Value) -> Result<i64> {
    value
        .as_i64()
        .map(fittrackee_sport_for)
        .ok_or_else(|| SyncError::InvalidInput(format!("Garmin type id {} is not an integer", value)))
}
