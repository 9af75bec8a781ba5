// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - API clients and sync logic.

pub mod fittrackee;
pub mod garmin;
pub mod oauth;
pub mod sports;
pub mod sync;

pub use fittrackee::{FittrackeeClient, WorkoutDestination, WorkoutPager};
pub use garmin::{ActivitySource, GarminClient};
pub use oauth::{OAuthClient, TokenManager};
pub use sync::{SyncOptions, SyncOutcome, SyncReport, SyncState, Synchronizer};
