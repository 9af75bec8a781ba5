// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for both platforms and the credential store.

pub mod activity;
pub mod credentials;
pub mod workout;

pub use activity::Activity;
pub use credentials::{Credentials, FittrackeeApp, TokenSet};
pub use workout::{Sport, Workout, WorkoutSegment};
