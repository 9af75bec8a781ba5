// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Garmin → FitTrackee synchronization.
//!
//! Handles the core workflow:
//! 1. Bootstrapping: resume after the newest FitTrackee workout, or start on
//!    January 1 of a bootstrap year
//! 2. Window walking: ask Garmin for activities one day at a time up to now
//! 3. Per activity: skip if already in the ledger, map the sport, download the
//!    GPX, stage it on disk, upload it, record the new pair
//!
//! Bootstrapping failures and run-fatal errors (see
//! [`SyncError::is_run_fatal`]) abort a run. Everything else that goes wrong
//! with a single activity or window is logged and skipped.

use crate::db::Ledger;
use crate::error::{Result, SyncError};
use crate::models::{Activity, Workout};
use crate::services::fittrackee::WorkoutDestination;
use crate::services::garmin::ActivitySource;
use crate::services::sports::fittrackee_sport_for_json;
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Garmin did not exist before this year.
pub const START_YEAR_FLOOR: i32 = 1990;

/// Length of one fetch window; also how far the cursor advances per step.
pub fn window_length() -> Duration {
    Duration::days(1)
}

/// Offset added to the newest workout so it is not fetched again.
pub fn resume_offset() -> Duration {
    Duration::minutes(1)
}

/// Run-level settings.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Bootstrap year used when FitTrackee has no workout yet
    pub start_year: Option<i32>,
    /// Whether the user may be prompted
    pub interactive: bool,
    /// Whether the identity ledger is consulted and written
    pub use_ledger: bool,
    /// Where tracks are staged before upload
    pub track_dir: PathBuf,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            start_year: None,
            interactive: true,
            use_ledger: false,
            track_dir: std::env::temp_dir(),
        }
    }
}

/// Orchestrator states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Bootstrapping,
    WindowWalking,
    Done,
    Aborted(String),
}

impl SyncState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Done | SyncState::Aborted(_))
    }

    /// Process exit code for a terminal state.
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncState::Done => 0,
            _ => 1,
        }
    }
}

/// Half-open fetch window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Walk from `start` to `now` in one-day windows.
///
/// The cursor only moves forward and every window end is clamped to `now`.
pub fn sync_windows(start: DateTime<Utc>, now: DateTime<Utc>) -> impl Iterator<Item = SyncWindow> {
    std::iter::successors(Some(start), |cursor| Some(*cursor + window_length()))
        .take_while(move |cursor| *cursor < now)
        .map(move |cursor| SyncWindow {
            start: cursor,
            end: (cursor + window_length()).min(now),
        })
}

/// Where the first window starts.
///
/// `prompt` is only called when FitTrackee is empty, no start year was given
/// and the run is interactive.
pub fn resolve_start<F>(
    latest: Option<&Workout>,
    options: &SyncOptions,
    prompt: F,
) -> Result<DateTime<Utc>>
where
    F: FnOnce() -> Option<i32>,
{
    if let Some(workout) = latest {
        let last = workout.start_time().ok_or_else(|| {
            SyncError::PreconditionFailed(format!(
                "Cannot parse date '{}' of workout {}",
                workout.workout_date, workout.id
            ))
        })?;
        tracing::debug!(last = %format_utc_rfc3339(last), "Newest FitTrackee workout");
        return Ok(last + resume_offset());
    }

    let year = match options.start_year {
        Some(year) => {
            tracing::warn!(year, "No workout present on FitTrackee, fetching Garmin activities from start year");
            year
        }
        None if options.interactive => {
            tracing::warn!("No workout present on FitTrackee");
            let year = prompt().ok_or_else(|| {
                SyncError::InvalidInput("No start year given".to_string())
            })?;
            tracing::info!(year, "Fetching Garmin activities from start year");
            year
        }
        None => {
            return Err(SyncError::PreconditionFailed(
                "No workout found on FitTrackee and interactive mode is off. \
                 Specify a year to start with --start-year"
                    .to_string(),
            ))
        }
    };

    if year < START_YEAR_FLOOR {
        return Err(SyncError::InvalidInput(format!(
            "Start year {} is before {}: Garmin was not selling trackers back then",
            year, START_YEAR_FLOOR
        )));
    }

    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| SyncError::InvalidInput(format!("Invalid start year {}", year)))
}

/// Pipeline step at which an activity was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStep {
    LedgerLookup,
    MapSport,
    Download,
    StageTrack,
    Upload,
}

/// What happened to one activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutcome {
    Uploaded { workout_id: String },
    AlreadySynced,
    Failed(FailedStep),
}

/// Counters for one run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub windows: usize,
    pub failed_windows: usize,
    pub activities_seen: usize,
    pub uploaded: usize,
    pub skipped_synced: usize,
    pub failed: usize,
    /// Tracks kept on disk after a failed upload
    pub retained_tracks: Vec<PathBuf>,
    pub first_cursor: Option<DateTime<Utc>>,
    pub last_cursor: Option<DateTime<Utc>>,
}

/// Final state and counters of a run.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub state: SyncState,
    pub report: SyncReport,
}

impl SyncOutcome {
    /// Outcome of a run that never got past its preconditions.
    pub fn aborted(error: &SyncError) -> Self {
        Self {
            state: SyncState::Aborted(error.to_string()),
            report: SyncReport::default(),
        }
    }
}

/// Drives one sync pass between an activity source and a workout destination.
pub struct Synchronizer<'a, S, D> {
    source: &'a S,
    destination: &'a D,
    ledger: Option<&'a Ledger>,
    options: SyncOptions,
}

impl<'a, S, D> Synchronizer<'a, S, D>
where
    S: ActivitySource,
    D: WorkoutDestination,
{
    pub fn new(source: &'a S, destination: &'a D, ledger: Option<&'a Ledger>, options: SyncOptions) -> Self {
        Self {
            source,
            destination,
            ledger,
            options,
        }
    }

    /// Ledger to consult, if the ledger feature is on.
    fn ledger(&self) -> Option<&'a Ledger> {
        if self.options.use_ledger {
            self.ledger
        } else {
            None
        }
    }

    /// Run one pass up to `now`.
    pub async fn run<F>(&self, now: DateTime<Utc>, prompt: F) -> SyncOutcome
    where
        F: FnOnce() -> Option<i32>,
    {
        let mut report = SyncReport::default();
        let mut state = SyncState::Bootstrapping;
        tracing::debug!(state = ?state, "Sync started");

        if self.options.use_ledger && self.ledger.is_none() {
            return self.abort(
                SyncError::PreconditionFailed("Ledger enabled but not opened".to_string()),
                report,
            );
        }

        let latest = match self.destination.most_recent_workout().await {
            Ok(latest) => latest,
            Err(e) if e.is_run_fatal() => return self.abort(e, report),
            Err(e) => {
                return self.abort(
                    SyncError::PreconditionFailed(format!("Cannot read newest FitTrackee workout: {}", e)),
                    report,
                )
            }
        };

        let start = match resolve_start(latest.as_ref(), &self.options, prompt) {
            Ok(start) => start,
            Err(e) => return self.abort(e, report),
        };

        state = SyncState::WindowWalking;
        tracing::debug!(state = ?state, start = %format_utc_rfc3339(start), "Bootstrapped");
        report.first_cursor = Some(start);

        for window in sync_windows(start, now) {
            report.windows += 1;
            report.last_cursor = Some(window.start);
            if let Err(e) = self.walk_window(window, &mut report).await {
                return self.abort(e, report);
            }
        }

        state = SyncState::Done;
        tracing::info!(
            state = ?state,
            windows = report.windows,
            uploaded = report.uploaded,
            skipped = report.skipped_synced,
            failed = report.failed,
            "Sync finished"
        );
        SyncOutcome { state, report }
    }

    fn abort(&self, error: SyncError, report: SyncReport) -> SyncOutcome {
        tracing::error!(error = %error, "Sync aborted");
        SyncOutcome {
            state: SyncState::Aborted(error.to_string()),
            report,
        }
    }

    /// Sync every activity of one window. Only run-fatal errors are returned.
    async fn walk_window(&self, window: SyncWindow, report: &mut SyncReport) -> Result<()> {
        tracing::info!(
            from = %format_utc_rfc3339(window.start),
            to = %format_utc_rfc3339(window.end),
            "Fetching activities on Garmin"
        );

        let activities = match self
            .source
            .list_activities_between(window.start, window.end)
            .await
        {
            Ok(activities) => activities,
            Err(e) if e.is_run_fatal() => return Err(e),
            Err(e) => {
                tracing::error!(
                    from = %format_utc_rfc3339(window.start),
                    per_item = e.is_per_item(),
                    error = %e,
                    "Failed to list Garmin activities, skipping window"
                );
                report.failed_windows += 1;
                return Ok(());
            }
        };

        for activity in &activities {
            report.activities_seen += 1;
            match self.sync_activity(activity, report).await? {
                ActivityOutcome::Uploaded { .. } => report.uploaded += 1,
                ActivityOutcome::AlreadySynced => report.skipped_synced += 1,
                ActivityOutcome::Failed(_) => report.failed += 1,
            }
        }
        Ok(())
    }

    /// Run the per-activity pipeline.
    ///
    /// A failing step abandons the activity with [`ActivityOutcome::Failed`];
    /// only run-fatal errors are returned.
    pub async fn sync_activity(
        &self,
        activity: &Activity,
        report: &mut SyncReport,
    ) -> Result<ActivityOutcome> {
        let activity_id = activity.activity_id;

        if let Some(ledger) = self.ledger() {
            match ledger.exists(activity_id) {
                Ok(true) => {
                    tracing::debug!(activity_id, "Activity already synced, skipping");
                    return Ok(ActivityOutcome::AlreadySynced);
                }
                Ok(false) => {}
                Err(e) => return abandon(activity_id, FailedStep::LedgerLookup, e),
            }
        }

        let sport_id = match fittrackee_sport_for_json(&activity.type_id) {
            Ok(sport_id) => sport_id,
            Err(e) => return abandon(activity_id, FailedStep::MapSport, e),
        };

        let downloaded = match self.source.download_track(activity_id).await {
            Ok(track) => track,
            Err(e) => return abandon(activity_id, FailedStep::Download, e),
        };

        let staged = match StagedTrack::write(&self.options.track_dir, activity_id, &downloaded) {
            Ok(staged) => staged,
            Err(e) => return abandon(activity_id, FailedStep::StageTrack, e.into()),
        };
        tracing::info!(activity_id, path = %staged.path().display(), "Activity data downloaded");
        // Upload the staged bytes; a retained file holds exactly what was sent
        let track = match staged.contents() {
            Ok(track) => track,
            Err(e) => return abandon(activity_id, FailedStep::StageTrack, e.into()),
        };

        let file_name = format!("{}.gpx", activity_id);
        let workout = match self
            .destination
            .upload_track(track, file_name, sport_id, None)
            .await
        {
            Ok(workout) => workout,
            Err(e) => {
                match staged.retain() {
                    Ok(path) => {
                        tracing::info!(activity_id, path = %path.display(), "Track kept for inspection");
                        report.retained_tracks.push(path);
                    }
                    Err(e) => tracing::warn!(activity_id, error = %e, "Failed to keep track file"),
                }
                return abandon(activity_id, FailedStep::Upload, e);
            }
        };

        if let Err(e) = staged.discard() {
            tracing::warn!(activity_id, error = %e, "Failed to delete track file");
        }

        if let Some(ledger) = self.ledger() {
            tracing::debug!(workout_id = %workout.id, activity_id, "Recording ledger entry");
            match ledger.record(&workout.id, activity_id) {
                Ok(()) => {}
                Err(SyncError::ConstraintViolation(msg)) => {
                    tracing::warn!(workout_id = %workout.id, activity_id, reason = %msg, "Ledger already holds one of these ids");
                }
                Err(e) => {
                    tracing::warn!(workout_id = %workout.id, activity_id, error = %e, "Failed to record ledger entry");
                }
            }
        }

        Ok(ActivityOutcome::Uploaded {
            workout_id: workout.id,
        })
    }
}

/// Give up on one activity, or stop the run if `error` is run-fatal.
fn abandon(activity_id: u64, step: FailedStep, error: SyncError) -> Result<ActivityOutcome> {
    if error.is_run_fatal() {
        return Err(error);
    }
    tracing::error!(
        activity_id,
        step = ?step,
        status = ?error.status(),
        per_item = error.is_per_item(),
        error = %error,
        "Activity abandoned"
    );
    Ok(ActivityOutcome::Failed(step))
}

/// A downloaded track staged on disk.
///
/// Dropping it deletes the file; [`StagedTrack::retain`] keeps it.
struct StagedTrack {
    file: NamedTempFile,
}

impl StagedTrack {
    fn write(dir: &Path, activity_id: u64, track: &[u8]) -> std::io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}-", activity_id))
            .suffix(".gpx")
            .tempfile_in(dir)?;
        file.write_all(track)?;
        file.flush()?;
        Ok(Self { file })
    }

    fn path(&self) -> &Path {
        self.file.path()
    }

    fn contents(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.path())
    }

    fn retain(self) -> std::io::Result<PathBuf> {
        let (_, path) = self.file.keep().map_err(|e| e.error)?;
        Ok(path)
    }

    fn discard(self) -> std::io::Result<()> {
        self.file.close()
    }
}
