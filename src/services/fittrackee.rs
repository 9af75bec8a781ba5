// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FitTrackee API client for listing, uploading and deleting workouts.
//!
//! Handles:
//! - Workout listing with transparent pagination
//! - GPX upload (multipart) and workout deletion
//! - Instance version checks against the supported API range
//! - Error classification (transport vs. HTTP status)
//!
//! Every call is attempted once; retrying is the caller's decision.

use crate::db::CredentialStore;
use crate::error::{Result, SyncError};
use crate::models::{Credentials, Sport, Workout};
use crate::services::oauth::{OAuthClient, TokenManager, TokenUpdateCallback};
use serde::Deserialize;
use std::collections::VecDeque;
use std::future::Future;

/// Oldest supported FitTrackee version (inclusive).
pub const MIN_SUPPORTED_VERSION: [u64; 3] = [0, 7, 29];

/// First unsupported FitTrackee version (exclusive).
pub const MAX_SUPPORTED_VERSION: [u64; 3] = [0, 10, 0];

/// Destination operations the sync orchestrator relies on.
pub trait WorkoutDestination {
    /// Most recent workout by start date, if any.
    fn most_recent_workout(&self) -> impl Future<Output = Result<Option<Workout>>>;

    /// Upload one GPX track. The returned workout is marked present on both platforms.
    fn upload_track(
        &self,
        track: Vec<u8>,
        file_name: String,
        sport_id: i64,
        notes: Option<String>,
    ) -> impl Future<Output = Result<Workout>>;
}

/// Base URL of an instance.
///
/// A bare host is reached over HTTPS; an explicit scheme is kept as-is.
pub fn instance_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Parse a dotted version into `[major, minor, patch]`.
///
/// Missing components are 0; anything after `-` or `+` is ignored.
pub fn parse_version(version: &str) -> Option<[u64; 3]> {
    let core = version
        .trim()
        .trim_start_matches('v')
        .split(['-', '+'])
        .next()?;
    let mut parts = [0u64; 3];
    for (i, component) in core.split('.').enumerate() {
        if i >= 3 {
            break;
        }
        parts[i] = component.parse().ok()?;
    }
    Some(parts)
}

/// Whether a version lies in `[MIN_SUPPORTED_VERSION, MAX_SUPPORTED_VERSION)`.
pub fn version_in_supported_range(version: &str) -> bool {
    match parse_version(version) {
        Some(v) => v >= MIN_SUPPORTED_VERSION && v < MAX_SUPPORTED_VERSION,
        None => false,
    }
}

/// FitTrackee API client.
pub struct FittrackeeClient {
    http: reqwest::Client,
    api_url: String,
    tokens: TokenManager,
}

impl FittrackeeClient {
    /// Create a client for the instance at `instance_url` (see [`instance_url`]).
    pub fn new(http: reqwest::Client, instance_url: &str, tokens: TokenManager) -> Self {
        Self {
            http,
            api_url: format!("{}/api", instance_url),
            tokens,
        }
    }

    /// Build a client from stored credentials.
    ///
    /// Refreshed tokens are written back to `store`.
    pub fn from_credentials(credentials: &Credentials, store: CredentialStore) -> Result<Self> {
        let tokens = credentials.tokens.clone().ok_or_else(|| {
            SyncError::PreconditionFailed(
                "No FitTrackee tokens stored. Run `setup destination` first".to_string(),
            )
        })?;

        let http = reqwest::Client::new();
        let base = instance_url(&credentials.fittrackee.host);
        let oauth = OAuthClient::new(
            http.clone(),
            base.clone(),
            credentials.fittrackee.client_id.clone(),
            credentials.fittrackee.client_secret.clone(),
        );
        let on_update: TokenUpdateCallback = Box::new(move |tokens| {
            tracing::debug!("New FitTrackee token received, saving it");
            store
                .save_tokens(tokens)
                .map_err(|e| SyncError::PreconditionFailed(e.to_string()))
        });

        Ok(Self::new(
            http,
            &base,
            TokenManager::new(oauth, tokens, on_update),
        ))
    }

    /// Whether at least one workout exists.
    pub async fn has_any_workout(&self) -> Result<bool> {
        let page = self.fetch_page(1, 1, false).await?;
        tracing::debug!(count = page.data.workouts.len(), "Checked for workouts");
        Ok(!page.data.workouts.is_empty())
    }

    /// Lazily iterate every workout, `page_size` per request.
    pub fn workouts(&self, page_size: u32) -> WorkoutPager<'_> {
        WorkoutPager {
            client: self,
            page_size,
            next_page: Some(1),
            buffer: VecDeque::new(),
            requests: 0,
        }
    }

    /// Collect every workout.
    pub async fn all_workouts(&self, page_size: u32) -> Result<Vec<Workout>> {
        tracing::info!(page_size, "Fetching all workouts from FitTrackee");
        let mut pager = self.workouts(page_size);
        let mut workouts = Vec::new();
        while let Some(workout) = pager.next_workout().await? {
            workouts.push(workout);
        }
        Ok(workouts)
    }

    /// Most recent workout by start date.
    pub async fn most_recent_workout(&self) -> Result<Option<Workout>> {
        let page = self.fetch_page(1, 1, true).await?;
        Ok(page.data.workouts.into_iter().next().map(|mut workout| {
            workout.flag_unknown_fields();
            workout.mark_present_on_destination();
            workout
        }))
    }

    /// Upload a GPX track as a new workout.
    pub async fn upload_track(
        &self,
        track: Vec<u8>,
        file_name: &str,
        sport_id: i64,
        notes: Option<&str>,
    ) -> Result<Workout> {
        tracing::debug!(file_name, sport_id, "Posting track to FitTrackee");

        let data = serde_json::json!({
            "sport_id": sport_id,
            "notes": notes.unwrap_or(""),
        });
        let file = reqwest::multipart::Part::bytes(track)
            .file_name(file_name.to_string())
            .mime_str("application/gpx+xml")
            .map_err(|e| SyncError::InvalidInput(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("data", data.to_string());

        let access_token = self.tokens.access_token().await?;
        let response = self
            .http
            .post(format!("{}/workouts", self.api_url))
            .bearer_auth(access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let envelope: WorkoutsEnvelope = check_response_json(response).await?;
        let mut workout = envelope.data.workouts.into_iter().next().ok_or_else(|| {
            SyncError::Decode("Upload response contained no workout".to_string())
        })?;
        workout.flag_unknown_fields();
        workout.mark_present_on_destination();
        workout.mark_present_on_source();

        tracing::info!(workout_id = %workout.id, "Workout added on FitTrackee");
        Ok(workout)
    }

    /// Delete a workout.
    pub async fn delete_workout(&self, workout_id: &str) -> Result<()> {
        let access_token = self.tokens.access_token().await?;
        let response = self
            .http
            .delete(format!("{}/workouts/{}", self.api_url, workout_id))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        check_response(response).await?;
        tracing::warn!(workout_id, "Workout deleted");
        Ok(())
    }

    /// Sports defined on the instance.
    pub async fn get_sports(&self) -> Result<Vec<Sport>> {
        let access_token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(format!("{}/sports", self.api_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let envelope: SportsEnvelope = check_response_json(response).await?;
        Ok(envelope.data.sports)
    }

    /// Version reported by an instance's public `/api/config`.
    pub async fn instance_version(http: &reqwest::Client, instance_url: &str) -> Result<String> {
        let response = http
            .get(format!("{}/api/config", instance_url))
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let envelope: ConfigEnvelope = check_response_json(response).await?;
        Ok(envelope.data.version)
    }

    /// Whether an instance runs a supported FitTrackee version.
    ///
    /// Any failure to read the version counts as unsupported.
    pub async fn is_instance_supported(http: &reqwest::Client, instance_url: &str) -> bool {
        match Self::instance_version(http, instance_url).await {
            Ok(version) => {
                let supported = version_in_supported_range(&version);
                tracing::debug!(%version, supported, "Checked FitTrackee version");
                supported
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to get instance config");
                false
            }
        }
    }

    /// Like [`Self::is_instance_supported`] but reports why.
    pub async fn ensure_instance_supported(
        http: &reqwest::Client,
        instance_url: &str,
    ) -> Result<String> {
        let version = Self::instance_version(http, instance_url)
            .await
            .map_err(|e| SyncError::PreconditionFailed(format!("FitTrackee unreachable: {}", e)))?;
        if !version_in_supported_range(&version) {
            return Err(SyncError::UnsupportedInstance(format!(
                "version {} is outside the supported range [{}, {})",
                version,
                join_version(MIN_SUPPORTED_VERSION),
                join_version(MAX_SUPPORTED_VERSION)
            )));
        }
        Ok(version)
    }

    /// Fetch one page of `/workouts`.
    async fn fetch_page(&self, page: u32, per_page: u32, newest_first: bool) -> Result<WorkoutsEnvelope> {
        let mut query = vec![
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];
        if newest_first {
            query.push(("order", "desc".to_string()));
        }

        let access_token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(format!("{}/workouts", self.api_url))
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        check_response_json(response).await
    }
}

impl WorkoutDestination for FittrackeeClient {
    async fn most_recent_workout(&self) -> Result<Option<Workout>> {
        FittrackeeClient::most_recent_workout(self).await
    }

    async fn upload_track(
        &self,
        track: Vec<u8>,
        file_name: String,
        sport_id: i64,
        notes: Option<String>,
    ) -> Result<Workout> {
        FittrackeeClient::upload_track(self, track, &file_name, sport_id, notes.as_deref()).await
    }
}

/// Lazy page-by-page workout iterator.
pub struct WorkoutPager<'a> {
    client: &'a FittrackeeClient,
    page_size: u32,
    next_page: Option<u32>,
    buffer: VecDeque<Workout>,
    requests: u32,
}

impl WorkoutPager<'_> {
    /// Next workout, fetching the next page when the current one is used up.
    pub async fn next_workout(&mut self) -> Result<Option<Workout>> {
        while self.buffer.is_empty() {
            let Some(page) = self.next_page else {
                return Ok(None);
            };

            let envelope = match self.client.fetch_page(page, self.page_size, false).await {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::error!(page, error = %e, "Failed to get workouts page");
                    self.next_page = None;
                    return Err(e);
                }
            };
            self.requests += 1;

            let has_next = envelope.pagination.map(|p| p.has_next).unwrap_or(false);
            self.next_page = if has_next { Some(page + 1) } else { None };

            for mut workout in envelope.data.workouts {
                workout.flag_unknown_fields();
                workout.mark_present_on_destination();
                self.buffer.push_back(workout);
            }
            tracing::debug!(page, buffered = self.buffer.len(), has_next, "Fetched workouts page");
        }
        Ok(self.buffer.pop_front())
    }

    /// Number of page requests issued so far.
    pub fn requests(&self) -> u32 {
        self.requests
    }
}

/// `{"data": {"workouts": [...]}, "pagination": {...}}`
#[derive(Debug, Deserialize)]
struct WorkoutsEnvelope {
    data: WorkoutsData,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct WorkoutsData {
    #[serde(default)]
    workouts: Vec<Workout>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    has_next: bool,
}

#[derive(Debug, Deserialize)]
struct SportsEnvelope {
    data: SportsData,
}

#[derive(Debug, Deserialize)]
struct SportsData {
    sports: Vec<Sport>,
}

#[derive(Debug, Deserialize)]
struct ConfigEnvelope {
    data: InstanceConfig,
}

#[derive(Debug, Deserialize)]
struct InstanceConfig {
    version: String,
}

fn join_version(v: [u64; 3]) -> String {
    format!("{}.{}.{}", v[0], v[1], v[2])
}

/// Check response status and return error if not successful.
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status, body = %body, "FitTrackee request rejected");
    Err(SyncError::Api { status, body })
}

/// Check response and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
    let response = check_response(response).await?;
    response
        .json()
        .await
        .map_err(|e| SyncError::Decode(format!("JSON parse error: {}", e)))
}
