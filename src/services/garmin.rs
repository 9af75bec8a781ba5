// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Garmin Connect client for listing activities and downloading GPX tracks.
//!
//! Session handling is not done here: the OAuth2 token is read from the
//! directory written by the Garmin SSO login helper.

use crate::error::{Result, SyncError};
use crate::models::Activity;
use crate::time_utils::parse_garmin_gmt;
use chrono::{DateTime, Days, Utc};
use serde::Deserialize;
use std::future::Future;
use std::path::Path;

/// Page size of the Garmin activity search endpoint.
const ACTIVITY_PAGE_SIZE: usize = 20;

/// Token file inside the Garmin token directory.
pub const OAUTH2_TOKEN_FILE: &str = "oauth2_token.json";

const GARMIN_API_URL: &str = "https://connectapi.garmin.com";
const USER_AGENT: &str = "GCM-iOS-5.7.2.1";

/// Source operations the sync orchestrator relies on.
pub trait ActivitySource {
    /// Activities whose start time lies in `[start, end)`.
    fn list_activities_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Activity>>>;

    /// Raw GPX export of one activity.
    fn download_track(&self, activity_id: u64) -> impl Future<Output = Result<Vec<u8>>>;
}

/// Garmin Connect API client.
#[derive(Clone)]
pub struct GarminClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl GarminClient {
    pub fn new(access_token: String) -> Self {
        Self::with_base_url(GARMIN_API_URL.to_string(), access_token)
    }

    pub fn with_base_url(base_url: String, access_token: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url,
            access_token,
        }
    }

    /// Load the session token saved in `token_dir`.
    pub fn from_token_dir(token_dir: &Path) -> Result<Self> {
        let path = token_dir.join(OAUTH2_TOKEN_FILE);
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            SyncError::PreconditionFailed(format!(
                "Garmin session not found at {} ({}). Log in to Garmin Connect first",
                path.display(),
                e
            ))
        })?;
        let token: GarminOAuth2Token = serde_json::from_str(&raw).map_err(|e| {
            SyncError::PreconditionFailed(format!("Invalid Garmin token file {}: {}", path.display(), e))
        })?;
        Ok(Self::new(token.access_token))
    }

    /// One page of the activity search.  The endpoint filters on the
    /// user's local calendar date, so the query covers one extra day on
    /// each side of the window and callers filter on GMT start time.
    async fn search_page(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        offset: usize,
    ) -> Result<Vec<GarminActivitySummary>> {
        let first_day = start.date_naive() - Days::new(1);
        let last_day = end.date_naive() + Days::new(1);
        let url = format!(
            "{}/activitylist-service/activities/search/activities",
            self.base_url
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("startDate", first_day.to_string()),
                ("endDate", last_day.to_string()),
                ("start", offset.to_string()),
                ("limit", ACTIVITY_PAGE_SIZE.to_string()),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Decode(format!("JSON parse error: {}", e)))
    }
}

impl ActivitySource for GarminClient {
    async fn list_activities_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Activity>> {
        let mut summaries = Vec::new();
        loop {
            let page = self.search_page(start, end, summaries.len()).await?;
            let done = page.len() < ACTIVITY_PAGE_SIZE;
            summaries.extend(page);
            if done {
                break;
            }
        }

        // The search covers whole local days; keep only the requested window
        let activities = summaries
            .into_iter()
            .filter_map(|summary| summary.into_activity())
            .filter(|activity| activity.start_time >= start && activity.start_time < end)
            .collect();
        Ok(activities)
    }

    async fn download_track(&self, activity_id: u64) -> Result<Vec<u8>> {
        let url = format!(
            "{}/download-service/export/gpx/activity/{}",
            self.base_url, activity_id
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let bytes = check_response(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Token written by the Garmin SSO helper.
#[derive(Debug, Deserialize)]
struct GarminOAuth2Token {
    access_token: String,
}

/// Activity summary from the search endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminActivitySummary {
    activity_id: u64,
    #[serde(default)]
    activity_name: Option<String>,
    #[serde(rename = "startTimeGMT", default)]
    start_time_gmt: Option<String>,
    activity_type: GarminActivityType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminActivityType {
    #[serde(default)]
    type_id: serde_json::Value,
}

impl GarminActivitySummary {
    fn into_activity(self) -> Option<Activity> {
        let Some(start_time) = self.start_time_gmt.as_deref().and_then(parse_garmin_gmt) else {
            tracing::warn!(
                activity_id = self.activity_id,
                start = ?self.start_time_gmt,
                "Garmin activity has no usable start time, skipping"
            );
            return None;
        };
        Some(Activity {
            activity_id: self.activity_id,
            name: self.activity_name,
            type_id: self.activity_type.type_id,
            start_time,
        })
    }
}

async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    if status == 401 {
        tracing::warn!("Garmin session rejected (401)");
    }
    Err(SyncError::Api { status, body })
}
