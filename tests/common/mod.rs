// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{delete, get, post},
    Form, Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use garmin_to_fittrackee::error::{Result, SyncError};
use garmin_to_fittrackee::models::{Activity, Credentials, FittrackeeApp, TokenSet, Workout};
use garmin_to_fittrackee::services::{ActivitySource, WorkoutDestination};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const ACCESS_TOKEN: &str = "access-token";
pub const REFRESHED_TOKEN: &str = "refreshed-token";
#[allow(dead_code)]
pub const GARMIN_TOKEN: &str = "garmin-token";

/// State of the fake FitTrackee instance.
pub struct FakeFittrackee {
    pub version: Mutex<String>,
    /// Accepted bearer token
    pub access_token: Mutex<String>,
    /// Workouts, oldest first
    pub workouts: Mutex<Vec<Value>>,
    /// Upload bodies, in order
    pub uploads: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    /// Status returned for every upload when set
    pub reject_uploads: Mutex<Option<u16>>,
    pub list_requests: AtomicUsize,
    pub token_requests: AtomicUsize,
    next_id: AtomicUsize,
}

impl Default for FakeFittrackee {
    fn default() -> Self {
        Self {
            version: Mutex::new("0.8.12".to_string()),
            access_token: Mutex::new(ACCESS_TOKEN.to_string()),
            workouts: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            reject_uploads: Mutex::new(None),
            list_requests: AtomicUsize::new(0),
            token_requests: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        }
    }
}

impl FakeFittrackee {
    /// Add a workout starting at `start`.
    #[allow(dead_code)]
    pub fn add_workout(&self, start: DateTime<Utc>, sport_id: i64) -> String {
        let id = format!("wk{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.workouts.lock().unwrap().push(json!({
            "id": id,
            "sport_id": sport_id,
            "workout_date": start.to_rfc2822().replace("+0000", "GMT"),
            "title": "Workout",
            "distance": 12.5,
            "with_gpx": true,
            "segments": [],
            "records": [],
            "bounds": null,
        }));
        id
    }

    #[allow(dead_code)]
    pub fn workout_count(&self) -> usize {
        self.workouts.lock().unwrap().len()
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.access_token.lock().unwrap());
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v == expected)
            .unwrap_or(false)
    }
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"status": "error", "message": "invalid token"})),
    )
}

async fn instance_config(State(state): State<Arc<FakeFittrackee>>) -> Json<Value> {
    let version = state.version.lock().unwrap().clone();
    Json(json!({"status": "success", "data": {"version": version, "is_registration_enabled": false}}))
}

async fn list_workouts(
    State(state): State<Arc<FakeFittrackee>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    state.list_requests.fetch_add(1, Ordering::SeqCst);

    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let per_page: usize = params.get("per_page").and_then(|p| p.parse().ok()).unwrap_or(5);
    let mut workouts = state.workouts.lock().unwrap().clone();
    if params.get("order").map(String::as_str) == Some("desc") {
        workouts.reverse();
    }

    let total = workouts.len();
    let items: Vec<Value> = workouts
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();
    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "data": {"workouts": items},
            "pagination": {
                "has_next": page * per_page < total,
                "has_prev": page > 1,
                "page": page,
                "pages": total.div_ceil(per_page),
                "total": total,
            }
        })),
    )
}

/// Start time written by [`gpx_for`] into a track.
fn start_from_track(body: &str) -> Option<DateTime<Utc>> {
    let start = body.find("<time>")? + "<time>".len();
    let end = start + body[start..].find("</time>")?;
    DateTime::parse_from_rfc3339(&body[start..end])
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn sport_from_body(body: &str) -> i64 {
    body.find("\"sport_id\":")
        .map(|i| &body[i + "\"sport_id\":".len()..])
        .map(|rest| {
            rest.trim_start()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
        })
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

async fn upload_workout(
    State(state): State<Arc<FakeFittrackee>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let body = String::from_utf8_lossy(&body).to_string();
    state.uploads.lock().unwrap().push(body.clone());

    if let Some(status) = *state.reject_uploads.lock().unwrap() {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, Json(json!({"status": "error", "message": "rejected"})));
    }
    if !body.contains("name=\"file\"") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "message": "no file part"})),
        );
    }

    let start = start_from_track(&body).unwrap_or_else(Utc::now);
    let id = state.add_workout(start, sport_from_body(&body));
    let workout = state.workouts.lock().unwrap().last().cloned().unwrap();
    assert_eq!(workout["id"], json!(id));
    (
        StatusCode::CREATED,
        Json(json!({"status": "created", "data": {"workouts": [workout]}})),
    )
}

async fn delete_workout(
    State(state): State<Arc<FakeFittrackee>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> StatusCode {
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    let mut workouts = state.workouts.lock().unwrap();
    let before = workouts.len();
    workouts.retain(|w| w["id"] != json!(id));
    if workouts.len() == before {
        return StatusCode::NOT_FOUND;
    }
    state.deleted.lock().unwrap().push(id);
    StatusCode::NO_CONTENT
}

async fn sports(State(state): State<Arc<FakeFittrackee>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "data": {"sports": [
                {"id": 1, "label": "Cycling (Sport)", "is_active": true, "color": null},
                {"id": 5, "label": "Running", "is_active": true, "color": null},
                {"id": 12, "label": "Snowshoes", "is_active": false, "color": null}
            ]}
        })),
    )
}

async fn oauth_token(
    State(state): State<Arc<FakeFittrackee>>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    state.token_requests.fetch_add(1, Ordering::SeqCst);
    let valid = match form.get("grant_type").map(String::as_str) {
        Some("refresh_token") => form.get("refresh_token").is_some(),
        Some("authorization_code") => form.get("code").map(String::as_str) == Some("the-code"),
        _ => false,
    };
    if !valid || form.get("client_secret").map(String::as_str) != Some("secret") {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"})));
    }

    *state.access_token.lock().unwrap() = REFRESHED_TOKEN.to_string();
    (
        StatusCode::OK,
        Json(json!({
            "access_token": REFRESHED_TOKEN,
            "refresh_token": "refresh-2",
            "expires_in": 864000,
            "token_type": "Bearer",
            "scope": "workouts:read workouts:write profile:read"
        })),
    )
}

/// Serve a fake FitTrackee on a random local port. Returns its base URL.
#[allow(dead_code)]
pub async fn spawn_fittrackee(state: Arc<FakeFittrackee>) -> String {
    let app = Router::new()
        .route("/api/config", get(instance_config))
        .route("/api/workouts", get(list_workouts).post(upload_workout))
        .route("/api/workouts/{id}", delete(delete_workout))
        .route("/api/sports", get(sports))
        .route("/api/oauth/token", post(oauth_token))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake FitTrackee");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Activity known to the fake Garmin Connect server.
#[derive(Clone)]
pub struct GarminEntry {
    pub activity_id: u64,
    pub type_id: i64,
    /// Start time in the user's time zone
    pub local: NaiveDateTime,
    pub gmt: NaiveDateTime,
}

impl GarminEntry {
    #[allow(dead_code)]
    pub fn at_utc(activity_id: u64, gmt: DateTime<Utc>) -> Self {
        Self {
            activity_id,
            type_id: 1,
            local: gmt.naive_utc(),
            gmt: gmt.naive_utc(),
        }
    }
}

/// State of the fake Garmin Connect server.
pub struct FakeGarminServer {
    pub access_token: String,
    pub activities: Mutex<Vec<GarminEntry>>,
    /// Activities whose download is refused with HTTP 401
    pub locked_tracks: HashSet<u64>,
    pub search_requests: AtomicUsize,
    /// `(startDate, endDate)` of every search
    pub searched_days: Mutex<Vec<(String, String)>>,
}

impl FakeGarminServer {
    #[allow(dead_code)]
    pub fn with_activities(activities: Vec<GarminEntry>) -> Self {
        Self {
            access_token: GARMIN_TOKEN.to_string(),
            activities: Mutex::new(activities),
            locked_tracks: HashSet::new(),
            search_requests: AtomicUsize::new(0),
            searched_days: Mutex::new(Vec::new()),
        }
    }
}

fn garmin_authorized(state: &FakeGarminServer, headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", state.access_token))
        .unwrap_or(false)
}

fn garmin_day(params: &HashMap<String, String>, key: &str) -> Option<NaiveDate> {
    params.get(key)?.parse().ok()
}

async fn search_activities(
    State(state): State<Arc<FakeGarminServer>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    state.search_requests.fetch_add(1, Ordering::SeqCst);
    if !garmin_authorized(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "unauthorized"})));
    }
    let (Some(first), Some(last)) = (garmin_day(&params, "startDate"), garmin_day(&params, "endDate"))
    else {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": "bad dates"})));
    };
    state.searched_days.lock().unwrap().push((
        params["startDate"].clone(),
        params["endDate"].clone(),
    ));
    let start: usize = params.get("start").and_then(|v| v.parse().ok()).unwrap_or(0);
    let limit: usize = params.get("limit").and_then(|v| v.parse().ok()).unwrap_or(20);

    // Garmin matches both bounds against the local calendar date, newest first
    let mut matching: Vec<GarminEntry> = state
        .activities
        .lock()
        .unwrap()
        .iter()
        .filter(|a| a.local.date() >= first && a.local.date() <= last)
        .cloned()
        .collect();
    matching.sort_by(|a, b| b.gmt.cmp(&a.gmt));

    let page: Vec<Value> = matching
        .iter()
        .skip(start)
        .take(limit)
        .map(|a| {
            json!({
                "activityId": a.activity_id,
                "activityName": format!("Activity {}", a.activity_id),
                "startTimeLocal": a.local.format("%Y-%m-%d %H:%M:%S").to_string(),
                "startTimeGMT": a.gmt.format("%Y-%m-%d %H:%M:%S").to_string(),
                "activityType": {"typeId": a.type_id, "typeKey": "running"},
            })
        })
        .collect();
    (StatusCode::OK, Json(Value::Array(page)))
}

async fn export_gpx(
    State(state): State<Arc<FakeGarminServer>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> (StatusCode, Vec<u8>) {
    if !garmin_authorized(&state, &headers) || state.locked_tracks.contains(&id) {
        return (StatusCode::UNAUTHORIZED, b"unauthorized".to_vec());
    }
    let activities = state.activities.lock().unwrap();
    match activities.iter().find(|a| a.activity_id == id) {
        Some(a) => (StatusCode::OK, gpx_for(a.gmt.and_utc())),
        None => (StatusCode::NOT_FOUND, b"not found".to_vec()),
    }
}

/// Serve a fake Garmin Connect API on a random local port. Returns its base URL.
#[allow(dead_code)]
pub async fn spawn_garmin(state: Arc<FakeGarminServer>) -> String {
    let app = Router::new()
        .route(
            "/activitylist-service/activities/search/activities",
            get(search_activities),
        )
        .route("/download-service/export/gpx/activity/{id}", get(export_gpx))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake Garmin");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A base URL nobody listens on.
#[allow(dead_code)]
pub async fn closed_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Credentials for a fake instance at `url`.
#[allow(dead_code)]
pub fn credentials(url: &str, expires_at: i64) -> Credentials {
    Credentials {
        fittrackee: FittrackeeApp {
            host: url.to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        },
        tokens: Some(TokenSet {
            access_token: ACCESS_TOKEN.to_string(),
            refresh_token: "refresh-1".to_string(),
            expires_at,
            token_type: "Bearer".to_string(),
            scope: Some("workouts:read workouts:write profile:read".to_string()),
        }),
    }
}

/// Minimal GPX track carrying its start time.
pub fn gpx_for(start: DateTime<Utc>) -> Vec<u8> {
    format!(
        "<?xml version=\"1.0\"?><gpx><trk><trkseg><trkpt lat=\"47.2\" lon=\"-1.6\"><time>{}</time></trkpt></trkseg></trk></gpx>",
        start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    )
    .into_bytes()
}

/// In-memory Garmin account.
#[derive(Default)]
pub struct FakeGarmin {
    pub activities: Vec<Activity>,
    pub failing_downloads: HashSet<u64>,
    pub failing_windows: HashSet<DateTime<Utc>>,
    /// Windows whose listing reports an expired session
    pub expired_windows: HashSet<DateTime<Utc>>,
    /// Every window requested, in order
    pub windows: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    pub downloads: Mutex<Vec<u64>>,
}

impl FakeGarmin {
    #[allow(dead_code)]
    pub fn with_activities(activities: Vec<Activity>) -> Self {
        Self {
            activities,
            ..Self::default()
        }
    }

    #[allow(dead_code)]
    pub fn windows(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.windows.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn downloads(&self) -> Vec<u64> {
        self.downloads.lock().unwrap().clone()
    }
}

impl ActivitySource for FakeGarmin {
    async fn list_activities_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Activity>> {
        self.windows.lock().unwrap().push((start, end));
        if self.failing_windows.contains(&start) {
            return Err(SyncError::Transport("connection reset".to_string()));
        }
        if self.expired_windows.contains(&start) {
            return Err(SyncError::PreconditionFailed(
                "Garmin session expired".to_string(),
            ));
        }
        Ok(self
            .activities
            .iter()
            .filter(|a| a.start_time >= start && a.start_time < end)
            .cloned()
            .collect())
    }

    async fn download_track(&self, activity_id: u64) -> Result<Vec<u8>> {
        self.downloads.lock().unwrap().push(activity_id);
        if self.failing_downloads.contains(&activity_id) {
            return Err(SyncError::Api {
                status: 404,
                body: "not found".to_string(),
            });
        }
        let activity = self
            .activities
            .iter()
            .find(|a| a.activity_id == activity_id)
            .ok_or_else(|| SyncError::Api {
                status: 404,
                body: "not found".to_string(),
            })?;
        Ok(gpx_for(activity.start_time))
    }
}

/// In-memory FitTrackee account.
#[derive(Default)]
pub struct FakeDestination {
    pub workouts: Mutex<Vec<Workout>>,
    /// File names whose upload is rejected with HTTP 401
    pub rejected_files: HashSet<String>,
    pub fail_listing: bool,
    pub upload_attempts: Mutex<Vec<String>>,
    /// Track bytes of every upload attempt
    pub sent_tracks: Mutex<Vec<Vec<u8>>>,
}

impl FakeDestination {
    #[allow(dead_code)]
    pub fn with_workout_at(start: DateTime<Utc>) -> Self {
        let destination = Self::default();
        destination.push(start, 1);
        destination
    }

    fn push(&self, start: DateTime<Utc>, sport_id: i64) -> Workout {
        let mut workouts = self.workouts.lock().unwrap();
        let workout: Workout = serde_json::from_value(json!({
            "id": format!("w{}", workouts.len() + 1),
            "sport_id": sport_id,
            "workout_date": start.to_rfc2822().replace("+0000", "GMT"),
        }))
        .unwrap();
        workouts.push(workout.clone());
        workout
    }

    #[allow(dead_code)]
    pub fn uploaded(&self) -> usize {
        self.workouts.lock().unwrap().len()
    }
}

impl WorkoutDestination for FakeDestination {
    async fn most_recent_workout(&self) -> Result<Option<Workout>> {
        if self.fail_listing {
            return Err(SyncError::Api {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(self
            .workouts
            .lock()
            .unwrap()
            .iter()
            .max_by_key(|w| w.start_time())
            .cloned())
    }

    async fn upload_track(
        &self,
        track: Vec<u8>,
        file_name: String,
        sport_id: i64,
        _notes: Option<String>,
    ) -> Result<Workout> {
        self.upload_attempts.lock().unwrap().push(file_name.clone());
        self.sent_tracks.lock().unwrap().push(track.clone());
        if self.rejected_files.contains(&file_name) {
            return Err(SyncError::Api {
                status: 401,
                body: "invalid token".to_string(),
            });
        }
        let start = start_from_track(&String::from_utf8_lossy(&track)).unwrap_or_else(Utc::now);
        let mut workout = self.push(start, sport_id);
        workout.mark_present_on_destination();
        workout.mark_present_on_source();
        Ok(workout)
    }
}
