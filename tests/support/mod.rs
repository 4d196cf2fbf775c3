//! In-process mock of the opportunities backend for integration tests.
#![allow(dead_code)]

use axum::extract::{Multipart, Path, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use unifocus::{ApiClient, ClientConfig, SessionStore};

pub const EMAIL: &str = "student@campus.example";
pub const PASSWORD: &str = "correct horse";
pub const LOGIN_TOKEN: &str = "login-token";
pub const REFRESHED_TOKEN: &str = "refreshed-token";

#[derive(Debug, Clone)]
pub struct Upload {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

#[derive(Default)]
pub struct Recorded {
    /// (path, Authorization header) for every request, in arrival order.
    pub requests: Vec<(String, Option<String>)>,
    pub list_queries: Vec<Option<String>>,
    pub uploads: Vec<Upload>,
}

struct Data {
    opportunities: BTreeMap<i64, Value>,
    next_id: i64,
    tokens: HashSet<String>,
    profile: Value,
}

pub struct MockState {
    pub recorded: Mutex<Recorded>,
    data: Mutex<Data>,
    metrics_status: Mutex<Option<StatusCode>>,
    list_status: Mutex<Option<StatusCode>>,
    metrics_delay: Mutex<Option<Duration>>,
}

impl MockState {
    fn record(&self, path: &str, headers: &HeaderMap) {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.recorded
            .lock()
            .unwrap()
            .requests
            .push((path.to_string(), auth));
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match token {
            Some(token) => self.data.lock().unwrap().tokens.contains(token),
            None => false,
        }
    }
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn user_json() -> Value {
    json!({
        "id": 42,
        "username": "xiaoming",
        "email": EMAIL,
        "school": "Tsinghua University",
        "major": "Software Engineering",
        "grade": 3,
        "avatar_url": "",
        "created_at": "2026-09-01T08:00:00Z",
        "updated_at": "2026-09-01T08:00:00Z"
    })
}

fn opportunity_json(id: i64, payload: &Value) -> Value {
    let field = |name: &str| payload.get(name).cloned().unwrap_or(Value::Null);
    json!({
        "id": id,
        "title": field("title"),
        "type": field("type"),
        "description": field("description"),
        "source_url": field("source_url"),
        "source_type": "official",
        "competition_level": field("competition_level"),
        "organizer": field("organizer"),
        "start_date": field("start_date"),
        "deadline": field("deadline"),
        "event_date": field("event_date"),
        "location": field("location"),
        "target_majors": field("target_majors"),
        "tags": field("tags"),
        "is_active": true,
        "view_count": id * 10,
        "save_count": id,
        "created_at": format!("2026-10-{:02}T08:00:00Z", id.clamp(1, 28)),
        "updated_at": "2026-10-15T08:00:00Z"
    })
}

fn seed_opportunities() -> BTreeMap<i64, Value> {
    let seeds = [
        json!({
            "title": "National College Mathematical Modeling Contest",
            "type": "competition",
            "description": "Three-day team modeling contest",
            "source_url": "https://mcm.example/2026",
            "competition_level": "national-A",
            "tags": ["math", "modeling"]
        }),
        json!({
            "title": "Provincial Innovation Scholarship",
            "type": "scholarship",
            "description": "Merit scholarship for innovation projects",
            "source_url": "https://edu.example/scholarship"
        }),
        json!({
            "title": "Robotics Challenge",
            "type": "competition",
            "description": "Autonomous robot design",
            "source_url": "https://robots.example/challenge",
            "competition_level": "provincial",
            "deadline": "2026-12-01T00:00:00Z"
        }),
    ];
    seeds
        .iter()
        .enumerate()
        .map(|(i, seed)| {
            let id = i as i64 + 1;
            (id, opportunity_json(id, seed))
        })
        .collect()
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState {
            recorded: Mutex::new(Recorded::default()),
            data: Mutex::new(Data {
                opportunities: seed_opportunities(),
                next_id: 4,
                tokens: HashSet::new(),
                profile: json!({
                    "id": 1,
                    "user_id": 42,
                    "resume_text": "",
                    "skills": ["python"],
                    "certificates": [{ "name": "CET-6", "score": 560 }],
                    "interests": ["ai"],
                    "updated_at": "2026-10-01T08:00:00Z"
                }),
            }),
            metrics_status: Mutex::new(None),
            list_status: Mutex::new(None),
            metrics_delay: Mutex::new(None),
        });

        let app = Router::new()
            .route("/api/v1/auth/register", post(register))
            .route("/api/v1/auth/login", post(login))
            .route("/api/v1/auth/refresh", post(refresh))
            .route("/api/v1/metrics", get(metrics))
            .route(
                "/api/v1/opportunities",
                get(list_opportunities).post(create_opportunity),
            )
            .route(
                "/api/v1/opportunities/{id}",
                get(get_opportunity)
                    .put(update_opportunity)
                    .delete(delete_opportunity),
            )
            .route(
                "/api/v1/users/me/profile",
                get(get_profile).put(update_profile),
            )
            .route("/api/v1/users/me/profile/resume", post(upload_resume))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.base_url(), Duration::from_secs(5)).unwrap()
    }

    pub fn client(&self, session: SessionStore) -> ApiClient {
        ApiClient::builder(self.client_config())
            .session(session)
            .build()
            .unwrap()
    }

    /// Client whose expiry hook bumps the returned counter.
    pub fn client_with_hook(&self, session: SessionStore) -> (ApiClient, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let client = ApiClient::builder(self.client_config())
            .session(session)
            .on_session_expired(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        (client, calls)
    }

    /// Register a token the backend will accept.
    pub fn accept_token(&self, token: &str) {
        self.state
            .data
            .lock()
            .unwrap()
            .tokens
            .insert(token.to_string());
    }

    pub fn fail_metrics(&self, status: Option<StatusCode>) {
        *self.state.metrics_status.lock().unwrap() = status;
    }

    pub fn fail_list(&self, status: Option<StatusCode>) {
        *self.state.list_status.lock().unwrap() = status;
    }

    pub fn delay_metrics(&self, delay: Duration) {
        *self.state.metrics_delay.lock().unwrap() = Some(delay);
    }

    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.state.recorded.lock().unwrap().requests.clone()
    }

    pub fn last_list_query(&self) -> Option<String> {
        self.state
            .recorded
            .lock()
            .unwrap()
            .list_queries
            .last()
            .cloned()
            .flatten()
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.state.recorded.lock().unwrap().uploads.clone()
    }
}

/// Split a raw query string into (key, value) pairs.
pub fn query_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|p| !p.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

// --- Handlers ---

async fn register(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record("/auth/register", &headers);
    if body["email"].as_str().unwrap_or_default().is_empty() {
        return error(StatusCode::BAD_REQUEST, "email is required");
    }
    state.data.lock().unwrap().tokens.insert(LOGIN_TOKEN.into());
    let mut user = user_json();
    user["username"] = body["username"].clone();
    user["email"] = body["email"].clone();
    (
        StatusCode::CREATED,
        Json(json!({ "token": LOGIN_TOKEN, "user": user })),
    )
        .into_response()
}

async fn login(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record("/auth/login", &headers);
    if body["email"] != EMAIL || body["password"] != PASSWORD {
        return error(StatusCode::UNAUTHORIZED, "invalid email or password");
    }
    state.data.lock().unwrap().tokens.insert(LOGIN_TOKEN.into());
    Json(json!({ "token": LOGIN_TOKEN, "user": user_json() })).into_response()
}

async fn refresh(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("/auth/refresh", &headers);
    if !state.authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "authorization header required");
    }
    state
        .data
        .lock()
        .unwrap()
        .tokens
        .insert(REFRESHED_TOKEN.into());
    Json(json!({ "token": REFRESHED_TOKEN })).into_response()
}

async fn metrics(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("/metrics", &headers);
    let delay = *state.metrics_delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let forced = *state.metrics_status.lock().unwrap();
    if let Some(status) = forced {
        return error(status, "metrics backend unavailable");
    }
    Json(json!({
        "status": "ok",
        "timestamp": { "current_time": {} },
        "system": { "uptime": "42m" }
    }))
    .into_response()
}

async fn list_opportunities(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    state.record("/opportunities", &headers);
    state
        .recorded
        .lock()
        .unwrap()
        .list_queries
        .push(query.clone());

    let forced = *state.list_status.lock().unwrap();
    if let Some(status) = forced {
        return error(status, "database unavailable");
    }

    let pairs = query.as_deref().map(query_pairs).unwrap_or_default();
    let param = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };
    let limit: usize = param("limit").and_then(|v| v.parse().ok()).unwrap_or(20);
    let offset: usize = param("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    let kind = param("type");

    let data = state.data.lock().unwrap();
    let matching: Vec<Value> = data
        .opportunities
        .values()
        .rev()
        .filter(|o| kind.as_deref().map_or(true, |k| o["type"] == k))
        .cloned()
        .collect();
    let total = matching.len();
    let page: Vec<Value> = matching.into_iter().skip(offset).take(limit).collect();

    Json(json!({ "data": page, "total": total, "limit": limit, "offset": offset })).into_response()
}

async fn create_opportunity(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record("/opportunities", &headers);
    if body["title"].as_str().unwrap_or_default().is_empty() {
        return error(StatusCode::BAD_REQUEST, "title is required");
    }
    let mut data = state.data.lock().unwrap();
    let id = data.next_id;
    data.next_id += 1;
    let opp = opportunity_json(id, &body);
    data.opportunities.insert(id, opp.clone());
    (StatusCode::CREATED, Json(opp)).into_response()
}

async fn get_opportunity(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    state.record(&format!("/opportunities/{id}"), &headers);
    match state.data.lock().unwrap().opportunities.get(&id) {
        Some(opp) => Json(opp.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "opportunity not found"),
    }
}

async fn update_opportunity(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    state.record(&format!("/opportunities/{id}"), &headers);
    let mut data = state.data.lock().unwrap();
    if !data.opportunities.contains_key(&id) {
        return error(StatusCode::NOT_FOUND, "opportunity not found");
    }
    let opp = opportunity_json(id, &body);
    data.opportunities.insert(id, opp.clone());
    Json(opp).into_response()
}

async fn delete_opportunity(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    state.record(&format!("/opportunities/{id}"), &headers);
    match state.data.lock().unwrap().opportunities.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => error(StatusCode::NOT_FOUND, "opportunity not found"),
    }
}

async fn get_profile(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("/users/me/profile", &headers);
    if !state.authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "invalid token");
    }
    Json(state.data.lock().unwrap().profile.clone()).into_response()
}

async fn update_profile(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record("/users/me/profile", &headers);
    if !state.authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "invalid token");
    }
    let mut data = state.data.lock().unwrap();
    if let Some(fields) = body.as_object() {
        for (key, value) in fields {
            data.profile[key.as_str()] = value.clone();
        }
    }
    data.profile["updated_at"] = json!("2026-10-19T09:00:00Z");
    Json(data.profile.clone()).into_response()
}

async fn upload_resume(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    state.record("/users/me/profile/resume", &headers);
    if !state.authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "invalid token");
    }

    let mut received = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let upload = Upload {
            field: field.name().unwrap_or_default().to_string(),
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            size: 0,
        };
        let bytes = field.bytes().await.unwrap_or_default();
        received = Some(Upload {
            size: bytes.len(),
            ..upload
        });
    }

    let Some(upload) = received.filter(|u| u.field == "file") else {
        return error(StatusCode::BAD_REQUEST, "file is required");
    };
    let summary = format!(
        "extracted {} bytes from {}",
        upload.size,
        upload.file_name.clone().unwrap_or_default()
    );
    state.recorded.lock().unwrap().uploads.push(upload);

    let mut data = state.data.lock().unwrap();
    data.profile["resume_text"] = json!(summary);
    data.profile["skills"] = json!(["python", "rust"]);
    Json(data.profile.clone()).into_response()
}
