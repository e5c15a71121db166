//! JSON HTTP API over the attendee store.
//!
//! Serves the same operations as the CLI for a browser front end. The page
//! binds its listeners to the `data-action` attributes in the card markup
//! returned by `POST /search`; the server never emits inline script.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/attendees?q=&school=&sort=` | Filtered, sorted listing |
//! | `POST` | `/attendees?school=&image=` | Add one profile (body: profile JSON) |
//! | `DELETE` | `/attendees` | Remove every profile |
//! | `GET`  | `/attendees/{id}` | One profile |
//! | `DELETE` | `/attendees/{id}` | Remove one profile (idempotent) |
//! | `POST` | `/attendees/import` | Merge a JSON array of profiles |
//! | `GET`  | `/export` | Download the collection |
//! | `GET`  | `/schools` | Distinct schools for the filter control |
//! | `GET`  | `/stats` | Count and progress toward the target |
//! | `GET` / `PUT` | `/model` | Selected ranking model |
//! | `GET`  | `/search` | Current search state |
//! | `POST` | `/search` | Run an AI search |
//! | `DELETE` | `/search` | Clear search results |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "duplicate", "message": "An attendee with this profile URL already exists" } }
//! ```
//!
//! Error codes: `bad_request` (400), `empty_query` (400),
//! `nothing_to_search` (400), `missing_api_key` (400), `not_found` (404),
//! `duplicate` (409), `superseded` (409), `upstream` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::filter::{filter_profiles, ListQuery};
use crate::models::{AttendeeProfile, ProfileId};
use crate::render::{html, project, Expansion, ProfileView, RenderSettings};
use crate::search::{
    self, Completion, HttpRankingClient, RankingClient, RankingModel, SearchError, SearchOutcome,
    SearchPhase, SearchSession,
};
use crate::store::{parse_import, parse_profile_input, AddOutcome, ProfileStore, StoreStats};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<RwLock<ProfileStore>>,
    session: Arc<Mutex<SearchSession>>,
    client: Arc<dyn RankingClient>,
}

impl AppState {
    pub fn new(config: Config, store: ProfileStore, client: Arc<dyn RankingClient>) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(RwLock::new(store)),
            session: Arc::new(Mutex::new(SearchSession::new())),
            client,
        }
    }
}

/// All routes, with permissive CORS.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/attendees",
            get(handle_list).post(handle_add).delete(handle_clear),
        )
        .route("/attendees/import", post(handle_import))
        .route("/attendees/{id}", get(handle_get).delete(handle_remove))
        .route("/export", get(handle_export))
        .route("/schools", get(handle_schools))
        .route("/stats", get(handle_stats))
        .route("/model", get(handle_get_model).put(handle_put_model))
        .route(
            "/search",
            get(handle_search_state)
                .post(handle_search)
                .delete(handle_search_clear),
        )
        .layer(cors)
        .with_state(state)
}

/// `roster serve`: load the store (seeding it if empty) and serve until
/// the process is stopped.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = ProfileStore::open(config).await?;
    let client = Arc::new(HttpRankingClient::new(config.search.timeout_secs)?);

    let bind_addr = config.server.bind.clone();
    let app = router(AppState::new(config.clone(), store, client));

    println!("Roster listening on http://{}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", format!("{:#}", err))
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

fn search_error(err: &SearchError) -> AppError {
    let (status, code) = match err {
        SearchError::EmptyQuery => (StatusCode::BAD_REQUEST, "empty_query"),
        SearchError::NothingToSearch => (StatusCode::BAD_REQUEST, "nothing_to_search"),
        SearchError::MissingApiKey { .. } => (StatusCode::BAD_REQUEST, "missing_api_key"),
        SearchError::Transport(_)
        | SearchError::Remote { .. }
        | SearchError::MalformedEnvelope => (StatusCode::BAD_GATEWAY, "upstream"),
    };
    AppError::new(status, code, err.user_message())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /attendees ============

#[derive(Serialize)]
struct ListResponse {
    /// Size of the whole collection.
    total: usize,
    attendees: Vec<AttendeeProfile>,
}

async fn handle_list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<ListResponse> {
    let store = state.store.read().await;
    let attendees = filter_profiles(store.profiles(), &query)
        .into_iter()
        .cloned()
        .collect();
    Json(ListResponse {
        total: store.len(),
        attendees,
    })
}

#[derive(Deserialize, Default)]
struct AddParams {
    school: Option<String>,
    image: Option<String>,
}

#[derive(Serialize)]
struct AddResponse {
    id: ProfileId,
}

/// The body is the pasted profile JSON, taken as text so malformed input
/// gets the same message as the CLI.
async fn handle_add(
    State(state): State<AppState>,
    Query(params): Query<AddParams>,
    body: String,
) -> Result<(StatusCode, Json<AddResponse>), AppError> {
    if body.trim().is_empty() {
        return Err(bad_request("Please paste profile JSON"));
    }
    let profile = parse_profile_input(&body, params.school.as_deref(), params.image.as_deref())
        .map_err(|e| bad_request(format!("Invalid profile JSON: {}", e)))?;

    let mut store = state.store.write().await;
    match store.add(profile).await? {
        AddOutcome::Added(id) => Ok((StatusCode::CREATED, Json(AddResponse { id }))),
        AddOutcome::Duplicate { url } => Err(AppError::new(
            StatusCode::CONFLICT,
            "duplicate",
            format!("An attendee with this profile URL already exists: {}", url),
        )),
    }
}

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AttendeeProfile>, AppError> {
    let store = state.store.read().await;
    store
        .get(&ProfileId::from(id.as_str()))
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found(format!("attendee not found: {}", id)))
}

#[derive(Serialize)]
struct RemoveResponse {
    removed: bool,
}

async fn handle_remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RemoveResponse>, AppError> {
    let removed = state
        .store
        .write()
        .await
        .remove(&ProfileId::from(id))
        .await?;
    Ok(Json(RemoveResponse { removed }))
}

#[derive(Serialize)]
struct ClearResponse {
    removed: usize,
}

async fn handle_clear(State(state): State<AppState>) -> Result<Json<ClearResponse>, AppError> {
    let mut store = state.store.write().await;
    let removed = store.len();
    store.clear().await?;
    Ok(Json(ClearResponse { removed }))
}

#[derive(Serialize)]
struct ImportResponse {
    imported: usize,
    total: usize,
}

async fn handle_import(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportResponse>, AppError> {
    let candidates =
        parse_import(&body).map_err(|e| bad_request(format!("Error importing file: {}", e)))?;

    let mut store = state.store.write().await;
    let imported = store.import_merge(candidates).await?;
    Ok(Json(ImportResponse {
        imported,
        total: store.len(),
    }))
}

// ============ GET /export, /schools, /stats ============

async fn handle_export(State(state): State<AppState>) -> Result<Response, AppError> {
    let snapshot = state.store.read().await.export_snapshot()?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        crate::export_file_name(chrono::Local::now().date_naive())
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        snapshot,
    )
        .into_response())
}

#[derive(Serialize)]
struct SchoolsResponse {
    schools: Vec<String>,
}

async fn handle_schools(State(state): State<AppState>) -> Json<SchoolsResponse> {
    let store = state.store.read().await;
    Json(SchoolsResponse {
        schools: store.schools().into_iter().map(String::from).collect(),
    })
}

async fn handle_stats(State(state): State<AppState>) -> Json<StoreStats> {
    Json(state.store.read().await.stats())
}

// ============ /model ============

#[derive(Serialize, Deserialize)]
struct ModelBody {
    model: String,
}

async fn handle_get_model(State(state): State<AppState>) -> Result<Json<ModelBody>, AppError> {
    let store = state.store.read().await;
    let model = search::selected_model(&store, &state.config.search).await?;
    Ok(Json(ModelBody {
        model: model.to_string(),
    }))
}

async fn handle_put_model(
    State(state): State<AppState>,
    Json(body): Json<ModelBody>,
) -> Result<Json<ModelBody>, AppError> {
    let model: RankingModel = body.model.parse().map_err(|e: anyhow::Error| bad_request(e.to_string()))?;
    state
        .store
        .read()
        .await
        .set_selected_model(model.as_str())
        .await?;
    info!(model = %model, "selected ranking model");
    Ok(Json(ModelBody {
        model: model.to_string(),
    }))
}

// ============ /search ============

#[derive(Deserialize)]
struct SearchBody {
    query: String,
    /// Overrides the stored preference for this search only.
    #[serde(default)]
    model: Option<String>,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum SearchResponse {
    Success {
        summary: String,
        dropped_below_floor: usize,
        show_clear: bool,
        results: Vec<ProfileView>,
        /// Rendered cards, escaped.
        html: String,
    },
    ParseError {
        message: String,
        raw: String,
    },
}

async fn handle_search(
    State(state): State<AppState>,
    Json(body): Json<SearchBody>,
) -> Result<Json<SearchResponse>, AppError> {
    let (model, profiles) = {
        let store = state.store.read().await;
        let model = match body.model.as_deref() {
            Some(m) => m
                .parse::<RankingModel>()
                .map_err(|e| bad_request(e.to_string()))?,
            None => search::selected_model(&store, &state.config.search).await?,
        };
        (model, store.profiles().to_vec())
    };

    let ticket = state.session.lock().await.begin(body.query.trim());
    let result = search::search(
        state.client.as_ref(),
        &state.config.search,
        model,
        &body.query,
        &profiles,
    )
    .await;

    let response = match &result {
        Ok(outcome) => Ok(search_response(outcome, &state.config)),
        Err(e) => Err(search_error(e)),
    };

    if state.session.lock().await.complete(ticket, result) == Completion::Stale {
        return Err(AppError::new(
            StatusCode::CONFLICT,
            "superseded",
            "A newer search replaced this one",
        ));
    }

    response.map(Json)
}

fn search_response(outcome: &SearchOutcome, config: &Config) -> SearchResponse {
    match outcome {
        SearchOutcome::Ranked {
            summary_text,
            matches,
            dropped_below_floor,
            show_clear,
        } => {
            let settings = RenderSettings::from(&config.render);
            let expansion = Expansion::new();
            let results: Vec<ProfileView> = matches
                .iter()
                .map(|m| project(&m.profile, Some(&m.matched), &expansion, &settings))
                .collect();
            SearchResponse::Success {
                summary: summary_text.clone(),
                dropped_below_floor: *dropped_below_floor,
                show_clear: *show_clear,
                html: html::render_cards(&results),
                results,
            }
        }
        SearchOutcome::Unparsed { raw } => SearchResponse::ParseError {
            message: "Error parsing AI response".to_string(),
            raw: raw.clone(),
        },
    }
}

async fn handle_search_state(State(state): State<AppState>) -> Json<SearchPhase> {
    Json(state.session.lock().await.phase().clone())
}

async fn handle_search_clear(State(state): State<AppState>) -> Json<SearchPhase> {
    let mut session = state.session.lock().await;
    session.clear();
    Json(session.phase().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchRequest;
    use crate::slots::MemorySlots;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct FixedAnswer(Result<String, u16>);

    #[async_trait]
    impl RankingClient for FixedAnswer {
        async fn rank(&self, _endpoint: &str, _request: &SearchRequest) -> Result<String, SearchError> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(SearchError::Remote {
                    status: *status,
                    message: "bad key".into(),
                }),
            }
        }
    }

    async fn spawn(client: FixedAnswer) -> String {
        let store = ProfileStore::load(Arc::new(MemorySlots::new())).await.unwrap();
        spawn_with(store, client).await
    }

    async fn spawn_with(store: ProfileStore, client: FixedAnswer) -> String {
        let state = AppState::new(Config::minimal("unused.sqlite"), store, Arc::new(client));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn add(http: &reqwest::Client, base: &str, body: Value) -> reqwest::Response {
        http.post(format!("{}/attendees", base))
            .body(body.to_string())
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_duplicate_list_remove() {
        let base = spawn(FixedAnswer(Ok("{}".into()))).await;
        let http = reqwest::Client::new();

        let resp = add(&http, &base, json!({"name": "Alice", "url": "u1"})).await;
        assert_eq!(resp.status(), 201);
        let id = resp.json::<Value>().await.unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();

        let resp = add(&http, &base, json!({"name": "Bob", "url": "u1"})).await;
        assert_eq!(resp.status(), 409);
        let err: Value = resp.json().await.unwrap();
        assert_eq!(err["error"]["code"], "duplicate");

        let list: Value = http
            .get(format!("{}/attendees?q=ali", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(list["total"], 1);
        assert_eq!(list["attendees"][0]["name"], "Alice");

        for _ in 0..2 {
            let resp = http
                .delete(format!("{}/attendees/{}", base, id))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 200);
        }
        let resp = http
            .get(format!("{}/attendees/{}", base, id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn test_import_rejects_non_array() {
        let base = spawn(FixedAnswer(Ok("{}".into()))).await;
        let http = reqwest::Client::new();
        let resp = http
            .post(format!("{}/attendees/import", base))
            .body(r#"{"name": "x"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp: Value = http
            .post(format!("{}/attendees/import", base))
            .body(r#"[{"name": "A", "url": "a"}, {"name": "A2", "url": "a"}]"#)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resp["imported"], 1);
    }

    #[tokio::test]
    async fn test_search_renders_escaped_cards() {
        let answer = json!({"summary": "One", "matches": [
            {"id": "eve-1", "score": 80},
            {"id": "ghost", "score": 99}
        ]})
        .to_string();
        let mut store = ProfileStore::load(Arc::new(MemorySlots::new())).await.unwrap();
        store
            .import_merge(vec![AttendeeProfile {
                id: Some(ProfileId::from("eve-1")),
                name: Some("<b>Eve</b>".into()),
                ..Default::default()
            }])
            .await
            .unwrap();
        let base = spawn_with(store, FixedAnswer(Ok(answer))).await;

        let resp: Value = reqwest::Client::new()
            .post(format!("{}/search", base))
            .json(&json!({"query": "eve"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resp["status"], "success");
        assert_eq!(resp["summary"], "One");
        assert_eq!(resp["results"].as_array().unwrap().len(), 1);
        assert_eq!(resp["results"][0]["name"], "<b>Eve</b>");
        let html = resp["html"].as_str().unwrap();
        assert!(html.contains("&lt;b&gt;Eve&lt;/b&gt;"));
        assert!(!html.contains("<b>Eve"));
    }

    #[tokio::test]
    async fn test_search_error_and_empty_store() {
        let base = spawn(FixedAnswer(Err(500))).await;
        let http = reqwest::Client::new();

        let resp = http
            .post(format!("{}/search", base))
            .json(&json!({"query": "rust"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let err: Value = resp.json().await.unwrap();
        assert_eq!(err["error"]["code"], "nothing_to_search");

        add(&http, &base, json!({"name": "A"})).await;
        let resp = http
            .post(format!("{}/search", base))
            .json(&json!({"query": "rust"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 502);
        let err: Value = resp.json().await.unwrap();
        assert_eq!(
            err["error"]["message"],
            "Error: bad key. Please check your API key and try again."
        );

        let phase: Value = http
            .get(format!("{}/search", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(phase["phase"], "transport_error");

        let phase: Value = http
            .delete(format!("{}/search", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(phase["phase"], "idle");
    }

    #[tokio::test]
    async fn test_model_round_trip() {
        let base = spawn(FixedAnswer(Ok("{}".into()))).await;
        let http = reqwest::Client::new();

        let current: Value = http
            .get(format!("{}/model", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(current["model"], "gemini-pro");

        let resp = http
            .put(format!("{}/model", base))
            .json(&json!({"model": "nope"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        http.put(format!("{}/model", base))
            .json(&json!({"model": "gpt-4o"}))
            .send()
            .await
            .unwrap();
        let current: Value = http
            .get(format!("{}/model", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(current["model"], "gpt-4o");
    }
}
