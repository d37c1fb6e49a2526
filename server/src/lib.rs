use anyhow::{Context, Result};
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use logvec_core::{load_path, EngineConfig, IndexError, InputFormat, Record, SearchEngine};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

pub const MAX_K: usize = 1000;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub field: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub field: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub record_id: usize,
    pub distance: f32,
    pub value: String,
}

#[derive(Serialize)]
pub struct FieldInfo {
    pub field: String,
    pub dimension: usize,
    pub rows: usize,
}

/// Where records come from and how to index them; fixed for the server's lifetime.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub input: PathBuf,
    pub format: InputFormat,
    pub fields: Vec<String>,
    pub engine: EngineConfig,
    /// Required in `X-ADMIN-TOKEN` for admin endpoints; admin endpoints are closed when unset.
    pub admin_token: Option<String>,
}

/// A built engine together with the records its row ids refer to.
pub struct Snapshot {
    pub engine: SearchEngine,
    pub records: Vec<Record>,
    pub failed_fields: Vec<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<ServerSettings>,
    pub snapshot: Arc<RwLock<Arc<Snapshot>>>,
    pub rebuild_lock: Arc<Mutex<()>>,
}

impl AppState {
    fn current(&self) -> Arc<Snapshot> { self.snapshot.read().clone() }
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, msg: impl std::fmt::Display) -> ApiError {
    (status, Json(serde_json::json!({ "error": msg.to_string() })))
}

fn index_error(err: IndexError) -> ApiError {
    match err {
        IndexError::UnknownField(_) => api_error(StatusCode::NOT_FOUND, err),
        IndexError::InvalidQuery { .. } => api_error(StatusCode::BAD_REQUEST, err),
        IndexError::DimensionMismatch { .. } => api_error(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

/// Load records and build a fresh engine. Field failures are kept in the
/// snapshot rather than aborting the build.
pub fn build_snapshot(settings: &ServerSettings) -> Result<Snapshot> {
    let (records, stats) = load_path(&settings.input, settings.format)
        .with_context(|| format!("loading records from {}", settings.input.display()))?;
    tracing::info!(records = records.len(), skipped = stats.skipped, "ingested records");

    let mut engine = SearchEngine::new(settings.engine.clone());
    let failed_fields = match engine.build_index(&records, &settings.fields) {
        Ok(()) => Vec::new(),
        Err(e) => e.failed.into_keys().collect(),
    };
    Ok(Snapshot { engine, records, failed_fields })
}

pub fn build_app(settings: ServerSettings) -> Result<Router> {
    let snapshot = build_snapshot(&settings)?;
    let app_state = AppState {
        settings: Arc::new(settings),
        snapshot: Arc::new(RwLock::new(Arc::new(snapshot))),
        rebuild_lock: Arc::new(Mutex::new(())),
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/fields", get(fields_handler))
        .route("/search", get(search_handler))
        .route("/record/:record_id", get(record_handler))
        .route("/index/rebuild", post(rebuild_handler))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);
    Ok(app)
}

pub async fn fields_handler(State(state): State<AppState>) -> Json<Vec<FieldInfo>> {
    let snap = state.current();
    let fields = snap
        .engine
        .fields()
        .map(|(field, fi)| FieldInfo { field: field.to_string(), dimension: fi.dimension(), rows: fi.rows() })
        .collect();
    Json(fields)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let snap = state.current();
    let k = params.k.min(MAX_K);
    let hits = snap.engine.search_with_distances(&params.q, &params.field, k).map_err(index_error)?;

    let results: Vec<SearchHit> = hits
        .into_iter()
        .map(|n| SearchHit {
            record_id: n.record,
            distance: n.distance,
            value: snap
                .records
                .get(n.record)
                .and_then(|r| r.get(&params.field))
                .map(|v| v.as_text().into_owned())
                .unwrap_or_default(),
        })
        .collect();

    let elapsed = start.elapsed();
    tracing::debug!(field = %params.field, k, hits = results.len(), "search served");
    Ok(Json(SearchResponse {
        query: params.q,
        field: params.field,
        took_ms: elapsed.as_millis(),
        took_s: elapsed.as_secs_f64(),
        total_hits: results.len(),
        results,
    }))
}

pub async fn record_handler(State(state): State<AppState>, Path(record_id): Path<usize>) -> Result<Json<serde_json::Value>, ApiError> {
    let snap = state.current();
    match snap.records.get(record_id) {
        Some(record) => Ok(Json(serde_json::json!({ "record_id": record_id, "fields": record.to_json() }))),
        None => Err(api_error(StatusCode::NOT_FOUND, format!("record {record_id} not found"))),
    }
}

// --- Admin endpoints ---
async fn rebuild_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;

    let worker = state.clone();
    let snapshot = tokio::task::spawn_blocking(move || {
        // One rebuild at a time; searches keep reading the old snapshot until the swap.
        let _guard = worker.rebuild_lock.lock();
        let snap = Arc::new(build_snapshot(&worker.settings)?);
        *worker.snapshot.write() = snap.clone();
        Ok::<_, anyhow::Error>(snap)
    })
    .await
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))?;

    tracing::info!(records = snapshot.records.len(), failed = snapshot.failed_fields.len(), "index rebuilt");
    Ok(Json(serde_json::json!({
        "records": snapshot.records.len(),
        "fields": snapshot.engine.fields().map(|(f, _)| f).collect::<Vec<_>>(),
        "failed_fields": snapshot.failed_fields,
    })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.settings.admin_token {
        Some(t) => t,
        None => return Err(api_error(StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set")),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(api_error(StatusCode::UNAUTHORIZED, "invalid admin token"))
    }
}
