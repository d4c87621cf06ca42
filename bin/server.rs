// Ratio Desk - Web Server
// REST API over the ratio dataset + per-session dialogue engines

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use ratio_desk::{
    config::CONFIG_ENV_VAR, load_csv, run_pipeline, trend_series, AppConfig, Dataset,
    DialogueEngine, FieldValue, MetricVocabulary, TrendSeries,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Sessions untouched for this long are dropped on the next session create
const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct Session {
    engine: DialogueEngine,
    last_seen: Instant,
}

/// Drop sessions idle longer than `ttl`; returns how many were removed
fn evict_idle(sessions: &mut HashMap<String, Session>, now: Instant, ttl: Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|_, s| now.saturating_duration_since(s.last_seen) < ttl);
    before - sessions.len()
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    dataset: Arc<Dataset>,
    vocabulary: Arc<MetricVocabulary>,
    extra_companies: Arc<Vec<String>>,
    /// One dialogue engine per session id
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

impl AppState {
    fn new(dataset: Dataset, vocabulary: MetricVocabulary, extra_companies: Vec<String>) -> Self {
        Self {
            dataset: Arc::new(dataset),
            vocabulary: Arc::new(vocabulary),
            extra_companies: Arc::new(extra_companies),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn new_engine(&self) -> DialogueEngine {
        DialogueEngine::with_phrase_recognizer(
            self.dataset.clone(),
            self.vocabulary.clone(),
            &self.extra_companies,
        )
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message.into()),
        }
    }
}

#[derive(Serialize)]
struct MetricResponse {
    name: String,
    /// Vocabulary phrases resolving to this column
    phrases: Vec<String>,
    trend_href: String,
}

#[derive(Serialize)]
struct SessionResponse {
    session_id: String,
}

#[derive(Deserialize)]
struct MessageRequest {
    utterance: String,
}

#[derive(Serialize)]
struct MessageResponse {
    response: String,
}

/// One record as column → JSON value, in dataset column order
fn record_to_json(dataset: &Dataset, index: usize) -> serde_json::Map<String, serde_json::Value> {
    let record = &dataset.records()[index];
    dataset
        .columns()
        .iter()
        .map(|column| {
            let value = match record.value(column) {
                Some(FieldValue::Number(Some(v))) => serde_json::json!(v),
                Some(FieldValue::Text(text)) => serde_json::Value::String(text.to_string()),
                Some(FieldValue::Number(None)) | None => serde_json::Value::Null,
            };
            (column.clone(), value)
        })
        .collect()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/records - Normalized dataset with derived ratios
async fn get_records(State(state): State<AppState>) -> impl IntoResponse {
    let records: Vec<_> = (0..state.dataset.len())
        .map(|i| record_to_json(&state.dataset, i))
        .collect();

    Json(ApiResponse::ok(records))
}

/// GET /api/metrics - Numeric columns + the phrases that reach them
async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let metrics: Vec<MetricResponse> = state
        .dataset
        .numeric_columns()
        .into_iter()
        .map(|name| {
            let phrases = state
                .vocabulary
                .phrases()
                .filter(|p| state.vocabulary.canonical(p) == Some(name.as_str()))
                .map(str::to_string)
                .collect();
            MetricResponse {
                trend_href: format!("/api/trends/{}", urlencoding::encode(&name)),
                phrases,
                name,
            }
        })
        .collect();

    Json(ApiResponse::ok(metrics))
}

/// GET /api/trends/:metric - Per-company series for one metric
async fn get_trends(State(state): State<AppState>, Path(metric): Path<String>) -> impl IntoResponse {
    match trend_series(&state.dataset, &metric) {
        Some(series) => (StatusCode::OK, Json(ApiResponse::<Vec<TrendSeries>>::ok(series))).into_response(),
        None => {
            tracing::debug!(%metric, "trend requested for non-numeric metric");
            (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::err(format!("'{}' is not a numeric metric", metric))),
            )
                .into_response()
        }
    }
}

/// POST /api/sessions - Start an isolated conversation
async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let session_id = uuid::Uuid::new_v4().to_string();
    let session = Session {
        engine: state.new_engine(),
        last_seen: Instant::now(),
    };

    let mut sessions = state.sessions.lock().await;
    let evicted = evict_idle(&mut sessions, Instant::now(), SESSION_IDLE_TIMEOUT);
    if evicted > 0 {
        tracing::info!(evicted, "idle sessions dropped");
    }
    sessions.insert(session_id.clone(), session);
    tracing::info!(%session_id, active = sessions.len(), "session created");

    (StatusCode::CREATED, Json(ApiResponse::ok(SessionResponse { session_id })))
}

/// POST /api/sessions/:id/messages - One dialogue turn
async fn post_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> impl IntoResponse {
    let mut sessions = state.sessions.lock().await;

    match sessions.get_mut(&session_id) {
        Some(session) => {
            session.last_seen = Instant::now();
            let response = session.engine.respond(&request.utterance);
            (StatusCode::OK, Json(ApiResponse::ok(MessageResponse { response }))).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err(format!("Unknown session {}", session_id))),
        )
            .into_response(),
    }
}

/// DELETE /api/sessions/:id - End a conversation
async fn delete_session(State(state): State<AppState>, Path(session_id): Path<String>) -> impl IntoResponse {
    match state.sessions.lock().await.remove(&session_id) {
        Some(_) => {
            tracing::info!(%session_id, "session closed");
            StatusCode::NO_CONTENT.into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err(format!("Unknown session {}", session_id))),
        )
            .into_response(),
    }
}

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/records", get(get_records))
        .route("/metrics", get(get_metrics))
        .route("/trends/:metric", get(get_trends))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", delete(delete_session))
        .route("/sessions/:id/messages", post(post_message))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ratio_desk=info,tower_http=info".into()),
        )
        .init();

    println!("🌐 Ratio Desk - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config_path = std::env::var_os(CONFIG_ENV_VAR).map(std::path::PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    if !config.input_path.exists() {
        eprintln!("❌ Input data not found at {:?}", config.input_path);
        eprintln!("   Set {} to a config file with input_path", CONFIG_ENV_VAR);
        std::process::exit(1);
    }

    let table = load_csv(&config.input_path)?;
    let output = run_pipeline(table)
        .with_context(|| format!("Failed to build dataset from {:?}", config.input_path))?;
    println!("✓ Dataset loaded: {} records", output.dataset.len());
    println!("✓ {}", output.ratios.summary());

    let state = AppState::new(output.dataset, config.vocabulary(), config.extra_companies.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server_addr))?;

    println!("\n🚀 Server running on http://{}", config.server_addr);
    println!("   API: http://{}/api/records", config.server_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
