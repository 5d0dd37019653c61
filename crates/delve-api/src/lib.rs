//! delve-api — HTTP API server for the delve research service.
//!
//! Exposes three routes: the research trigger (`POST /api/research`), the
//! report viewer (`GET /api/reports/{id}`), and a health probe. The trigger
//! validates input, starts the research job in the background, and answers
//! immediately — callers never wait on job completion, and all research
//! outcome information flows through the webhook channel and the persisted
//! report.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use delve_core::{defaults, Error, Result, TriggerRequest, TriggerResponse};
use delve_inference::{OpenAIBackend, ProviderConfig};
use delve_pipeline::{PipelineConfig, ReportStore, ResearchJob, ResearchPipeline, WebhookNotifier};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Server configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port.
    pub port: u16,
    /// OpenAI-compatible provider endpoint.
    pub provider_base_url: String,
    /// Server-side provider API key. A per-request `apiKey` overrides it;
    /// one of the two must exist for a job to start.
    pub api_key: Option<String>,
    /// Default synthesis model.
    pub thinking_model: String,
    /// Default retrieval model.
    pub networking_model: String,
    /// Search-capable model allow-list.
    pub search_models: Vec<String>,
    /// Public base address for report viewer links.
    pub public_base_url: Option<String>,
}

impl ServerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `PORT` | `3000` | Listen port |
    /// | `OPENAI_BASE_URL` | `https://api.openai.com/v1` | Provider endpoint |
    /// | `OPENAI_API_KEY` | (none) | Provider API key |
    /// | `THINKING_MODEL` | `gpt-4o` | Synthesis model |
    /// | `NETWORKING_MODEL` | `gpt-4o-mini-search-preview` | Retrieval model |
    /// | `SEARCH_MODELS` | built-in list | Search-capable allow-list |
    /// | `PUBLIC_BASE_URL` | (none) | Base address for report links |
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::SERVER_PORT),
            provider_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| defaults::PROVIDER_BASE_URL.to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            thinking_model: std::env::var("THINKING_MODEL")
                .unwrap_or_else(|_| defaults::THINKING_MODEL.to_string()),
            networking_model: std::env::var("NETWORKING_MODEL")
                .unwrap_or_else(|_| defaults::NETWORKING_MODEL.to_string()),
            search_models: defaults::search_models_from_env(),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn ReportStore>,
    pub notifier: WebhookNotifier,
    /// Client used by the report viewer to fetch stored content.
    http: reqwest::Client,
}

impl AppState {
    pub fn new(config: ServerConfig, store: Arc<dyn ReportStore>) -> Result<Self> {
        Ok(Self {
            config: Arc::new(config),
            store,
            notifier: WebhookNotifier::new()?,
            http: reqwest::Client::new(),
        })
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/research", post(trigger_research))
        .route("/api/reports/:id", get(view_report))
        .route("/health", get(health))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// HANDLERS
// =============================================================================

/// Validate trigger input before any job state exists.
fn validate_trigger(req: &TriggerRequest) -> Result<()> {
    if req.query.trim().is_empty() {
        return Err(Error::Validation("query must not be empty".to_string()));
    }
    if let Some(url) = req.callback_url.as_deref() {
        if !url.trim().is_empty() && !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::Validation(
                "callbackUrl must be an http(s) URL".to_string(),
            ));
        }
    }
    Ok(())
}

/// `POST /api/research` — validate, start the job in the background, answer
/// immediately.
async fn trigger_research(
    State(state): State<AppState>,
    Json(req): Json<TriggerRequest>,
) -> (StatusCode, Json<TriggerResponse>) {
    if let Err(e) = validate_trigger(&req) {
        warn!(error = %e, "Trigger rejected");
        state.notifier.notify_progress(
            req.callback_url.as_deref(),
            format!("Research request rejected: {}", e),
        );
        return (
            StatusCode::BAD_REQUEST,
            Json(TriggerResponse::rejected(e.to_string())),
        );
    }

    // Per-job credentials: request override wins, then server config.
    // The key is threaded into freshly built backends, never into shared
    // state, so concurrent jobs with different keys cannot race.
    let api_key = req.api_key.clone().or_else(|| state.config.api_key.clone());
    if api_key.is_none() {
        let e = Error::Config("no provider API key configured".to_string());
        error!(error = %e, "Trigger rejected");
        state.notifier.notify_progress(
            req.callback_url.as_deref(),
            format!("Research request rejected: {}", e),
        );
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(TriggerResponse::rejected(e.to_string())),
        );
    }

    let pipeline = match build_pipeline(&state, &req, api_key) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(error = %e, "Trigger rejected");
            state.notifier.notify_progress(
                req.callback_url.as_deref(),
                format!("Research request rejected: {}", e),
            );
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TriggerResponse::rejected(e.to_string())),
            );
        }
    };

    let job = ResearchJob::new(req.query.trim())
        .with_language(req.language)
        .with_thinking_model(
            req.thinking_model
                .unwrap_or_else(|| state.config.thinking_model.clone()),
        )
        .with_networking_model(
            req.networking_model
                .unwrap_or_else(|| state.config.networking_model.clone()),
        )
        .with_callback_url(req.callback_url);

    info!(query = %job.query, "Research job accepted");
    state
        .notifier
        .notify_progress(job.callback_url.as_deref(), format!("Research accepted: {}", job.query));

    tokio::spawn(async move {
        pipeline
            .notifier()
            .notify_progress(job.callback_url.as_deref(), "Research running in background");
        pipeline.run(job).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(TriggerResponse::accepted("research started")),
    )
}

/// Build the per-job pipeline: fresh backends carrying this job's
/// credentials and model choices.
fn build_pipeline(
    state: &AppState,
    req: &TriggerRequest,
    api_key: Option<String>,
) -> Result<ResearchPipeline> {
    let thinking_model = req
        .thinking_model
        .clone()
        .unwrap_or_else(|| state.config.thinking_model.clone());
    let networking_model = req
        .networking_model
        .clone()
        .unwrap_or_else(|| state.config.networking_model.clone());

    let thinking = OpenAIBackend::new(
        ProviderConfig {
            base_url: state.config.provider_base_url.clone(),
            ..Default::default()
        }
        .with_model(thinking_model)
        .with_api_key(api_key.clone()),
    )?;

    let web_search = defaults::search_capable(&networking_model, &state.config.search_models);
    let networking = OpenAIBackend::new(
        ProviderConfig {
            base_url: state.config.provider_base_url.clone(),
            ..Default::default()
        }
        .with_model(networking_model)
        .with_api_key(api_key)
        .with_web_search(web_search),
    )?;

    Ok(ResearchPipeline::new(
        Arc::new(thinking),
        Arc::new(networking),
        state.store.clone(),
        state.notifier.clone(),
        PipelineConfig {
            public_base_url: state.config.public_base_url.clone(),
            ..Default::default()
        },
    ))
}

/// `GET /api/reports/{id}` — resolve the stored path, fetch content, serve
/// it as markdown. Missing path or identifier mismatch is not-found; any
/// other fetch problem is a generic upstream error.
async fn view_report(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if id.is_empty() || id.contains('/') || id.contains("..") {
        return not_found();
    }

    let report_path = defaults::report_path(&id);
    let objects = match state.store.list(&report_path).await {
        Ok(objects) => objects,
        Err(e) => {
            error!(report_id = %id, error = %e, "Report listing failed");
            return bad_upstream();
        }
    };

    let Some(object) = objects.into_iter().find(|o| o.pathname == report_path) else {
        return not_found();
    };

    let response = match state.http.get(&object.url).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) if response.status() == StatusCode::NOT_FOUND => return not_found(),
        Ok(response) => {
            error!(report_id = %id, status = %response.status(), "Report fetch rejected");
            return bad_upstream();
        }
        Err(e) => {
            error!(report_id = %id, error = %e, "Report fetch failed");
            return bad_upstream();
        }
    };

    match response.text().await {
        Ok(content) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, defaults::REPORT_CONTENT_TYPE)],
            content,
        )
            .into_response(),
        Err(e) => {
            error!(report_id = %id, error = %e, "Report body read failed");
            bad_upstream()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "report not found").into_response()
}

fn bad_upstream() -> Response {
    (StatusCode::BAD_GATEWAY, "report fetch failed").into_response()
}

/// `GET /health` — liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
