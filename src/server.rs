//! HTTP API for the web front end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/fetch` | Folder tree of a local path or GitHub URL |
//! | `POST` | `/analyze` | Run (or fetch the cached) analysis |
//! | `GET`  | `/download_json?path=` | Download a written `final_summary.json` |
//! | `GET`  | `/refresh_db` | Dump the stored files, chunks, and analyses |
//! | `POST` | `/clear_db` | Empty the store and the response cache |
//!
//! # Error Contract
//!
//! ```json
//! { "error": "Path '/nope' does not exist" }
//! ```
//!
//! Input errors (bad URL, failed clone, missing path) are 400, a missing
//! download (or any file that is not a `final_summary.json`) is 404,
//! everything else is 500.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::analyzer::{create_analyzer, ChunkAnalyzer};
use crate::config::Config;
use crate::error::is_input_error;
use crate::github;
use crate::loader::{self, FolderNode};
use crate::pipeline::{self, AnalysisContext, AnalyzeOutcome};
use crate::store::{self, CollectionsDump};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<AnalysisContext>,
    pub analyzer: Arc<dyn ChunkAnalyzer>,
}

/// Start the server on `[server].bind` and run until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let analyzer = create_analyzer(&config.llm)?;
    let ctx = AnalysisContext::open(config.clone()).await?;

    let app = router(AppState {
        ctx: Arc::new(ctx),
        analyzer,
    });

    tracing::info!(addr = %bind_addr, "server listening");
    println!("codelens listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router with every route and the CORS layer.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/fetch", post(handle_fetch))
        .route("/analyze", post(handle_analyze))
        .route("/download_json", get(handle_download))
        .route("/refresh_db", get(handle_refresh))
        .route("/clear_db", post(handle_clear))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if is_input_error(&err) {
            tracing::warn!(error = %err, "rejected request");
            AppError {
                status: StatusCode::BAD_REQUEST,
                message: err.to_string(),
            }
        } else {
            tracing::error!("request failed: {:#}", err);
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("{:#}", err),
            }
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        message: message.into(),
    }
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

// ============ POST /fetch, POST /analyze ============

#[derive(Deserialize)]
struct RepoRequest {
    repo_path: String,
}

#[derive(Serialize)]
struct FetchResponse {
    structure: FolderNode,
}

async fn handle_fetch(
    State(state): State<AppState>,
    Json(req): Json<RepoRequest>,
) -> Result<Json<FetchResponse>, AppError> {
    if req.repo_path.trim().is_empty() {
        return Err(bad_request("repo_path must not be empty"));
    }
    tracing::info!(input = %req.repo_path, "fetching folder structure");

    let path = github::resolve_input(&req.repo_path, &state.ctx.config.clone).await?;
    let structure = loader::folder_tree(&path)?;
    Ok(Json(FetchResponse { structure }))
}

async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<RepoRequest>,
) -> Result<Json<AnalyzeOutcome>, AppError> {
    if req.repo_path.trim().is_empty() {
        return Err(bad_request("repo_path must not be empty"));
    }
    tracing::info!(input = %req.repo_path, "analyze requested");

    let outcome =
        pipeline::analyze_input(&state.ctx, &req.repo_path, state.analyzer.as_ref(), true).await?;
    Ok(Json(outcome))
}

// ============ GET /download_json ============

#[derive(Deserialize)]
struct DownloadQuery {
    path: Option<String>,
}

async fn handle_download(Query(query): Query<DownloadQuery>) -> Result<Response, AppError> {
    let Some(path) = query.path.filter(|p| !p.is_empty()) else {
        return Err(bad_request("path query parameter is required"));
    };
    let path = PathBuf::from(path);
    tracing::info!(path = %path.display(), "download requested");

    // Only written summaries are served
    let is_summary = path
        .file_name()
        .is_some_and(|name| name == pipeline::OUTPUT_FILENAME);
    if !is_summary || !path.is_file() {
        return Err(not_found(format!("File '{}' not found", path.display())));
    }
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", pipeline::OUTPUT_FILENAME),
            ),
        ],
        bytes,
    )
        .into_response())
}

// ============ GET /refresh_db, POST /clear_db ============

async fn handle_refresh(State(state): State<AppState>) -> Result<Json<CollectionsDump>, AppError> {
    Ok(Json(store::dump_collections(&state.ctx.pool).await?))
}

#[derive(Serialize)]
struct ClearResponse {
    status: String,
}

async fn handle_clear(State(state): State<AppState>) -> Result<Json<ClearResponse>, AppError> {
    tracing::warn!("clearing store and cache");
    pipeline::clear_all(&state.ctx).await?;
    Ok(Json(ClearResponse {
        status: "cleared".to_string(),
    }))
}
