use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use agentd_contract::{CreateRunInput, Run, StoreError, Thread};
use agentd_runtime::{AgentApi, RuntimeError};

use crate::sse::sse_response;

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn AgentApi>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, msg) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };
        let body = Json(serde_json::json!({ "error": msg }));
        (code, body).into_response()
    }
}

impl From<RuntimeError> for ApiError {
    fn from(e: RuntimeError) -> Self {
        let msg = e.to_string();
        match e {
            RuntimeError::Store(StoreError::ThreadNotFound(_))
            | RuntimeError::Store(StoreError::RunNotFound(_)) => ApiError::NotFound(msg),
            RuntimeError::Store(StoreError::InvalidId(_)) => ApiError::BadRequest(msg),
            RuntimeError::CancelTerminal { .. } => ApiError::Conflict(msg),
            RuntimeError::Store(_) | RuntimeError::Exec(_) => ApiError::Internal(msg),
        }
    }
}

/// Public thread projection without history, returned by thread creation.
#[derive(Debug, Serialize)]
pub struct ThreadView {
    pub id: String,
    pub object: String,
    pub created_at: u64,
    pub metadata: Map<String, Value>,
}

impl From<&Thread> for ThreadView {
    fn from(thread: &Thread) -> Self {
        Self {
            id: thread.id.clone(),
            object: thread.object.clone(),
            created_at: thread.created_at,
            metadata: thread.metadata.clone(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/threads", post(create_thread))
        .route("/threads/:id", get(get_thread))
        .route("/runs", post(create_run))
        .route("/runs/stream", post(stream_run))
        .route("/runs/wait", post(wait_run))
        .route("/runs/:id", get(get_run))
        .route("/runs/:id/cancel", post(cancel_run))
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

async fn create_thread(State(st): State<AppState>) -> Result<Json<ThreadView>, ApiError> {
    let thread = st.api.create_thread().await?;
    Ok(Json(ThreadView::from(&thread)))
}

async fn get_thread(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Thread>, ApiError> {
    Ok(Json(st.api.get_thread(&id).await?))
}

async fn create_run(
    State(st): State<AppState>,
    Json(input): Json<CreateRunInput>,
) -> Result<Json<Run>, ApiError> {
    Ok(Json(st.api.async_run(input).await?))
}

async fn wait_run(
    State(st): State<AppState>,
    Json(input): Json<CreateRunInput>,
) -> Result<Json<Run>, ApiError> {
    Ok(Json(st.api.sync_run(input).await?))
}

async fn stream_run(
    State(st): State<AppState>,
    Json(input): Json<CreateRunInput>,
) -> Result<Response, ApiError> {
    let frames = st.api.stream_run(input).await?;
    Ok(sse_response(frames))
}

async fn get_run(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Run>, ApiError> {
    Ok(Json(st.api.get_run(&id).await?))
}

async fn cancel_run(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Run>, ApiError> {
    Ok(Json(st.api.cancel_run(&id).await?))
}
