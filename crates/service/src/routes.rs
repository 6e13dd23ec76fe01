use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, routing::post, Json, Router};
use futures::stream::{Stream, StreamExt};
use notecheck_core::DeterministicReport;
use notecheck_hybrid::{CheckRequest, FullCheckReport, HybridChecker};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub struct AppState {
    pub checker: HybridChecker,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/check/quick", post(handle_quick))
        .route("/api/check/full", post(handle_full))
        .route("/api/check/stream", post(handle_stream))
        .route("/api/terminology/extract", post(handle_terminology))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    ai_configured: bool,
}

#[derive(Debug, Deserialize)]
struct QuickCheckBody {
    #[serde(default)]
    text: String,
    #[serde(default)]
    terminology: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FullCheckBody {
    #[serde(default)]
    speaker_notes: String,
    #[serde(default)]
    slide_content: String,
    #[serde(default)]
    terminology: Vec<String>,
}

impl FullCheckBody {
    fn into_request(self) -> Result<CheckRequest, AppError> {
        if self.speaker_notes.trim().is_empty() {
            return Err(AppError::bad_request("speaker_notes is required"));
        }
        Ok(CheckRequest {
            speaker_notes: self.speaker_notes,
            slide_content: self.slide_content,
            terminology: self.terminology,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TerminologyBody {
    #[serde(default)]
    slide_content: String,
}

#[derive(Debug, Serialize)]
struct TerminologyResponse {
    terminology: Vec<String>,
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        ai_configured: state.checker.ai_configured(),
    })
}

async fn handle_quick(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QuickCheckBody>,
) -> Result<Json<DeterministicReport>, AppError> {
    if body.text.trim().is_empty() {
        return Err(AppError::bad_request("text is required"));
    }
    Ok(Json(state.checker.quick_check(&body.text, &body.terminology)))
}

async fn handle_full(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FullCheckBody>,
) -> Result<Json<FullCheckReport>, AppError> {
    let req = body.into_request()?;
    Ok(Json(state.checker.full_check(&req).await))
}

async fn handle_stream(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FullCheckBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let req = body.into_request()?;
    let events = state.checker.stream_check(req).await.map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_else(|err| {
            json!({ "type": "error", "message": err.to_string() }).to_string()
        });
        Ok(Event::default().data(data))
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn handle_terminology(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TerminologyBody>,
) -> Result<Json<TerminologyResponse>, AppError> {
    if body.slide_content.trim().is_empty() {
        return Err(AppError::bad_request("slide_content is required"));
    }
    let terminology = state
        .checker
        .extract_terminology(&body.slide_content)
        .await?;
    Ok(Json(TerminologyResponse { terminology }))
}

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn bad_request<E: ToString>(msg: E) -> Self {
        Self::BadRequest(msg.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(err) => {
                error!("internal_error" = %err);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
