//! HTTP surface: the JSON API, the chat UI and a liveness probe.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /` | chat page |
//! | `POST /api/analyze-assignment` | `AnalysisResult` JSON, or `{"error"}` |
//! | `POST /chat/upload` | HTML fragment appended to the transcript |
//! | `GET /healthz` | `ok` |
//!
//! Both upload routes read one multipart field named `file`. The JSON route
//! tags every analysis with an `x-analysis-source: model|fallback` header.

use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use maud::Markup;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::chat::Message;
use crate::error::GraderError;
use crate::pipeline::upload::Upload;
use crate::service::AssignmentService;
use crate::views;

/// Response header telling whether the analysis came from the model.
pub const ANALYSIS_SOURCE_HEADER: &str = "x-analysis-source";

/// Multipart field carrying the assignment.
pub const FILE_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AssignmentService>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(service: AssignmentService, max_upload_bytes: usize) -> Self {
        Self {
            service: Arc::new(service),
            max_upload_bytes,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/api/analyze-assignment", post(analyze_assignment))
        .route("/chat/upload", post(chat_upload))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for GraderError {
    fn into_response(self) -> Response {
        log_failure(&self);
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

fn log_failure(err: &GraderError) {
    if err.status_code() >= 500 {
        error!("Assignment analysis failed: {}", err);
    } else {
        warn!("Rejected upload: {}", err);
    }
}

async fn index() -> Markup {
    views::page("AI Assignment Evaluator", views::chat::chat(&Message::greeting()))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn analyze_assignment(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, GraderError> {
    let upload = read_upload(multipart, state.max_upload_bytes).await?;
    let outcome = state.service.analyze(&upload).await?;

    Ok((
        [(ANALYSIS_SOURCE_HEADER, outcome.source.header_value())],
        Json(outcome.analysis),
    )
        .into_response())
}

/// The htmx endpoint. Always 200 so the fragment is swapped in; failures
/// become an assistant error message.
async fn chat_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Markup {
    let upload = match read_upload(multipart, state.max_upload_bytes).await {
        Ok(upload) => upload,
        Err(e) => return views::chat::exchange(&[failure_message(&e)]),
    };

    let reply = match state.service.analyze(&upload).await {
        Ok(outcome) => Message::analysis(outcome.analysis, outcome.source.is_fallback()),
        Err(e) => failure_message(&e),
    };
    views::chat::exchange(&[Message::uploaded(&upload.file_name), reply])
}

fn failure_message(err: &GraderError) -> Message {
    log_failure(err);
    if err.status_code() < 500 {
        Message::failure(Some(&err.public_message()))
    } else {
        Message::failure(None)
    }
}

/// Read the `file` field into an [`Upload`]. Other fields are ignored.
pub async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
    limit: usize,
) -> Result<Upload, GraderError> {
    let mut multipart = multipart.map_err(|e| GraderError::MalformedUpload {
        detail: e.body_text(),
    })?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("assignment").to_string();
        let declared_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        return Upload::new(file_name, declared_type, bytes.to_vec());
    }

    Err(GraderError::MissingFile)
}

fn multipart_error(err: MultipartError, limit: usize) -> GraderError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GraderError::UploadTooLarge { limit }
    } else {
        GraderError::MalformedUpload {
            detail: err.body_text(),
        }
    }
}
