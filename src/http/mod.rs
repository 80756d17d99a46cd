use crate::config::HttpServerConfig;
use crate::error::{NotesError, Result};
use crate::extract::{self, CONTENT_TYPE_PDF};
use crate::store::NotesStore;
use crate::summarize::{ChunkingSummarizer, GenerationParams, SummaryOutcome};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the synchronous API handlers
pub struct ApiState {
    pub summarizer: Arc<ChunkingSummarizer>,
    pub store: Arc<dyn NotesStore>,
}

/// Request body for POST /api/summarize
#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub do_sample: Option<bool>,
}

/// Run the HTTP API server
pub async fn serve(state: Arc<ApiState>, config: &HttpServerConfig) -> Result<()> {
    let app = router(state, &config.allowed_origins);

    let addr = format!("0.0.0.0:{}", config.port);
    log::info!("Worker API running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| NotesError::Config(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| NotesError::Io(std::io::Error::other(format!("HTTP server error: {}", e))))?;

    Ok(())
}

/// Build the axum router
pub fn router(state: Arc<ApiState>, allowed_origins: &[String]) -> Router {
    // No restriction configured means allow all origins (local dev)
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/summarize", post(handle_summarize))
        .route("/api/notify-upload", post(handle_notify_upload))
        .route("/api/notes/:file_key", get(handle_get_notes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// POST /api/summarize
///
/// Summarizes pasted text. Honors the cold-start forwarding contract: a
/// warming-up model yields 200 with `{ estimated_time }` rather than an
/// error, so clients can retry the whole request later.
async fn handle_summarize(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SummarizeRequest>,
) -> Response {
    let text = match request.text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Text is required (non-empty string)",
            );
        }
    };

    let params = GenerationParams {
        max_length: request.max_length,
        min_length: request.min_length,
        do_sample: request.do_sample,
    };

    match state.summarizer.summarize(&text, &params).await {
        SummaryOutcome::ColdStart { estimated_time } => {
            log::info!("Forwarding estimated_time: {}", estimated_time);
            Json(json!({"estimated_time": estimated_time})).into_response()
        }
        SummaryOutcome::Summary(summary) => Json(json!({"summary": summary})).into_response(),
    }
}

/// POST /api/notify-upload
///
/// Accepts multipart/form-data with field "file" (PDF), extracts its text,
/// and summarizes it in one synchronous round trip.
async fn handle_notify_upload(
    State(state): State<Arc<ApiState>>,
    mut multipart: Multipart,
) -> Response {
    let mut file_bytes: Option<Vec<u8>> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => {
                match field.bytes().await {
                    Ok(bytes) => file_bytes = Some(bytes.to_vec()),
                    Err(e) => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            &format!("Failed to read upload: {}", e),
                        );
                    }
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    &format!("Invalid multipart request: {}", e),
                );
            }
        }
    }

    let bytes = match file_bytes {
        Some(bytes) => bytes,
        None => return error_response(StatusCode::BAD_REQUEST, "No file uploaded"),
    };

    log::info!("Received PDF upload ({} bytes)", bytes.len());

    let text = match extract::extract_text(&bytes, CONTENT_TYPE_PDF) {
        Ok(text) => text,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to process PDF: {}", e),
            );
        }
    };

    if text.trim().is_empty() {
        log::warn!("PDF contained no extractable text");
        return Json(json!({"text": "", "summary": "No text found in PDF."})).into_response();
    }

    log::info!("Extracted text length: {}", text.chars().count());

    let params = GenerationParams {
        max_length: Some(320),
        min_length: Some(80),
        do_sample: None,
    };

    match state.summarizer.summarize(&text, &params).await {
        SummaryOutcome::ColdStart { estimated_time } => {
            Json(json!({"estimated_time": estimated_time})).into_response()
        }
        SummaryOutcome::Summary(summary) => {
            Json(json!({"text": text, "summary": summary})).into_response()
        }
    }
}

/// GET /api/notes/:file_key
///
/// Returns the most recently persisted notes for a document reference.
async fn handle_get_notes(
    State(state): State<Arc<ApiState>>,
    Path(file_key): Path<String>,
) -> Response {
    match state.store.get(&file_key).await {
        Ok(Some(notes)) => Json(notes).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "No notes found for this file."),
        Err(e) => {
            log::error!("Failed to read notes for {}: {}", file_key, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to read notes: {}", e),
            )
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}
