// crates/server/src/routes/relay.rs
//! Streaming relay endpoints for the analysis service.
//!
//! These handlers forward a question to the upstream service and pipe
//! its server-sent-event response straight back to the client, chunk by
//! chunk, with no buffering or reframing. The upstream owns the event
//! format; this layer only moves bytes.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat-stream", post(chat_stream))
        .route("/podcast-stream", post(podcast_stream))
        .route("/insights-stream", post(insights_stream))
}

/// Request body shared by all streaming endpoints.
#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    pub question: String,
    /// Storage name of a previously uploaded document, when the question
    /// is scoped to one file.
    #[serde(rename = "pdfFilename")]
    pub pdf_filename: Option<String>,
}

async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StreamRequest>,
) -> ApiResult<Response> {
    relay(&state, "chat-stream", request).await
}

async fn podcast_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StreamRequest>,
) -> ApiResult<Response> {
    relay(&state, "podcast-stream", request).await
}

async fn insights_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StreamRequest>,
) -> ApiResult<Response> {
    relay(&state, "insights-stream", request).await
}

/// Forward one question to an upstream streaming endpoint and hand its
/// byte stream back unmodified.
///
/// Failures before the stream starts produce a JSON error; once the
/// stream is flowing, mid-stream upstream failures simply end the body,
/// exactly as the client would see talking to the upstream directly.
/// Dropping the response (client disconnect) drops the upstream
/// connection with it.
async fn relay(state: &AppState, endpoint: &str, request: StreamRequest) -> ApiResult<Response> {
    if request.question.trim().is_empty() {
        return Err(ApiError::BadRequest("Question is required".to_string()));
    }

    let url = format!("{}/{endpoint}/", state.config.upstream_url);
    tracing::info!(endpoint, url = %url, "relaying stream request");

    let upstream = state
        .http
        .post(&url)
        .json(&serde_json::json!({
            "question": request.question,
            "pdfFilename": request.pdf_filename,
        }))
        .send()
        .await
        .map_err(|e| {
            tracing::error!(endpoint, error = %e, "could not reach the analysis service");
            ApiError::Upstream("could not reach the analysis service".to_string())
        })?;

    let status = upstream.status();
    if !status.is_success() {
        return Err(ApiError::Upstream(format!(
            "analysis service responded with status {status}"
        )));
    }

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| ApiError::Internal(format!("failed to build stream response: {e}")))
}
