// crates/server/src/routes/speech.rs
//! Text-to-speech proxy.
//!
//! Keeps the vendor subscription key server-side: the client posts SSML
//! here, this handler forwards it to the speech service with the
//! credential headers attached, and streams the audio back. Vendor error
//! bodies are never forwarded to the client.

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

const OUTPUT_FORMAT: &str = "audio-16khz-128kbitrate-mono-mp3";
const DEFAULT_AUDIO_TYPE: &str = "audio/mpeg";

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/text-to-speech", post(text_to_speech))
}

#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    pub ssml: String,
}

/// POST /api/text-to-speech - synthesize SSML into streamed MP3 audio.
async fn text_to_speech(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SpeechRequest>,
) -> ApiResult<Response> {
    if request.ssml.trim().is_empty() {
        return Err(ApiError::BadRequest("SSML is required".to_string()));
    }

    let (key, region) = match (&state.config.tts_key, &state.config.tts_region) {
        (Some(key), Some(region)) => (key.clone(), region.clone()),
        _ => {
            return Err(ApiError::Upstream(
                "speech synthesis is not configured".to_string(),
            ))
        }
    };

    let url = state.config.tts_endpoint(&region);
    let upstream = state
        .http
        .post(&url)
        .header("Ocp-Apim-Subscription-Key", key)
        .header(header::CONTENT_TYPE, "application/ssml+xml")
        .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
        .body(request.ssml)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "could not reach the speech service");
            ApiError::Upstream("could not reach the speech service".to_string())
        })?;

    let status = upstream.status();
    if !status.is_success() {
        // Log the vendor status but keep the response body opaque to
        // the client so credential hints never leak.
        tracing::error!(status = %status, "speech service rejected synthesis request");
        return Err(ApiError::Upstream(format!(
            "speech service responded with status {status}"
        )));
    }

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_AUDIO_TYPE)
        .to_string();

    Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| ApiError::Internal(format!("failed to build audio response: {e}")))
}
