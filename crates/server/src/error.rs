// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use docsight_core::{JobError, OutputParseError};

/// Structured JSON error response for API errors.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            exit_code: None,
            stderr: None,
            raw: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::new(error)
        }
    }
}

/// API error taxonomy. Execution, parse, and upstream failures map to
/// distinct response shapes so operators can tell "the tool crashed"
/// from "the tool ran but produced garbage" from "the upstream service
/// is unreachable".
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Analysis job failed: {0}")]
    Job(#[from] JobError),

    #[error("Analysis output invalid: {source}")]
    Output {
        #[source]
        source: OutputParseError,
        /// Subprocess stderr captured alongside the bad stdout.
        stderr: String,
    },

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, ErrorResponse::new(msg))
            }
            ApiError::Job(JobError::Timeout { timeout_ms, stderr }) => {
                tracing::error!(timeout_ms, "Analysis process timed out");
                let mut body = ErrorResponse::with_details(
                    "Analysis process timed out",
                    format!("process killed after {timeout_ms}ms"),
                );
                body.stderr = Some(stderr);
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
            ApiError::Job(JobError::Exit { code, stderr }) => {
                tracing::error!(exit_code = ?code, "Analysis process failed");
                let mut body = ErrorResponse::new("Analysis process failed");
                body.exit_code = code;
                body.stderr = Some(stderr);
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
            ApiError::Job(err) => {
                tracing::error!(error = %err, "Failed to launch analysis process");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("Failed to launch analysis process", err.to_string()),
                )
            }
            ApiError::Output { source, stderr } => {
                tracing::error!(error = %source, "Analysis output was not valid JSON");
                let mut body = ErrorResponse::with_details(
                    "Failed to parse analysis output as JSON",
                    source.to_string(),
                );
                body.raw = source.raw().map(str::to_string);
                body.stderr = Some(stderr);
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
            ApiError::Upstream(msg) => {
                tracing::error!(message = %msg, "Upstream service error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("Upstream service error", msg),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn extract_response(response: Response) -> (StatusCode, ErrorResponse) {
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error_response: ErrorResponse = serde_json::from_slice(&body).unwrap();
        (status, error_response)
    }

    #[tokio::test]
    async fn test_bad_request_returns_400() {
        let response = ApiError::BadRequest("Persona and job are required".to_string())
            .into_response();
        let (status, body) = extract_response(response).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Persona and job are required");
        assert!(body.stderr.is_none());
    }

    #[tokio::test]
    async fn test_timeout_carries_partial_stderr() {
        let err = ApiError::Job(JobError::Timeout {
            timeout_ms: 120_000,
            stderr: "loading model...".to_string(),
        });
        let (status, body) = extract_response(err.into_response()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Analysis process timed out");
        assert_eq!(body.stderr.as_deref(), Some("loading model..."));
        assert!(body.details.unwrap().contains("120000ms"));
    }

    #[tokio::test]
    async fn test_process_failure_surfaces_exit_code_verbatim() {
        let err = ApiError::Job(JobError::Exit {
            code: Some(3),
            stderr: "Traceback (most recent call last)".to_string(),
        });
        let (status, body) = extract_response(err.into_response()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Analysis process failed");
        assert_eq!(body.exit_code, Some(3));
        assert_eq!(
            body.stderr.as_deref(),
            Some("Traceback (most recent call last)")
        );
    }

    #[tokio::test]
    async fn test_parse_failure_distinct_from_process_failure() {
        let parse_err = docsight_core::parse_output(b"not json").unwrap_err();
        let err = ApiError::Output {
            source: parse_err,
            stderr: "warning: deprecated flag".to_string(),
        };
        let (status, body) = extract_response(err.into_response()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Failed to parse analysis output as JSON");
        assert_eq!(body.raw.as_deref(), Some("not json"));
        assert_eq!(body.stderr.as_deref(), Some("warning: deprecated flag"));
        assert!(body.exit_code.is_none());
    }

    #[tokio::test]
    async fn test_upstream_error_returns_safe_message() {
        let err = ApiError::Upstream("analysis service responded with status 503".to_string());
        let (status, body) = extract_response(err.into_response()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Upstream service error");
        assert!(body.details.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let err = ApiError::Internal("sqlite handle poisoned".to_string());
        let (status, body) = extract_response(err.into_response()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
        assert!(body.details.is_none());
    }

    #[test]
    fn test_error_response_skips_absent_fields() {
        let json = serde_json::to_string(&ErrorResponse::new("oops")).unwrap();
        assert_eq!(json, r#"{"error":"oops"}"#);
    }
}
