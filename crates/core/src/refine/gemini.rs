// crates/core/src/refine/gemini.rs
//! Gemini text-generation client used by the refinement step.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the AI text-generation service. These never reach API
/// callers; the refinement step absorbs them all.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("request to AI service failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("AI service responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("AI response carried no generated text")]
    MissingText,
}

/// Thin client for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Point the client at a different endpoint. Tests use this to talk
    /// to a local stub server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Run one text completion and return the raw model text.
    pub async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let t0 = std::time::Instant::now();
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::Status(status));
        }

        let value: serde_json::Value = response.json().await?;
        let text = value["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or(AiError::MissingText)?
            .to_string();

        tracing::debug!(
            model = %self.model,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            text_len = text.len(),
            "AI completion received"
        );
        Ok(text)
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
    }

    #[tokio::test]
    async fn test_generate_extracts_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("hello")))
            .mount(&server)
            .await;

        let client = GeminiClient::new("test-key").with_base_url(server.uri());
        let text = client.generate("say hello").await.unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_generate_maps_http_error_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = GeminiClient::new("k").with_base_url(server.uri());
        let err = client.generate("p").await.unwrap_err();
        assert!(matches!(err, AiError::Status(s) if s.as_u16() == 429));
    }

    #[tokio::test]
    async fn test_generate_rejects_response_without_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::new("k").with_base_url(server.uri());
        let err = client.generate("p").await.unwrap_err();
        assert!(matches!(err, AiError::MissingText));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = GeminiClient::new("super-secret");
        let debug = format!("{client:?}");
        assert!(!debug.contains("super-secret"));
    }
}
