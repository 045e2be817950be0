// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use docsight_core::{AiClient, StagingArea};

use crate::config::Config;

/// Shared application state accessible from all route handlers.
///
/// No mutable state is shared across requests; the staging directory is
/// the only cross-request namespace and every staged name is unique.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    pub config: Config,
    /// Shared HTTP client for relays, the TTS proxy, and side calls.
    pub http: reqwest::Client,
    /// AI capability for deep-search refinement. `Unconfigured` when no
    /// credentials were provided, which disables refinement entirely.
    pub ai: AiClient,
    pub staging: StagingArea,
}

impl AppState {
    /// Create application state wrapped in an Arc for sharing. The AI
    /// client is built from the configured credentials.
    pub fn new(config: Config) -> Arc<Self> {
        let ai = AiClient::from_key(config.gemini_api_key.clone());
        if !ai.is_configured() {
            tracing::warn!("GEMINI_API_KEY not set; deep-search refinement is disabled");
        }
        Self::new_with_ai(config, ai)
    }

    /// Create with an externally-provided AI client (for testing against
    /// a stub endpoint).
    pub fn new_with_ai(config: Config, ai: AiClient) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            http: reqwest::Client::new(),
            ai,
            staging: StagingArea::new(&config.staging_dir),
            config,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_new() {
        let config = Config::from_vars(|_| None);
        let state = AppState::new(config);
        assert!(state.uptime_secs() < 5);
        assert!(!state.ai.is_configured());
    }

    #[test]
    fn test_app_state_builds_ai_from_key() {
        let mut config = Config::from_vars(|_| None);
        config.gemini_api_key = Some("key".to_string());
        let state = AppState::new(config);
        assert!(state.ai.is_configured());
    }
}
