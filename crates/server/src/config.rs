// crates/server/src/config.rs
//! Environment-driven server configuration, read once at startup.

use std::path::PathBuf;
use std::time::Duration;

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 3001;
/// Default hard deadline for analysis subprocesses, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

const DEFAULT_UPSTREAM_URL: &str = "http://localhost:8000";
const DEFAULT_STAGING_DIR: &str = "uploads";
const DEFAULT_HEADINGS_EXTRACTOR: &str = "extractors/headings";
const DEFAULT_SECTIONS_EXTRACTOR: &str = "extractors/sections";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Hard deadline for each analysis subprocess.
    pub job_timeout: Duration,
    /// Program invoked as `<program> <pdfPath>` for heading extraction.
    pub headings_extractor: PathBuf,
    /// Program invoked as `<program> <descriptorPath>` for section extraction.
    pub sections_extractor: PathBuf,
    /// Base URL of the streaming analysis service (chat, podcast, insights).
    pub upstream_url: String,
    /// Scratch directory for staged uploads.
    pub staging_dir: PathBuf,
    /// Gemini API key; absent means refinement is a disabled no-op.
    pub gemini_api_key: Option<String>,
    /// Azure TTS subscription key and region for the speech proxy.
    pub tts_key: Option<String>,
    pub tts_region: Option<String>,
    /// Explicit TTS endpoint override. Tests point this at a stub server;
    /// production derives the endpoint from `tts_region`.
    pub tts_url: Option<String>,
}

impl Config {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Keeps parsing testable
    /// without mutating process-global environment.
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let port = get("DOCSIGHT_PORT")
            .or_else(|| get("PORT"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let timeout_ms = get("EXTRACT_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        Self {
            port,
            job_timeout: Duration::from_millis(timeout_ms),
            headings_extractor: get("HEADINGS_EXTRACTOR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HEADINGS_EXTRACTOR)),
            sections_extractor: get("SECTIONS_EXTRACTOR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SECTIONS_EXTRACTOR)),
            upstream_url: get("ANALYSIS_SERVICE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string()),
            staging_dir: get("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STAGING_DIR)),
            gemini_api_key: get("GEMINI_API_KEY"),
            tts_key: get("AZURE_TTS_KEY"),
            tts_region: get("AZURE_SPEECH_REGION"),
            tts_url: get("AZURE_TTS_ENDPOINT"),
        }
    }

    /// Resolve the speech-synthesis endpoint for the configured region.
    pub fn tts_endpoint(&self, region: &str) -> String {
        match &self.tts_url {
            Some(url) => url.clone(),
            None => format!("https://{region}.tts.speech.microsoft.com/cognitiveservices/v1"),
        }
    }
}
