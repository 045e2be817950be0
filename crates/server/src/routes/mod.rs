//! API route handlers for the docsight server.

pub mod extract;
pub mod health;
pub mod relay;
pub mod speech;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET /api/health - Health check
/// - POST /api/extract-headings - Heading outline for one uploaded PDF
/// - POST /api/extract-sections - Relevant sections across a PDF batch
/// - POST /api/chat-stream - Relay a chat question as SSE
/// - POST /api/podcast-stream - Relay a podcast script request as SSE
/// - POST /api/insights-stream - Relay an insights request as SSE
/// - POST /api/text-to-speech - Synthesize SSML into streamed audio
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", extract::router())
        .nest("/api", relay::router())
        .nest("/api", speech::router())
        .with_state(state)
}
