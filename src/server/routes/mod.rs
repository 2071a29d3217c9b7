//! API route handlers

pub mod agents;
pub mod auth;
pub mod documents;
pub mod reports;
pub mod sessions;
pub mod system;

use crate::server::state::AppState;
use axum::Router;
use std::sync::Arc;

/// Prefix for every versioned endpoint
pub const API_PREFIX: &str = "/api/v1";

/// Combined router.
///
/// Routes:
/// - GET  /, /health, /ready - service banner and probes
/// - /api/v1/auth/* - register, login, refresh, logout, me
/// - /api/v1/sessions/* - research sessions and their analysis goal
/// - /api/v1/documents/* - PDF upload, listing, download, deletion
/// - /api/v1/agents/general/* - chat and chat history
/// - POST /api/v1/agents/{search,analysis,embedding}
/// - /api/v1/agents/report/* - report generation and history
pub fn api_routes(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .merge(auth::router())
        .merge(sessions::router())
        .merge(documents::router())
        .merge(agents::router())
        .merge(reports::router());

    Router::new()
        .merge(system::router())
        .nest(API_PREFIX, api)
        .with_state(state)
}
