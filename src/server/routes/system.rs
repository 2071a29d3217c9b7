//! Liveness, readiness, and service banner

use crate::server::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub database: bool,
    pub vector_store: bool,
    pub vector_count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub api: String,
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
    })
}

/// GET /ready - 503 until both the database and the vector store answer
pub async fn readiness(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadyResponse>) {
    let services = &state.services;

    let database = match services.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Database not ready: {}", e);
            false
        }
    };
    let vector_count = match services.store.count().await {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("Vector store {} not ready: {}", services.store.name(), e);
            None
        }
    };

    let ready = database && vector_count.is_some();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            status: if ready { "ready" } else { "unavailable" }.to_string(),
            database,
            vector_store: vector_count.is_some(),
            vector_count,
        }),
    )
}

/// GET /
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        api: "/api/v1".to_string(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
}
