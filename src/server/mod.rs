//! Axum HTTP server
//!
//! Builds the shared state from a [`Config`], mounts the routes, and wraps
//! them in CORS, request tracing, an upload-sized body limit, and API usage
//! recording.

pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::{api_routes, API_PREFIX};
pub use state::AppState;

use crate::agents::Services;
use crate::auth::{TokenKind, TokenService};
use crate::config::Config;
use crate::embed::create_embedder;
use crate::error::Result;
use crate::llm::create_provider;
use crate::meta::{ApiUsage, MetaDb};
use crate::papers::create_providers;
use crate::parse::PdfExtractor;
use crate::store::create_store;
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    Router,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

/// Room for multipart framing on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the Axum application with all routes and middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    let config = &state.services.config;
    let body_limit = config.server.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .merge(api_routes(state.clone()))
        .layer(middleware::from_fn_with_state(state.clone(), record_usage))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&config.server.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Write an [`ApiUsage`] row for every request
async fn record_usage(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let endpoint = request.uri().path().to_string();
    let method = request.method().to_string();
    let user_id = extract::bearer_token(request.headers())
        .and_then(|token| state.tokens.verify(token, TokenKind::Access).ok())
        .map(|claims| claims.sub);

    let start = Instant::now();
    let response = next.run(request).await;

    let usage = ApiUsage {
        id: Uuid::new_v4().to_string(),
        user_id,
        endpoint,
        method,
        status_code: i64::from(response.status().as_u16()),
        response_time_ms: start.elapsed().as_millis() as i64,
        created_at: Utc::now().to_rfc3339(),
    };
    if let Err(e) = state.services.db.insert_api_usage(&usage).await {
        warn!("Failed to record API usage for {}: {}", usage.endpoint, e);
    }

    response
}

/// Open the database and construct every backend the agents need
pub async fn build_state(config: Config) -> Result<Arc<AppState>> {
    let db = MetaDb::connect(&config.paths.db_file).await?;
    db.init_schema().await?;

    let store = create_store(&config).await?;
    store.ensure_collection().await?;

    let tokens = TokenService::new(&config.jwt_secret()?, &config.auth);

    let http = reqwest::Client::builder()
        .user_agent(&config.search.user_agent)
        .timeout(Duration::from_secs(config.search.timeout_secs))
        .build()?;

    tokio::fs::create_dir_all(&config.paths.upload_dir).await?;

    let services = Services {
        db,
        llm: Arc::from(create_provider(&config)?),
        embedder: Arc::from(create_embedder(&config)?),
        store: Arc::from(store),
        extractor: Arc::new(PdfExtractor::new()),
        providers: create_providers(&config.search)?,
        http,
        upload_dir: config.paths.upload_dir.clone(),
        config: Arc::new(config),
    };

    Ok(AppState::new(services, tokens))
}

/// Build the state and serve until Ctrl-C
pub async fn serve(config: Config) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = build_state(config).await?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}{}", addr, API_PREFIX);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_wildcard_and_list() {
        // Both shapes build without panicking on valid input
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&["http://localhost:3000".to_string(), "bad\norigin".to_string()]);
        let _ = cors_layer(&[]);
    }
}
