//! Research session endpoints

use crate::agents::check_length;
use crate::error::Error;
use crate::meta::Session;
use crate::server::error::{ApiError, ApiResult};
use crate::server::extract::{AuthUser, ValidJson, ValidQuery};
use crate::server::state::AppState;
use crate::store::parse_point_ids;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoalRequest {
    /// `null` or blank clears the goal
    #[serde(default)]
    pub analysis_goal: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub limit: i64,
    pub offset: i64,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<Session>,
    pub total_count: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct DeleteSessionResponse {
    pub id: String,
    pub deleted: bool,
    pub deleted_message_count: i64,
}

fn check_fields(title: Option<&str>, description: Option<&str>) -> ApiResult<()> {
    if let Some(title) = title {
        check_length("title", title.trim(), 1, 255)?;
    }
    if let Some(description) = description {
        check_length("description", description, 0, 1000)?;
    }
    Ok(())
}

/// POST /api/v1/sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    check_fields(Some(&req.title), req.description.as_deref())?;
    let session = Session::new(
        user.id,
        req.title.trim().to_string(),
        req.description.filter(|d| !d.trim().is_empty()),
    );
    state.services.db.insert_session(&session).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/v1/sessions?limit&offset
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidQuery(query): ValidQuery<ListQuery>,
) -> ApiResult<Json<SessionListResponse>> {
    if !(1..=100).contains(&query.limit) || query.offset < 0 {
        return Err(ApiError::validation(
            "limit must be between 1 and 100 and offset must not be negative",
        ));
    }
    let db = &state.services.db;
    let sessions = db.list_sessions(&user.id, query.limit, query.offset).await?;
    let total_count = db.count_sessions(&user.id).await?;

    Ok(Json(SessionListResponse {
        sessions,
        total_count,
        limit: query.limit,
        offset: query.offset,
    }))
}

/// GET /api/v1/sessions/{id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Session>> {
    let session = state
        .services
        .db
        .get_session(&id, &user.id)
        .await?
        .ok_or(Error::SessionNotFound(id))?;
    Ok(Json(session))
}

/// PUT /api/v1/sessions/{id}
pub async fn update_session(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateSessionRequest>,
) -> ApiResult<Json<Session>> {
    check_fields(req.title.as_deref(), req.description.as_deref())?;
    let session = state
        .services
        .db
        .update_session(
            &id,
            &user.id,
            req.title.as_deref().map(str::trim),
            req.description.as_deref(),
        )
        .await?
        .ok_or(Error::SessionNotFound(id))?;
    Ok(Json(session))
}

/// PUT /api/v1/sessions/{id}/goal
pub async fn update_goal(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<GoalRequest>,
) -> ApiResult<Json<Session>> {
    let goal = req
        .analysis_goal
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty());
    if let Some(goal) = goal {
        check_length("analysis_goal", goal, 1, 2000)?;
    }
    let session = state
        .services
        .db
        .update_analysis_goal(&id, &user.id, goal)
        .await?
        .ok_or(Error::SessionNotFound(id))?;
    Ok(Json(session))
}

/// DELETE /api/v1/sessions/{id}
///
/// Messages, documents, chunks, and reports go with the session; vectors
/// and stored PDFs of its documents are removed too.
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteSessionResponse>> {
    let services = &state.services;
    let session = services
        .db
        .get_session(&id, &user.id)
        .await?
        .ok_or_else(|| Error::SessionNotFound(id.clone()))?;

    let deleted_message_count = services.db.count_messages(&session.id).await?;
    let documents = services
        .db
        .list_session_documents(&session.id, &user.id)
        .await?;
    let point_ids = parse_point_ids(&services.db.vector_ids_for_session(&session.id).await?);

    if !point_ids.is_empty() {
        services.store.delete_points(&point_ids).await?;
    }
    services.db.delete_session(&session.id, &user.id).await?;

    for doc in &documents {
        if let Err(e) = tokio::fs::remove_file(&doc.file_path).await {
            warn!("Could not remove {}: {}", doc.file_path, e);
        }
    }

    info!(
        "Deleted session {} ({} messages, {} documents)",
        session.id,
        deleted_message_count,
        documents.len()
    );

    Ok(Json(DeleteSessionResponse {
        id: session.id,
        deleted: true,
        deleted_message_count,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route(
            "/sessions/{id}",
            get(get_session).put(update_session).delete(delete_session),
        )
        .route("/sessions/{id}/goal", put(update_goal))
}
