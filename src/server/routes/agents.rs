//! Agent endpoints: chat, paper search, analysis, and embedding

use crate::agents::{
    run_agent, AgentContext, AnalysisAgent, AnalysisRequest, AnalysisResponse, ChatAgent,
    ChatRequest, ChatResponse, EmbeddingAgent, EmbeddingRequest, EmbeddingResponse, SearchAgent,
    SearchRequest, SearchResponse,
};
use crate::error::Error;
use crate::meta::ChatMessage;
use crate::server::error::{ApiError, ApiResult};
use crate::server::extract::{AuthUser, ValidJson, ValidQuery};
use crate::server::state::AppState;
use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub session_id: String,
    #[serde(default = "default_history_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_history_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
    pub total_count: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct DeleteMessageResponse {
    pub id: String,
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearHistoryResponse {
    pub session_id: String,
    pub deleted_count: u64,
}

/// POST /api/v1/agents/general/message
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let agent = ChatAgent::new(state.services.clone());
    let ctx = AgentContext::new(user.id);
    Ok(Json(run_agent(&agent, &state.services.db, &ctx, req).await?))
}

/// GET /api/v1/agents/general/history?session_id&limit&offset
pub async fn chat_history(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidQuery(query): ValidQuery<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    if !(1..=500).contains(&query.limit) || query.offset < 0 {
        return Err(ApiError::validation(
            "limit must be between 1 and 500 and offset must not be negative",
        ));
    }
    let db = &state.services.db;
    if db.get_session(&query.session_id, &user.id).await?.is_none() {
        return Err(Error::SessionNotFound(query.session_id).into());
    }

    let messages = db
        .list_messages(&query.session_id, query.limit, query.offset)
        .await?;
    let total_count = db.count_messages(&query.session_id).await?;

    Ok(Json(HistoryResponse {
        session_id: query.session_id,
        messages,
        total_count,
        limit: query.limit,
        offset: query.offset,
    }))
}

/// DELETE /api/v1/agents/general/{message_id}
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(message_id): Path<String>,
) -> ApiResult<Json<DeleteMessageResponse>> {
    if !state
        .services
        .db
        .delete_message(&message_id, &user.id)
        .await?
    {
        return Err(Error::MessageNotFound(message_id).into());
    }
    Ok(Json(DeleteMessageResponse {
        id: message_id,
        deleted: true,
    }))
}

/// DELETE /api/v1/agents/general/session/{session_id}/clear
pub async fn clear_history(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<String>,
) -> ApiResult<Json<ClearHistoryResponse>> {
    let db = &state.services.db;
    if db.get_session(&session_id, &user.id).await?.is_none() {
        return Err(Error::SessionNotFound(session_id).into());
    }
    let deleted_count = db.clear_messages(&session_id).await?;
    Ok(Json(ClearHistoryResponse {
        session_id,
        deleted_count,
    }))
}

/// POST /api/v1/agents/search
pub async fn search_papers(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let agent = SearchAgent::new(state.services.clone());
    let ctx = AgentContext::new(user.id);
    Ok(Json(run_agent(&agent, &state.services.db, &ctx, req).await?))
}

/// POST /api/v1/agents/analysis
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<AnalysisRequest>,
) -> ApiResult<Json<AnalysisResponse>> {
    let agent = AnalysisAgent::new(state.services.clone());
    let ctx = AgentContext::new(user.id);
    Ok(Json(run_agent(&agent, &state.services.db, &ctx, req).await?))
}

/// POST /api/v1/agents/embedding
pub async fn embed_document(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<EmbeddingRequest>,
) -> ApiResult<Json<EmbeddingResponse>> {
    let agent = EmbeddingAgent::new(state.services.clone());
    let ctx = AgentContext::new(user.id);
    Ok(Json(run_agent(&agent, &state.services.db, &ctx, req).await?))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/agents/general/message", post(send_message))
        .route("/agents/general/history", get(chat_history))
        .route("/agents/general/{message_id}", delete(delete_message))
        .route(
            "/agents/general/session/{session_id}/clear",
            delete(clear_history),
        )
        .route("/agents/search", post(search_papers))
        .route("/agents/analysis", post(analyze))
        .route("/agents/embedding", post(embed_document))
}
