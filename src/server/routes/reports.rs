//! Report generation, history, and download

use crate::agents::{
    run_agent, AgentContext, ReportAgent, ReportRequest, ReportResponse, TopicAnalysisAgent,
    TopicAnalysisRequest, TopicAnalysisResponse,
};
use crate::error::Error;
use crate::meta::Report;
use crate::server::error::{ApiError, ApiResult};
use crate::server::extract::{AuthUser, ValidJson, ValidQuery};
use crate::server::state::AppState;
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ReportHistoryQuery {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_report_limit")]
    pub limit: i64,
}

fn default_report_limit() -> i64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "markdown".to_string()
}

/// History entry; report bodies are fetched through the download endpoint
#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub id: String,
    pub session_id: Option<String>,
    pub title: String,
    pub research_topic: String,
    pub report_type: String,
    pub tokens_used: i64,
    pub created_at: String,
}

impl From<Report> for ReportSummary {
    fn from(report: Report) -> Self {
        Self {
            id: report.id,
            session_id: report.session_id,
            title: report.title,
            research_topic: report.research_topic,
            report_type: report.report_type,
            tokens_used: report.tokens_used,
            created_at: report.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportHistoryResponse {
    pub reports: Vec<ReportSummary>,
    pub total_count: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteReportResponse {
    pub id: String,
    pub deleted: bool,
}

/// POST /api/v1/agents/report/generate
pub async fn generate_report(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<ReportRequest>,
) -> ApiResult<Json<ReportResponse>> {
    let agent = ReportAgent::new(state.services.clone());
    let ctx = AgentContext::new(user.id);
    Ok(Json(run_agent(&agent, &state.services.db, &ctx, req).await?))
}

/// POST /api/v1/agents/report/analyze
pub async fn analyze_topic(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<TopicAnalysisRequest>,
) -> ApiResult<Json<TopicAnalysisResponse>> {
    let agent = TopicAnalysisAgent::new(state.services.clone());
    let ctx = AgentContext::new(user.id);
    Ok(Json(run_agent(&agent, &state.services.db, &ctx, req).await?))
}

/// GET /api/v1/agents/report/history?session_id&limit
pub async fn report_history(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidQuery(query): ValidQuery<ReportHistoryQuery>,
) -> ApiResult<Json<ReportHistoryResponse>> {
    if !(1..=100).contains(&query.limit) {
        return Err(ApiError::validation("limit must be between 1 and 100"));
    }
    let reports = state
        .services
        .db
        .list_reports(&user.id, query.session_id.as_deref(), query.limit)
        .await?;

    Ok(Json(ReportHistoryResponse {
        total_count: reports.len(),
        reports: reports.into_iter().map(ReportSummary::from).collect(),
    }))
}

/// DELETE /api/v1/agents/report/delete/{report_id}
pub async fn delete_report(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(report_id): Path<String>,
) -> ApiResult<Json<DeleteReportResponse>> {
    if !state.services.db.delete_report(&report_id, &user.id).await? {
        return Err(Error::ReportNotFound(report_id).into());
    }
    Ok(Json(DeleteReportResponse {
        id: report_id,
        deleted: true,
    }))
}

/// GET /api/v1/agents/report/download/{report_id}?format=markdown|json
pub async fn download_report(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(report_id): Path<String>,
    ValidQuery(query): ValidQuery<DownloadQuery>,
) -> ApiResult<Response> {
    if query.format != "markdown" && query.format != "json" {
        return Err(ApiError::validation("format must be 'markdown' or 'json'"));
    }
    let report = state
        .services
        .db
        .get_report(&report_id, &user.id)
        .await?
        .ok_or(Error::ReportNotFound(report_id))?;

    if query.format == "json" {
        let content: Value = serde_json::from_str(&report.content_json).map_err(Error::from)?;
        return Ok(Json(content).into_response());
    }

    let disposition = format!("attachment; filename=\"report_{}.md\"", report.id);
    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.markdown,
    )
        .into_response())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/agents/report/generate", post(generate_report))
        .route("/agents/report/analyze", post(analyze_topic))
        .route("/agents/report/history", get(report_history))
        .route("/agents/report/delete/{report_id}", delete(delete_report))
        .route("/agents/report/download/{report_id}", get(download_report))
}
