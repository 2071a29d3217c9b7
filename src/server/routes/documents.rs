//! Document upload, listing, download, and deletion

use crate::error::Error;
use crate::meta::Document;
use crate::parse::{is_pdf, safe_title};
use crate::server::error::{ApiError, ApiResult};
use crate::server::extract::{AuthUser, ValidQuery};
use crate::server::state::AppState;
use crate::store::parse_point_ids;
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<Document>,
    pub total_count: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteDocumentResponse {
    pub id: String,
    pub deleted: bool,
    pub deleted_vectors: usize,
}

fn multipart_error(e: MultipartError, limit: usize) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError(Error::PayloadTooLarge(limit))
    } else {
        ApiError(Error::BadRequest(e.body_text()))
    }
}

fn looks_like_pdf_upload(file_name: &str, content_type: Option<&str>) -> bool {
    file_name.to_lowercase().ends_with(".pdf") || content_type == Some("application/pdf")
}

/// POST /api/v1/documents/upload?title&description&session_id
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidQuery(query): ValidQuery<UploadQuery>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let services = &state.services;
    let limit = services.config.server.max_upload_bytes;

    if let Some(session_id) = &query.session_id {
        if services.db.get_session(session_id, &user.id).await?.is_none() {
            return Err(Error::SessionNotFound(session_id.clone()).into());
        }
    }

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
        let content_type = field.content_type().map(str::to_string);
        if !looks_like_pdf_upload(&file_name, content_type.as_deref()) {
            return Err(Error::BadRequest("Only PDF files are accepted".to_string()).into());
        }
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| ApiError::validation("Multipart field 'file' is required"))?;
    if bytes.len() > limit {
        return Err(Error::PayloadTooLarge(limit).into());
    }
    if !is_pdf(&bytes) {
        return Err(Error::BadRequest("File is not a valid PDF".to_string()).into());
    }

    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(&file_name)
        .to_string();
    let title = query
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| stem.clone());

    let dir = services.upload_dir.join(&user.id);
    tokio::fs::create_dir_all(&dir).await.map_err(Error::from)?;
    let path = dir.join(format!("{}_{}.pdf", Uuid::new_v4(), safe_title(&stem)));
    tokio::fs::write(&path, &bytes).await.map_err(Error::from)?;

    let mut doc = Document::new(
        user.id,
        query.session_id,
        title,
        file_name,
        path.to_string_lossy().to_string(),
        bytes.len() as i64,
    );
    doc.description = query.description.filter(|d| !d.trim().is_empty());
    services.db.insert_document(&doc).await?;

    info!("Stored upload {} ({} bytes)", doc.id, doc.file_size);
    Ok((StatusCode::CREATED, Json(doc)))
}

/// GET /api/v1/documents
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<DocumentListResponse>> {
    let documents = state.services.db.list_documents(&user.id).await?;
    Ok(Json(DocumentListResponse {
        total_count: documents.len(),
        documents,
    }))
}

/// GET /api/v1/documents/session/{session_id}
pub async fn list_session_documents(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<String>,
) -> ApiResult<Json<DocumentListResponse>> {
    let db = &state.services.db;
    if db.get_session(&session_id, &user.id).await?.is_none() {
        return Err(Error::SessionNotFound(session_id).into());
    }
    let documents = db.list_session_documents(&session_id, &user.id).await?;
    Ok(Json(DocumentListResponse {
        total_count: documents.len(),
        documents,
    }))
}

/// GET /api/v1/documents/{id}
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Document>> {
    let doc = state
        .services
        .db
        .get_document(&id, &user.id)
        .await?
        .ok_or(Error::DocumentNotFound(id))?;
    Ok(Json(doc))
}

/// GET /api/v1/documents/{id}/download
pub async fn download_document(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let doc = state
        .services
        .db
        .get_document(&id, &user.id)
        .await?
        .ok_or_else(|| Error::DocumentNotFound(id.clone()))?;

    let bytes = match tokio::fs::read(&doc.file_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("File for document {} is missing: {}", doc.id, doc.file_path);
            return Err(Error::DocumentNotFound(id).into());
        }
        Err(e) => return Err(Error::from(e).into()),
    };

    let disposition = format!(
        "attachment; filename=\"{}\"",
        doc.file_name.replace('"', "")
    );
    Ok((
        [
            (header::CONTENT_TYPE, doc.mime_type.clone()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// DELETE /api/v1/documents/{id}
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteDocumentResponse>> {
    let services = &state.services;
    let doc = services
        .db
        .get_document(&id, &user.id)
        .await?
        .ok_or(Error::DocumentNotFound(id))?;

    let point_ids = parse_point_ids(&services.db.vector_ids_for_document(&doc.id).await?);
    if !point_ids.is_empty() {
        services.store.delete_points(&point_ids).await?;
    }
    services.db.delete_document(&doc.id).await?;

    if let Err(e) = tokio::fs::remove_file(&doc.file_path).await {
        warn!("Could not remove {}: {}", doc.file_path, e);
    }
    debug!("Deleted document {} and {} vectors", doc.id, point_ids.len());

    Ok(Json(DeleteDocumentResponse {
        id: doc.id,
        deleted: true,
        deleted_vectors: point_ids.len(),
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/documents/upload", post(upload_document))
        .route("/documents", get(list_documents))
        .route("/documents/session/{session_id}", get(list_session_documents))
        .route("/documents/{id}", get(get_document).delete(delete_document))
        .route("/documents/{id}/download", get(download_document))
}
