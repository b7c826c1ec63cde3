//! Document handlers: metadata CRUD and raw uploads

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{double_option, folders::ensure_folder_exists, optional_text, required_text};
use crate::AppState;
use acge_common::{
    auth::AuthContext,
    db::{models::Document, DocumentFilter, DocumentUpdate, NewDocument},
    errors::{AppError, Result},
    metrics,
    storage,
};

const MAX_TITLE_LEN: usize = 255;
const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListDocumentsQuery {
    pub folder_id: Option<Uuid>,
    pub search: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl ListDocumentsQuery {
    fn into_filter(self) -> DocumentFilter {
        DocumentFilter {
            folder_id: self.folder_id,
            search: optional_text(self.search),
            offset: self.offset.unwrap_or(0),
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }
}

#[derive(Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<Document>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// Metadata for a file that already lives in blob storage
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDocumentRequest {
    pub title: String,

    pub description: Option<String>,

    #[validate(length(min = 1, max = 255))]
    pub file_name: String,

    #[validate(range(min = 0))]
    pub file_size: i64,

    pub mime_type: Option<String>,

    #[validate(url)]
    pub url: String,

    pub checksum: Option<String>,

    pub folder_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
    pub folder_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    /// `null` detaches the document from its folder
    #[serde(default, deserialize_with = "double_option")]
    pub folder_id: Option<Option<Uuid>>,
}

pub async fn list_documents(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(query): Query<ListDocumentsQuery>,
) -> Result<Json<DocumentListResponse>> {
    let filter = query.into_filter();
    let (documents, total) = state.repo().list_documents(&filter).await?;

    Ok(Json(DocumentListResponse {
        documents,
        total,
        limit: filter.limit,
        offset: filter.offset,
    }))
}

pub async fn create_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<Document>)> {
    request.validate()?;

    let title = required_text("title", &request.title, MAX_TITLE_LEN)?;
    let repo = state.repo();

    if let Some(folder_id) = request.folder_id {
        ensure_folder_exists(&repo, folder_id, "folder_id").await?;
    }

    let mime_type = optional_text(request.mime_type)
        .unwrap_or_else(|| storage::guess_mime_type(&request.file_name).to_string());

    let document = repo
        .create_document(NewDocument {
            title,
            description: optional_text(request.description),
            file_name: request.file_name,
            file_size: request.file_size,
            mime_type,
            url: request.url,
            checksum: optional_text(request.checksum),
            folder_id: request.folder_id,
            author_id: auth.user_id,
        })
        .await?;

    tracing::info!(
        document_id = %document.id,
        user_id = %auth.user_id,
        request_id = %auth.request_id,
        "Document registered"
    );

    Ok((StatusCode::CREATED, Json(document)))
}

/// Store the raw request body in blob storage and record the document
pub async fn upload_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Document>)> {
    if !state.blobs.is_enabled() {
        return Err(AppError::ServiceUnavailable {
            message: "Document uploads are not configured".to_string(),
        });
    }

    let file_name = storage::sanitize_file_name(&required_text("filename", &query.filename, 255)?);
    if body.is_empty() {
        return Err(AppError::validation("body", "Uploaded file is empty"));
    }

    let limit = state.config.server.max_upload_bytes;
    if body.len() > limit {
        return Err(AppError::PayloadTooLarge {
            size: body.len(),
            limit,
        });
    }

    let title = match query.title.as_deref() {
        Some(title) => required_text("title", title, MAX_TITLE_LEN)?,
        None => file_name.clone(),
    };

    let repo = state.repo();
    if let Some(folder_id) = query.folder_id {
        ensure_folder_exists(&repo, folder_id, "folder_id").await?;
    }

    // Trust an explicit content type, otherwise go by extension
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && *v != "application/octet-stream")
        .map(String::from)
        .unwrap_or_else(|| storage::guess_mime_type(&file_name).to_string());

    let size = body.len();
    let checksum = storage::checksum(&body);
    let pathname = storage::document_pathname(auth.user_id, &file_name);
    let blob = state.blobs.put(&pathname, &mime_type, body.to_vec()).await?;

    metrics::record_upload(size);

    let created = repo
        .create_document(NewDocument {
            title,
            description: optional_text(query.description),
            file_name,
            file_size: size as i64,
            mime_type,
            url: blob.url,
            checksum: Some(checksum),
            folder_id: query.folder_id,
            author_id: auth.user_id,
        })
        .await;
    let document = match created {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!(
                pathname = %blob.pathname,
                error = %e,
                "Document record failed after upload, blob left orphaned"
            );
            return Err(e);
        }
    };

    tracing::info!(
        document_id = %document.id,
        pathname = %blob.pathname,
        size_bytes = size,
        user_id = %auth.user_id,
        "Document uploaded"
    );

    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn get_document(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>> {
    state
        .repo()
        .find_document_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("document", id))
}

pub async fn update_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDocumentRequest>,
) -> Result<Json<Document>> {
    let repo = state.repo();
    let document = repo
        .find_document_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("document", id))?;

    auth.require_owner_or_admin(document.author_id)?;

    let title = request
        .title
        .as_deref()
        .map(|title| required_text("title", title, MAX_TITLE_LEN))
        .transpose()?;

    if let Some(Some(folder_id)) = request.folder_id {
        ensure_folder_exists(&repo, folder_id, "folder_id").await?;
    }

    let update = DocumentUpdate {
        title,
        description: request.description.map(optional_text),
        folder_id: request.folder_id,
    };

    let document = repo.update_document(document, update).await?;
    tracing::info!(document_id = %id, user_id = %auth.user_id, "Document updated");

    Ok(Json(document))
}

/// Delete the metadata row. The blob itself is left in storage.
pub async fn delete_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let repo = state.repo();
    let document = repo
        .find_document_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("document", id))?;

    auth.require_owner_or_admin(document.author_id)?;

    if !repo.delete_document(id).await? {
        return Err(AppError::not_found("document", id));
    }

    tracing::info!(document_id = %id, user_id = %auth.user_id, "Document deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(limit: Option<u64>, offset: Option<u64>) -> ListDocumentsQuery {
        ListDocumentsQuery {
            folder_id: None,
            search: Some("  ".to_string()),
            limit,
            offset,
        }
    }

    #[test]
    fn test_limit_defaults_and_clamps() {
        assert_eq!(query(None, None).into_filter().limit, DEFAULT_LIMIT);
        assert_eq!(query(Some(0), None).into_filter().limit, 1);
        assert_eq!(query(Some(10_000), None).into_filter().limit, MAX_LIMIT);
        assert_eq!(query(None, Some(30)).into_filter().offset, 30);
    }

    #[test]
    fn test_blank_search_is_ignored() {
        assert_eq!(query(None, None).into_filter().search, None);
    }
}
