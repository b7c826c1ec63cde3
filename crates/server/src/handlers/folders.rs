//! Folder management handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{double_option, optional_text, required_text};
use crate::AppState;
use acge_common::{
    auth::{AuthContext, Role},
    db::{
        models::{Document, Folder},
        FolderUpdate, Repository,
    },
    errors::{AppError, Result},
};

const MAX_NAME_LEN: usize = 255;

/// Guard against walking a corrupted (cyclic) parent chain forever
const MAX_FOLDER_DEPTH: usize = 64;

/// Roles allowed to create folders
const FOLDER_CREATORS: &[Role] = &[Role::Secretaire];

#[derive(Debug, Deserialize)]
pub struct ListFoldersQuery {
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFolderRequest {
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    /// `null` moves the folder to the root
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<Uuid>>,
}

#[derive(Serialize)]
pub struct FolderDetail {
    #[serde(flatten)]
    pub folder: Folder,
    pub children: Vec<Folder>,
    pub documents: Vec<Document>,
}

pub async fn list_folders(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(query): Query<ListFoldersQuery>,
) -> Result<Json<Vec<Folder>>> {
    let folders = state.repo().list_folders(query.parent_id).await?;
    Ok(Json(folders))
}

pub async fn create_folder(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateFolderRequest>,
) -> Result<(StatusCode, Json<Folder>)> {
    auth.require_role(FOLDER_CREATORS)?;

    let name = required_text("name", &request.name, MAX_NAME_LEN)?;
    let repo = state.repo();

    if let Some(parent_id) = request.parent_id {
        ensure_folder_exists(&repo, parent_id, "parent_id").await?;
    }

    let folder = repo
        .create_folder(
            name,
            optional_text(request.description),
            request.parent_id,
            auth.user_id,
        )
        .await?;

    tracing::info!(
        folder_id = %folder.id,
        user_id = %auth.user_id,
        request_id = %auth.request_id,
        "Folder created"
    );

    Ok((StatusCode::CREATED, Json(folder)))
}

/// Folder with its direct children and documents
pub async fn get_folder(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<FolderDetail>> {
    let repo = state.repo();
    let folder = repo
        .find_folder_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("folder", id))?;

    let children = repo.child_folders(id).await?;
    let documents = repo.documents_in_folder(id).await?;

    Ok(Json(FolderDetail {
        folder,
        children,
        documents,
    }))
}

pub async fn update_folder(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateFolderRequest>,
) -> Result<Json<Folder>> {
    let repo = state.repo();
    let folder = repo
        .find_folder_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("folder", id))?;

    auth.require_owner_or_admin(folder.author_id)?;

    let name = request
        .name
        .as_deref()
        .map(|name| required_text("name", name, MAX_NAME_LEN))
        .transpose()?;

    if let Some(Some(parent_id)) = request.parent_id {
        ensure_not_descendant(&repo, id, parent_id).await?;
    }

    let update = FolderUpdate {
        name,
        description: request.description.map(optional_text),
        parent_id: request.parent_id,
    };

    let folder = repo.update_folder(folder, update).await?;
    tracing::info!(folder_id = %id, user_id = %auth.user_id, "Folder updated");

    Ok(Json(folder))
}

/// Delete a folder; sub-folders go with it, documents are detached
pub async fn delete_folder(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let repo = state.repo();
    let folder = repo
        .find_folder_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("folder", id))?;

    auth.require_owner_or_admin(folder.author_id)?;

    if !repo.delete_folder(id).await? {
        return Err(AppError::not_found("folder", id));
    }

    tracing::info!(folder_id = %id, user_id = %auth.user_id, "Folder deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn ensure_folder_exists(repo: &Repository, id: Uuid, field: &str) -> Result<Folder> {
    repo.find_folder_by_id(id)
        .await?
        .ok_or_else(|| AppError::validation(field, format!("Folder {} does not exist", id)))
}

/// Reject moving `folder_id` under itself or one of its descendants
async fn ensure_not_descendant(repo: &Repository, folder_id: Uuid, new_parent: Uuid) -> Result<()> {
    let mut current = Some(ensure_folder_exists(repo, new_parent, "parent_id").await?);

    for _ in 0..MAX_FOLDER_DEPTH {
        let Some(folder) = current else {
            return Ok(());
        };
        if folder.id == folder_id {
            return Err(AppError::validation(
                "parent_id",
                "A folder cannot be moved inside itself",
            ));
        }
        current = match folder.parent_id {
            Some(parent_id) => repo.find_folder_by_id(parent_id).await?,
            None => None,
        };
    }

    match current {
        None => Ok(()),
        Some(_) => Err(AppError::validation("parent_id", "Folder hierarchy is too deep")),
    }
}
