//! Dossier workflow handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{optional_text, required_text};
use crate::AppState;
use acge_common::{
    auth::{AuthContext, Role},
    db::{
        models::{Dossier, DossierHistory},
        NewDossier,
    },
    errors::{AppError, Result},
    workflow::{DossierAction, DossierService, DossierStatus},
};

/// Roles allowed to register dossiers
const DOSSIER_CREATORS: &[Role] = &[Role::Secretaire];

#[derive(Debug, Deserialize)]
pub struct ListDossiersQuery {
    pub statut: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDossierRequest {
    pub numero_dossier: String,
    pub numero_nature: String,
    pub objet_operation: String,
    pub beneficiaire: String,
    pub poste_comptable_id: Uuid,
    pub nature_document_id: Uuid,
    pub folder_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: DossierAction,
    pub comment: Option<String>,
}

#[derive(Serialize)]
pub struct DossierDetail {
    #[serde(flatten)]
    pub dossier: Dossier,
    pub history: Vec<DossierHistory>,
}

pub async fn list_dossiers(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(query): Query<ListDossiersQuery>,
) -> Result<Json<Vec<Dossier>>> {
    let status = optional_text(query.statut)
        .map(|s| s.parse::<DossierStatus>())
        .transpose()?;

    let dossiers = match status {
        Some(status) => state.repo().list_dossiers(Some(std::slice::from_ref(&status))).await?,
        None => state.repo().list_dossiers(None).await?,
    };
    Ok(Json(dossiers))
}

/// Dossiers waiting on the caller's role
pub async fn queue(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Dossier>>> {
    let statuses = DossierStatus::queue_for(auth.role);
    if statuses.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let dossiers = state.repo().list_dossiers(Some(statuses.as_slice())).await?;
    Ok(Json(dossiers))
}

pub async fn create_dossier(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateDossierRequest>,
) -> Result<(StatusCode, Json<Dossier>)> {
    auth.require_role(DOSSIER_CREATORS)?;

    let new = NewDossier {
        numero_dossier: required_text("numero_dossier", &request.numero_dossier, 100)?,
        numero_nature: required_text("numero_nature", &request.numero_nature, 100)?,
        objet_operation: required_text("objet_operation", &request.objet_operation, 1000)?,
        beneficiaire: required_text("beneficiaire", &request.beneficiaire, 255)?,
        poste_comptable_id: request.poste_comptable_id,
        nature_document_id: request.nature_document_id,
        folder_id: request.folder_id,
    };

    let dossier = DossierService::new(state.repo()).create(&auth, new).await?;
    Ok((StatusCode::CREATED, Json(dossier)))
}

pub async fn get_dossier(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<DossierDetail>> {
    let repo = state.repo();
    let dossier = repo
        .find_dossier_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("dossier", id))?;
    let history = repo.dossier_history(id).await?;

    Ok(Json(DossierDetail { dossier, history }))
}

pub async fn perform_action(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<Dossier>> {
    let dossier = DossierService::new(state.repo())
        .perform(&auth, id, request.action, request.comment.as_deref())
        .await?;
    Ok(Json(dossier))
}
