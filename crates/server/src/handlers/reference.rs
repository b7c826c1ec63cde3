//! Accounting reference tables (document natures, accounting posts)

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use super::{optional_text, required_text};
use crate::AppState;
use acge_common::{
    auth::{AuthContext, Role},
    cache::keys,
    db::models::{NatureDocument, PosteComptable},
    errors::Result,
};

#[derive(Debug, Deserialize)]
pub struct CreateNatureDocumentRequest {
    pub numero: String,
    pub nom: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePosteComptableRequest {
    pub numero: String,
    pub intitule: String,
}

/// Active document natures, ordered by numero
pub async fn list_natures_documents(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<Vec<NatureDocument>>> {
    let repo = state.repo();
    let natures = state
        .reference
        .natures_documents
        .get_or_load(keys::NATURES_DOCUMENTS, || async move {
            repo.list_natures_documents().await
        })
        .await?;
    Ok(Json(natures))
}

pub async fn create_nature_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateNatureDocumentRequest>,
) -> Result<(StatusCode, Json<NatureDocument>)> {
    auth.require_role(&[Role::Admin])?;

    let nature = state
        .repo()
        .create_nature_document(
            required_text("numero", &request.numero, 50)?,
            required_text("nom", &request.nom, 255)?,
            optional_text(request.description),
        )
        .await?;

    state.reference.natures_documents.invalidate(&keys::NATURES_DOCUMENTS).await;
    tracing::info!(nature_id = %nature.id, numero = %nature.numero, "Document nature created");

    Ok((StatusCode::CREATED, Json(nature)))
}

/// Active accounting posts, ordered by numero
pub async fn list_postes_comptables(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<Vec<PosteComptable>>> {
    let repo = state.repo();
    let postes = state
        .reference
        .postes_comptables
        .get_or_load(keys::POSTES_COMPTABLES, || async move {
            repo.list_postes_comptables().await
        })
        .await?;
    Ok(Json(postes))
}

pub async fn create_poste_comptable(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreatePosteComptableRequest>,
) -> Result<(StatusCode, Json<PosteComptable>)> {
    auth.require_role(&[Role::Admin])?;

    let poste = state
        .repo()
        .create_poste_comptable(
            required_text("numero", &request.numero, 50)?,
            required_text("intitule", &request.intitule, 255)?,
        )
        .await?;

    state.reference.postes_comptables.invalidate(&keys::POSTES_COMPTABLES).await;
    tracing::info!(poste_id = %poste.id, numero = %poste.numero, "Accounting post created");

    Ok((StatusCode::CREATED, Json(poste)))
}
