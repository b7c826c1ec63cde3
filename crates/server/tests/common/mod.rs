//! Shared fixtures for router tests

#![allow(dead_code)]

use acge_common::{
    auth::{hash_password, JwtManager, Role},
    config::AppConfig,
    db::{
        models::{Document, Dossier, DossierHistory, Folder, NatureDocument, PosteComptable, User},
        DbPool,
    },
};
use acge_server::{create_router, AppState};
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use sea_orm::{prelude::DateTimeWithTimeZone, DatabaseConnection, Statement, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret-with-enough-entropy";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = Some(JWT_SECRET.to_string());
    config.rate_limit.enabled = false;
    config
}

pub fn state_with(conn: DatabaseConnection) -> AppState {
    AppState::new(test_config(), DbPool::from_connection(conn), None).unwrap()
}

pub fn app(conn: DatabaseConnection) -> Router {
    create_router(state_with(conn))
}

/// Router over a connection the test keeps a handle to
pub fn app_shared(conn: &Arc<DatabaseConnection>) -> Router {
    let state = AppState::new(test_config(), DbPool::from_shared(conn.clone()), None).unwrap();
    create_router(state)
}

/// Every statement the mock received. The router must be dropped first.
pub fn executed(conn: Arc<DatabaseConnection>) -> Vec<Statement> {
    let conn = Arc::try_unwrap(conn).unwrap_or_else(|_| panic!("connection is still shared"));
    conn.into_transaction_log()
        .iter()
        .flat_map(|txn| txn.statements().to_vec())
        .collect()
}

/// First statement whose SQL starts with `prefix`, with its position in the log
pub fn find_statement<'a>(log: &'a [Statement], prefix: &str) -> Option<(usize, &'a Statement)> {
    log.iter().enumerate().find(|(_, stmt)| stmt.sql.starts_with(prefix))
}

pub fn binds(statement: &Statement, value: impl Into<Value>) -> bool {
    let value = value.into();
    statement
        .values
        .as_ref()
        .is_some_and(|values| values.0.contains(&value))
}

/// Row for a `SELECT id` projection
pub fn id_row(id: Uuid) -> BTreeMap<&'static str, Value> {
    BTreeMap::from([("id", Value::from(id))])
}

pub fn now() -> DateTimeWithTimeZone {
    chrono::Utc::now().into()
}

pub fn token_for(user_id: Uuid, role: Role) -> String {
    JwtManager::new(JWT_SECRET, 3600)
        .generate_token(user_id, "user@acge.test", role)
        .unwrap()
}

/// Request builder with the session cookie already set
pub fn authed(method: &str, uri: &str, user_id: Uuid, role: Role) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, format!("auth-token={}", token_for(user_id, role)))
}

pub fn json_body(value: serde_json::Value) -> Body {
    Body::from(value.to_string())
}

pub async fn read_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn user(email: &str, password: &str, role: Role) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        name: "Test User".to_string(),
        password_hash: hash_password(password).unwrap(),
        role: role.as_str().to_string(),
        is_active: true,
        created_at: now(),
        updated_at: now(),
    }
}

pub fn folder(name: &str, author_id: Uuid) -> Folder {
    Folder {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        parent_id: None,
        author_id,
        created_at: now(),
        updated_at: now(),
    }
}

pub fn document(title: &str, author_id: Uuid) -> Document {
    Document {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: None,
        file_name: "facture.pdf".to_string(),
        file_size: 4,
        mime_type: "application/pdf".to_string(),
        url: "https://blobs.test/facture.pdf".to_string(),
        checksum: None,
        folder_id: None,
        author_id,
        created_at: now(),
        updated_at: now(),
    }
}

pub fn dossier(statut: &str, secretaire_id: Uuid) -> Dossier {
    Dossier {
        id: Uuid::new_v4(),
        numero_dossier: "DOS-2025-001".to_string(),
        numero_nature: "N-01".to_string(),
        objet_operation: "Achat de fournitures".to_string(),
        beneficiaire: "Papeterie Centrale".to_string(),
        poste_comptable_id: Uuid::new_v4(),
        nature_document_id: Uuid::new_v4(),
        secretaire_id,
        folder_id: None,
        statut: statut.to_string(),
        motif_rejet: None,
        created_at: now(),
        updated_at: now(),
    }
}

pub fn nature(numero: &str, nom: &str) -> NatureDocument {
    NatureDocument {
        id: Uuid::new_v4(),
        numero: numero.to_string(),
        nom: nom.to_string(),
        description: None,
        is_active: true,
        created_at: now(),
    }
}

pub fn poste(numero: &str, intitule: &str) -> PosteComptable {
    PosteComptable {
        id: Uuid::new_v4(),
        numero: numero.to_string(),
        intitule: intitule.to_string(),
        is_active: true,
        created_at: now(),
    }
}

pub fn history(dossier_id: Uuid, from: Option<&str>, to: &str, actor_id: Uuid) -> DossierHistory {
    DossierHistory {
        id: Uuid::new_v4(),
        dossier_id,
        from_statut: from.map(String::from),
        to_statut: to.to_string(),
        actor_id,
        comment: None,
        created_at: now(),
    }
}
