//! Notification handlers. Every operation is scoped to the caller's own rows.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use acge_common::{
    auth::AuthContext,
    db::models::Notification,
    errors::{AppError, Result},
};

#[derive(Debug, Default, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub count: u64,
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Vec<Notification>>> {
    let notifications = state
        .repo()
        .list_notifications(auth.user_id, query.unread_only)
        .await?;
    Ok(Json(notifications))
}

pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<UnreadCountResponse>> {
    let count = state.repo().unread_notification_count(auth.user_id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

/// Someone else's notification is reported as missing
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    if !state.repo().mark_notification_read(auth.user_id, id).await? {
        return Err(AppError::not_found("notification", id));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<MarkAllReadResponse>> {
    let updated = state.repo().mark_all_notifications_read(auth.user_id).await?;

    tracing::debug!(user_id = %auth.user_id, updated, "Notifications marked read");
    Ok(Json(MarkAllReadResponse { updated }))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    if !state.repo().delete_notification(auth.user_id, id).await? {
        return Err(AppError::not_found("notification", id));
    }
    Ok(StatusCode::NO_CONTENT)
}
