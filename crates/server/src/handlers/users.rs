//! User administration (ADMIN only)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{auth::UserResponse, normalize_email, required_text};
use crate::AppState;
use acge_common::{
    auth::{self, AuthContext, Role},
    db::UserUpdate,
    errors::{AppError, Result},
};

/// Length of generated passwords
const GENERATED_PASSWORD_LEN: usize = 16;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,

    pub name: String,

    pub password: String,

    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct ResetPasswordResponse {
    pub user_id: Uuid,
    /// Only present when the server generated the password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_password: Option<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<UserResponse>>> {
    auth.require_role(&[Role::Admin])?;

    let users = state
        .repo()
        .list_users()
        .await?
        .into_iter()
        .map(UserResponse::from_model)
        .collect::<Result<Vec<_>>>()?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(mut request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    auth.require_role(&[Role::Admin])?;

    request.email = normalize_email(&request.email);
    request.validate()?;

    let name = required_text("name", &request.name, 255)?;
    auth::check_password_strength(&request.password)?;

    let repo = state.repo();
    let email = request.email;
    if repo.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Duplicate {
            message: format!("A user with email {} already exists", email),
        });
    }

    let hash = auth::hash_password_task(request.password).await?;
    let user = repo.create_user(email, name, hash, request.role).await?;

    tracing::info!(
        user_id = %user.id,
        role = %request.role,
        admin_id = %auth.user_id,
        "User created"
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from_model(user)?)))
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    auth.require_role(&[Role::Admin])?;

    // An admin locking themselves out leaves nobody to undo it
    if id == auth.user_id {
        if request.is_active == Some(false) {
            return Err(AppError::validation("is_active", "You cannot deactivate your own account"));
        }
        if request.role.is_some_and(|role| role != Role::Admin) {
            return Err(AppError::validation("role", "You cannot remove your own admin role"));
        }
    }

    let update = UserUpdate {
        name: request
            .name
            .as_deref()
            .map(|name| required_text("name", name, 255))
            .transpose()?,
        role: request.role,
        is_active: request.is_active,
    };

    let user = state.repo().update_user(id, update).await?;
    tracing::info!(user_id = %id, admin_id = %auth.user_id, "User updated");

    Ok(Json(UserResponse::from_model(user)?))
}

pub async fn reset_password(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    request: Option<Json<ResetPasswordRequest>>,
) -> Result<Json<ResetPasswordResponse>> {
    auth.require_role(&[Role::Admin])?;

    let requested = request.and_then(|Json(body)| body.password);
    let (password, generated) = match requested {
        Some(password) => {
            auth::check_password_strength(&password)?;
            (password, false)
        }
        None => (auth::generate_password(GENERATED_PASSWORD_LEN), true),
    };

    let hash = auth::hash_password_task(password.clone()).await?;
    if !state.repo().set_password_hash(id, hash).await? {
        return Err(AppError::not_found("user", id));
    }

    tracing::info!(user_id = %id, admin_id = %auth.user_id, generated, "Password reset");

    Ok(Json(ResetPasswordResponse {
        user_id: id,
        generated_password: generated.then_some(password),
    }))
}
