//! Session handlers: login, logout, current user

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::normalize_email;
use crate::AppState;
use acge_common::{
    auth::{self, AuthContext, Role},
    db::models::User,
    errors::{AppError, Result},
    metrics,
};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 320))]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

/// Public view of a user account
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl UserResponse {
    pub fn from_model(user: User) -> Result<Self> {
        Ok(Self {
            role: user.role()?,
            id: user.id,
            email: user.email,
            name: user.name,
            is_active: user.is_active,
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.to_rfc3339(),
        })
    }
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    /// Landing page for the user's role
    pub redirect_to: &'static str,
    pub token: String,
}

#[derive(Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub redirect_to: &'static str,
}

/// Exchange credentials for a session cookie
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    request.validate()?;

    let repo = state.repo();
    let email = normalize_email(&request.email);

    // Unknown email, inactive account and wrong password all look the same,
    // and all of them pay for one Argon2 verification
    let user = repo.find_user_by_email(&email).await?;
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let password_ok = auth::verify_password_task(request.password, stored_hash).await?;

    let user = match user {
        Some(user) => user,
        None => {
            metrics::record_login("invalid_credentials");
            tracing::info!(email = %email, "Login rejected: unknown email");
            return Err(AppError::InvalidCredentials);
        }
    };

    if !user.is_active {
        metrics::record_login("inactive");
        tracing::info!(user_id = %user.id, "Login rejected: inactive account");
        return Err(AppError::InvalidCredentials);
    }

    if !password_ok {
        metrics::record_login("invalid_credentials");
        tracing::info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let role = user.role()?;
    let token = state.jwt.generate_token(user.id, &user.email, role)?;
    let cookie = auth::session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.jwt.expiration_secs(),
        state.config.auth.cookie_secure,
    );

    metrics::record_login("success");
    tracing::info!(user_id = %user.id, role = %role, "User logged in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            user: UserResponse::from_model(user)?,
            redirect_to: role.home_path(),
            token,
        }),
    ))
}

/// Clear the session cookie. Works without a valid session.
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let cookie = auth::expired_session_cookie(
        &state.config.auth.cookie_name,
        state.config.auth.cookie_secure,
    );
    (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)])
}

/// Current user, re-read from the database
pub async fn me(State(state): State<AppState>, auth: AuthContext) -> Result<Json<MeResponse>> {
    let user = state
        .repo()
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user", auth.user_id))?;

    let user = UserResponse::from_model(user)?;
    Ok(Json(MeResponse {
        redirect_to: user.role.home_path(),
        user,
    }))
}
