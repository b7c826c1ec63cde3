//! Startup seeding

use acge_common::{
    auth::{self, Role},
    config::AuthConfig,
    db::Repository,
    errors::Result,
};
use tracing::{info, warn};

use crate::handlers::normalize_email;

/// Create the configured admin account if no user has its email yet.
///
/// Returns whether an account was created.
pub async fn ensure_bootstrap_admin(repo: &Repository, config: &AuthConfig) -> Result<bool> {
    let (Some(email), Some(password)) = (
        config.bootstrap_admin_email.as_deref(),
        config.bootstrap_admin_password.as_deref(),
    ) else {
        return Ok(false);
    };

    let email = normalize_email(email);
    if email.is_empty() {
        warn!("Bootstrap admin email is blank, skipping");
        return Ok(false);
    }

    if repo.find_user_by_email(&email).await?.is_some() {
        return Ok(false);
    }

    auth::check_password_strength(password)?;
    let hash = auth::hash_password(password)?;
    let user = repo
        .create_user(email, "Administrateur".to_string(), hash, Role::Admin)
        .await?;

    info!(user_id = %user.id, email = %user.email, "Bootstrap admin created");
    Ok(true)
}
