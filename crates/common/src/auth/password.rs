//! Password hashing (Argon2id, PHC string format)

use crate::errors::{AppError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{distributions::Alphanumeric, Rng};
use std::sync::OnceLock;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password for storage
pub fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

/// Check a password against a stored hash. Malformed hashes never match.
pub fn verify_password(plain: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is not a valid PHC string");
            false
        }
    }
}

/// Verify on the blocking pool. With no stored hash the check still runs
/// against a throwaway hash and always fails, so a missing account costs the
/// same as a wrong password.
pub async fn verify_password_task(plain: String, stored_hash: Option<String>) -> Result<bool> {
    tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => verify_password(&plain, &hash),
        None => {
            if let Some(hash) = dummy_hash() {
                verify_password(&plain, hash);
            }
            false
        }
    })
    .await
    .map_err(|e| AppError::Internal {
        message: format!("Password verification task failed: {}", e),
    })
}

/// Hash on the blocking pool
pub async fn hash_password_task(plain: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Password hashing task failed: {}", e),
        })?
}

fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("acge-unknown-account").ok())
        .as_deref()
}

/// Reject passwords shorter than the minimum length
pub fn check_password_strength(plain: &str) -> Result<()> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

/// Generate a random alphanumeric password, used for admin resets
pub fn generate_password(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-hash"));
        assert!(!verify_password("", ""));
    }

    #[tokio::test]
    async fn test_verify_task_without_account_fails() {
        assert!(!verify_password_task("acge-unknown-account".into(), None).await.unwrap());

        let hash = hash_password_task("correct horse".into()).await.unwrap();
        assert!(verify_password_task("correct horse".into(), Some(hash)).await.unwrap());
    }

    #[test]
    fn test_password_strength() {
        assert!(check_password_strength("short").is_err());
        assert!(check_password_strength("longenough").is_ok());
    }

    #[test]
    fn test_generate_password() {
        let pw = generate_password(16);
        assert_eq!(pw.len(), 16);
        assert!(pw.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
