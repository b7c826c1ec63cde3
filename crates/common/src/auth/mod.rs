//! Authentication and authorization utilities
//!
//! Provides:
//! - Password hashing and verification
//! - JWT token generation and validation
//! - Session token extraction (cookie or bearer header)
//! - Role allow-lists and the role-to-route redirect table

mod password;
mod role;

pub use password::{
    check_password_strength, generate_password, hash_password, hash_password_task, verify_password,
    verify_password_task, MIN_PASSWORD_LEN,
};
pub use role::{Role, UnknownRole};

use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,

    pub email: String,

    pub role: Role,

    /// Request ID for tracing
    pub request_id: String,
}

impl AuthContext {
    /// Check the role against an allow-list (admins always pass)
    pub fn has_role(&self, allowed: &[Role]) -> bool {
        self.role.is_allowed(allowed)
    }

    /// Require one of the given roles, returning 403 otherwise
    pub fn require_role(&self, allowed: &[Role]) -> Result<()> {
        if self.has_role(allowed) {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: format!("Role {} is not allowed to perform this action", self.role),
            })
        }
    }

    /// Require the caller to own the resource or be an admin
    pub fn require_owner_or_admin(&self, owner_id: Uuid) -> Result<()> {
        if self.user_id == owner_id || self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: "Only the author or an administrator can modify this resource".to_string(),
            })
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    pub email: String,

    pub role: Role,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    pub fn expiration_secs(&self) -> i64 {
        self.expiration_secs
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, user_id: Uuid, email: &str, role: Role) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal {
                message: format!("Failed to generate token: {}", e)
            })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::ExpiredToken
                    }
                    _ => AppError::InvalidToken,
                }
            })
    }
}

/// Everything the extractor needs to authenticate a request
#[derive(Clone)]
pub struct AuthKeys {
    pub jwt: Arc<JwtManager>,
    pub cookie_name: String,
}

/// Extract a bearer token from an Authorization header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Find a cookie value by name across all Cookie headers
pub fn extract_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Session token from the cookie, falling back to the Authorization header
pub fn extract_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    extract_cookie(headers, cookie_name).or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer)
    })
}

/// `Set-Cookie` value for a freshly issued session token
pub fn session_cookie(name: &str, token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that clears the session
pub fn expired_session_cookie(name: &str, secure: bool) -> String {
    session_cookie(name, "", 0, secure)
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    AuthKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let keys = AuthKeys::from_ref(state);

        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let token = extract_token(&parts.headers, &keys.cookie_name)
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing session token".to_string(),
            })?;

        let claims = keys.jwt.validate_token(token)?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

        Ok(AuthContext {
            user_id,
            email: claims.email,
            role: claims.role,
            request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_extract_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; auth-token=tok123; other=1"),
        );
        assert_eq!(extract_cookie(&headers, "auth-token"), Some("tok123"));
        assert_eq!(extract_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("auth-token=from-cookie"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_token(&headers, "auth-token"), Some("from-cookie"));

        headers.remove(header::COOKIE);
        assert_eq!(extract_token(&headers, "auth-token"), Some("from-header"));
    }

    #[test]
    fn test_session_cookie_format() {
        let cookie = session_cookie("auth-token", "t", 60, true);
        assert!(cookie.starts_with("auth-token=t;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=60"));
        assert!(cookie.ends_with("; Secure"));

        let cleared = expired_session_cookie("auth-token", false);
        assert!(cleared.contains("Max-Age=0"));
        assert!(!cleared.contains("Secure"));
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);
        let user_id = Uuid::new_v4();

        let token = manager
            .generate_token(user_id, "cb@acge.local", Role::ControleurBudgetaire)
            .unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "cb@acge.local");
        assert_eq!(claims.role, Role::ControleurBudgetaire);
    }

    #[test]
    fn test_jwt_wrong_secret_is_invalid() {
        let signer = JwtManager::new("secret-a", 3600);
        let verifier = JwtManager::new("secret-b", 3600);
        let token = signer.generate_token(Uuid::new_v4(), "a@b.c", Role::Admin).unwrap();

        assert!(matches!(verifier.validate_token(&token), Err(AppError::InvalidToken)));
        assert!(matches!(verifier.validate_token("garbage"), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_jwt_expired() {
        let manager = JwtManager::new("test_secret", 3600);
        let past = Utc::now() - Duration::hours(2);
        let claims = JwtClaims {
            sub: Uuid::new_v4().to_string(),
            email: "old@acge.local".to_string(),
            role: Role::Secretaire,
            exp: past.timestamp(),
            iat: (past - Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test_secret"),
        )
        .unwrap();

        assert!(matches!(manager.validate_token(&token), Err(AppError::ExpiredToken)));
    }

    #[test]
    fn test_require_role() {
        let ctx = AuthContext {
            user_id: Uuid::new_v4(),
            email: "s@acge.local".to_string(),
            role: Role::Secretaire,
            request_id: "r".to_string(),
        };
        assert!(ctx.require_role(&[Role::Secretaire]).is_ok());
        assert!(matches!(
            ctx.require_role(&[Role::Ordonnateur]),
            Err(AppError::Forbidden { .. })
        ));
        assert!(ctx.require_owner_or_admin(ctx.user_id).is_ok());
        assert!(ctx.require_owner_or_admin(Uuid::new_v4()).is_err());
    }
}
