/// Caller identity resolution
///
/// Turns an `Authorization: Bearer <token>` header into an [`AuthContext`]
/// holding the caller's current profile. The token only proves who the caller
/// is; the user row is re-read on every request so deleted accounts lose
/// access at once and role changes apply without re-login.
///
/// # Example
///
/// ```no_run
/// use axum::http::HeaderMap;
/// use bugtracker_shared::auth::middleware::{bearer_token, resolve_identity};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, headers: HeaderMap) -> Result<(), Box<dyn std::error::Error>> {
/// let token = bearer_token(&headers)?;
/// let auth = resolve_identity(&pool, "jwt-secret", token).await?;
/// println!("request from {}", auth.user.email);
/// # Ok(())
/// # }
/// ```

use axum::http::{header, HeaderMap};
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{validate_token, JwtError};
use crate::models::user::{User, UserProfile, UserRole};

/// Authenticated caller, inserted into request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user: UserProfile,
}

impl AuthContext {
    pub fn new(user: UserProfile) -> Self {
        Self { user }
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> UserRole {
        self.user.role
    }

    pub fn is_admin(&self) -> bool {
        self.user.role == UserRole::Admin
    }
}

/// Why a request could not be authenticated
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingCredentials,

    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    InvalidToken(String),

    /// Token is valid but its user has since been deleted
    #[error("User no longer exists")]
    UnknownUser,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid token issuer".to_string()),
            other => AuthError::InvalidToken(format!("Invalid token: {}", other)),
        }
    }
}

/// Extracts the bearer token from request headers
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat("Malformed authorization header".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    Ok(token)
}

/// Validates a token and loads the caller's current profile
pub async fn resolve_identity(
    pool: &PgPool,
    secret: &str,
    token: &str,
) -> Result<AuthContext, AuthError> {
    let claims = validate_token(token, secret)?;

    let user = User::find_by_id(pool, claims.sub)
        .await?
        .ok_or(AuthError::UnknownUser)?;

    Ok(AuthContext::new(user.into()))
}
