/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id hashing and registration strength rules
/// - [`jwt`]: Bearer token issuing and validation
/// - [`middleware`]: Resolving a bearer token to the caller's profile
/// - [`authorization`]: Team membership, role and authorship checks
///
/// # Example
///
/// ```no_run
/// use bugtracker_shared::auth::{issue_token, password::hash_password};
/// use bugtracker_shared::models::user::{CreateUser, User};
/// use chrono::Duration;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let user = User::create(&pool, CreateUser {
///     name: "Ada".to_string(),
///     email: "ada@example.com".to_string(),
///     password_hash: hash_password("analytical1")?,
/// }).await?;
///
/// let response = issue_token(&user, "jwt-secret", Duration::hours(24))?;
/// println!("token expires at {}", response.expires_at);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::{User, UserProfile};

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;

/// Body returned by register and login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

/// Issues a bearer token for `user`
pub fn issue_token(user: &User, secret: &str, lifetime: Duration) -> Result<AuthResponse, jwt::JwtError> {
    let claims = jwt::Claims::new(user.id, lifetime);
    let token = jwt::create_token(&claims, secret)?;

    Ok(AuthResponse {
        token,
        expires_at: claims.expires_at(),
        user: user.profile(),
    })
}
