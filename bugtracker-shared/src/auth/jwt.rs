/// Bearer token issuing and validation
///
/// Tokens are HS256-signed JWTs carrying only the user ID and timing claims.
/// The role is deliberately absent: it is loaded from the database on every
/// request, so a role change takes effect immediately.
///
/// # Example
///
/// ```
/// use bugtracker_shared::auth::jwt::{create_token, validate_token, Claims};
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-secret-of-at-least-thirty-two-bytes";
/// let claims = Claims::new(Uuid::new_v4(), Duration::hours(24));
///
/// let token = create_token(&claims, secret)?;
/// let decoded = validate_token(&token, secret)?;
/// assert_eq!(decoded.sub, claims.sub);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issuer claim written into and required from every token
pub const ISSUER: &str = "bugtracker";

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token issuer")]
    InvalidIssuer,
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,

    /// Always [`ISSUER`]
    pub iss: String,

    /// Issued at (unix seconds)
    pub iat: i64,

    /// Expires at (unix seconds)
    pub exp: i64,

    /// Not valid before (unix seconds)
    pub nbf: i64,
}

impl Claims {
    /// Claims for `user_id` valid from now for `expires_in`
    pub fn new(user_id: Uuid, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_else(Utc::now)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs the claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| JwtError::CreateError(e.to_string()))
}

/// Verifies signature, issuer, expiry and not-before, returning the claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
            _ => JwtError::ValidationError(e.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_claims_new() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, Duration::hours(24));

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert!(!claims.is_expired());
        assert_eq!(claims.expires_at().timestamp(), claims.exp);
    }

    #[test]
    fn test_create_and_validate_token() {
        let claims = Claims::new(Uuid::new_v4(), Duration::hours(1));
        let token = create_token(&claims, SECRET).expect("should create token");

        let validated = validate_token(&token, SECRET).expect("should validate token");
        assert_eq!(validated, claims);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token(&Claims::new(Uuid::new_v4(), Duration::hours(1)), SECRET).unwrap();

        assert!(matches!(
            validate_token(&token, "another-secret-key-at-least-32-bytes"),
            Err(JwtError::ValidationError(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = Claims::new(Uuid::new_v4(), Duration::hours(-2));
        assert!(claims.is_expired());

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let mut claims = Claims::new(Uuid::new_v4(), Duration::hours(1));
        claims.iss = "someone-else".to_string();

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::InvalidIssuer)));
    }

    #[test]
    fn test_malformed_token_rejected() {
        assert!(validate_token("not.a.jwt", SECRET).is_err());
        assert!(validate_token("", SECRET).is_err());
    }
}
