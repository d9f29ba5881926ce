/// Client error types

use thiserror::Error;
use uuid::Uuid;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure or an undecodable response body
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The stored token has passed its expiry and was discarded
    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("Not logged in")]
    NotAuthenticated,

    /// A board move that can't be started
    #[error("Invalid move for ticket {ticket_id}: {reason}")]
    InvalidMove { ticket_id: Uuid, reason: String },
}

impl ClientError {
    /// Whether the server rejected the caller's credentials or permissions
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ClientError::Api { status: 401 | 403, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_detection() {
        let unauthorized = ClientError::Api {
            status: 401,
            message: "Token is not valid".to_string(),
        };
        let forbidden = ClientError::Api {
            status: 403,
            message: "Not a team member".to_string(),
        };
        let not_found = ClientError::Api {
            status: 404,
            message: "Ticket not found".to_string(),
        };

        assert!(unauthorized.is_auth_failure());
        assert!(forbidden.is_auth_failure());
        assert!(!not_found.is_auth_failure());
        assert!(!ClientError::SessionExpired.is_auth_failure());
    }
}
