/// Client-side session store
///
/// A session is either anonymous or holds the bearer token issued at login
/// together with its expiry and the user it belongs to. Reading the token of
/// an expired session clears it.

use crate::error::{ClientError, ClientResult};
use bugtracker_shared::{auth::AuthResponse, models::user::UserProfile};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated {
        token: String,
        expires_at: DateTime<Utc>,
        user: UserProfile,
    },
}

impl Session {
    /// Builds an authenticated session from a login or register response
    pub fn from_auth(response: AuthResponse) -> Self {
        Session::Authenticated {
            token: response.token,
            expires_at: response.expires_at,
            user: response.user,
        }
    }

    /// Replaces the session with the one described by `response`
    pub fn login_from(&mut self, response: AuthResponse) {
        info!(user_id = %response.user.id, "Session started");
        *self = Session::from_auth(response);
    }

    pub fn clear(&mut self) {
        if self.is_authenticated() {
            debug!("Session cleared");
        }
        *self = Session::Anonymous;
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated { .. })
    }

    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            Session::Authenticated { user, .. } => Some(user),
            Session::Anonymous => None,
        }
    }

    /// Current bearer token
    ///
    /// # Errors
    ///
    /// - `NotAuthenticated` when anonymous
    /// - `SessionExpired` when the token has expired; the session is cleared
    pub fn token(&mut self) -> ClientResult<String> {
        self.token_at(Utc::now())
    }

    fn token_at(&mut self, now: DateTime<Utc>) -> ClientResult<String> {
        let Session::Authenticated { token, expires_at, .. } = self else {
            return Err(ClientError::NotAuthenticated);
        };

        if *expires_at > now {
            return Ok(token.clone());
        }

        info!("Session expired");
        self.clear();
        Err(ClientError::SessionExpired)
    }
}
