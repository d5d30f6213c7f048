//! Bearer-token session and login credentials.

use std::fmt;
use std::time::{Duration, Instant};

/// Repository login credentials.
///
/// `Debug` redacts the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Repository account (usually an e-mail address).
    pub user: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A bearer token obtained from one login exchange.
///
/// Lives only in memory for the duration of one run.
#[derive(Clone)]
pub struct AuthSession {
    bearer_token: String,
    expires_at: Instant,
}

impl AuthSession {
    /// Creates a session valid for `ttl` from now.
    ///
    /// A leading `Bearer ` scheme on `token` is stripped.
    #[must_use]
    pub fn new(token: &str, ttl: Duration) -> Self {
        let token = token.trim();
        let token = token
            .strip_prefix("Bearer ")
            .or_else(|| token.strip_prefix("bearer "))
            .unwrap_or(token);
        Self {
            bearer_token: token.trim().to_string(),
            expires_at: Instant::now() + ttl,
        }
    }

    /// True while the token has not reached its expiry.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.has_token() && Instant::now() < self.expires_at
    }

    /// True when the login returned a non-blank token.
    #[must_use]
    pub fn has_token(&self) -> bool {
        !self.bearer_token.is_empty()
    }

    /// `Authorization` header value.
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.bearer_token)
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("bearer_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
