//! OAuth2 credential with expiry tracking.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: u64 = 3600;
const MAX_EXPIRES_IN: u64 = 10 * 365 * 24 * 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".into()
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            expires_at,
            token_type: default_token_type(),
        }
    }

    /// Credential expiring `expires_in` seconds from now.
    pub fn expiring_in(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in: u64,
    ) -> Self {
        let lifetime = ChronoDuration::seconds(expires_in.min(MAX_EXPIRES_IN) as i64);
        let expires_at = Utc::now() + lifetime;
        Self::new(access_token, refresh_token, expires_at)
    }

    /// True if the token is expired or expires within `margin`.
    pub fn is_expired(&self, margin: Duration) -> bool {
        self.is_expired_at(Utc::now(), margin)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let Ok(margin) = ChronoDuration::from_std(margin) else {
            return true;
        };
        match self.expires_at.checked_sub_signed(margin) {
            Some(deadline) => now >= deadline,
            None => true,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Seconds until `expires_at` (negative once expired).
    pub fn seconds_until_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds()
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Build a credential, keeping `previous_refresh` when the provider did
    /// not rotate the refresh token.
    pub fn into_credential(self, previous_refresh: Option<&str>) -> Credential {
        let refresh = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous_refresh.map(str::to_string));
        let mut credential = Credential::expiring_in(
            self.access_token,
            refresh,
            self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
        );
        if let Some(token_type) = self.token_type {
            credential.token_type = token_type;
        }
        credential
    }
}
