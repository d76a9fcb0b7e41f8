//! Session data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Identity snapshot supplied by the sign-in transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub display_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// The persisted credential snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_extended_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Build an authenticated state from a validated sign-in result
    pub fn from_sign_in(result: SignInResult, issued_at: DateTime<Utc>) -> Self {
        Self {
            access_token: Some(result.token),
            refresh_token: result.refresh_token,
            user: Some(result.user),
            issued_at,
            expires_at: result.expires_at,
            last_extended_at: None,
        }
    }

    /// Whether this snapshot describes an authenticated session.
    ///
    /// A state that fails this check must never be held in memory.
    pub fn is_valid(&self) -> bool {
        let has_token = self
            .access_token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty());

        has_token && self.expires_at > self.issued_at
    }

    /// Move the deadline forward. Returns false when `candidate` would not
    /// increase it.
    pub fn extend_to(&mut self, candidate: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if candidate <= self.expires_at {
            return false;
        }

        self.expires_at = candidate;
        self.last_extended_at = Some(now);
        true
    }
}

/// Output of the sign-in transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResult {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: UserProfile,
    pub expires_at: DateTime<Utc>,
}

impl SignInResult {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), SessionError> {
        if self.token.trim().is_empty() {
            return Err(SessionError::InvalidSignIn("missing access token".into()));
        }

        if self.expires_at <= now {
            return Err(SessionError::InvalidSignIn(format!(
                "expiry {} is not in the future",
                self.expires_at.to_rfc3339()
            )));
        }

        Ok(())
    }
}
