//! Session State Machine
//!
//! ```text
//! Unauthenticated
//!   ↓ sign in
//! Authenticated ⇄ Warning      (warning tick / extension)
//!   ↓ deadline reached
//! Expired
//!   ↓ cleared
//! Unauthenticated
//! ```
//!
//! Warning is observational: the session stays usable. Sign-out leads back
//! to Unauthenticated from any state without passing through Expired.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// No credential is held
    Unauthenticated,
    /// Credential held, deadline outside the warning window
    Authenticated,
    /// Credential held, deadline inside the warning window
    Warning,
    /// Deadline reached, credential being cleared
    Expired,
}

impl SessionPhase {
    pub fn can_transition_to(&self, target: SessionPhase) -> bool {
        match (self, target) {
            (SessionPhase::Unauthenticated, SessionPhase::Authenticated) => true,
            // Re-sign-in replaces the session wholesale
            (SessionPhase::Authenticated, SessionPhase::Authenticated) => true,
            (SessionPhase::Warning, SessionPhase::Authenticated) => true,
            (SessionPhase::Authenticated, SessionPhase::Warning) => true,
            (SessionPhase::Warning, SessionPhase::Warning) => true,
            (SessionPhase::Authenticated, SessionPhase::Expired) => true,
            (SessionPhase::Warning, SessionPhase::Expired) => true,
            // Sign-out and the end of expiry
            (_, SessionPhase::Unauthenticated) => true,
            _ => false,
        }
    }

    /// Whether a credential is held in this phase
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionPhase::Authenticated | SessionPhase::Warning)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Unauthenticated => "unauthenticated",
            SessionPhase::Authenticated => "authenticated",
            SessionPhase::Warning => "warning",
            SessionPhase::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
