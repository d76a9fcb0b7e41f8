//! Session lifecycle events

use serde::{Deserialize, Serialize};

pub const SESSION_WARNING: &str = "session-warning";
pub const SESSION_EXPIRED: &str = "session-expired";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Expiry is imminent, the session is still usable
    #[serde(rename = "session-warning", rename_all = "camelCase")]
    Warning { minutes_remaining: u64 },
    /// The session reached its deadline and was signed out
    #[serde(rename = "session-expired")]
    Expired,
}

impl SessionEvent {
    pub fn channel(&self) -> &'static str {
        match self {
            SessionEvent::Warning { .. } => SESSION_WARNING,
            SessionEvent::Expired => SESSION_EXPIRED,
        }
    }
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::Warning { minutes_remaining } => {
                write!(f, "{} ({} min)", self.channel(), minutes_remaining)
            }
            SessionEvent::Expired => write!(f, "{}", self.channel()),
        }
    }
}
