//! Durable session snapshot
//!
//! The session is stored as one versioned JSON envelope in a named slot:
//!
//! ```json
//! { "version": 1, "session": { "accessToken": "...", "issuedAt": "...", ... } }
//! ```
//!
//! Anything that does not decode to a valid session is treated as signed out.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use campus_storage::Slot;

use crate::state::SessionState;
use crate::Result;

pub const STORE_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    session: &'a SessionState,
}

#[derive(Deserialize)]
struct Envelope {
    session: SessionState,
}

/// Outcome of decoding a stored blob
#[derive(Debug)]
enum Decoded {
    Current(SessionState),
    /// Pre-envelope layout, rewritten on load
    Legacy(SessionState),
    Rejected(&'static str),
}

fn decode(raw: &str) -> Decoded {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => return Decoded::Rejected("unparseable"),
    };

    let Some(object) = value.as_object() else {
        return Decoded::Rejected("not an object");
    };

    let decoded = match object.get("version") {
        None => match serde_json::from_value::<SessionState>(value) {
            Ok(state) => Decoded::Legacy(state),
            Err(_) => return Decoded::Rejected("malformed legacy session"),
        },
        Some(version) if version.as_u64() == Some(u64::from(STORE_VERSION)) => {
            match serde_json::from_value::<Envelope>(value) {
                Ok(envelope) => Decoded::Current(envelope.session),
                Err(_) => return Decoded::Rejected("malformed session"),
            }
        }
        Some(_) => return Decoded::Rejected("unknown version"),
    };

    let valid = match &decoded {
        Decoded::Current(state) | Decoded::Legacy(state) => state.is_valid(),
        Decoded::Rejected(_) => true,
    };

    if valid {
        decoded
    } else {
        Decoded::Rejected("invalid session")
    }
}

#[derive(Clone)]
pub struct SessionStore {
    slot: Arc<dyn Slot>,
    key: String,
}

impl SessionStore {
    pub fn new(slot: Arc<dyn Slot>, key: impl Into<String>) -> Self {
        Self {
            slot,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the persisted session.
    ///
    /// Never fails: unreadable storage, corrupt blobs and unknown versions
    /// all yield `None`. Rejected blobs are removed.
    pub fn load(&self) -> Option<SessionState> {
        let raw = match self.slot.read(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Session storage unreadable");
                return None;
            }
        };

        match decode(&raw) {
            Decoded::Current(state) => Some(state),
            Decoded::Legacy(state) => {
                tracing::info!(key = %self.key, "Migrating legacy session blob");
                if let Err(e) = self.save(&state) {
                    tracing::warn!(key = %self.key, error = %e, "Failed to rewrite legacy session");
                }
                Some(state)
            }
            Decoded::Rejected(reason) => {
                tracing::warn!(key = %self.key, reason, "Discarding persisted session");
                if let Err(e) = self.clear() {
                    tracing::warn!(key = %self.key, error = %e, "Failed to discard session blob");
                }
                None
            }
        }
    }

    /// Persist the whole session, replacing whatever was stored
    pub fn save(&self, state: &SessionState) -> Result<()> {
        let raw = serde_json::to_string(&EnvelopeRef {
            version: STORE_VERSION,
            session: state,
        })?;
        self.slot.write(&self.key, &raw)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.slot.remove(&self.key)?;
        Ok(())
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").field("key", &self.key).finish()
    }
}
