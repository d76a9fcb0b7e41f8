//! Session timing policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_STORAGE_KEY: &str = "campus.session";

const MAX_EXTENSION_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;
const MAX_POLL_INTERVAL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionPolicy {
    /// How far past "now" an extension moves the deadline
    pub extension_window_secs: u64,
    /// Remaining minutes at or below which warnings are published
    pub warning_threshold_minutes: u64,
    /// Expiry poll period
    pub poll_interval_secs: u64,
    /// Quiet period between the first activity signal and the extension
    pub activity_debounce_secs: u64,
    /// Persistence slot holding the serialized session
    pub storage_key: String,
}

impl SessionPolicy {
    pub fn extension_window(&self) -> chrono::Duration {
        let secs = self.extension_window_secs.min(MAX_EXTENSION_WINDOW_SECS);
        chrono::Duration::seconds(secs as i64)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.clamp(1, MAX_POLL_INTERVAL_SECS))
    }

    pub fn activity_debounce(&self) -> Duration {
        Duration::from_secs(self.activity_debounce_secs)
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            extension_window_secs: 60 * 60,
            warning_threshold_minutes: 15,
            poll_interval_secs: 60,
            activity_debounce_secs: 30,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override() {
        let policy: SessionPolicy =
            serde_json::from_str(r#"{ "warningThresholdMinutes": 5 }"#).unwrap();

        assert_eq!(policy.warning_threshold_minutes, 5);
        assert_eq!(policy.poll_interval_secs, 60);
        assert_eq!(policy.storage_key, DEFAULT_STORAGE_KEY);
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let policy = SessionPolicy {
            poll_interval_secs: 0,
            ..SessionPolicy::default()
        };
        assert_eq!(policy.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_huge_poll_interval_is_clamped() {
        let policy: SessionPolicy =
            serde_json::from_str(&format!(r#"{{ "pollIntervalSecs": {} }}"#, u64::MAX)).unwrap();

        assert_eq!(policy.poll_interval(), Duration::from_secs(MAX_POLL_INTERVAL_SECS));
        assert!(policy.poll_interval() >= Duration::from_secs(60));
    }
}
