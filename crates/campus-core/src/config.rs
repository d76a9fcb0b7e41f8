//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use campus_session::SessionPolicy;

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Session timing and persistence
    #[serde(default)]
    pub session: SessionPolicy,
    /// Where signed-out users are sent from protected routes
    #[serde(default = "default_sign_in_path")]
    pub sign_in_path: String,
    /// Where signed-in users are sent from guest-only routes
    #[serde(default = "default_home_path")]
    pub home_path: String,
}

fn default_sign_in_path() -> String {
    "/login".to_string()
}

fn default_home_path() -> String {
    "/".to_string()
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("campus.db"),
            session: SessionPolicy::default(),
            sign_in_path: default_sign_in_path(),
            home_path: default_home_path(),
        }
    }

    /// Read a JSON config file, falling back to defaults when it is missing
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))?;

        tracing::info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Campus"))
            .unwrap_or_else(|| PathBuf::from(".campus"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}
