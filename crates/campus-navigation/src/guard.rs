//! Route guard

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use campus_session::SessionManager;

use crate::error::NavigationError;
use crate::Result;

/// Query parameter carrying the path to resume after sign-in
pub const RETURN_PARAM: &str = "returnUrl";

/// Read-only view of whether someone is signed in
pub trait SessionView {
    fn is_authenticated(&self) -> bool;
}

impl SessionView for SessionManager {
    fn is_authenticated(&self) -> bool {
        SessionManager::is_authenticated(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "to", rename_all = "lowercase")]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

/// Same-origin absolute path: `/x`, never `//host` or `/\host`
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    sign_in_path: String,
    home_path: String,
}

impl RouteGuard {
    pub fn new(sign_in_path: impl Into<String>, home_path: impl Into<String>) -> Result<Self> {
        let sign_in_path = sign_in_path.into();
        let home_path = home_path.into();

        for path in [&sign_in_path, &home_path] {
            if !is_local_path(path) {
                return Err(NavigationError::InvalidPath(path.clone()));
            }
        }

        Ok(Self {
            sign_in_path,
            home_path,
        })
    }

    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }

    pub fn home_path(&self) -> &str {
        &self.home_path
    }

    /// Admit signed-in users, send everyone else to sign in and back
    pub fn require_authenticated<S: SessionView + ?Sized>(
        &self,
        session: &S,
        current_path: &str,
    ) -> GuardDecision {
        if session.is_authenticated() {
            return GuardDecision::Allow;
        }

        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair(RETURN_PARAM, current_path)
            .finish();
        let target = format!("{}?{}", self.sign_in_path, query);

        tracing::debug!(path = %current_path, redirect = %target, "Protected route requires sign-in");
        GuardDecision::Redirect(target)
    }

    /// Admit guests only, send signed-in users home
    pub fn require_guest_only<S: SessionView + ?Sized>(&self, session: &S) -> GuardDecision {
        if session.is_authenticated() {
            tracing::debug!(redirect = %self.home_path, "Guest-only route while signed in");
            GuardDecision::Redirect(self.home_path.clone())
        } else {
            GuardDecision::Allow
        }
    }

    /// Whether `path` points at the sign-in page itself, ignoring query,
    /// fragment and a trailing slash
    fn is_sign_in(&self, path: &str) -> bool {
        let end = path.find(['?', '#']).unwrap_or(path.len());
        path[..end].trim_end_matches('/') == self.sign_in_path.trim_end_matches('/')
    }

    /// Where to go after a successful sign-in, given the sign-in page's
    /// query string. Anything but a local path falls back to home.
    pub fn return_target(&self, query: &str) -> String {
        let query = query.strip_prefix('?').unwrap_or(query);

        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == RETURN_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|path| is_local_path(path) && !self.is_sign_in(path))
            .unwrap_or_else(|| self.home_path.clone())
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self {
            sign_in_path: "/login".to_string(),
            home_path: "/".to_string(),
        }
    }
}
