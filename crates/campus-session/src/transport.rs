//! Sign-in transport seam
//!
//! The network protocol for acquiring and revoking tokens lives outside this
//! crate. The manager only needs these two calls.

use std::future::Future;
use thiserror::Error;

use crate::state::SignInResult;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Credentials rejected: {0}")]
    Rejected(String),

    #[error("Network failure: {0}")]
    Network(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub trait AuthTransport: Send + Sync {
    fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<SignInResult, TransportError>> + Send;

    /// Invalidate an access token server-side
    fn revoke(&self, access_token: &str) -> impl Future<Output = Result<(), TransportError>> + Send;
}
