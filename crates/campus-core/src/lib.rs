//! Campus Core
//!
//! Composition root for the portal client's session core.
//! One [`Portal`] per client instance owns the session manager; UI code gets
//! references to it instead of reaching for a global.

mod config;
mod error;
mod portal;

pub use config::Config;
pub use error::CoreError;
pub use portal::{Portal, SESSION_POLICY_SETTING};

// Re-export core components
pub use campus_events::{EventBus, SessionEvent, Subscription, SESSION_EXPIRED, SESSION_WARNING};
pub use campus_navigation::{GuardDecision, NavigationError, RouteGuard, SessionView};
pub use campus_session::{
    ActivitySignal, ActivitySource, AuthTransport, Clock, Credentials, ManualActivitySource,
    ManualClock, SessionError, SessionManager, SessionPhase, SessionPolicy, SessionState,
    SignInResult, TokioClock, TransportError, UserProfile,
};
pub use campus_storage::{Database, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
