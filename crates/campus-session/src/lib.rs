//! Campus Session Management
//!
//! Sign-in session lifecycle for the portal client:
//! - A signed-in session is persisted and restored across restarts
//! - User activity extends the deadline, rate-limited by a debounce window
//! - Expiry is polled; warnings and hard expiry are broadcast on the event bus
//! - Sign-out is user initiated and publishes nothing
//!
//! All timers go through [`Clock`] so the whole lifecycle can be driven by a
//! [`ManualClock`] in tests.

mod activity;
mod clock;
mod error;
mod manager;
mod phase;
mod policy;
mod scheduler;
mod state;
mod store;
mod transport;

pub use activity::{
    ActivitySignal, ActivitySource, ActivityTarget, ActivityTracker, ManualActivitySource,
    SignalHandler, Unsubscribe,
};
pub use clock::{Clock, ManualClock, RepeatingCallback, TimerCallback, TimerHandle, TokioClock};
pub use error::SessionError;
pub use manager::SessionManager;
pub use phase::SessionPhase;
pub use policy::{SessionPolicy, DEFAULT_STORAGE_KEY};
pub use scheduler::{remaining_minutes, ExpiryScheduler, ExpiryTarget};
pub use state::{SessionState, SignInResult, UserProfile};
pub use store::{SessionStore, STORE_VERSION};
pub use transport::{AuthTransport, Credentials, TransportError};

pub type Result<T> = std::result::Result<T, SessionError>;
