//! Campus Navigation Guards
//!
//! Route gating for the navigation layer:
//! 1. Protected route, signed out → redirect to sign-in with a return path
//! 2. Guest-only route (sign-in, register), signed in → redirect home
//! 3. After sign-in → resume at the validated return path
//!
//! Guards only read the session snapshot; they never mutate it.

mod error;
mod guard;

pub use error::NavigationError;
pub use guard::{GuardDecision, RouteGuard, SessionView, RETURN_PARAM};

pub type Result<T> = std::result::Result<T, NavigationError>;
