//! Campus Event Bus
//!
//! Named-channel publish/subscribe for session lifecycle notifications:
//! - `session-warning` carries the minutes left before hard expiry
//! - `session-expired` carries nothing
//!
//! Delivery is synchronous and in subscription order. A failing subscriber
//! never blocks delivery to the ones after it.

mod bus;
mod event;

pub use bus::{EventBus, Handler, Subscription};
pub use event::{SessionEvent, SESSION_EXPIRED, SESSION_WARNING};
