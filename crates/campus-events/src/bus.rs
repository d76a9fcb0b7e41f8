//! Event bus
//!
//! Subscribers are stored per channel in subscription order. Publishing
//! iterates a snapshot of the channel's list, so a handler may subscribe or
//! unsubscribe (itself included) while it is being dispatched.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use uuid::Uuid;

use crate::event::SessionEvent;

pub type Handler = Arc<dyn Fn(&SessionEvent) -> anyhow::Result<()> + Send + Sync>;

type Channels = HashMap<String, Vec<(Uuid, Handler)>>;

#[derive(Clone, Default)]
pub struct EventBus {
    channels: Arc<RwLock<Channels>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler on a named channel
    pub fn subscribe<F>(&self, channel: &str, handler: F) -> Subscription
    where
        F: Fn(&SessionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.channels
            .write()
            .entry(channel.to_string())
            .or_default()
            .push((id, Arc::new(handler)));

        tracing::debug!(channel = %channel, subscription_id = %id, "Subscribed");

        Subscription {
            id,
            channel: channel.to_string(),
            channels: Arc::downgrade(&self.channels),
        }
    }

    /// Deliver an event to every subscriber of its channel.
    ///
    /// Returns the number of handlers that completed without error.
    pub fn publish(&self, event: SessionEvent) -> usize {
        let channel = event.channel();
        let handlers: Vec<(Uuid, Handler)> = match self.channels.read().get(channel) {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        for (id, handler) in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::error!(
                        channel = %channel,
                        subscription_id = %id,
                        error = %e,
                        "Subscriber failed"
                    );
                }
                Err(_) => {
                    tracing::error!(
                        channel = %channel,
                        subscription_id = %id,
                        "Subscriber panicked"
                    );
                }
            }
        }

        tracing::trace!(event = %event, delivered, "Published");

        delivered
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.read().get(channel).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let channels = self.channels.read();
        let mut map = f.debug_map();
        for (name, list) in channels.iter() {
            map.entry(name, &list.len());
        }
        map.finish()
    }
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping the handle keeps the subscription alive; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "keep the subscription to be able to unsubscribe"]
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    channel: String,
    channels: Weak<RwLock<Channels>>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn unsubscribe(self) {
        let Some(channels) = self.channels.upgrade() else {
            return;
        };

        let mut channels = channels.write();
        if let Some(list) = channels.get_mut(&self.channel) {
            list.retain(|(id, _)| *id != self.id);
            if list.is_empty() {
                channels.remove(&self.channel);
            }
        }

        tracing::debug!(channel = %self.channel, subscription_id = %self.id, "Unsubscribed");
    }
}
