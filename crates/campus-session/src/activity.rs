//! User activity tracking
//!
//! Turns a high-frequency stream of interaction signals into at most one
//! extension request per debounce window. The first signal arms a timer,
//! later signals are absorbed while it is pending, and when it fires the
//! tracker asks for one extension and re-arms on the next signal.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::clock::{Clock, TimerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivitySignal {
    PointerDown,
    PointerMove,
    KeyDown,
    Scroll,
    TouchStart,
    Click,
}

impl ActivitySignal {
    pub const ALL: [ActivitySignal; 6] = [
        ActivitySignal::PointerDown,
        ActivitySignal::PointerMove,
        ActivitySignal::KeyDown,
        ActivitySignal::Scroll,
        ActivitySignal::TouchStart,
        ActivitySignal::Click,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivitySignal::PointerDown => "pointerdown",
            ActivitySignal::PointerMove => "pointermove",
            ActivitySignal::KeyDown => "keydown",
            ActivitySignal::Scroll => "scroll",
            ActivitySignal::TouchStart => "touchstart",
            ActivitySignal::Click => "click",
        }
    }
}

impl std::fmt::Display for ActivitySignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub type SignalHandler = Arc<dyn Fn(ActivitySignal) + Send + Sync>;

/// Deregisters a listener added through [`ActivitySource::subscribe`]
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

/// Where interaction signals come from. Supplied by the embedding UI.
pub trait ActivitySource: Send + Sync {
    fn subscribe(&self, signal: ActivitySignal, handler: SignalHandler) -> Unsubscribe;
}

type Listeners = Vec<(u64, ActivitySignal, SignalHandler)>;

/// In-process signal emitter
#[derive(Default)]
pub struct ManualActivitySource {
    listeners: Arc<RwLock<Listeners>>,
    next_id: AtomicU64,
}

impl ManualActivitySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a signal to every listener registered for it
    pub fn emit(&self, signal: ActivitySignal) {
        let handlers: Vec<SignalHandler> = self
            .listeners
            .read()
            .iter()
            .filter(|(_, kind, _)| *kind == signal)
            .map(|(_, _, handler)| Arc::clone(handler))
            .collect();

        for handler in handlers {
            handler(signal);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl ActivitySource for ManualActivitySource {
    fn subscribe(&self, signal: ActivitySignal, handler: SignalHandler) -> Unsubscribe {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().push((id, signal, handler));

        let listeners = Arc::downgrade(&self.listeners);
        Box::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.write().retain(|(other, _, _)| *other != id);
            }
        })
    }
}

/// What the tracker drives when activity settles
pub trait ActivityTarget: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn request_extension(&self);
}

struct Armed {
    id: u64,
    timer: TimerHandle,
}

struct TrackerShared {
    clock: Arc<dyn Clock>,
    source: Arc<dyn ActivitySource>,
    debounce: Duration,
    target: Arc<dyn ActivityTarget>,
    armed: Mutex<Option<Armed>>,
    next_arm: AtomicU64,
    listeners: Mutex<Vec<Unsubscribe>>,
}

impl TrackerShared {
    fn on_signal(self: &Arc<Self>, signal: ActivitySignal) {
        let mut armed = self.armed.lock();
        if armed.is_some() {
            return;
        }

        let id = self.next_arm.fetch_add(1, Ordering::Relaxed);
        let weak = Arc::downgrade(self);
        // Held across scheduling so a zero-delay timer cannot fire before
        // its handle is recorded
        let timer = self.clock.after(
            self.debounce,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_settled(id);
                }
            }),
        );
        *armed = Some(Armed { id, timer });

        tracing::trace!(signal = %signal, "Activity window opened");
    }

    fn on_settled(&self, id: u64) {
        {
            let mut armed = self.armed.lock();
            if armed.as_ref().map(|current| current.id) != Some(id) {
                return;
            }
            *armed = None;
        }

        if !self.target.is_authenticated() {
            tracing::debug!("Activity settled without a session, not extending");
            return;
        }

        self.target.request_extension();
    }
}

pub struct ActivityTracker {
    shared: Arc<TrackerShared>,
}

impl ActivityTracker {
    pub fn new(
        clock: Arc<dyn Clock>,
        source: Arc<dyn ActivitySource>,
        debounce: Duration,
        target: Arc<dyn ActivityTarget>,
    ) -> Self {
        Self {
            shared: Arc::new(TrackerShared {
                clock,
                source,
                debounce,
                target,
                armed: Mutex::new(None),
                next_arm: AtomicU64::new(0),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a listener for every signal kind. No-op while running.
    pub fn start(&self) {
        let mut listeners = self.shared.listeners.lock();
        if !listeners.is_empty() {
            return;
        }

        let weak: Weak<TrackerShared> = Arc::downgrade(&self.shared);
        let handler: SignalHandler = Arc::new(move |signal: ActivitySignal| {
            if let Some(shared) = weak.upgrade() {
                shared.on_signal(signal);
            }
        });

        for signal in ActivitySignal::ALL {
            listeners.push(self.shared.source.subscribe(signal, Arc::clone(&handler)));
        }

        tracing::debug!(
            debounce_secs = self.shared.debounce.as_secs(),
            "Activity tracking started"
        );
    }

    /// Cancel the pending window and deregister every listener
    pub fn stop(&self) {
        let listeners: Vec<Unsubscribe> = self.shared.listeners.lock().drain(..).collect();
        let was_running = !listeners.is_empty();
        for unsubscribe in listeners {
            unsubscribe();
        }

        if let Some(armed) = self.shared.armed.lock().take() {
            armed.timer.cancel();
        }

        if was_running {
            tracing::debug!("Activity tracking stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.shared.listeners.lock().is_empty()
    }

    /// Whether an extension request is waiting on the debounce timer
    pub fn has_pending(&self) -> bool {
        self.shared.armed.lock().is_some()
    }
}

impl Drop for ActivityTracker {
    fn drop(&mut self) {
        self.stop();
    }
}
