//! Time source and cancelable timers
//!
//! Every timer-driven component reads time and schedules work through
//! [`Clock`] only. [`TokioClock`] runs on a tokio runtime, [`ManualClock`]
//! moves only when told to.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

pub type TimerCallback = Box<dyn FnOnce() + Send>;
pub type RepeatingCallback = Box<dyn FnMut() + Send>;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Run `callback` once after `delay`
    fn after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Run `callback` every `interval`, first after one full interval
    fn every(&self, interval: Duration, callback: RepeatingCallback) -> TimerHandle;
}

/// Cancels a scheduled timer.
///
/// Cancelling is idempotent and may happen from inside the timer's own
/// callback. Dropping the handle without cancelling leaves the timer armed.
#[must_use = "dropping a TimerHandle leaves the timer armed"]
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

fn to_delta(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100))
}

/// Longest repeat period a tokio timer is armed with, roughly 30 years
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Wall-clock time with timers spawned on a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioClock {
    runtime: tokio::runtime::Handle,
}

impl TokioClock {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self { runtime }
    }

    /// Clock bound to the runtime of the calling context, if any
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });

        TimerHandle::new(move || task.abort())
    }

    fn every(&self, interval: Duration, mut callback: RepeatingCallback) -> TimerHandle {
        let period = interval.clamp(Duration::from_millis(1), FAR_FUTURE);
        let task = self.runtime.spawn(async move {
            let now = tokio::time::Instant::now();
            let start = now
                .checked_add(period)
                .unwrap_or_else(|| now + FAR_FUTURE);
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                callback();
            }
        });

        TimerHandle::new(move || task.abort())
    }
}

enum Pending {
    Once(TimerCallback),
    Repeat {
        callback: RepeatingCallback,
        every: chrono::Duration,
    },
}

struct ManualTimer {
    due: DateTime<Utc>,
    pending: Pending,
}

struct ManualState {
    now: DateTime<Utc>,
    next_id: u64,
    timers: BTreeMap<u64, ManualTimer>,
    /// Timer whose callback is executing right now
    running: Option<u64>,
    /// Repeating timers cancelled from inside their own callback
    cancelled: HashSet<u64>,
}

/// Simulated clock for deterministic tests and replays.
///
/// Time only moves through [`ManualClock::advance`], which fires every timer
/// falling due on the way in deadline order. Callbacks run on the caller's
/// thread with no internal lock held.
#[derive(Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now: start,
                next_id: 0,
                timers: BTreeMap::new(),
                running: None,
                cancelled: HashSet::new(),
            })),
        }
    }

    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().now + to_delta(by);

        loop {
            let next = {
                let mut state = self.state.lock();
                let due_id = state
                    .timers
                    .iter()
                    .filter(|(_, timer)| timer.due <= target)
                    .min_by_key(|(id, timer)| (timer.due, **id))
                    .map(|(id, _)| *id);

                match due_id.and_then(|id| state.timers.remove(&id).map(|t| (id, t))) {
                    Some((id, timer)) => {
                        state.now = timer.due;
                        state.running = Some(id);
                        Some((id, timer))
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };

            let Some((id, timer)) = next else {
                break;
            };

            match timer.pending {
                Pending::Once(callback) => {
                    callback();

                    let mut state = self.state.lock();
                    state.running = None;
                    state.cancelled.remove(&id);
                }
                Pending::Repeat {
                    mut callback,
                    every,
                } => {
                    callback();

                    let mut state = self.state.lock();
                    state.running = None;
                    if !state.cancelled.remove(&id) {
                        state.timers.insert(
                            id,
                            ManualTimer {
                                due: timer.due + every,
                                pending: Pending::Repeat { callback, every },
                            },
                        );
                    }
                }
            }
        }
    }

    /// Number of armed timers
    pub fn pending_timers(&self) -> usize {
        self.state.lock().timers.len()
    }

    fn schedule(&self, delay: Duration, pending: Pending) -> TimerHandle {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            let due = state.now + to_delta(delay);
            state.timers.insert(id, ManualTimer { due, pending });
            id
        };

        let state: Weak<Mutex<ManualState>> = Arc::downgrade(&self.state);
        TimerHandle::new(move || {
            let Some(state) = state.upgrade() else {
                return;
            };
            let mut state = state.lock();
            if state.timers.remove(&id).is_none() && state.running == Some(id) {
                state.cancelled.insert(id);
            }
        })
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.state.lock().now
    }

    fn after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        self.schedule(delay, Pending::Once(callback))
    }

    fn every(&self, interval: Duration, callback: RepeatingCallback) -> TimerHandle {
        let every = to_delta(interval.max(Duration::from_millis(1)));
        self.schedule(interval, Pending::Repeat { callback, every })
    }
}

impl std::fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualClock")
            .field("now", &state.now)
            .field("pending_timers", &state.timers.len())
            .finish()
    }
}
