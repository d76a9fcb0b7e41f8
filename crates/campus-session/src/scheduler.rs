//! Expiry scheduling
//!
//! The scheduler polls live session state on a fixed interval instead of
//! arming a one-shot timer at the deadline, since extensions keep moving the
//! deadline forward. Each tick re-reads the deadline.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::clock::{Clock, TimerHandle};

/// Whole minutes left before `expires_at`, never negative
pub fn remaining_minutes(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let seconds = (expires_at - now).num_seconds();
    if seconds <= 0 {
        0
    } else {
        (seconds / 60) as u64
    }
}

/// What the scheduler watches and drives
pub trait ExpiryTarget: Send + Sync {
    /// Current deadline, `None` once the session is gone
    fn deadline(&self) -> Option<DateTime<Utc>>;

    fn warn(&self, minutes_remaining: u64);

    /// Expire the session. Returns false when there was nothing to expire,
    /// either because it is already gone or because its deadline moved.
    fn expire(&self) -> bool;
}

struct SchedulerShared {
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    warning_threshold: u64,
    target: Arc<dyn ExpiryTarget>,
    ticker: Mutex<Option<TimerHandle>>,
    /// Bumped on every start and stop; ticks from older runs are ignored
    epoch: AtomicU64,
}

impl SchedulerShared {
    fn tick(&self, epoch: u64) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }

        let remaining = self
            .target
            .deadline()
            .map(|deadline| remaining_minutes(deadline, self.clock.now()));

        match remaining {
            None => {
                tracing::debug!("Session gone, expiry polling stopped");
                self.halt_from(epoch);
            }
            Some(0) => {
                tracing::debug!("Expiry poll reached the deadline");
                if self.target.expire() {
                    self.halt_from(epoch);
                }
            }
            Some(minutes) if minutes <= self.warning_threshold => {
                self.target.warn(minutes);
            }
            Some(_) => {}
        }
    }

    /// Halt only if no start or stop happened since `epoch`
    fn halt_from(&self, epoch: u64) {
        let mut ticker = self.ticker.lock();
        if self
            .epoch
            .compare_exchange(epoch, epoch + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let stale = ticker.take();
        drop(ticker);
        if let Some(stale) = stale {
            stale.cancel();
        }
    }

    fn halt(&self) -> bool {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        match self.ticker.lock().take() {
            Some(ticker) => {
                ticker.cancel();
                true
            }
            None => false,
        }
    }
}

pub struct ExpiryScheduler {
    shared: Arc<SchedulerShared>,
}

impl ExpiryScheduler {
    pub fn new(
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
        warning_threshold: u64,
        target: Arc<dyn ExpiryTarget>,
    ) -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                clock,
                poll_interval,
                warning_threshold,
                target,
                ticker: Mutex::new(None),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Check immediately, then keep polling until stopped or expired.
    /// Restarts cleanly if already running.
    pub fn start(&self) {
        self.shared.halt();
        let epoch = self.shared.epoch.load(Ordering::SeqCst);

        self.shared.tick(epoch);
        if self.shared.epoch.load(Ordering::SeqCst) != epoch {
            // Expired or signed out on the first check
            return;
        }

        let weak: Weak<SchedulerShared> = Arc::downgrade(&self.shared);
        let ticker = self.shared.clock.every(
            self.shared.poll_interval,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.tick(epoch);
                }
            }),
        );

        let mut slot = self.shared.ticker.lock();
        if self.shared.epoch.load(Ordering::SeqCst) == epoch {
            *slot = Some(ticker);
        } else {
            drop(slot);
            ticker.cancel();
        }
    }

    pub fn stop(&self) {
        if self.shared.halt() {
            tracing::debug!("Expiry polling stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.ticker.lock().is_some()
    }

    /// Remaining whole minutes for a deadline, measured on this scheduler's clock
    pub fn remaining_minutes(&self, expires_at: DateTime<Utc>) -> u64 {
        remaining_minutes(expires_at, self.shared.clock.now())
    }

    pub fn warning_threshold(&self) -> u64 {
        self.shared.warning_threshold
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        self.shared.halt();
    }
}
