//! Session Manager
//!
//! Owns the in-memory session and drives its lifecycle: sign-in, activity
//! extension, expiry warnings, hard expiry and sign-out. Every mutation is
//! written through to the [`SessionStore`] before the state lock is released,
//! so the stored blob always reflects the latest applied change.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

use campus_events::{EventBus, SessionEvent};

use crate::activity::{ActivitySource, ActivityTarget, ActivityTracker};
use crate::clock::Clock;
use crate::phase::SessionPhase;
use crate::policy::SessionPolicy;
use crate::scheduler::{ExpiryScheduler, ExpiryTarget};
use crate::state::{SessionState, SignInResult, UserProfile};
use crate::store::SessionStore;
use crate::transport::{AuthTransport, Credentials};
use crate::Result;

struct Inner {
    /// Canonical session, `Some` iff authenticated
    state: RwLock<Option<SessionState>>,
    phase: RwLock<SessionPhase>,
    store: SessionStore,
    clock: Arc<dyn Clock>,
    events: EventBus,
    policy: SessionPolicy,
    scheduler: ExpiryScheduler,
    tracker: ActivityTracker,
}

impl Inner {
    fn transition(&self, to: SessionPhase) {
        let mut phase = self.phase.write();
        let from = *phase;
        if from == to {
            return;
        }

        if !from.can_transition_to(to) {
            tracing::warn!(from = %from, to = %to, "Unexpected session transition");
        }

        tracing::debug!(from = %from, to = %to, "Session phase changed");
        *phase = to;
    }

    fn sign_in(&self, result: SignInResult) -> Result<SessionState> {
        let now = self.clock.now();
        result.validate(now)?;

        // A new sign-in replaces any current session wholesale
        self.tracker.stop();
        self.scheduler.stop();

        let state = SessionState::from_sign_in(result, now);
        {
            let mut current = self.state.write();
            if let Err(e) = self.store.save(&state) {
                tracing::warn!(error = %e, "Session not persisted, it will not survive reload");
            }
            *current = Some(state.clone());
            self.transition(SessionPhase::Authenticated);
        }

        tracing::info!(
            expires_at = %state.expires_at.to_rfc3339(),
            has_refresh_token = state.refresh_token.is_some(),
            "Signed in"
        );

        self.tracker.start();
        self.scheduler.start();

        Ok(state)
    }

    fn extend_session(&self) -> bool {
        let now = self.clock.now();
        let candidate = now + self.policy.extension_window();

        let expires_at = {
            let mut current = self.state.write();
            let Some(state) = current.as_mut() else {
                return false;
            };

            if !state.extend_to(candidate, now) {
                return false;
            }

            if let Err(e) = self.store.save(state) {
                tracing::warn!(error = %e, "Extended session not persisted");
            }
            state.expires_at
        };

        if self.scheduler.remaining_minutes(expires_at) > self.scheduler.warning_threshold() {
            self.transition(SessionPhase::Authenticated);
        }

        tracing::info!(expires_at = %expires_at.to_rfc3339(), "Session extended");
        true
    }

    /// Stop both timers and drop the session from memory and storage.
    /// Callers hold the state write lock.
    fn teardown(&self, current: &mut Option<SessionState>) -> Option<SessionState> {
        self.tracker.stop();
        self.scheduler.stop();

        let previous = current.take();
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Failed to clear persisted session");
        }
        previous
    }

    fn sign_out(&self) -> Option<SessionState> {
        let previous = {
            let mut current = self.state.write();
            let previous = self.teardown(&mut current);
            self.transition(SessionPhase::Unauthenticated);
            previous
        };

        if previous.is_some() {
            tracing::info!("Signed out");
        }
        previous
    }

    fn warn(&self, minutes_remaining: u64) {
        if self.state.read().is_none() {
            return;
        }

        self.transition(SessionPhase::Warning);
        tracing::info!(minutes_remaining, "Session expiring soon");
        self.events.publish(SessionEvent::Warning { minutes_remaining });
    }

    /// Hard expiry. The deadline is re-checked under the write lock, so a
    /// stale poll can neither expire a signed-out session nor one that was
    /// just extended.
    fn expire(&self) -> bool {
        {
            let mut current = self.state.write();
            match current.as_ref() {
                None => {
                    tracing::debug!("Expiry poll found no session");
                    return false;
                }
                Some(state) if self.scheduler.remaining_minutes(state.expires_at) > 0 => {
                    tracing::debug!(
                        expires_at = %state.expires_at.to_rfc3339(),
                        "Deadline moved before expiry, session kept"
                    );
                    return false;
                }
                Some(_) => {}
            }

            self.teardown(&mut current);
            self.transition(SessionPhase::Expired);
            self.transition(SessionPhase::Unauthenticated);
        }

        tracing::info!("Session expired");
        self.events.publish(SessionEvent::Expired);
        true
    }

    fn restore(&self) -> Option<SessionState> {
        if let Some(current) = self.state.read().clone() {
            return Some(current);
        }

        let state = self.store.load()?;
        if self.scheduler.remaining_minutes(state.expires_at) == 0 {
            tracing::info!(
                expires_at = %state.expires_at.to_rfc3339(),
                "Persisted session already expired, discarding"
            );
            if let Err(e) = self.store.clear() {
                tracing::warn!(error = %e, "Failed to clear expired session");
            }
            return None;
        }

        *self.state.write() = Some(state.clone());
        self.transition(SessionPhase::Authenticated);

        tracing::info!(
            expires_at = %state.expires_at.to_rfc3339(),
            "Restored persisted session"
        );

        self.tracker.start();
        self.scheduler.start();

        Some(state)
    }
}

/// Lets the tracker and scheduler call back without keeping the manager alive
struct Link(Weak<Inner>);

impl ActivityTarget for Link {
    fn is_authenticated(&self) -> bool {
        match self.0.upgrade() {
            Some(inner) => {
                let authenticated = inner.state.read().is_some();
                authenticated
            }
            None => false,
        }
    }

    fn request_extension(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.extend_session();
        }
    }
}

impl ExpiryTarget for Link {
    fn deadline(&self) -> Option<DateTime<Utc>> {
        let inner = self.0.upgrade()?;
        let state = inner.state.read();
        state.as_ref().map(|s| s.expires_at)
    }

    fn warn(&self, minutes_remaining: u64) {
        if let Some(inner) = self.0.upgrade() {
            inner.warn(minutes_remaining);
        }
    }

    fn expire(&self) -> bool {
        match self.0.upgrade() {
            Some(inner) => inner.expire(),
            None => false,
        }
    }
}

/// Explicitly constructed session owner.
///
/// Clones share the same session. The composition root decides the
/// lifetime; call [`SessionManager::shutdown`] before tearing it down.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        store: SessionStore,
        clock: Arc<dyn Clock>,
        events: EventBus,
        activity: Arc<dyn ActivitySource>,
        policy: SessionPolicy,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let link = Arc::new(Link(weak.clone()));

            Inner {
                scheduler: ExpiryScheduler::new(
                    Arc::clone(&clock),
                    policy.poll_interval(),
                    policy.warning_threshold_minutes,
                    link.clone(),
                ),
                tracker: ActivityTracker::new(
                    Arc::clone(&clock),
                    activity,
                    policy.activity_debounce(),
                    link,
                ),
                state: RwLock::new(None),
                phase: RwLock::new(SessionPhase::Unauthenticated),
                store,
                clock,
                events,
                policy,
            }
        });

        Self { inner }
    }

    /// Pick up a session persisted by a previous run
    pub fn restore(&self) -> Option<SessionState> {
        self.inner.restore()
    }

    /// Accept a transport sign-in result.
    ///
    /// A malformed result fails with [`crate::SessionError::InvalidSignIn`]
    /// and leaves the current state untouched.
    pub fn sign_in(&self, result: SignInResult) -> Result<SessionState> {
        self.inner.sign_in(result)
    }

    /// Authenticate through the transport, then sign in with its result
    pub async fn sign_in_with<T: AuthTransport>(
        &self,
        transport: &T,
        credentials: &Credentials,
    ) -> Result<SessionState> {
        let result = transport.authenticate(credentials).await.map_err(|e| {
            tracing::warn!(email = %credentials.email, error = %e, "Sign-in failed");
            e
        })?;

        self.sign_in(result)
    }

    /// Push the deadline forward by the extension window.
    ///
    /// Returns false when signed out or when the current deadline is already
    /// later than the extension would make it.
    pub fn extend_session(&self) -> bool {
        self.inner.extend_session()
    }

    /// End the session on the user's request. Publishes nothing.
    pub fn sign_out(&self) {
        self.inner.sign_out();
    }

    /// Sign out locally, then revoke the old token on a best-effort basis
    pub async fn sign_out_with<T: AuthTransport>(&self, transport: &T) {
        let Some(token) = self.inner.sign_out().and_then(|s| s.access_token) else {
            return;
        };

        if let Err(e) = transport.revoke(&token).await {
            tracing::warn!(error = %e, "Token revocation failed");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.read().is_some()
    }

    /// Whole minutes until hard expiry, zero when signed out
    pub fn get_session_time_remaining(&self) -> u64 {
        let expires_at = self.inner.state.read().as_ref().map(|s| s.expires_at);
        expires_at.map_or(0, |at| self.inner.scheduler.remaining_minutes(at))
    }

    pub fn get_user(&self) -> Option<UserProfile> {
        self.inner
            .state
            .read()
            .as_ref()
            .and_then(|s| s.user.clone())
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .as_ref()
            .and_then(|s| s.access_token.clone())
    }

    pub fn snapshot(&self) -> Option<SessionState> {
        self.inner.state.read().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        *self.inner.phase.read()
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.inner.policy
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Stop timers and listeners, keeping the persisted session for next start
    pub fn shutdown(&self) {
        self.inner.tracker.stop();
        self.inner.scheduler.stop();
        tracing::debug!("Session manager shut down");
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("phase", &self.phase())
            .field("store", &self.inner.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivitySignal, ManualActivitySource};
    use crate::clock::ManualClock;
    use crate::error::SessionError;
    use crate::transport::TransportError;
    use campus_events::{SESSION_EXPIRED, SESSION_WARNING};
    use campus_storage::{MemorySlot, Slot, StorageError};
    use chrono::{Duration, TimeZone};
    use parking_lot::Mutex;
    use std::time::Duration as StdDuration;

    struct Harness {
        t0: DateTime<Utc>,
        clock: ManualClock,
        source: Arc<ManualActivitySource>,
        slot: Arc<MemorySlot>,
        manager: SessionManager,
        received: Arc<Mutex<Vec<SessionEvent>>>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_slot(Arc::new(MemorySlot::new()))
        }

        fn with_slot(slot: Arc<MemorySlot>) -> Self {
            let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
            let clock = ManualClock::new(t0);
            let source = Arc::new(ManualActivitySource::new());
            let events = EventBus::new();

            let received = Arc::new(Mutex::new(Vec::new()));
            for channel in [SESSION_WARNING, SESSION_EXPIRED] {
                let received = Arc::clone(&received);
                let _ = events.subscribe(channel, move |event| {
                    received.lock().push(*event);
                    Ok(())
                });
            }

            let manager = SessionManager::new(
                SessionStore::new(slot.clone(), "session"),
                Arc::new(clock.clone()),
                events,
                source.clone(),
                SessionPolicy::default(),
            );

            Self {
                t0,
                clock,
                source,
                slot,
                manager,
                received,
            }
        }

        fn result(&self, expires_in_secs: i64) -> SignInResult {
            SignInResult {
                token: "access-token".to_string(),
                refresh_token: Some("refresh-token".to_string()),
                user: UserProfile {
                    display_name: "Ada Lovelace".to_string(),
                    email: "ada@example.com".to_string(),
                    role: Some("student".to_string()),
                },
                expires_at: self.clock.now() + Duration::seconds(expires_in_secs),
            }
        }

        fn advance_secs(&self, secs: u64) {
            self.clock.advance(StdDuration::from_secs(secs));
        }

        fn expired_count(&self) -> usize {
            self.received
                .lock()
                .iter()
                .filter(|e| **e == SessionEvent::Expired)
                .count()
        }

        fn persisted(&self) -> Option<String> {
            self.slot.read("session").unwrap()
        }
    }

    #[test]
    fn test_sign_in() {
        let h = Harness::new();
        assert!(!h.manager.is_authenticated());
        assert_eq!(h.manager.phase(), SessionPhase::Unauthenticated);

        let state = h.manager.sign_in(h.result(3600)).unwrap();
        assert_eq!(state.issued_at, h.t0);
        assert_eq!(state.access_token.as_deref(), Some("access-token"));

        assert!(h.manager.is_authenticated());
        assert_eq!(h.manager.phase(), SessionPhase::Authenticated);
        assert_eq!(h.manager.get_session_time_remaining(), 60);
        assert_eq!(
            h.manager.get_user().map(|u| u.display_name),
            Some("Ada Lovelace".to_string())
        );
        assert_eq!(h.manager.access_token().as_deref(), Some("access-token"));
        assert!(h.persisted().is_some());
        assert_eq!(h.source.listener_count(), ActivitySignal::ALL.len());
    }

    #[test]
    fn test_invalid_sign_in_leaves_state_untouched() {
        let h = Harness::new();

        let mut blank = h.result(3600);
        blank.token = String::new();
        assert!(matches!(
            h.manager.sign_in(blank.clone()),
            Err(SessionError::InvalidSignIn(_))
        ));
        assert!(!h.manager.is_authenticated());
        assert!(h.persisted().is_none());

        let original = h.manager.sign_in(h.result(3600)).unwrap();
        let stored = h.persisted();

        assert!(h.manager.sign_in(blank).is_err());
        assert!(h.manager.sign_in(h.result(-5)).is_err());

        assert_eq!(h.manager.snapshot(), Some(original));
        assert_eq!(h.persisted(), stored);
    }

    #[test]
    fn test_sign_in_replaces_session() {
        let h = Harness::new();
        h.manager.sign_in(h.result(3600)).unwrap();

        let mut second = h.result(7200);
        second.token = "second-token".to_string();
        h.manager.sign_in(second).unwrap();

        assert_eq!(h.manager.access_token().as_deref(), Some("second-token"));
        assert_eq!(h.manager.get_session_time_remaining(), 120);
        assert_eq!(h.source.listener_count(), ActivitySignal::ALL.len());
        assert_eq!(h.clock.pending_timers(), 1);
    }

    #[test]
    fn test_extend_is_monotone() {
        let h = Harness::new();
        assert!(!h.manager.extend_session());

        // Deadline two hours out, a one hour extension must not shorten it
        h.manager.sign_in(h.result(7200)).unwrap();
        let mut last = h.manager.snapshot().unwrap().expires_at;
        assert!(!h.manager.extend_session());

        for step in [600, 1800, 3000, 60, 1200, 45] {
            h.advance_secs(step);
            h.manager.extend_session();
            let current = h.manager.snapshot().unwrap().expires_at;
            assert!(current >= last);
            last = current;
        }
    }

    #[test]
    fn test_extension_is_persisted() {
        let h = Harness::new();
        h.manager.sign_in(h.result(600)).unwrap();
        h.advance_secs(120);

        assert!(h.manager.extend_session());
        let state = h.manager.snapshot().unwrap();
        assert_eq!(state.expires_at, h.clock.now() + Duration::hours(1));
        assert_eq!(state.last_extended_at, Some(h.clock.now()));

        let store = SessionStore::new(h.slot.clone(), "session");
        assert_eq!(store.load(), Some(state));
    }

    #[test]
    fn test_remaining_time_never_negative() {
        let h = Harness::new();
        assert_eq!(h.manager.get_session_time_remaining(), 0);

        h.manager.sign_in(h.result(3600)).unwrap();
        h.advance_secs(3570);
        assert!(h.manager.is_authenticated());
        assert_eq!(h.manager.get_session_time_remaining(), 0);

        h.advance_secs(3600);
        assert_eq!(h.manager.get_session_time_remaining(), 0);
    }

    #[test]
    fn test_activity_burst_extends_once() {
        let h = Harness::new();
        h.manager.sign_in(h.result(3600)).unwrap();
        h.advance_secs(600);

        for _ in 0..1_000 {
            h.source.emit(ActivitySignal::PointerMove);
        }
        h.advance_secs(30);

        let state = h.manager.snapshot().unwrap();
        assert_eq!(state.last_extended_at, Some(h.t0 + Duration::seconds(630)));
        assert_eq!(state.expires_at, h.t0 + Duration::seconds(630 + 3600));

        // Nothing else was queued by the burst
        h.advance_secs(30);
        assert_eq!(
            h.manager.snapshot().unwrap().last_extended_at,
            Some(h.t0 + Duration::seconds(630))
        );
    }

    #[test]
    fn test_sign_out() {
        let h = Harness::new();
        h.manager.sign_in(h.result(900)).unwrap();
        h.source.emit(ActivitySignal::KeyDown);
        h.received.lock().clear();

        h.manager.sign_out();

        assert!(!h.manager.is_authenticated());
        assert_eq!(h.manager.phase(), SessionPhase::Unauthenticated);
        assert!(h.persisted().is_none());
        assert_eq!(h.clock.pending_timers(), 0);
        assert_eq!(h.source.listener_count(), 0);

        h.advance_secs(3600);
        assert!(h.received.lock().is_empty());

        // Signing out twice is harmless
        h.manager.sign_out();
        assert_eq!(h.expired_count(), 0);
    }

    #[test]
    fn test_stale_expiry_after_sign_out_is_silent() {
        let h = Harness::new();
        h.manager.sign_in(h.result(3600)).unwrap();
        h.manager.sign_out();
        h.received.lock().clear();

        // A poll that read the deadline just before the sign-out
        assert!(!h.manager.inner.expire());

        assert!(h.received.lock().is_empty());
        assert_eq!(h.manager.phase(), SessionPhase::Unauthenticated);
    }

    #[test]
    fn test_stale_expiry_keeps_extended_session() {
        let h = Harness::new();
        h.manager.sign_in(h.result(600)).unwrap();
        h.advance_secs(590);
        assert!(h.manager.extend_session());
        h.received.lock().clear();

        // A poll that saw zero minutes left before the extension landed
        assert!(!h.manager.inner.expire());

        assert!(h.manager.is_authenticated());
        assert_eq!(h.manager.phase(), SessionPhase::Authenticated);
        assert_eq!(h.manager.get_session_time_remaining(), 60);
        assert!(h.persisted().is_some());
        assert_eq!(h.expired_count(), 0);
        assert_eq!(h.source.listener_count(), ActivitySignal::ALL.len());
    }

    #[test]
    fn test_natural_expiry_publishes_once() {
        let h = Harness::new();
        h.manager.sign_in(h.result(1800)).unwrap();

        h.advance_secs(1800);
        assert!(!h.manager.is_authenticated());
        assert_eq!(h.manager.phase(), SessionPhase::Unauthenticated);
        assert_eq!(h.expired_count(), 1);
        assert!(h.persisted().is_none());
        assert_eq!(h.source.listener_count(), 0);

        h.advance_secs(3600);
        assert_eq!(h.expired_count(), 1);
        assert_eq!(h.clock.pending_timers(), 0);
    }

    #[test]
    fn test_extension_moves_deadline_past_original() {
        let h = Harness::new();
        h.manager.sign_in(h.result(3600)).unwrap();

        h.advance_secs(3550);
        assert!(h.manager.extend_session());
        assert_eq!(
            h.manager.snapshot().unwrap().expires_at,
            h.t0 + Duration::seconds(3550 + 3600)
        );

        h.advance_secs(50);
        assert!(h.manager.is_authenticated());
        assert_eq!(h.expired_count(), 0);

        h.advance_secs(60);
        assert!(h.manager.is_authenticated());
    }

    #[test]
    fn test_warning_then_expiry() {
        let h = Harness::new();
        h.manager.sign_in(h.result(900)).unwrap();

        assert_eq!(
            h.received.lock().first().copied(),
            Some(SessionEvent::Warning {
                minutes_remaining: 15
            })
        );
        assert_eq!(h.manager.phase(), SessionPhase::Warning);
        assert!(h.manager.is_authenticated());

        h.advance_secs(840);
        assert_eq!(
            h.received.lock().last().copied(),
            Some(SessionEvent::Warning {
                minutes_remaining: 1
            })
        );

        h.advance_secs(60);
        assert_eq!(h.received.lock().last().copied(), Some(SessionEvent::Expired));
        assert_eq!(h.expired_count(), 1);
        assert!(!h.manager.is_authenticated());
    }

    #[test]
    fn test_warning_values_never_increase_without_extension() {
        let h = Harness::new();
        h.manager.sign_in(h.result(1200)).unwrap();
        h.advance_secs(1200);

        let minutes: Vec<u64> = h
            .received
            .lock()
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Warning { minutes_remaining } => Some(*minutes_remaining),
                SessionEvent::Expired => None,
            })
            .collect();

        assert_eq!(minutes.first(), Some(&15));
        assert!(minutes.windows(2).all(|w| w[1] <= w[0]));
        assert!(minutes.iter().all(|m| (1..=15).contains(m)));
    }

    #[test]
    fn test_extension_leaves_warning() {
        let h = Harness::new();
        h.manager.sign_in(h.result(600)).unwrap();
        assert_eq!(h.manager.phase(), SessionPhase::Warning);

        assert!(h.manager.extend_session());
        assert_eq!(h.manager.phase(), SessionPhase::Authenticated);

        h.received.lock().clear();
        h.advance_secs(600);
        assert!(h.received.lock().is_empty());
    }

    #[test]
    fn test_restore() {
        let slot = Arc::new(MemorySlot::new());
        let first = Harness::with_slot(slot.clone());
        let state = first.manager.sign_in(first.result(3600)).unwrap();
        first.manager.shutdown();
        assert!(first.persisted().is_some());

        let second = Harness::with_slot(slot);
        assert_eq!(second.manager.restore(), Some(state.clone()));
        assert!(second.manager.is_authenticated());
        assert_eq!(second.manager.get_user(), state.user);
        assert_eq!(second.source.listener_count(), ActivitySignal::ALL.len());

        second.advance_secs(3600);
        assert!(!second.manager.is_authenticated());
        assert_eq!(second.expired_count(), 1);
    }

    #[test]
    fn test_restore_discards_expired_session() {
        let slot = Arc::new(MemorySlot::new());
        let first = Harness::with_slot(slot.clone());
        let mut result = first.result(3600);
        result.expires_at = first.t0 - Duration::seconds(1);
        let stale = SessionState {
            issued_at: first.t0 - Duration::hours(2),
            ..SessionState::from_sign_in(result, first.t0)
        };
        SessionStore::new(slot.clone(), "session").save(&stale).unwrap();

        let second = Harness::with_slot(slot);
        assert_eq!(second.manager.restore(), None);
        assert!(!second.manager.is_authenticated());
        assert!(second.persisted().is_none());
        assert_eq!(second.expired_count(), 0);
    }

    #[test]
    fn test_restore_with_corrupt_blob() {
        let h = Harness::new();
        h.slot.write("session", "{\"version\":1,\"sess").unwrap();

        assert_eq!(h.manager.restore(), None);
        assert!(!h.manager.is_authenticated());
    }

    /// Slot that accepts nothing
    struct FullSlot;

    impl Slot for FullSlot {
        fn read(&self, _key: &str) -> campus_storage::Result<Option<String>> {
            Ok(None)
        }

        fn write(&self, _key: &str, _value: &str) -> campus_storage::Result<()> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }

        fn remove(&self, _key: &str) -> campus_storage::Result<()> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }
    }

    #[test]
    fn test_storage_failure_keeps_memory_session() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let clock = ManualClock::new(t0);
        let manager = SessionManager::new(
            SessionStore::new(Arc::new(FullSlot), "session"),
            Arc::new(clock.clone()),
            EventBus::new(),
            Arc::new(ManualActivitySource::new()),
            SessionPolicy::default(),
        );

        let result = SignInResult {
            token: "tok".to_string(),
            refresh_token: None,
            user: UserProfile {
                display_name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                role: None,
            },
            expires_at: t0 + Duration::hours(1),
        };
        manager.sign_in(result).unwrap();
        assert!(manager.is_authenticated());

        clock.advance(StdDuration::from_secs(600));
        assert!(manager.extend_session());

        manager.sign_out();
        assert!(!manager.is_authenticated());
    }

    #[test]
    fn test_subscriber_may_sign_out_during_warning() {
        let h = Harness::new();
        let manager = h.manager.clone();
        let _ = h.manager.events().subscribe(SESSION_WARNING, move |_| {
            manager.sign_out();
            Ok(())
        });

        h.manager.sign_in(h.result(3600)).unwrap();
        assert!(h.manager.is_authenticated());

        h.advance_secs(45 * 60);
        assert!(!h.manager.is_authenticated());
        assert_eq!(h.clock.pending_timers(), 0);

        h.advance_secs(3600);
        assert_eq!(h.expired_count(), 0);
    }

    struct FakeTransport {
        outcome: std::result::Result<SignInResult, TransportError>,
        revoked: Mutex<Vec<String>>,
    }

    impl AuthTransport for FakeTransport {
        fn authenticate(
            &self,
            _credentials: &Credentials,
        ) -> impl std::future::Future<Output = std::result::Result<SignInResult, TransportError>> + Send
        {
            std::future::ready(self.outcome.clone())
        }

        fn revoke(
            &self,
            access_token: &str,
        ) -> impl std::future::Future<Output = std::result::Result<(), TransportError>> + Send
        {
            self.revoked.lock().push(access_token.to_string());
            std::future::ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_sign_in_and_out_through_transport() {
        let h = Harness::new();
        let transport = FakeTransport {
            outcome: Ok(h.result(3600)),
            revoked: Mutex::new(Vec::new()),
        };
        let credentials = Credentials::new("ada@example.com", "hunter2");

        h.manager
            .sign_in_with(&transport, &credentials)
            .await
            .unwrap();
        assert!(h.manager.is_authenticated());

        h.manager.sign_out_with(&transport).await;
        assert!(!h.manager.is_authenticated());
        assert_eq!(*transport.revoked.lock(), vec!["access-token".to_string()]);

        // Nothing to revoke the second time
        h.manager.sign_out_with(&transport).await;
        assert_eq!(transport.revoked.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_previous_session() {
        let h = Harness::new();
        let previous = h.manager.sign_in(h.result(3600)).unwrap();

        let transport = FakeTransport {
            outcome: Err(TransportError::Rejected("bad password".to_string())),
            revoked: Mutex::new(Vec::new()),
        };
        let err = h
            .manager
            .sign_in_with(&transport, &Credentials::new("ada@example.com", "wrong"))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Transport(TransportError::Rejected(_))));
        assert_eq!(h.manager.snapshot(), Some(previous));
    }
}
