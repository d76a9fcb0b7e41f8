//! Portal composition root
//!
//! Builds the session core once per client instance and hands out references.
//! Nothing here is global; the embedding application owns the `Portal` and
//! decides when it starts and shuts down.

use std::sync::Arc;

use campus_events::EventBus;
use campus_navigation::{GuardDecision, RouteGuard};
use campus_session::{
    ActivitySource, Clock, SessionManager, SessionPolicy, SessionState, SessionStore,
};
use campus_storage::Database;

use crate::config::Config;
use crate::Result;

/// Settings key holding a JSON [`SessionPolicy`] override
pub const SESSION_POLICY_SETTING: &str = "session_policy";

pub struct Portal {
    /// Effective configuration, persisted overrides applied
    config: Config,
    db: Database,
    events: EventBus,
    session_manager: SessionManager,
    guard: RouteGuard,
}

impl Portal {
    /// Open the database at `config.database_path` and build the core
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock>,
        activity: Arc<dyn ActivitySource>,
    ) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&config.database_path)?;
        Self::with_database(config, db, clock, activity)
    }

    pub fn with_database(
        mut config: Config,
        db: Database,
        clock: Arc<dyn Clock>,
        activity: Arc<dyn ActivitySource>,
    ) -> Result<Self> {
        if let Some(policy) = db.get_setting_json::<SessionPolicy>(SESSION_POLICY_SETTING)? {
            tracing::info!(?policy, "Applying persisted session policy");
            config.session = policy;
        }

        let guard = RouteGuard::new(config.sign_in_path.clone(), config.home_path.clone())?;
        let events = EventBus::new();
        let store = SessionStore::new(Arc::new(db.clone()), config.session.storage_key.clone());
        let session_manager = SessionManager::new(
            store,
            clock,
            events.clone(),
            activity,
            config.session.clone(),
        );

        Ok(Self {
            config,
            db,
            events,
            session_manager,
            guard,
        })
    }

    /// Restore the session persisted by a previous run, if still valid
    pub fn initialize(&self) -> Result<Option<SessionState>> {
        let restored = self.session_manager.restore();

        tracing::info!(authenticated = restored.is_some(), "Portal initialized");

        Ok(restored)
    }

    /// Stop timers and listeners. The persisted session is kept.
    pub fn shutdown(&self) {
        self.session_manager.shutdown();
        tracing::info!("Portal shut down");
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn session_manager(&self) -> &SessionManager {
        &self.session_manager
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    // === Route gating ===

    pub fn require_authenticated(&self, current_path: &str) -> GuardDecision {
        self.guard
            .require_authenticated(&self.session_manager, current_path)
    }

    pub fn require_guest_only(&self) -> GuardDecision {
        self.guard.require_guest_only(&self.session_manager)
    }

    /// Store a policy override, applied the next time a portal is built
    pub fn persist_policy(&self, policy: &SessionPolicy) -> Result<()> {
        self.db.set_setting_json(SESSION_POLICY_SETTING, policy)?;
        tracing::info!("Persisted session policy override");
        Ok(())
    }
}
