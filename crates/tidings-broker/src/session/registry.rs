//! Session registry.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use super::context::{AffinityKey, SessionContext};

/// Result of [`SessionRegistry::change_identity`].
#[derive(Debug, Clone)]
pub struct IdentityChange {
    /// The session now carrying the new id.
    pub session: Arc<SessionContext>,
    /// A previous owner of the new id that was removed in the process.
    pub replaced: Option<Arc<SessionContext>>,
}

/// Summary of a live session (for debugging/admin).
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub affinity: Option<String>,
    pub user: Option<String>,
    pub ghost: bool,
    pub age_secs: u64,
}

/// Registry of live sessions.
///
/// Lookups scan the list linearly. The number of live sessions is bounded
/// by concurrent users and removal is explicit, so the list stays short.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<Vec<Arc<SessionContext>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the session bound to `affinity`.
    ///
    /// With `create_if_absent`, a new session with a random id is registered
    /// and bound when none exists. Without it, `None` is a normal answer.
    pub fn resolve(
        &self,
        affinity: &AffinityKey,
        create_if_absent: bool,
    ) -> Option<Arc<SessionContext>> {
        if let Some(session) = self.bound_to(affinity) {
            return Some(session);
        }
        if !create_if_absent {
            return None;
        }
        Some(self.register(affinity, false))
    }

    /// Resolve the session bound to `affinity`, creating a ghost session for
    /// server-side work when none exists.
    pub fn resolve_ghost(&self, affinity: &AffinityKey) -> Arc<SessionContext> {
        match self.bound_to(affinity) {
            Some(session) => session,
            None => self.register(affinity, true),
        }
    }

    /// Find a live session by id.
    pub fn find(&self, id: &str) -> Option<Arc<SessionContext>> {
        self.sessions
            .read()
            .iter()
            .find(|session| session.has_id(id))
            .cloned()
    }

    /// Bind an existing session to `affinity`.
    ///
    /// Any session previously bound to `affinity` is unbound (not removed).
    /// Returns `None` when no live session has `session_id`.
    pub fn attach(&self, affinity: &AffinityKey, session_id: &str) -> Option<Arc<SessionContext>> {
        let sessions = self.sessions.write();
        let session = sessions.iter().find(|s| s.has_id(session_id))?.clone();

        for other in sessions.iter() {
            if !Arc::ptr_eq(other, &session) && other.is_bound_to(affinity) {
                other.bind(None);
            }
        }
        session.bind(Some(affinity.clone()));

        tracing::debug!(session_id, affinity = %affinity, "session attached");
        Some(session)
    }

    /// Unbind whatever session is bound to `affinity`, keeping it alive.
    pub fn detach(&self, affinity: &AffinityKey) -> Option<Arc<SessionContext>> {
        let sessions = self.sessions.write();
        let session = sessions.iter().find(|s| s.is_bound_to(affinity))?.clone();
        session.bind(None);
        Some(session)
    }

    /// Rebind the session resolved for `affinity` to `new_id`.
    ///
    /// A session is created first if none is bound. When another live
    /// session already owns `new_id` and `delete_old` is set, its user is
    /// carried over (unless the rebound session already has one) and it is
    /// removed. Without `delete_old` both sessions share the id.
    pub fn change_identity(
        &self,
        affinity: &AffinityKey,
        new_id: &str,
        delete_old: bool,
    ) -> IdentityChange {
        let session = match self.bound_to(affinity) {
            Some(session) => session,
            None => self.register(affinity, false),
        };

        let mut sessions = self.sessions.write();
        if session.has_id(new_id) {
            return IdentityChange {
                session,
                replaced: None,
            };
        }

        let old_id = session.id();
        let mut replaced = None;
        if delete_old {
            if let Some(pos) = sessions
                .iter()
                .position(|s| !Arc::ptr_eq(s, &session) && s.has_id(new_id))
            {
                let old = sessions.remove(pos);
                if session.user().is_none() {
                    session.set_user(old.user());
                }
                old.kill();
                replaced = Some(old);
            }
        }
        session.set_id(new_id);

        tracing::debug!(
            old_id = %old_id,
            new_id,
            replaced = replaced.is_some(),
            "session identity changed"
        );

        IdentityChange { session, replaced }
    }

    /// Remove a session. Removing an already removed session is a no-op.
    pub fn remove(&self, session: &Arc<SessionContext>) -> bool {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|s| !Arc::ptr_eq(s, session));
        session.kill();

        let removed = sessions.len() != before;
        if removed {
            tracing::debug!(session_id = %session.id(), "session removed");
        }
        removed
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Get info about all sessions.
    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions
            .read()
            .iter()
            .map(|session| SessionInfo {
                id: session.id(),
                affinity: session.affinity().map(|a| a.to_string()),
                user: session.user().map(|u| u.name),
                ghost: session.is_ghost(),
                age_secs: session.age().as_secs(),
            })
            .collect()
    }

    fn bound_to(&self, affinity: &AffinityKey) -> Option<Arc<SessionContext>> {
        self.sessions
            .read()
            .iter()
            .find(|session| session.is_bound_to(affinity))
            .cloned()
    }

    fn register(&self, affinity: &AffinityKey, ghost: bool) -> Arc<SessionContext> {
        let mut sessions = self.sessions.write();
        // Another worker may have registered for this key since our read.
        if let Some(existing) = sessions.iter().find(|s| s.is_bound_to(affinity)) {
            return existing.clone();
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        let session = Arc::new(SessionContext::new(id, Some(affinity.clone()), ghost));
        sessions.push(session.clone());

        tracing::debug!(session_id = %session.id(), affinity = %affinity, ghost, "session created");
        session
    }
}
