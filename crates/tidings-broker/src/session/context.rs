//! Session context and execution affinity.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Identifies the unit of work a call executes on.
///
/// Usually derived from the serving thread or the transport's request
/// handle. The broker never looks it up implicitly; callers pass it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AffinityKey(String);

impl AffinityKey {
    /// Wrap a transport-supplied key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for the calling OS thread.
    pub fn current_thread() -> Self {
        Self(format!("{:?}", std::thread::current().id()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AffinityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated user attached to a session.
///
/// `level` is an opaque fact supplied by the authentication layer; the
/// broker only carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub name: String,
    pub level: u32,
}

impl UserIdentity {
    pub fn new(name: impl Into<String>, level: u32) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }
}

/// A logical client session.
///
/// The id can change once (anonymous to authenticated) while the context
/// object, and everything that references it, stays the same.
#[derive(Debug)]
pub struct SessionContext {
    id: RwLock<String>,
    affinity: RwLock<Option<AffinityKey>>,
    user: RwLock<Option<UserIdentity>>,
    alive: AtomicBool,
    ghost: bool,
    created_at: Instant,
}

impl SessionContext {
    pub(crate) fn new(id: impl Into<String>, affinity: Option<AffinityKey>, ghost: bool) -> Self {
        Self {
            id: RwLock::new(id.into()),
            affinity: RwLock::new(affinity),
            user: RwLock::new(None),
            alive: AtomicBool::new(true),
            ghost,
            created_at: Instant::now(),
        }
    }

    /// Current session id.
    pub fn id(&self) -> String {
        self.id.read().clone()
    }

    /// Check the id without cloning it.
    pub fn has_id(&self, id: &str) -> bool {
        *self.id.read() == id
    }

    /// Affinity key this session is currently bound to, if any.
    pub fn affinity(&self) -> Option<AffinityKey> {
        self.affinity.read().clone()
    }

    pub fn is_bound_to(&self, affinity: &AffinityKey) -> bool {
        self.affinity.read().as_ref() == Some(affinity)
    }

    /// Authenticated user, if any.
    pub fn user(&self) -> Option<UserIdentity> {
        self.user.read().clone()
    }

    pub fn set_user(&self, user: Option<UserIdentity>) {
        *self.user.write() = user;
    }

    /// Whether the session is still registered.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Whether this session serves server-side work with no client
    /// attached. Ghost sessions never receive notifications.
    pub fn is_ghost(&self) -> bool {
        self.ghost
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub(crate) fn set_id(&self, id: impl Into<String>) {
        *self.id.write() = id.into();
    }

    pub(crate) fn bind(&self, affinity: Option<AffinityKey>) {
        *self.affinity.write() = affinity;
    }

    pub(crate) fn kill(&self) {
        self.alive.store(false, Ordering::Release);
        self.bind(None);
    }
}
