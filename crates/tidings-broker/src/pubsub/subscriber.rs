//! Per-session channel subscriptions and their view filters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use tidings_proto::{ViewParams, ViewType};

use super::search::{SearchError, SearchExpr};
use crate::session::SessionContext;

/// Key a view filter is stored under: `"<channel>|<viewId>"`.
pub fn filter_key(channel: &str, view_id: &str) -> String {
    format!("{}|{}", channel, view_id)
}

/// A named search predicate mirroring one client view's current query.
#[derive(Debug, Clone)]
pub struct ViewFilter {
    /// Channel the view watches.
    pub channel: String,
    /// Client view identifier.
    pub view_id: String,
    /// Declared view type.
    pub view_type: ViewType,
    /// Search text as the client sent it.
    pub search: String,
    parsed: Result<SearchExpr, SearchError>,
}

impl ViewFilter {
    /// Build a filter from view parameters. A malformed search is kept and
    /// reported each time the filter is evaluated.
    pub fn new(channel: impl Into<String>, params: &ViewParams) -> Self {
        Self {
            channel: channel.into(),
            view_id: params.view_id.clone(),
            view_type: params.view_type.clone(),
            search: params.search.clone(),
            parsed: SearchExpr::parse(&params.search),
        }
    }

    pub fn key(&self) -> String {
        filter_key(&self.channel, &self.view_id)
    }

    /// Parsed search expression, or the error it failed with.
    pub fn expr(&self) -> Result<&SearchExpr, SearchError> {
        self.parsed.as_ref().map_err(|e| e.clone())
    }
}

/// A session's subscription to one channel.
///
/// Holds the delivery bookmark (the stamp up to which payloads have been
/// handed to this session) and the session's view filters on the channel.
#[derive(Debug)]
pub struct Subscriber {
    channel: String,
    session: RwLock<Arc<SessionContext>>,
    bookmark: AtomicU64,
    filters: RwLock<BTreeMap<String, ViewFilter>>,
    created_at: Instant,
    delivered: AtomicU64,
}

impl Subscriber {
    pub(crate) fn new(channel: impl Into<String>, session: Arc<SessionContext>, bookmark: u64) -> Self {
        Self {
            channel: channel.into(),
            session: RwLock::new(session),
            bookmark: AtomicU64::new(bookmark),
            filters: RwLock::new(BTreeMap::new()),
            created_at: Instant::now(),
            delivered: AtomicU64::new(0),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn session(&self) -> Arc<SessionContext> {
        self.session.read().clone()
    }

    /// Id of the bound session (follows identity changes).
    pub fn session_id(&self) -> String {
        self.session.read().id()
    }

    /// Whether this subscriber delivers to the given live session id.
    pub fn serves(&self, session_id: &str) -> bool {
        let session = self.session.read();
        session.is_alive() && session.has_id(session_id)
    }

    /// Whether this subscriber delivers to the given live session object.
    ///
    /// Two sessions may carry the same id after a non-destructive identity
    /// change; each keeps its own subscribers.
    pub fn belongs_to(&self, session: &Arc<SessionContext>) -> bool {
        let bound = self.session.read();
        bound.is_alive() && Arc::ptr_eq(&*bound, session)
    }

    /// Whether the bound session is still registered.
    pub fn is_active(&self) -> bool {
        self.session.read().is_alive()
    }

    /// Stamp of the last delivery cycle.
    pub fn bookmark(&self) -> u64 {
        self.bookmark.load(Ordering::Acquire)
    }

    /// Claim the range `(from, to]` for delivery by moving the bookmark
    /// from `from` to `to`.
    ///
    /// Fails when the bookmark is no longer `from`, i.e. a concurrent poll
    /// claimed first. The caller must re-read the bookmark.
    pub fn claim(&self, from: u64, to: u64) -> bool {
        from < to
            && self
                .bookmark
                .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    /// Attach or replace the filter for the view.
    pub fn set_filter(&self, filter: ViewFilter) {
        self.filters.write().insert(filter.key(), filter);
    }

    /// Drop the filter for a view. Returns whether one existed.
    pub fn remove_filter(&self, channel: &str, view_id: &str) -> bool {
        self.filters
            .write()
            .remove(&filter_key(channel, view_id))
            .is_some()
    }

    /// Snapshot of the filters registered for `channel`.
    pub fn filters_for(&self, channel: &str) -> Vec<ViewFilter> {
        let prefix = format!("{}|", channel);
        self.filters
            .read()
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(_, filter)| filter.clone())
            .collect()
    }

    pub fn filter_count(&self) -> usize {
        self.filters.read().len()
    }

    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Number of payloads delivered through this subscriber.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub(crate) fn record_delivery(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rebind(&self, session: Arc<SessionContext>) {
        *self.session.write() = session;
    }
}
