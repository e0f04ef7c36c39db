//! Named channels: a payload log plus the sessions subscribed to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use tidings_proto::Payload;

use super::subscriber::Subscriber;
use crate::clock::StampSource;
use crate::session::SessionContext;

/// What a channel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Entity channel fed by the persistence pipeline.
    Persistent,
    /// Free-form topic for messages and application events.
    Informational,
}

/// Summary of a channel (for debugging/admin).
#[derive(Debug, Clone, Serialize)]
pub struct ChannelInfo {
    pub name: String,
    pub kind: ChannelKind,
    pub payloads: usize,
    pub subscribers: usize,
    pub oldest_timestamp: Option<u64>,
    pub newest_timestamp: Option<u64>,
}

/// A named topic.
///
/// The log is ordered by timestamp: stamps are taken while holding the log
/// write lock, and the stamp source is strictly increasing.
#[derive(Debug)]
pub struct Channel {
    name: String,
    persistent: AtomicBool,
    log: RwLock<Vec<Arc<Payload>>>,
    subscribers: RwLock<Vec<Arc<Subscriber>>>,
}

impl Channel {
    pub(crate) fn new(name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            name: name.into(),
            persistent: AtomicBool::new(kind == ChannelKind::Persistent),
            log: RwLock::new(Vec::new()),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ChannelKind {
        if self.persistent.load(Ordering::Relaxed) {
            ChannelKind::Persistent
        } else {
            ChannelKind::Informational
        }
    }

    /// Upgrade to a persistence-backed channel once entity traffic is seen.
    pub(crate) fn mark_persistent(&self) {
        self.persistent.store(true, Ordering::Relaxed);
    }

    // Payload log

    /// Stamp and append a payload. Returns its timestamp.
    pub(crate) fn append(&self, mut payload: Payload, stamps: &StampSource) -> u64 {
        let mut log = self.log.write();
        let timestamp = stamps.next();
        payload.timestamp = timestamp;
        payload.origin.channel = Some(self.name.clone());
        log.push(Arc::new(payload));
        timestamp
    }

    /// Payloads with `after < timestamp <= upto`, in publish order.
    pub fn payloads_between(&self, after: u64, upto: u64) -> Vec<Arc<Payload>> {
        let log = self.log.read();
        let start = log.partition_point(|p| p.timestamp <= after);
        let end = log.partition_point(|p| p.timestamp <= upto);
        if start >= end {
            return Vec::new();
        }
        log[start..end].to_vec()
    }

    pub fn payload_count(&self) -> usize {
        self.log.read().len()
    }

    /// Drop payloads stamped before `cutoff`. Returns how many were removed.
    pub(crate) fn remove_older_than(&self, cutoff: u64) -> usize {
        let mut log = self.log.write();
        let expired = log.partition_point(|p| p.timestamp < cutoff);
        log.drain(..expired);
        expired
    }

    // Subscribers

    /// Existing subscriber for the session, or a new one whose bookmark is
    /// taken from `bookmark`.
    pub(crate) fn subscribe(
        &self,
        session: &Arc<SessionContext>,
        bookmark: impl FnOnce() -> u64,
    ) -> (Arc<Subscriber>, bool) {
        let mut subscribers = self.subscribers.write();
        if let Some(existing) = subscribers.iter().find(|s| s.belongs_to(session)) {
            return (existing.clone(), false);
        }

        let subscriber = Arc::new(Subscriber::new(self.name.clone(), session.clone(), bookmark()));
        subscribers.push(subscriber.clone());
        (subscriber, true)
    }

    /// The live subscriber for a session id, if any.
    pub fn subscriber(&self, session_id: &str) -> Option<Arc<Subscriber>> {
        self.subscribers
            .read()
            .iter()
            .find(|s| s.serves(session_id))
            .cloned()
    }

    /// The subscriber bound to this exact session.
    pub fn subscriber_of(&self, session: &Arc<SessionContext>) -> Option<Arc<Subscriber>> {
        self.subscribers
            .read()
            .iter()
            .find(|s| s.belongs_to(session))
            .cloned()
    }

    pub fn has_subscriber(&self, session_id: &str) -> bool {
        self.subscribers.read().iter().any(|s| s.serves(session_id))
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub(crate) fn remove_subscriber(&self, session_id: &str) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| !s.serves(session_id));
        subscribers.len() != before
    }

    /// Drop subscribers whose session is gone.
    pub(crate) fn prune_inactive(&self) -> usize {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.is_active());
        before - subscribers.len()
    }

    /// Hand the subscriptions of a replaced session over to its successor.
    ///
    /// Where the successor already subscribes, the old subscriber is dropped.
    pub(crate) fn adopt(&self, from: &Arc<SessionContext>, to: &Arc<SessionContext>) {
        let mut subscribers = self.subscribers.write();
        let successor_present = subscribers
            .iter()
            .any(|s| Arc::ptr_eq(&s.session(), to));

        if successor_present {
            subscribers.retain(|s| !Arc::ptr_eq(&s.session(), from));
        } else {
            for subscriber in subscribers.iter() {
                if Arc::ptr_eq(&subscriber.session(), from) {
                    subscriber.rebind(to.clone());
                }
            }
        }
    }

    pub fn info(&self) -> ChannelInfo {
        let log = self.log.read();
        ChannelInfo {
            name: self.name.clone(),
            kind: self.kind(),
            payloads: log.len(),
            subscribers: self.subscriber_count(),
            oldest_timestamp: log.first().map(|p| p.timestamp),
            newest_timestamp: log.last().map(|p| p.timestamp),
        }
    }
}
