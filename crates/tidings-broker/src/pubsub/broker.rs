//! The change broker: channel directory, publishing, and the poll protocol.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use tidings_proto::{Payload, ViewParams};

use super::channel::{Channel, ChannelInfo, ChannelKind};
use super::filter::FilterMatcher;
use super::subscriber::{Subscriber, ViewFilter};
use super::sweeper::{SweepResult, Sweeper};
use crate::clock::{Clock, StampSource, SystemClock};
use crate::config::BrokerConfig;
use crate::error::Result;
use crate::metrics::BrokerMetrics;
use crate::session::{AffinityKey, SessionContext, SessionRegistry};

/// Session-scoped publish/subscribe broker.
///
/// One instance is built at startup and shared (usually behind an `Arc`)
/// by every worker. Publishers append to channel logs; each session's
/// worker periodically calls [`Broker::poll`] to collect what it has not
/// seen yet, narrowed to the views it has open.
pub struct Broker {
    config: BrokerConfig,
    stamps: StampSource,
    sessions: SessionRegistry,
    /// Channels keyed by name.
    channels: DashMap<String, Arc<Channel>>,
    /// The same channels in creation order, for iteration.
    channel_order: RwLock<Vec<Arc<Channel>>>,
    sweeper: Sweeper,
    matcher: FilterMatcher,
    metrics: Arc<BrokerMetrics>,
    shutdown: AtomicBool,
}

impl Broker {
    /// Create a broker driven by the system clock.
    pub fn new(config: BrokerConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a broker driven by the given clock.
    pub fn with_clock(config: BrokerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(BrokerMetrics::new());
        let stamps = StampSource::new(clock);
        let sweeper = Sweeper::new(stamps.wall());
        let matcher = FilterMatcher::new(config.case_insensitive_search, metrics.clone());

        Ok(Self {
            config,
            stamps,
            sessions: SessionRegistry::new(),
            channels: DashMap::new(),
            channel_order: RwLock::new(Vec::new()),
            sweeper,
            matcher,
            metrics,
            shutdown: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn metrics(&self) -> &Arc<BrokerMetrics> {
        &self.metrics
    }

    pub fn sweeper(&self) -> &Sweeper {
        &self.sweeper
    }

    // Sessions

    /// Rebind the caller's session to `new_id` (typically after login).
    ///
    /// When a previous owner of `new_id` is removed, its subscriptions move
    /// to the rebound session.
    pub fn change_identity(
        &self,
        affinity: &AffinityKey,
        new_id: &str,
        delete_old: bool,
    ) -> Arc<SessionContext> {
        let change = self.sessions.change_identity(affinity, new_id, delete_old);
        if let Some(replaced) = &change.replaced {
            for channel in self.channels_snapshot() {
                channel.adopt(replaced, &change.session);
            }
        }
        change.session
    }

    /// Remove a session and its subscriptions. Idempotent.
    pub fn remove_session(&self, session: &Arc<SessionContext>) -> bool {
        let removed = self.sessions.remove(session);
        for channel in self.channels_snapshot() {
            channel.prune_inactive();
        }
        removed
    }

    // Directory

    /// Look up a channel by name.
    pub fn channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.get(name).map(|entry| entry.value().clone())
    }

    /// Channel names in creation order.
    pub fn channel_names(&self) -> Vec<String> {
        self.channel_order
            .read()
            .iter()
            .map(|channel| channel.name().to_string())
            .collect()
    }

    pub fn channel_info(&self, name: &str) -> Option<ChannelInfo> {
        self.channel(name).map(|channel| channel.info())
    }

    /// The subscriber for (channel, session id), if any.
    pub fn subscriber(&self, channel: &str, session_id: &str) -> Option<Arc<Subscriber>> {
        self.channel(channel)?.subscriber(session_id)
    }

    fn channel_or_create(&self, name: &str, kind: ChannelKind) -> Arc<Channel> {
        let channel = match self.channels.get(name) {
            Some(entry) => entry.value().clone(),
            None => self
                .channels
                .entry(name.to_string())
                .or_insert_with(|| {
                    let channel = Arc::new(Channel::new(name, kind));
                    self.channel_order.write().push(channel.clone());
                    debug!(channel = name, kind = ?kind, "channel created");
                    channel
                })
                .value()
                .clone(),
        };
        if kind == ChannelKind::Persistent && channel.kind() != kind {
            channel.mark_persistent();
        }
        channel
    }

    fn channels_snapshot(&self) -> Vec<Arc<Channel>> {
        self.channel_order.read().clone()
    }

    // Subscription

    /// Subscribe the caller's session (created if needed) to a channel.
    pub fn subscribe(&self, channel: &str, affinity: &AffinityKey) -> Option<Arc<Subscriber>> {
        let session = self.sessions.resolve(affinity, true)?;
        self.subscribe_session(channel, &session)
    }

    /// Subscribe a given session to a channel.
    ///
    /// Returns the existing subscriber when there is one. Removed and ghost
    /// sessions cannot subscribe.
    pub fn subscribe_session(
        &self,
        channel: &str,
        session: &Arc<SessionContext>,
    ) -> Option<Arc<Subscriber>> {
        if !session.is_alive() || session.is_ghost() {
            return None;
        }

        let entry = self.channel_or_create(channel, ChannelKind::Informational);
        let (subscriber, created) = entry.subscribe(session, || self.stamps.next());
        if created {
            debug!(
                channel,
                session_id = %session.id(),
                bookmark = subscriber.bookmark(),
                "subscriber created"
            );
        }
        Some(subscriber)
    }

    /// Drop the subscription of a session id to a channel.
    pub fn unsubscribe(&self, channel: &str, session_id: &str) -> bool {
        let removed = self
            .channel(channel)
            .map(|entry| entry.remove_subscriber(session_id))
            .unwrap_or(false);
        if removed {
            debug!(channel, session_id, "subscriber removed");
        }
        removed
    }

    /// Drop every subscription of a session id.
    pub fn remove_session_subscriptions(&self, session_id: &str) -> usize {
        self.channels_snapshot()
            .iter()
            .filter(|channel| channel.remove_subscriber(session_id))
            .count()
    }

    /// Narrow the caller's subscription on an entity channel to a view's
    /// current query.
    ///
    /// Grid and chart views (and views that do not declare a type) register
    /// a filter under `entity|viewId`, replacing any previous one. Other
    /// view types stay unfiltered.
    pub fn limit_subscriber(
        &self,
        entity: &str,
        affinity: &AffinityKey,
        params: &ViewParams,
    ) -> Option<Arc<Subscriber>> {
        self.channel_or_create(entity, ChannelKind::Persistent);
        let subscriber = self.subscribe(entity, affinity)?;

        if !params.view_type.is_filtered() {
            subscriber.remove_filter(entity, &params.view_id);
            debug!(
                entity,
                view_id = %params.view_id,
                view_type = ?params.view_type,
                "view type is not filtered, subscribing unfiltered"
            );
            return Some(subscriber);
        }

        let filter = ViewFilter::new(entity, params);
        if let Err(e) = filter.expr() {
            warn!(
                entity,
                view_id = %params.view_id,
                search = %params.search,
                error = %e,
                "view search cannot be parsed, inserts and updates will not match"
            );
        }
        debug!(entity, view_id = %params.view_id, search = %params.search, "view filter set");
        subscriber.set_filter(filter);
        Some(subscriber)
    }

    /// [`Broker::limit_subscriber`] from the raw client parameter map.
    pub fn limit_subscriber_with<I, K, V>(
        &self,
        entity: &str,
        affinity: &AffinityKey,
        pairs: I,
    ) -> Result<Option<Arc<Subscriber>>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params = ViewParams::from_pairs(pairs)?;
        Ok(self.limit_subscriber(entity, affinity, &params))
    }

    /// Remove a view's filter when the view closes.
    pub fn unlimit_subscriber(&self, entity: &str, affinity: &AffinityKey, view_id: &str) -> bool {
        let Some(session) = self.sessions.resolve(affinity, false) else {
            return false;
        };
        self.channel(entity)
            .and_then(|channel| channel.subscriber_of(&session))
            .map(|subscriber| subscriber.remove_filter(entity, view_id))
            .unwrap_or(false)
    }

    // Publishing

    /// Append a payload to a channel, creating the channel if needed.
    ///
    /// Returns the payload's timestamp.
    pub fn publish(&self, channel: &str, payload: Payload) -> u64 {
        let kind = if payload.has_manipulations() {
            ChannelKind::Persistent
        } else {
            ChannelKind::Informational
        };
        let entry = self.channel_or_create(channel, kind);
        self.append(&entry, payload)
    }

    /// Deliver a payload to one session only.
    ///
    /// The payload rides on the first channel the session subscribes to
    /// and is addressed so no other subscriber receives it. Returns false
    /// when the session has no subscription at all.
    pub fn publish_to_session(&self, session_id: &str, mut payload: Payload) -> bool {
        for channel in self.channels_snapshot() {
            if channel.has_subscriber(session_id) {
                payload.recipient = Some(session_id.to_string());
                self.append(&channel, payload);
                return true;
            }
        }
        debug!(session_id, "no subscription to deliver directed payload through");
        false
    }

    /// Append a copy of a payload to every channel. Returns the number of
    /// channels reached.
    pub fn publish_to_all(&self, payload: Payload) -> usize {
        let channels = self.channels_snapshot();
        for channel in &channels {
            self.append(channel, payload.clone());
        }
        channels.len()
    }

    fn append(&self, channel: &Channel, payload: Payload) -> u64 {
        let manipulations = payload.manipulations.len();
        let timestamp = channel.append(payload, &self.stamps);
        self.metrics.record_publish();
        trace!(channel = channel.name(), timestamp, manipulations, "payload published");
        timestamp
    }

    // Poll

    /// Collect pending, relevant payloads for the caller's session.
    ///
    /// A caller without a session gets an empty list.
    pub fn poll(&self, affinity: &AffinityKey) -> Vec<Payload> {
        match self.sessions.resolve(affinity, false) {
            Some(session) => self.poll_session(&session),
            None => Vec::new(),
        }
    }

    /// Collect pending, relevant payloads for a session.
    ///
    /// For every subscriber of the session, payloads stamped after its
    /// bookmark are copied, filtered against its views, and the bookmark
    /// moves to the poll's own stamp whenever anything was fetched, even if
    /// every copy was filtered out. Returns empty when the broker is shut
    /// down or a sweep outlasts the retry budget.
    pub fn poll_session(&self, session: &Arc<SessionContext>) -> Vec<Payload> {
        if self.is_shut_down() || !session.is_alive() || session.is_ghost() {
            return Vec::new();
        }

        self.maybe_sweep();
        if !self.wait_for_sweep() {
            self.metrics.record_poll_abandoned();
            return Vec::new();
        }

        let upto = self.stamps.next();
        let session_id = session.id();
        let mut delivered = Vec::new();

        for channel in self.channels_snapshot() {
            let Some(subscriber) = channel.subscriber_of(session) else {
                continue;
            };

            // Claim (bookmark, upto] before delivering so overlapping polls
            // of the same session never hand out the same payload twice.
            let fetched = loop {
                let from = subscriber.bookmark();
                if from >= upto {
                    break Vec::new();
                }
                let fetched = channel.payloads_between(from, upto);
                if fetched.is_empty() || subscriber.claim(from, upto) {
                    break fetched;
                }
            };
            if fetched.is_empty() {
                continue;
            }

            for payload in &fetched {
                if !payload.is_addressed_to(&session_id) {
                    continue;
                }
                let copy = Payload::clone(payload);
                match self.matcher.filter(&subscriber, copy) {
                    Some(relevant) => {
                        trace!(
                            channel = channel.name(),
                            session_id = %session_id,
                            timestamp = relevant.timestamp,
                            "payload delivered"
                        );
                        subscriber.record_delivery();
                        delivered.push(relevant);
                    }
                    None => self.metrics.record_filtered(),
                }
            }
        }

        self.metrics.record_poll(delivered.len() as u64);
        delivered
    }

    // Retention

    /// Remove payloads older than `max_age` from every channel, and drop
    /// subscribers of removed sessions.
    ///
    /// Returns a skipped, empty result if another sweep is running.
    pub fn sweep(&self, max_age: Duration) -> SweepResult {
        let Some(_guard) = self.sweeper.try_acquire() else {
            self.metrics.record_sweep_skipped();
            debug!("sweep already running, skipping");
            return SweepResult::skipped();
        };

        let start = Instant::now();
        let now = self.stamps.wall();
        self.sweeper.mark(now);
        let cutoff = now.saturating_sub(max_age.as_micros() as u64);

        let mut result = SweepResult::default();
        for channel in self.channels_snapshot() {
            result.channels_scanned += 1;
            result.payloads_removed += channel.remove_older_than(cutoff) as u64;
            result.subscribers_pruned += channel.prune_inactive() as u64;
        }
        result.duration = start.elapsed();
        self.metrics.record_sweep(result.payloads_removed);

        if result.did_cleanup() {
            info!(
                payloads_removed = result.payloads_removed,
                subscribers_pruned = result.subscribers_pruned,
                channels = result.channels_scanned,
                duration_us = result.duration.as_micros() as u64,
                "sweep completed"
            );
        } else {
            debug!(
                channels = result.channels_scanned,
                duration_us = result.duration.as_micros() as u64,
                "sweep completed with nothing to remove"
            );
        }

        result
    }

    /// Sweep with the configured retention horizon.
    pub fn sweep_expired(&self) -> SweepResult {
        self.sweep(self.config.retention)
    }

    fn maybe_sweep(&self) {
        if let Some(interval) = self.config.sweep_interval {
            if self.sweeper.is_due(self.stamps.wall(), interval) {
                self.sweep_expired();
            }
        }
    }

    /// Wait in bounded steps for a running sweep. False means give up on
    /// this poll cycle.
    fn wait_for_sweep(&self) -> bool {
        let mut attempts = 0;
        while self.sweeper.is_busy() {
            if self.is_shut_down() {
                return false;
            }
            if attempts >= self.config.poll_retry_limit {
                warn!(
                    attempts,
                    waited_ms = (self.config.poll_retry_delay * attempts).as_millis() as u64,
                    "sweep still running, returning empty poll"
                );
                return false;
            }
            attempts += 1;
            std::thread::sleep(self.config.poll_retry_delay);
        }
        !self.is_shut_down()
    }

    // Lifecycle

    /// Stop serving polls. Polls waiting on a sweep return empty at once.
    pub fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            info!("broker shutting down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tidings_proto::{FieldValue, Manipulation, Message, Origin, Record, ViewType};

    fn broker() -> Broker {
        Broker::with_clock(
            BrokerConfig::new().without_auto_sweep(),
            Arc::new(ManualClock::new(1_000_000)),
        )
        .unwrap()
    }

    fn message(text: &str) -> Payload {
        Payload::new(Origin::system()).with_message(Message::info(text))
    }

    fn order_update(id: i64, status: &str) -> Payload {
        Payload::new(Origin::persistence("alice")).with_manipulation(
            Manipulation::update("Order", id)
                .with_record(Record::new().with_field("status", FieldValue::new(status))),
        )
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = BrokerConfig::new().with_retention(Duration::ZERO);
        assert!(Broker::new(config).is_err());
    }

    #[test]
    fn test_subscribe_creates_channel_and_session() {
        let broker = broker();
        let key = AffinityKey::new("t1");

        let sub = broker.subscribe("news", &key).unwrap();
        assert_eq!(sub.channel(), "news");
        assert_eq!(broker.sessions().len(), 1);
        assert_eq!(broker.channel_names(), vec!["news"]);
        assert_eq!(broker.channel_info("news").unwrap().kind, ChannelKind::Informational);
    }

    #[test]
    fn test_publish_creates_channel_by_kind() {
        let broker = broker();
        broker.publish("news", message("hi"));
        broker.publish("Order", order_update(1, "open"));

        assert_eq!(broker.channel_info("news").unwrap().kind, ChannelKind::Informational);
        assert_eq!(broker.channel_info("Order").unwrap().kind, ChannelKind::Persistent);
        assert_eq!(broker.metrics().payloads_published(), 2);
    }

    #[test]
    fn test_limit_subscriber_marks_entity_channel() {
        let broker = broker();
        let key = AffinityKey::new("t1");
        broker.subscribe("Order", &key);
        assert_eq!(broker.channel_info("Order").unwrap().kind, ChannelKind::Informational);

        broker.limit_subscriber("Order", &key, &ViewParams::new("grid1"));
        assert_eq!(broker.channel_info("Order").unwrap().kind, ChannelKind::Persistent);
    }

    #[test]
    fn test_limit_subscriber_ignores_unfiltered_view_types() {
        let broker = broker();
        let key = AffinityKey::new("t1");

        let sub = broker
            .limit_subscriber(
                "Order",
                &key,
                &ViewParams::new("form1")
                    .with_view_type(ViewType::Other("form".into()))
                    .with_search("status=open"),
            )
            .unwrap();
        assert_eq!(sub.filter_count(), 0);

        broker.limit_subscriber(
            "Order",
            &key,
            &ViewParams::new("grid1")
                .with_view_type(ViewType::Grid)
                .with_search("status=open"),
        );
        assert_eq!(sub.filter_count(), 1);

        // The same view switching to an unfiltered type drops its filter.
        broker.limit_subscriber(
            "Order",
            &key,
            &ViewParams::new("grid1").with_view_type(ViewType::Other("tree".into())),
        );
        assert_eq!(sub.filter_count(), 0);
    }

    #[test]
    fn test_limit_subscriber_with_raw_params() {
        let broker = broker();
        let key = AffinityKey::new("t1");

        let sub = broker
            .limit_subscriber_with(
                "Order",
                &key,
                [("@viewId", "grid1"), ("@viewType", "chart"), ("@search", "status=open")],
            )
            .unwrap()
            .unwrap();
        assert_eq!(sub.filters_for("Order")[0].view_type, ViewType::Chart);

        assert!(broker
            .limit_subscriber_with("Order", &key, [("@search", "status=open")])
            .is_err());
    }

    #[test]
    fn test_unlimit_subscriber() {
        let broker = broker();
        let key = AffinityKey::new("t1");
        broker.limit_subscriber("Order", &key, &ViewParams::new("grid1").with_search("status=open"));

        assert!(broker.unlimit_subscriber("Order", &key, "grid1"));
        assert!(!broker.unlimit_subscriber("Order", &key, "grid1"));
        assert!(!broker.unlimit_subscriber("Order", &AffinityKey::new("nobody"), "grid1"));
    }

    #[test]
    fn test_poll_without_session_is_empty() {
        let broker = broker();
        broker.publish("news", message("hi"));
        assert!(broker.poll(&AffinityKey::new("t1")).is_empty());
        assert!(broker.sessions().is_empty());
    }

    #[test]
    fn test_publish_before_subscribe_is_not_delivered() {
        let broker = broker();
        broker.publish("news", message("early"));

        let key = AffinityKey::new("t1");
        broker.subscribe("news", &key);
        broker.publish("news", message("late"));

        let got = broker.poll(&key);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].messages[0].text, "late");
    }

    #[test]
    fn test_poll_order_follows_channels_then_publish_order() {
        let broker = broker();
        let key = AffinityKey::new("t1");
        broker.subscribe("a", &key);
        broker.subscribe("b", &key);

        broker.publish("b", message("b1"));
        broker.publish("a", message("a1"));
        broker.publish("a", message("a2"));

        let texts: Vec<String> = broker
            .poll(&key)
            .into_iter()
            .map(|p| p.messages[0].text.clone())
            .collect();
        assert_eq!(texts, vec!["a1", "a2", "b1"]);
    }

    #[test]
    fn test_publish_to_session_is_private() {
        let broker = broker();
        let a = AffinityKey::new("a");
        let b = AffinityKey::new("b");
        broker.subscribe("news", &a);
        broker.subscribe("news", &b);
        let a_id = broker.sessions().resolve(&a, false).unwrap().id();

        assert!(broker.publish_to_session(&a_id, message("for a")));
        assert!(!broker.publish_to_session("unknown", message("lost")));

        let got = broker.poll(&a);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].recipient.as_deref(), Some(a_id.as_str()));
        assert_eq!(got[0].channel(), Some("news"));
        assert!(broker.poll(&b).is_empty());
    }

    #[test]
    fn test_publish_to_all_reaches_every_channel() {
        let broker = broker();
        let key = AffinityKey::new("t1");
        broker.subscribe("a", &key);
        broker.subscribe("b", &key);
        broker.publish("c", message("c"));

        assert_eq!(broker.publish_to_all(message("maintenance")), 3);
        let got = broker.poll(&key);
        assert_eq!(got.len(), 2);
        assert!(got.iter().all(|p| p.messages[0].text == "maintenance"));
    }

    #[test]
    fn test_ghost_sessions_do_not_subscribe() {
        let broker = broker();
        let key = AffinityKey::new("scheduler");
        let ghost = broker.sessions().resolve_ghost(&key);

        assert!(broker.subscribe_session("news", &ghost).is_none());
        assert!(broker.subscribe("news", &key).is_none());
        broker.publish("news", message("hi"));
        assert!(broker.poll(&key).is_empty());
    }

    #[test]
    fn test_remove_session_drops_subscriptions() {
        let broker = broker();
        let key = AffinityKey::new("t1");
        let sub = broker.subscribe("news", &key).unwrap();
        let session = sub.session();

        assert!(broker.remove_session(&session));
        assert!(!broker.remove_session(&session));
        assert_eq!(broker.channel_info("news").unwrap().subscribers, 0);
        assert!(broker.subscribe_session("news", &session).is_none());
    }

    #[test]
    fn test_unsubscribe() {
        let broker = broker();
        let key = AffinityKey::new("t1");
        broker.subscribe("a", &key);
        broker.subscribe("b", &key);
        let id = broker.sessions().resolve(&key, false).unwrap().id();

        assert!(broker.unsubscribe("a", &id));
        assert!(!broker.unsubscribe("a", &id));
        assert!(!broker.unsubscribe("missing", &id));
        assert_eq!(broker.remove_session_subscriptions(&id), 1);
    }

    #[test]
    fn test_change_identity_moves_subscriptions() {
        let broker = broker();
        let old_key = AffinityKey::new("old");
        let new_key = AffinityKey::new("new");

        broker.subscribe("news", &old_key);
        broker.change_identity(&old_key, "user-7", true);

        broker.subscribe("other", &new_key);
        let session = broker.change_identity(&new_key, "user-7", true);

        assert_eq!(broker.sessions().len(), 1);
        let news = broker.subscriber("news", "user-7").unwrap();
        assert!(Arc::ptr_eq(&news.session(), &session));

        broker.publish("news", message("hello user 7"));
        assert_eq!(broker.poll(&new_key).len(), 1);
        assert!(broker.poll(&old_key).is_empty());
    }

    #[test]
    fn test_search_is_exact_unless_configured() {
        let update = || {
            Payload::new(Origin::persistence("alice")).with_manipulation(
                Manipulation::update("Order", 1i64)
                    .with_record(Record::new().with_field("note", FieldValue::new("Rush delivery"))),
            )
        };
        let view = ViewParams::new("grid1").with_search("note=rush");

        let exact = broker();
        let key = AffinityKey::new("t1");
        exact.limit_subscriber("Order", &key, &view);
        exact.publish("Order", update());
        assert!(exact.poll(&key).is_empty());

        let relaxed = Broker::with_clock(
            BrokerConfig::new()
                .without_auto_sweep()
                .with_case_insensitive_search(true),
            Arc::new(ManualClock::new(1_000_000)),
        )
        .unwrap();
        relaxed.limit_subscriber("Order", &key, &view);
        relaxed.publish("Order", update());
        assert_eq!(relaxed.poll(&key).len(), 1);
    }

    #[test]
    fn test_shutdown_stops_polls() {
        let broker = broker();
        let key = AffinityKey::new("t1");
        broker.subscribe("news", &key);
        broker.publish("news", message("hi"));

        broker.shutdown();
        assert!(broker.is_shut_down());
        assert!(broker.poll(&key).is_empty());
    }

    #[test]
    fn test_poll_triggers_due_sweep() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let broker = Broker::with_clock(
            BrokerConfig::new()
                .with_retention(Duration::from_secs(60))
                .with_sweep_interval(Duration::from_secs(30)),
            clock.clone(),
        )
        .unwrap();

        let key = AffinityKey::new("t1");
        broker.subscribe("news", &key);
        broker.publish("news", message("old"));
        clock.advance(Duration::from_secs(20));
        assert_eq!(broker.poll(&key).len(), 1);
        assert_eq!(broker.metrics().sweeps_run(), 0);

        clock.advance(Duration::from_secs(100));
        broker.poll(&key);
        assert_eq!(broker.metrics().sweeps_run(), 1);
        assert_eq!(broker.channel_info("news").unwrap().payloads, 0);
    }
}
