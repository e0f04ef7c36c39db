//! View-scoped relevance filtering.
//!
//! At delivery time each payload copy is checked against the same search
//! predicate the subscriber's views used to fetch their current page, so
//! a row change outside a client's filtered view does not trigger a
//! refresh. Deletions always pass: a client must be able to drop a stale
//! row whatever its current predicate.

use std::sync::Arc;

use tracing::warn;

use tidings_proto::{Manipulation, Payload};

use super::subscriber::{Subscriber, ViewFilter};
use crate::error::Result;
use crate::metrics::BrokerMetrics;

/// Decides which manipulations of a payload are relevant to a subscriber.
#[derive(Debug, Clone)]
pub struct FilterMatcher {
    case_insensitive: bool,
    metrics: Arc<BrokerMetrics>,
}

impl FilterMatcher {
    pub fn new(case_insensitive: bool, metrics: Arc<BrokerMetrics>) -> Self {
        Self {
            case_insensitive,
            metrics,
        }
    }

    /// Rewrite a payload copy for one subscriber.
    ///
    /// Returns `None` when nothing in the payload concerns the subscriber's
    /// views. Payloads without manipulations, and subscribers without
    /// filters on the payload's channel, pass unchanged.
    pub fn filter(&self, subscriber: &Subscriber, mut payload: Payload) -> Option<Payload> {
        if !payload.has_manipulations() {
            return Some(payload);
        }

        let channel = payload.channel().unwrap_or(subscriber.channel());
        let filters = subscriber.filters_for(channel);
        if filters.is_empty() {
            return Some(payload);
        }

        let mut matched = Vec::new();
        for manipulation in &payload.manipulations {
            for filter in &filters {
                match self.matches(manipulation, filter) {
                    Ok(true) => matched.push(manipulation.for_view(&filter.view_id)),
                    Ok(false) => {}
                    Err(e) => {
                        self.metrics.record_filter_failure();
                        warn!(
                            channel = %filter.channel,
                            view_id = %filter.view_id,
                            entity = %manipulation.entity,
                            primary_key = %manipulation.primary_key,
                            error = %e,
                            "failed to evaluate view filter"
                        );
                    }
                }
            }
        }

        payload.manipulations = matched;
        if payload.manipulations.is_empty() {
            None
        } else {
            Some(payload)
        }
    }

    /// Whether a single manipulation belongs in a single view.
    pub fn matches(&self, manipulation: &Manipulation, filter: &ViewFilter) -> Result<bool> {
        if !manipulation.kind.is_upsert() {
            return Ok(true);
        }
        let expr = filter.expr()?;
        if expr.is_empty() {
            return Ok(true);
        }
        Ok(expr.matches(&manipulation.record, self.case_insensitive)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{AffinityKey, SessionContext};
    use tidings_proto::{FieldValue, Message, Origin, Record, ViewParams};

    fn matcher() -> FilterMatcher {
        FilterMatcher::new(true, Arc::new(BrokerMetrics::new()))
    }

    fn subscriber() -> Subscriber {
        let session = Arc::new(SessionContext::new("s1", Some(AffinityKey::new("t1")), false));
        Subscriber::new("Order", session, 0)
    }

    fn order(kind: fn(&str, i64) -> Manipulation, id: i64, status: &str) -> Manipulation {
        kind("Order", id).with_record(Record::new().with_field("status", FieldValue::new(status)))
    }

    fn published(manipulations: Vec<Manipulation>) -> Payload {
        let mut payload = Payload::new(Origin::persistence("alice"));
        payload.manipulations = manipulations;
        payload.origin.channel = Some("Order".into());
        payload
    }

    fn insert(entity: &str, id: i64) -> Manipulation {
        Manipulation::insert(entity, id)
    }

    fn update(entity: &str, id: i64) -> Manipulation {
        Manipulation::update(entity, id)
    }

    fn delete(entity: &str, id: i64) -> Manipulation {
        Manipulation::delete(entity, id)
    }

    fn limit(sub: &Subscriber, view: &str, search: &str) {
        sub.set_filter(ViewFilter::new("Order", &ViewParams::new(view).with_search(search)));
    }

    #[test]
    fn test_message_only_payload_passes() {
        let sub = subscriber();
        limit(&sub, "grid1", "status=open");
        let payload = Payload::new(Origin::system()).with_message(Message::info("hello"));

        let out = matcher().filter(&sub, payload.clone()).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn test_unfiltered_subscriber_receives_everything() {
        let sub = subscriber();
        let payload = published(vec![order(update, 1, "closed")]);

        let out = matcher().filter(&sub, payload).unwrap();
        assert_eq!(out.manipulations.len(), 1);
        assert!(out.manipulations[0].target_view.is_none());
    }

    #[test]
    fn test_non_matching_update_is_dropped() {
        let sub = subscriber();
        limit(&sub, "grid1", "status=open");

        assert!(matcher()
            .filter(&sub, published(vec![order(update, 1, "closed")]))
            .is_none());
    }

    #[test]
    fn test_matching_insert_is_tagged() {
        let sub = subscriber();
        limit(&sub, "grid1", "status=open");

        let out = matcher()
            .filter(&sub, published(vec![order(insert, 1, "open")]))
            .unwrap();
        assert_eq!(out.manipulations[0].target_view.as_deref(), Some("grid1"));
    }

    #[test]
    fn test_delete_always_matches() {
        let sub = subscriber();
        limit(&sub, "grid1", "status=no-such-status");

        let out = matcher()
            .filter(&sub, published(vec![order(delete, 1, "closed")]))
            .unwrap();
        assert_eq!(out.manipulations.len(), 1);
        assert_eq!(out.manipulations[0].target_view.as_deref(), Some("grid1"));
    }

    #[test]
    fn test_empty_search_matches() {
        let sub = subscriber();
        limit(&sub, "grid1", "");

        let out = matcher()
            .filter(&sub, published(vec![order(update, 1, "anything")]))
            .unwrap();
        assert_eq!(out.manipulations[0].target_view.as_deref(), Some("grid1"));
    }

    #[test]
    fn test_one_copy_per_matching_view() {
        let sub = subscriber();
        limit(&sub, "grid1", "status=open");
        limit(&sub, "grid2", "status=open|closed");
        limit(&sub, "chart1", "status=closed");

        let out = matcher()
            .filter(&sub, published(vec![order(update, 1, "open")]))
            .unwrap();
        let views: Vec<_> = out
            .manipulations
            .iter()
            .map(|m| m.target_view.clone().unwrap())
            .collect();
        assert_eq!(views, vec!["grid1", "grid2"]);
    }

    #[test]
    fn test_only_relevant_manipulations_survive() {
        let sub = subscriber();
        limit(&sub, "grid1", "status=open");

        let out = matcher()
            .filter(
                &sub,
                published(vec![
                    order(update, 1, "closed"),
                    order(update, 2, "open"),
                    order(delete, 3, "closed"),
                ]),
            )
            .unwrap();
        let keys: Vec<_> = out
            .manipulations
            .iter()
            .map(|m| m.primary_key.as_i64().unwrap())
            .collect();
        assert_eq!(keys, vec![2, 3]);
    }

    #[test]
    fn test_failure_does_not_abort_other_filters() {
        let metrics = Arc::new(BrokerMetrics::new());
        let matcher = FilterMatcher::new(true, metrics.clone());
        let sub = subscriber();
        limit(&sub, "broken", "status");
        limit(&sub, "missing", "region=eu");
        limit(&sub, "grid1", "status=open");

        let out = matcher
            .filter(&sub, published(vec![order(update, 1, "open"), order(update, 2, "open")]))
            .unwrap();
        assert_eq!(out.manipulations.len(), 2);
        assert!(out
            .manipulations
            .iter()
            .all(|m| m.target_view.as_deref() == Some("grid1")));
        assert_eq!(metrics.filter_failures(), 4);
    }

    #[test]
    fn test_filtering_is_deterministic() {
        let sub = subscriber();
        limit(&sub, "grid1", "status=open");
        let payload = published(vec![order(update, 1, "open"), order(update, 2, "closed")]);

        let m = matcher();
        let first = m.filter(&sub, payload.clone());
        let second = m.filter(&sub, payload);
        assert_eq!(first, second);
    }
}
