//! Broker counters.
//!
//! Counters use relaxed atomics; readers get a best-effort view, which is
//! all an operator dashboard needs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Delivery and retention counters for one broker instance.
#[derive(Debug)]
pub struct BrokerMetrics {
    started_at: Instant,

    // Publish side
    payloads_published: AtomicU64,

    // Poll side
    polls_served: AtomicU64,
    polls_abandoned: AtomicU64,
    payloads_delivered: AtomicU64,
    payloads_filtered: AtomicU64,
    filter_failures: AtomicU64,

    // Retention
    sweeps_run: AtomicU64,
    sweeps_skipped: AtomicU64,
    payloads_swept: AtomicU64,
}

/// Point-in-time copy of [`BrokerMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub payloads_published: u64,
    pub polls_served: u64,
    pub polls_abandoned: u64,
    pub payloads_delivered: u64,
    pub payloads_filtered: u64,
    pub filter_failures: u64,
    pub sweeps_run: u64,
    pub sweeps_skipped: u64,
    pub payloads_swept: u64,
}

impl BrokerMetrics {
    /// Create a zeroed metrics set.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            payloads_published: AtomicU64::new(0),
            polls_served: AtomicU64::new(0),
            polls_abandoned: AtomicU64::new(0),
            payloads_delivered: AtomicU64::new(0),
            payloads_filtered: AtomicU64::new(0),
            filter_failures: AtomicU64::new(0),
            sweeps_run: AtomicU64::new(0),
            sweeps_skipped: AtomicU64::new(0),
            payloads_swept: AtomicU64::new(0),
        }
    }

    pub fn record_publish(&self) {
        self.payloads_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed poll and how many payloads it returned.
    pub fn record_poll(&self, delivered: u64) {
        self.polls_served.fetch_add(1, Ordering::Relaxed);
        self.payloads_delivered.fetch_add(delivered, Ordering::Relaxed);
    }

    /// Record a poll that gave up waiting for a sweep or was cancelled.
    pub fn record_poll_abandoned(&self) {
        self.polls_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtered(&self) {
        self.payloads_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filter_failure(&self) {
        self.filter_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a sweep that ran and the number of payloads it removed.
    pub fn record_sweep(&self, removed: u64) {
        self.sweeps_run.fetch_add(1, Ordering::Relaxed);
        self.payloads_swept.fetch_add(removed, Ordering::Relaxed);
    }

    pub fn record_sweep_skipped(&self) {
        self.sweeps_skipped.fetch_add(1, Ordering::Relaxed);
    }

    // Getters

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn payloads_published(&self) -> u64 {
        self.payloads_published.load(Ordering::Relaxed)
    }

    pub fn polls_served(&self) -> u64 {
        self.polls_served.load(Ordering::Relaxed)
    }

    pub fn polls_abandoned(&self) -> u64 {
        self.polls_abandoned.load(Ordering::Relaxed)
    }

    pub fn payloads_delivered(&self) -> u64 {
        self.payloads_delivered.load(Ordering::Relaxed)
    }

    pub fn payloads_filtered(&self) -> u64 {
        self.payloads_filtered.load(Ordering::Relaxed)
    }

    pub fn filter_failures(&self) -> u64 {
        self.filter_failures.load(Ordering::Relaxed)
    }

    pub fn sweeps_run(&self) -> u64 {
        self.sweeps_run.load(Ordering::Relaxed)
    }

    pub fn sweeps_skipped(&self) -> u64 {
        self.sweeps_skipped.load(Ordering::Relaxed)
    }

    pub fn payloads_swept(&self) -> u64 {
        self.payloads_swept.load(Ordering::Relaxed)
    }

    /// Copy every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            payloads_published: self.payloads_published(),
            polls_served: self.polls_served(),
            polls_abandoned: self.polls_abandoned(),
            payloads_delivered: self.payloads_delivered(),
            payloads_filtered: self.payloads_filtered(),
            filter_failures: self.filter_failures(),
            sweeps_run: self.sweeps_run(),
            sweeps_skipped: self.sweeps_skipped(),
            payloads_swept: self.payloads_swept(),
        }
    }

    /// Export to Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let counters = [
            ("payloads_published_total", "Payloads appended to channel logs", snapshot.payloads_published),
            ("polls_total", "Polls served", snapshot.polls_served),
            ("polls_abandoned_total", "Polls that returned empty while waiting on a sweep", snapshot.polls_abandoned),
            ("payloads_delivered_total", "Payload copies returned by polls", snapshot.payloads_delivered),
            ("payloads_filtered_total", "Payload copies dropped by view filters", snapshot.payloads_filtered),
            ("filter_failures_total", "Manipulation/filter evaluations that failed", snapshot.filter_failures),
            ("sweeps_total", "Retention sweeps that ran", snapshot.sweeps_run),
            ("sweeps_skipped_total", "Retention sweeps skipped because one was running", snapshot.sweeps_skipped),
            ("payloads_swept_total", "Payloads removed by retention sweeps", snapshot.payloads_swept),
        ];

        let mut out = String::new();
        out.push_str("# HELP tidings_uptime_seconds Broker uptime in seconds\n");
        out.push_str("# TYPE tidings_uptime_seconds gauge\n");
        out.push_str(&format!("tidings_uptime_seconds {}\n\n", snapshot.uptime_secs));

        for (name, help, value) in counters {
            out.push_str(&format!("# HELP tidings_{} {}\n", name, help));
            out.push_str(&format!("# TYPE tidings_{} counter\n", name));
            out.push_str(&format!("tidings_{} {}\n\n", name, value));
        }

        out
    }
}

impl Default for BrokerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
