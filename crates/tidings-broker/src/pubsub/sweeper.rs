//! Retention sweeping.
//!
//! Channel logs grow with every mutation. A sweep trims every log to the
//! retention horizon. Only one sweep runs at a time; a caller that finds
//! one running skips its own instead of waiting.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::broker::Broker;

/// Outcome of one sweep call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepResult {
    /// Payloads removed across all channels.
    pub payloads_removed: u64,

    /// Subscribers dropped because their session was gone.
    pub subscribers_pruned: u64,

    /// Channels visited.
    pub channels_scanned: u64,

    /// Duration of the sweep.
    pub duration: Duration,

    /// True when another sweep held the permit and nothing was done.
    pub skipped: bool,
}

impl SweepResult {
    pub(crate) fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    /// Check if any cleanup was performed.
    pub fn did_cleanup(&self) -> bool {
        self.payloads_removed > 0 || self.subscribers_pruned > 0
    }
}

/// Single-permit gate for sweeps, plus the time of the last one.
#[derive(Debug)]
pub struct Sweeper {
    busy: AtomicBool,
    last_sweep: AtomicU64,
}

/// Holds the sweep permit until dropped.
#[derive(Debug)]
pub struct SweepGuard<'a> {
    sweeper: &'a Sweeper,
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.sweeper.busy.store(false, Ordering::Release);
    }
}

impl Sweeper {
    pub(crate) fn new(now: u64) -> Self {
        Self {
            busy: AtomicBool::new(false),
            last_sweep: AtomicU64::new(now),
        }
    }

    /// Take the permit without blocking. `None` means a sweep is running.
    pub fn try_acquire(&self) -> Option<SweepGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .ok()
            .map(|_| SweepGuard { sweeper: self })
    }

    /// Whether a sweep currently holds the permit.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Time (microseconds) the last sweep started.
    pub fn last_sweep(&self) -> u64 {
        self.last_sweep.load(Ordering::Acquire)
    }

    /// Whether at least `interval` has passed since the last sweep.
    pub fn is_due(&self, now: u64, interval: Duration) -> bool {
        now.saturating_sub(self.last_sweep()) >= interval.as_micros() as u64
    }

    pub(crate) fn mark(&self, now: u64) {
        self.last_sweep.store(now, Ordering::Release);
    }
}

/// Background task that sweeps on a fixed interval until the broker shuts
/// down.
pub async fn sweep_task(broker: Arc<Broker>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if broker.is_shut_down() {
            debug!("sweep task stopping");
            break;
        }
        broker.sweep_expired();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_permit() {
        let sweeper = Sweeper::new(0);
        let guard = sweeper.try_acquire().unwrap();
        assert!(sweeper.is_busy());
        assert!(sweeper.try_acquire().is_none());

        drop(guard);
        assert!(!sweeper.is_busy());
        assert!(sweeper.try_acquire().is_some());
    }

    #[test]
    fn test_is_due() {
        let sweeper = Sweeper::new(1_000_000);
        assert!(!sweeper.is_due(1_500_000, Duration::from_secs(1)));
        assert!(sweeper.is_due(2_000_000, Duration::from_secs(1)));

        sweeper.mark(2_000_000);
        assert!(!sweeper.is_due(2_500_000, Duration::from_secs(1)));
        assert_eq!(sweeper.last_sweep(), 2_000_000);
    }

    #[test]
    fn test_skipped_result() {
        let result = SweepResult::skipped();
        assert!(result.skipped);
        assert!(!result.did_cleanup());
        assert_eq!(result.payloads_removed, 0);
    }
}
