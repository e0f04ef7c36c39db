//! Broker configuration.

use std::time::Duration;

use clap::Args;

use crate::error::{Error, Result};

/// Default retention horizon in seconds (10 minutes).
pub const DEFAULT_RETENTION_SECS: u64 = 600;

/// Default minimum time between poll-triggered sweeps, in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default pause between checks while a poll waits out a sweep.
pub const DEFAULT_POLL_RETRY_DELAY_MS: u64 = 50;

/// Default number of waits before a poll gives up for this cycle.
pub const DEFAULT_POLL_RETRY_LIMIT: u32 = 20;

/// Change broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Maximum age a payload is kept in a channel log.
    pub retention: Duration,

    /// Minimum time between sweeps triggered from `poll`. None disables
    /// poll-triggered sweeping.
    pub sweep_interval: Option<Duration>,

    /// Pause between checks while a poll waits for a running sweep.
    pub poll_retry_delay: Duration,

    /// Number of waits before a poll returns empty for this cycle.
    pub poll_retry_limit: u32,

    /// Whether string search clauses ignore case. Off by default, so
    /// clauses compare exactly.
    pub case_insensitive_search: bool,
}

impl BrokerConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self {
            retention: Duration::from_secs(DEFAULT_RETENTION_SECS),
            sweep_interval: Some(Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS)),
            poll_retry_delay: Duration::from_millis(DEFAULT_POLL_RETRY_DELAY_MS),
            poll_retry_limit: DEFAULT_POLL_RETRY_LIMIT,
            case_insensitive_search: false,
        }
    }

    /// Set the retention horizon.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Set the poll-triggered sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Disable poll-triggered sweeping.
    pub fn without_auto_sweep(mut self) -> Self {
        self.sweep_interval = None;
        self
    }

    /// Set how long and how often a poll waits for a running sweep.
    pub fn with_poll_retry(mut self, delay: Duration, limit: u32) -> Self {
        self.poll_retry_delay = delay;
        self.poll_retry_limit = limit;
        self
    }

    /// Set whether string clauses ignore case.
    pub fn with_case_insensitive_search(mut self, enabled: bool) -> Self {
        self.case_insensitive_search = enabled;
        self
    }

    /// Check if poll-triggered sweeping is enabled.
    pub fn has_auto_sweep(&self) -> bool {
        self.sweep_interval.is_some()
    }

    /// Total time a poll may spend waiting for a sweep.
    pub fn max_poll_wait(&self) -> Duration {
        self.poll_retry_delay * self.poll_retry_limit
    }

    /// Reject settings the broker cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.retention.is_zero() {
            return Err(Error::Config("retention must be greater than zero".into()));
        }
        if matches!(self.sweep_interval, Some(interval) if interval.is_zero()) {
            return Err(Error::Config(
                "sweep interval must be greater than zero (use without_auto_sweep to disable)"
                    .into(),
            ));
        }
        Ok(())
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Command-line arguments for embedding the broker in a host binary.
#[derive(Args, Debug, Clone)]
pub struct BrokerArgs {
    /// Payload retention horizon in seconds.
    #[arg(long, default_value_t = DEFAULT_RETENTION_SECS)]
    pub retention_secs: u64,

    /// Minimum seconds between poll-triggered sweeps. Set to 0 to disable.
    #[arg(long, default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
    pub sweep_interval_secs: u64,

    /// Milliseconds a poll sleeps between checks while a sweep runs.
    #[arg(long, default_value_t = DEFAULT_POLL_RETRY_DELAY_MS)]
    pub poll_retry_delay_ms: u64,

    /// Checks before a waiting poll gives up for this cycle.
    #[arg(long, default_value_t = DEFAULT_POLL_RETRY_LIMIT)]
    pub poll_retry_limit: u32,

    /// Match string search clauses ignoring case.
    #[arg(long)]
    pub case_insensitive_search: bool,
}

impl BrokerArgs {
    /// Convert command-line arguments to broker configuration.
    pub fn into_config(self) -> BrokerConfig {
        let sweep_interval = if self.sweep_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.sweep_interval_secs))
        };

        BrokerConfig {
            retention: Duration::from_secs(self.retention_secs),
            sweep_interval,
            poll_retry_delay: Duration::from_millis(self.poll_retry_delay_ms),
            poll_retry_limit: self.poll_retry_limit,
            case_insensitive_search: self.case_insensitive_search,
        }
    }
}
