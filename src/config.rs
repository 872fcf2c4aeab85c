use std::time::Duration;

/// Broker configuration.
///
/// All values are fixed for the lifetime of the [`Broker`](crate::Broker) they
/// are passed to. Use the builder methods to customize, or [`Default`] for
/// sensible defaults.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use switchboard::Config;
///
/// let config = Config::default()
///     .with_max_history(250)                          // keep a shorter audit log
///     .with_sweep_interval(Duration::from_secs(10))   // drop expired mail sooner
///     .with_mailbox_capacity(512);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Whether sent envelopes are retained in the in-memory history.
    /// Default: true
    pub history_enabled: bool,

    /// Maximum number of envelopes kept in history. Oldest entries are evicted
    /// first.
    /// Default: 1000
    pub max_history: usize,

    /// How often the background sweep drops expired envelopes from mailboxes.
    /// Default: 60 s
    pub sweep_interval: Duration,

    /// How often the throughput gauge samples the total message count.
    /// Default: 5 s
    pub stats_interval: Duration,

    /// Maximum number of envelopes waiting in a single mailbox. Deliveries to a
    /// full mailbox fail for that recipient only.
    /// Default: 10 000
    pub mailbox_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            history_enabled: true,
            max_history: 1000,
            sweep_interval: Duration::from_secs(60),
            stats_interval: Duration::from_secs(5),
            mailbox_capacity: 10_000,
        }
    }
}

impl Config {
    /// Enable or disable message history.
    ///
    /// With history disabled [`Broker::get_messages`](crate::Broker::get_messages)
    /// always returns an empty list.
    pub fn with_history(mut self, enabled: bool) -> Self {
        self.history_enabled = enabled;
        self
    }

    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history = max;
        self
    }

    /// Set the expiry sweep period. Values below 1 ms are raised to 1 ms.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Set the throughput sampling period. Values below 1 ms are raised to 1 ms.
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Set the per-agent mailbox capacity.
    ///
    /// Larger capacities tolerate slower consumers at the cost of memory.
    /// A capacity of `0` is raised to `1`.
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.history_enabled);
        assert_eq!(config.max_history, 1000);
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.stats_interval, Duration::from_secs(5));
    }

    #[test]
    fn builder_clamps_degenerate_values() {
        let config = Config::default()
            .with_mailbox_capacity(0)
            .with_sweep_interval(Duration::ZERO)
            .with_stats_interval(Duration::ZERO);
        assert_eq!(config.mailbox_capacity, 1);
        assert_eq!(config.sweep_interval, Duration::from_millis(1));
        assert_eq!(config.stats_interval, Duration::from_millis(1));
    }
}
