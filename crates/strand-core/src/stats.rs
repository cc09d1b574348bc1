use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;

/// Connection counters for a single relay
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RelayCounters {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub events: u64,
}

/// Stats for relay connections and events received from the network
#[derive(Debug, Default, Clone, Serialize)]
pub struct RelayStats {
    /// Counters keyed by relay URL
    pub by_relay: HashMap<String, RelayCounters>,
    /// Total event count by kind
    pub by_kind_total: HashMap<u16, u64>,
    /// Total events received
    pub total_events: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&mut self, relay: &str) {
        self.by_relay.entry(relay.to_string()).or_default().attempts += 1;
    }

    pub fn record_success(&mut self, relay: &str) {
        self.by_relay.entry(relay.to_string()).or_default().successes += 1;
    }

    pub fn record_failure(&mut self, relay: &str) {
        self.by_relay.entry(relay.to_string()).or_default().failures += 1;
    }

    pub fn record_event(&mut self, relay: &str, kind: u16) {
        self.total_events += 1;
        *self.by_kind_total.entry(kind).or_insert(0) += 1;
        self.by_relay.entry(relay.to_string()).or_default().events += 1;
    }

    /// Get list of kinds sorted by total count (descending)
    pub fn kinds_by_count(&self) -> Vec<(u16, u64)> {
        let mut kinds: Vec<_> = self.by_kind_total.iter().map(|(&k, &c)| (k, c)).collect();
        kinds.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        kinds
    }
}

/// Thread-safe wrapper for relay stats
#[derive(Debug, Clone)]
pub struct SharedRelayStats {
    inner: Arc<RwLock<RelayStats>>,
}

impl Default for SharedRelayStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedRelayStats {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RelayStats::new())),
        }
    }

    pub fn record_attempt(&self, relay: &str) {
        if let Ok(mut stats) = self.inner.write() {
            stats.record_attempt(relay);
        }
    }

    pub fn record_success(&self, relay: &str) {
        if let Ok(mut stats) = self.inner.write() {
            stats.record_success(relay);
        }
    }

    pub fn record_failure(&self, relay: &str) {
        if let Ok(mut stats) = self.inner.write() {
            stats.record_failure(relay);
        }
    }

    pub fn record_event(&self, relay: &str, kind: u16) {
        if let Ok(mut stats) = self.inner.write() {
            stats.record_event(relay, kind);
        }
    }

    pub fn snapshot(&self) -> RelayStats {
        self.inner.read().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_per_relay() {
        let stats = SharedRelayStats::new();
        stats.record_attempt("wss://a");
        stats.record_failure("wss://a");
        stats.record_attempt("wss://a");
        stats.record_success("wss://a");
        stats.record_event("wss://a", 3);
        stats.record_event("wss://b", 1);
        stats.record_event("wss://b", 1);

        let snapshot = stats.snapshot();
        assert_eq!(
            snapshot.by_relay["wss://a"],
            RelayCounters {
                attempts: 2,
                successes: 1,
                failures: 1,
                events: 1
            }
        );
        assert_eq!(snapshot.total_events, 3);
        assert_eq!(snapshot.kinds_by_count(), vec![(1, 2), (3, 1)]);
    }
}
