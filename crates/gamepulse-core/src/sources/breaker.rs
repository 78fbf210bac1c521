//! Per-endpoint failure isolation

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct BreakerState {
    failure_counts: HashMap<String, u32>,
    disabled: HashSet<String>,
}

/// Disables an endpoint after a number of consecutive failures
///
/// There is no time-based recovery: a disabled endpoint stays disabled until
/// [`CircuitBreaker::reset`] is called or the process restarts.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Default number of failures before an endpoint is disabled
    pub const DEFAULT_THRESHOLD: u32 = 3;

    /// Breaker disabling an endpoint after `threshold` failures (at least one)
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Whether `endpoint` is still enabled
    pub fn call_allowed(&self, endpoint: &str) -> bool {
        !self.state.lock().disabled.contains(endpoint)
    }

    /// Count a failure and disable the endpoint at the threshold
    pub fn record_failure(&self, endpoint: &str) {
        let mut state = self.state.lock();
        let count = state.failure_counts.entry(endpoint.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        if count >= self.threshold && state.disabled.insert(endpoint.to_string()) {
            warn!(
                endpoint = %endpoint,
                failures = count,
                "Endpoint disabled after repeated failures"
            );
        }
    }

    /// Clears the failure count; a disabled endpoint stays disabled
    pub fn record_success(&self, endpoint: &str) {
        self.state.lock().failure_counts.remove(endpoint);
    }

    /// Re-enable one endpoint, or all of them
    pub fn reset(&self, endpoint: Option<&str>) {
        let mut state = self.state.lock();
        match endpoint {
            Some(endpoint) => {
                state.failure_counts.remove(endpoint);
                state.disabled.remove(endpoint);
                info!(endpoint = %endpoint, "Circuit breaker reset");
            }
            None => {
                state.failure_counts.clear();
                state.disabled.clear();
                info!("Circuit breaker reset for all endpoints");
            }
        }
    }

    /// Failures recorded since the last success or reset
    pub fn failure_count(&self, endpoint: &str) -> u32 {
        self.state
            .lock()
            .failure_counts
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }

    /// Currently disabled endpoints, sorted
    pub fn disabled_endpoints(&self) -> Vec<String> {
        let mut disabled: Vec<_> = self.state.lock().disabled.iter().cloned().collect();
        disabled.sort();
        disabled
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_after_three_failures() {
        let breaker = CircuitBreaker::default();
        breaker.record_failure("get_top_games");
        breaker.record_failure("get_top_games");
        assert!(breaker.call_allowed("get_top_games"));
        breaker.record_failure("get_top_games");
        assert!(!breaker.call_allowed("get_top_games"));
        assert!(breaker.call_allowed("get_game_details"));
    }

    #[test]
    fn test_reset_reenables() {
        let breaker = CircuitBreaker::default();
        for _ in 0..3 {
            breaker.record_failure("a");
            breaker.record_failure("b");
        }
        breaker.reset(Some("a"));
        assert!(breaker.call_allowed("a"));
        assert!(!breaker.call_allowed("b"));
        assert_eq!(breaker.failure_count("a"), 0);

        breaker.reset(None);
        assert!(breaker.call_allowed("b"));
        assert!(breaker.disabled_endpoints().is_empty());
    }

    #[test]
    fn test_success_clears_count_but_not_disabled() {
        let breaker = CircuitBreaker::default();
        breaker.record_failure("a");
        breaker.record_failure("a");
        breaker.record_success("a");
        breaker.record_failure("a");
        assert!(breaker.call_allowed("a"));
        assert_eq!(breaker.failure_count("a"), 1);

        breaker.record_failure("a");
        breaker.record_failure("a");
        assert!(!breaker.call_allowed("a"));
        breaker.record_success("a");
        assert!(!breaker.call_allowed("a"));
    }
}
