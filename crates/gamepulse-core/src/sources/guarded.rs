//! Circuit breaker, rate limit and timeout around a source client

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::breaker::CircuitBreaker;
use super::SourceClient;
use crate::config::ClientConfig;
use crate::error::UpstreamError;
use crate::models::Platform;

/// A source client that refuses disabled endpoints, spaces out requests and
/// bounds how long one call may take
///
/// The breaker only sees transport-level outcomes. A payload that arrives
/// intact but reports `{"success": false}` is a successful call here; the
/// retriever turns it into an error afterwards.
pub struct GuardedClient {
    inner: Arc<dyn SourceClient>,
    breaker: CircuitBreaker,
    min_interval: Duration,
    timeout: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl GuardedClient {
    /// Wrap `inner` with the breaker threshold, interval and timeout of `config`
    pub fn new(inner: Arc<dyn SourceClient>, config: &ClientConfig) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(config.breaker_threshold),
            min_interval: config.min_request_interval,
            timeout: config.timeout,
            last_call: Mutex::new(None),
        }
    }

    /// Platform of the wrapped client
    pub fn platform(&self) -> Platform {
        self.inner.platform()
    }

    /// Per-endpoint failure state
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Call `method`, treating the method name as the breaker endpoint
    pub async fn call(
        &self,
        method: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, UpstreamError> {
        let platform = self.platform();
        if !self.breaker.call_allowed(method) {
            warn!(platform = %platform, endpoint = %method, "Skipping disabled endpoint");
            return Err(UpstreamError::EndpointDisabled(method.to_string()));
        }

        self.throttle().await;
        debug!(platform = %platform, endpoint = %method, "Calling source");

        let result = match tokio::time::timeout(self.timeout, self.inner.invoke(method, args)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(self.timeout)),
        };

        match &result {
            Ok(_) => self.breaker.record_success(method),
            Err(e) if e.trips_breaker() => {
                warn!(platform = %platform, endpoint = %method, error = %e, "Source call failed");
                self.breaker.record_failure(method);
            }
            Err(e) => debug!(platform = %platform, endpoint = %method, error = %e, "Source reported failure"),
        }
        result
    }

    /// Wait until at least `min_interval` has passed since the previous call
    async fn throttle(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
