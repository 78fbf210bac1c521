//! Monthly per-API call counters with soft limits

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::store::UsageStore;
use crate::error::Result;
use crate::models::{month_key, CostEstimate, UsageState, UsageStatus, UsageSummaryEntry};

/// Source of "now"; injectable so month rollover can be tested
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Approximate per-call price in USD; absent APIs are free
const CALL_COSTS: &[(&str, f64)] = &[("gamalytic", 0.01), ("openai", 0.03)];

/// Counts calls per API and reports them against monthly limits
pub struct UsageTracker {
    store: Arc<dyn UsageStore>,
    limits: BTreeMap<String, Option<u64>>,
    clock: Clock,
    state: Mutex<UsageState>,
}

impl UsageTracker {
    /// Load (or create) counters from the store using the wall clock
    pub fn new(store: Arc<dyn UsageStore>, limits: BTreeMap<String, Option<u64>>) -> Result<Self> {
        Self::with_clock(store, limits, Arc::new(Utc::now))
    }

    /// Load (or create) counters using a custom clock
    pub fn with_clock(
        store: Arc<dyn UsageStore>,
        limits: BTreeMap<String, Option<u64>>,
        clock: Clock,
    ) -> Result<Self> {
        let now = clock();
        let state = match store.load()? {
            Some(mut state) if state.month == month_key(now) => {
                for api in limits.keys() {
                    state.usage.entry(api.clone()).or_insert(0);
                }
                state
            }
            Some(stale) => {
                info!(old = %stale.month, new = %month_key(now), "New month, resetting API usage counters");
                let fresh = UsageState::fresh(limits.keys().map(String::as_str), now);
                store.save(&fresh)?;
                fresh
            }
            None => UsageState::fresh(limits.keys().map(String::as_str), now),
        };

        Ok(Self {
            store,
            limits,
            clock,
            state: Mutex::new(state),
        })
    }

    /// Record `count` calls to `api` and persist immediately
    pub fn track(&self, api: &str, count: u64) {
        let api = api.to_ascii_lowercase();
        let Some(limit) = self.limits.get(&api).copied() else {
            debug!(api = %api, "Ignoring usage for untracked API");
            return;
        };

        let mut state = self.state.lock();
        self.roll_month(&mut state);
        let current = {
            let slot = state.usage.entry(api.clone()).or_insert(0);
            *slot += count;
            *slot
        };
        if let Err(e) = self.store.save(&state) {
            warn!(api = %api, error = %e, "Failed to save API usage data");
        }
        drop(state);

        let Some(limit) = limit else { return };
        let percentage = percent_of(current, limit);
        if percentage >= 90.0 {
            warn!(api = %api, usage = current, limit, "CRITICAL: {} API usage at {:.1}%", api.to_uppercase(), percentage);
        } else if percentage >= 75.0 {
            warn!(api = %api, usage = current, limit, "{} API usage at {:.1}%", api.to_uppercase(), percentage);
        } else if percentage >= 50.0 {
            info!(api = %api, usage = current, limit, "{} API usage at {:.1}%", api.to_uppercase(), percentage);
        }
    }

    /// Usage for every tracked API
    pub fn summary(&self) -> BTreeMap<String, UsageSummaryEntry> {
        let mut state = self.state.lock();
        self.roll_month(&mut state);
        state
            .usage
            .iter()
            .filter_map(|(api, usage)| {
                let limit = *self.limits.get(api)?;
                let entry = match limit {
                    Some(limit) => {
                        let raw = percent_of(*usage, limit);
                        UsageSummaryEntry {
                            usage: *usage,
                            limit: Some(limit),
                            percentage: round1(raw),
                            remaining: Some(limit.saturating_sub(*usage)),
                            status: UsageStatus::from_percentage(raw),
                        }
                    }
                    None => UsageSummaryEntry {
                        usage: *usage,
                        limit: None,
                        percentage: 0.0,
                        remaining: None,
                        status: UsageStatus::Unlimited,
                    },
                };
                Some((api.clone(), entry))
            })
            .collect()
    }

    /// Current count for one API
    pub fn usage(&self, api: &str) -> u64 {
        self.state
            .lock()
            .usage
            .get(&api.to_ascii_lowercase())
            .copied()
            .unwrap_or(0)
    }

    /// Zero every counter and stamp the current month
    pub fn reset(&self) -> Result<()> {
        let fresh = UsageState::fresh(self.limits.keys().map(String::as_str), (self.clock)());
        self.store.reset()?;
        self.store.save(&fresh)?;
        info!(month = %fresh.month, "API usage counters reset");
        *self.state.lock() = fresh;
        Ok(())
    }

    /// Approximate spend for this month
    pub fn cost_estimate(&self) -> CostEstimate {
        let state = self.state.lock();
        let individual_costs: BTreeMap<String, f64> = self
            .limits
            .keys()
            .map(|api| {
                let per_call = CALL_COSTS
                    .iter()
                    .find(|(name, _)| name == api)
                    .map_or(0.0, |(_, cost)| *cost);
                let calls = state.usage.get(api).copied().unwrap_or(0);
                (api.clone(), calls as f64 * per_call)
            })
            .collect();
        let total: f64 = individual_costs.values().sum();

        CostEstimate {
            individual_costs,
            total_estimated: (total * 100.0).round() / 100.0,
            currency: "USD".to_string(),
        }
    }

    /// When counters were last zeroed
    pub fn last_reset(&self) -> DateTime<Utc> {
        self.state.lock().last_reset
    }

    fn roll_month(&self, state: &mut UsageState) {
        let now = (self.clock)();
        if state.month != month_key(now) {
            info!(old = %state.month, new = %month_key(now), "New month, resetting API usage counters");
            *state = UsageState::fresh(self.limits.keys().map(String::as_str), now);
        }
    }
}

impl std::fmt::Debug for UsageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageTracker")
            .field("limits", &self.limits)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

fn percent_of(usage: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 100.0;
    }
    usage as f64 / limit as f64 * 100.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UsageConfig;
    use crate::usage::MemoryUsageStore;
    use pretty_assertions::assert_eq;

    fn at(ts: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc)
    }

    fn tracker_at(store: Arc<MemoryUsageStore>, ts: &'static str) -> UsageTracker {
        UsageTracker::with_clock(store, UsageConfig::default().limits, Arc::new(move || at(ts)))
            .unwrap()
    }

    #[test]
    fn test_track_accumulates_and_persists() {
        let store = Arc::new(MemoryUsageStore::new());
        let tracker = tracker_at(store.clone(), "2026-10-18T10:00:00Z");
        for _ in 0..5 {
            tracker.track("rawg", 1);
        }
        assert_eq!(tracker.usage("rawg"), 5);
        assert_eq!(store.snapshot().unwrap().usage["rawg"], 5);
    }

    #[test]
    fn test_critical_at_ninety_percent() {
        let tracker = tracker_at(Arc::new(MemoryUsageStore::new()), "2026-10-18T10:00:00Z");
        tracker.track("gamalytic", 900);
        let summary = tracker.summary();
        let entry = &summary["gamalytic"];
        assert_eq!(entry.status, UsageStatus::Critical);
        assert_eq!(entry.percentage, 90.0);
        assert_eq!(entry.remaining, Some(100));
    }

    #[test]
    fn test_status_uses_unrounded_percentage() {
        let tracker = tracker_at(Arc::new(MemoryUsageStore::new()), "2026-10-18T10:00:00Z");
        tracker.track("rawg", 17_999);
        let entry = &tracker.summary()["rawg"];
        assert_eq!(entry.limit, Some(20_000));
        assert_eq!(entry.percentage, 90.0);
        assert_eq!(entry.status, UsageStatus::Warning);

        tracker.track("rawg", 1);
        assert_eq!(tracker.summary()["rawg"].status, UsageStatus::Critical);
    }

    #[test]
    fn test_unlimited_apis() {
        let tracker = tracker_at(Arc::new(MemoryUsageStore::new()), "2026-10-18T10:00:00Z");
        tracker.track("Steam", 12);
        let entry = &tracker.summary()["steam"];
        assert_eq!(entry.usage, 12);
        assert_eq!(entry.limit, None);
        assert_eq!(entry.status, UsageStatus::Unlimited);
        assert_eq!(entry.remaining, None);
    }

    #[test]
    fn test_unknown_api_is_ignored() {
        let store = Arc::new(MemoryUsageStore::new());
        let tracker = tracker_at(store.clone(), "2026-10-18T10:00:00Z");
        tracker.track("myspace", 3);
        assert!(!tracker.summary().contains_key("myspace"));
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let tracker = tracker_at(Arc::new(MemoryUsageStore::new()), "2026-10-18T10:00:00Z");
        tracker.track("rawg", 10);
        tracker.track("openai", 2);
        tracker.reset().unwrap();
        assert!(tracker.summary().values().all(|entry| entry.usage == 0));
    }

    #[test]
    fn test_stale_month_is_reset_on_load() {
        let mut old = UsageState::fresh(["rawg"], at("2026-09-30T23:59:00Z"));
        old.usage.insert("rawg".into(), 400);
        let store = Arc::new(MemoryUsageStore::with_state(old));

        let tracker = tracker_at(store.clone(), "2026-10-01T00:00:01Z");
        assert_eq!(tracker.usage("rawg"), 0);
        assert_eq!(store.snapshot().unwrap().month, "2026-10");
    }

    #[test]
    fn test_same_month_state_is_kept() {
        let mut old = UsageState::fresh(["rawg"], at("2026-10-02T00:00:00Z"));
        old.usage.insert("rawg".into(), 400);
        let store = Arc::new(MemoryUsageStore::with_state(old));

        let tracker = tracker_at(store, "2026-10-18T00:00:00Z");
        assert_eq!(tracker.usage("rawg"), 400);
        assert_eq!(tracker.summary()["gamalytic"].usage, 0);
    }

    #[test]
    fn test_cost_estimate() {
        let tracker = tracker_at(Arc::new(MemoryUsageStore::new()), "2026-10-18T10:00:00Z");
        tracker.track("gamalytic", 150);
        tracker.track("openai", 10);
        tracker.track("rawg", 1000);
        let cost = tracker.cost_estimate();
        assert_eq!(cost.currency, "USD");
        assert_eq!(cost.total_estimated, 1.8);
        assert_eq!(cost.individual_costs["rawg"], 0.0);
    }
}
