//! API usage models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted counter state, one document per store
///
/// Schema: `{month: "YYYY-MM", usage: {api: int}, last_reset: isoformat}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageState {
    /// Month the counters belong to
    pub month: String,

    /// Calls per API since the last reset
    pub usage: BTreeMap<String, u64>,

    /// When the counters were last zeroed
    pub last_reset: DateTime<Utc>,
}

impl UsageState {
    /// Zeroed counters for the given APIs
    pub fn fresh<'a>(apis: impl IntoIterator<Item = &'a str>, now: DateTime<Utc>) -> Self {
        Self {
            month: month_key(now),
            usage: apis.into_iter().map(|api| (api.to_string(), 0)).collect(),
            last_reset: now,
        }
    }
}

/// "YYYY-MM" for a timestamp
pub fn month_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Quota health label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageStatus {
    /// Below 50%
    Good,
    /// From 50%
    Moderate,
    /// From 75%
    Warning,
    /// From 90%
    Critical,
    /// No monthly ceiling
    Unlimited,
}

impl UsageStatus {
    /// Status for a usage percentage of a finite limit
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            UsageStatus::Critical
        } else if percentage >= 75.0 {
            UsageStatus::Warning
        } else if percentage >= 50.0 {
            UsageStatus::Moderate
        } else {
            UsageStatus::Good
        }
    }

    /// Lowercase name used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageStatus::Good => "good",
            UsageStatus::Moderate => "moderate",
            UsageStatus::Warning => "warning",
            UsageStatus::Critical => "critical",
            UsageStatus::Unlimited => "unlimited",
        }
    }
}

/// Usage of one API against its monthly limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummaryEntry {
    /// Calls this month
    pub usage: u64,
    /// None when the API has no monthly ceiling
    pub limit: Option<u64>,
    /// Rounded to one decimal; 0 when unlimited
    pub percentage: f64,
    /// Calls left before the limit; None when unlimited
    pub remaining: Option<u64>,
    /// Band of the unrounded percentage
    pub status: UsageStatus,
}

/// Rough monthly spend derived from call counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Spend per API
    pub individual_costs: BTreeMap<String, f64>,
    /// Sum of all APIs, rounded to cents
    pub total_estimated: f64,
    /// Currency code
    pub currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_thresholds() {
        assert_eq!(UsageStatus::from_percentage(0.0), UsageStatus::Good);
        assert_eq!(UsageStatus::from_percentage(49.9), UsageStatus::Good);
        assert_eq!(UsageStatus::from_percentage(50.0), UsageStatus::Moderate);
        assert_eq!(UsageStatus::from_percentage(75.0), UsageStatus::Warning);
        assert_eq!(UsageStatus::from_percentage(90.0), UsageStatus::Critical);
        assert_eq!(UsageStatus::from_percentage(140.0), UsageStatus::Critical);
    }

    #[test]
    fn test_state_serializes_documented_schema() {
        let now = DateTime::parse_from_rfc3339("2026-10-18T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let state = UsageState::fresh(["steam", "rawg"], now);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["month"], "2026-10");
        assert_eq!(json["usage"]["rawg"], 0);
        assert!(json["last_reset"].as_str().unwrap().starts_with("2026-10-18T12:00:00"));
    }
}
