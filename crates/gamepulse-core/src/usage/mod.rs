//! API usage tracking
//!
//! Every dispatched source call counts once against a monthly, per-API
//! counter. Counters are persisted through a [`UsageStore`] after each call
//! and reset automatically when the month changes.

mod store;
mod tracker;

pub use store::{FileUsageStore, MemoryUsageStore, UsageStore};
pub use tracker::{Clock, UsageTracker};
