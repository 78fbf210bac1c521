//! Turning retrieved tables into answers
//!
//! [`format_response`] renders a ranked text summary and a [`ChartSpec`] for
//! a table; [`Assistant`] is the end-to-end entry point that never fails.
//!
//! [`ChartSpec`]: crate::models::ChartSpec

mod assistant;
mod chart;
mod formatter;

pub use assistant::{Assistant, Response};
pub use chart::{ChartBuilder, JsonChartBuilder};
pub use formatter::{format_response, format_value, Formatted};
