//! Chart specifications handed to the chart builder

use serde::{Deserialize, Serialize};

use super::metric::ChartType;

/// What to draw: type, axis bindings into the normalized table, and labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Kind of chart
    pub chart_type: ChartType,
    /// Normalized column for the x axis
    pub x_column: String,
    /// Normalized column for the y axis
    pub y_column: String,
    /// Label of the x axis
    pub x_title: String,
    /// Label of the y axis
    pub y_title: String,
    /// Chart title
    pub title: String,
}
