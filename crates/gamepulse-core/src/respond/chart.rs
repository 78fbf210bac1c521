//! Chart builder boundary

use serde_json::{json, Value};

use crate::models::{ChartSpec, Table};

/// Turns a chart spec and its rows into a renderable figure
pub trait ChartBuilder {
    /// Rendered output
    type Figure;

    /// Render `table` as described by `spec`
    fn build(&self, spec: &ChartSpec, table: &Table) -> Self::Figure;
}

/// Builds a plain JSON figure: type, titles, and the x/y series
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonChartBuilder;

impl ChartBuilder for JsonChartBuilder {
    type Figure = Value;

    fn build(&self, spec: &ChartSpec, table: &Table) -> Value {
        let x: Vec<&str> = table.iter().map(|r| r.name.as_str()).collect();
        let y: Vec<f64> = table.iter().map(|r| r.value).collect();
        json!({
            "type": spec.chart_type.as_str(),
            "title": spec.title,
            "x_title": spec.x_title,
            "y_title": spec.y_title,
            "x": x,
            "y": y,
        })
    }
}
