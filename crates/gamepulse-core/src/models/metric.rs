//! Metric definitions: pre-declared retrieval recipes

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::platform::SourceApi;

/// How a result should be drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    /// Vertical bars
    Bar,
    /// Line over ordered labels
    Line,
    /// Share of a whole
    Pie,
    /// Scatter of points
    Scatter,
    /// Plain table
    Table,
    /// Text-only ranked list, no chart
    List,
}

impl ChartType {
    /// Lowercase identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Pie => "pie",
            ChartType::Scatter => "scatter",
            ChartType::Table => "table",
            ChartType::List => "list",
        }
    }

    /// Whether results of this type get a chart spec
    pub fn is_charted(&self) -> bool {
        !matches!(self, ChartType::List)
    }
}

/// Row ordering applied after normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Ranking semantics
    #[default]
    ValueDesc,
    /// Keep source order (time series, ranked lists)
    Preserve,
}

/// A literal default argument of a metric's method
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgValue {
    /// Integer argument
    Int(i64),
    /// String argument
    Str(&'static str),
}

impl From<ArgValue> for Value {
    fn from(arg: ArgValue) -> Self {
        match arg {
            ArgValue::Int(n) => Value::from(n),
            ArgValue::Str(s) => Value::from(s),
        }
    }
}

/// Which payload fields become chart axes, and how values are post-processed
#[derive(Debug, Clone, PartialEq)]
pub struct DataFormat {
    /// Source field used as the row label
    pub x_column: &'static str,
    /// Source field used as the row value
    pub y_column: &'static str,
    /// Label of the x axis
    pub x_title: &'static str,
    /// Label of the y axis
    pub y_title: &'static str,
    /// Chart title; `{game_name}` is substituted when known
    pub title_template: &'static str,
    /// Values are divided by this before they reach the table
    pub value_divisor: Option<f64>,
    /// Row order after normalization
    pub sort: SortOrder,
}

/// A named recipe: source + method + output shape, matched against free text
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    /// Unique registry key
    pub key: &'static str,
    /// One-line description shown in help text
    pub description: &'static str,
    /// Source that serves the metric
    pub api: SourceApi,
    /// Source method to call
    pub method: &'static str,
    /// Default arguments of the call
    pub method_args: &'static [(&'static str, ArgValue)],
    /// Phrases scored against user questions
    pub user_phrases: &'static [&'static str],
    /// Preferred chart
    pub chart_type: ChartType,
    /// Shape of the normalized rows
    pub data_format: DataFormat,
}

impl MetricDefinition {
    /// Default arguments as a JSON object
    pub fn default_args(&self) -> Map<String, Value> {
        self.method_args
            .iter()
            .map(|(name, value)| ((*name).to_string(), Value::from(*value)))
            .collect()
    }

    /// Whether answering this metric needs a game name
    pub fn requires_game(&self) -> bool {
        matches!(
            self.api,
            SourceApi::Gamalytic | SourceApi::GamalyticSimple | SourceApi::Multi
        )
    }
}
