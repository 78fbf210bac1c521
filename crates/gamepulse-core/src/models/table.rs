//! Normalized tables: the boundary between retrieval and presentation

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One labelled value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Row label (game, genre, statistic, date)
    pub name: String,

    /// Numeric value; always finite
    pub value: f64,

    /// Name of the measured quantity when rows carry different ones
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,

    /// Free-form grouping (genres, "rating", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Source the row came from
    pub api_source: String,

    /// Kind of result ("ranking", "also_played", ...)
    pub data_type: String,

    /// When the row was produced
    pub timestamp: DateTime<Utc>,
}

impl Row {
    /// Create a row stamped with the current time
    pub fn new(
        name: impl Into<String>,
        value: f64,
        api_source: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            metric: None,
            category: None,
            api_source: api_source.into(),
            data_type: data_type.into(),
            timestamp: Utc::now(),
        }
    }

    /// Set the metric label
    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    /// Set the category label
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Ordered collection of rows sharing one meaning of `value`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    /// Build a table, discarding rows whose value is not finite
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter().filter(|r| r.value.is_finite()).collect(),
        }
    }

    /// Empty table
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rows in order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Take the rows out
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over the rows
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Stable sort, highest value first
    pub fn sort_by_value_desc(&mut self) {
        self.rows
            .sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
    }

    /// Stable sort by label
    pub fn sort_by_name(&mut self) {
        self.rows.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Keep only the first `n` rows
    pub fn truncate(&mut self, n: usize) {
        self.rows.truncate(n);
    }

    /// Append rows from another table
    pub fn extend(&mut self, other: Table) {
        self.rows.extend(other.rows);
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_finite_values_are_dropped() {
        let table = Table::new(vec![
            Row::new("a", 1.0, "steam", "ranking"),
            Row::new("b", f64::NAN, "steam", "ranking"),
            Row::new("c", f64::INFINITY, "steam", "ranking"),
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].name, "a");
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let mut table = Table::new(vec![
            Row::new("first", 5.0, "steam", "ranking"),
            Row::new("big", 9.0, "steam", "ranking"),
            Row::new("second", 5.0, "steam", "ranking"),
        ]);
        table.sort_by_value_desc();
        let names: Vec<_> = table.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["big", "first", "second"]);
    }
}
