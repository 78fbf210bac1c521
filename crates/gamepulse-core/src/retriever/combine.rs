//! Merging per-source tables

use std::collections::BTreeMap;

use crate::models::Table;

/// Tag every row with its source name, concatenate, and rank by value
///
/// Sources are visited in key order; rows with equal values keep that order.
pub fn combine(tables: BTreeMap<String, Table>) -> Table {
    let mut combined = Table::empty();
    for (source, table) in tables {
        let rows = table
            .into_rows()
            .into_iter()
            .map(|mut row| {
                row.api_source.clone_from(&source);
                row
            })
            .collect();
        combined.extend(Table::new(rows));
    }
    combined.sort_by_value_desc();
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Row;
    use pretty_assertions::assert_eq;

    fn table(rows: &[(&str, f64)]) -> Table {
        Table::new(
            rows.iter()
                .map(|(name, value)| Row::new(*name, *value, "unknown", "game_stats"))
                .collect(),
        )
    }

    #[test]
    fn test_combine_empty() {
        assert_eq!(combine(BTreeMap::new()), Table::empty());
    }

    #[test]
    fn test_single_source_keeps_rows() {
        let mut tables = BTreeMap::new();
        tables.insert("a".to_string(), table(&[("x", 1.0), ("y", 3.0)]));
        let combined = combine(tables);
        assert_eq!(combined.len(), 2);
        assert!(combined.iter().all(|r| r.api_source == "a"));
        assert_eq!(combined.rows()[0].name, "y");
    }

    #[test]
    fn test_sources_are_relabelled_and_ranked() {
        let mut tables = BTreeMap::new();
        tables.insert("steamspy".to_string(), table(&[("Owners", 20.0)]));
        tables.insert("rawg".to_string(), table(&[("Rating", 4.5), ("Metacritic", 90.0)]));
        let combined = combine(tables);
        let got: Vec<_> = combined
            .iter()
            .map(|r| (r.name.as_str(), r.api_source.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![("Metacritic", "rawg"), ("Owners", "steamspy"), ("Rating", "rawg")]
        );
    }
}
