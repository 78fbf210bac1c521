//! Text summaries and chart specs for normalized tables

use std::collections::BTreeSet;

use crate::models::{ChartSpec, ChartType, Platform, SourceApi, Table};
use crate::routing::RetrievalPlan;

/// Number of rows listed in text answers
const MAX_LISTED: usize = 10;

/// Text answer plus an optional chart
#[derive(Debug, Clone, PartialEq)]
pub struct Formatted {
    /// Summary, ranking and attribution
    pub text: String,
    /// Chart specification, when the plan is charted
    pub chart: Option<ChartSpec>,
}

/// Summarize `table` for the query described by `plan`
pub fn format_response(table: &Table, plan: &RetrievalPlan) -> Formatted {
    let game = plan.game_name.as_deref();
    let listed = table.iter().take(MAX_LISTED);
    let mut text = String::new();

    match (plan.chart_type, game) {
        (ChartType::List, Some(game)) => {
            text.push_str(&format!("Other games that {game} players also play:\n\n"));
            for (i, row) in listed.enumerate() {
                text.push_str(&format!("{}. {}\n", i + 1, row.name));
            }
        }
        (_, Some(game)) => {
            text.push_str(&format!("Here are the statistics for {game}:\n\n"));
            for row in listed {
                text.push_str(&format!("• {}: {}\n", row.name, format_value(row.value)));
            }
        }
        (_, None) => {
            text.push_str(&format!("Here are the {}:\n\n", plan.description.to_lowercase()));
            for (i, row) in listed.enumerate() {
                text.push_str(&format!("{}. {}: {}\n", i + 1, row.name, format_value(row.value)));
            }
        }
    }

    text.push('\n');
    text.push_str(&attribution(table, plan));

    let chart = plan.chart_type.is_charted().then(|| ChartSpec {
        chart_type: plan.chart_type,
        x_column: "name".to_string(),
        y_column: "value".to_string(),
        x_title: plan.data_format.x_title.to_string(),
        y_title: plan.data_format.y_title.to_string(),
        title: plan.title.clone(),
    });

    Formatted { text, chart }
}

/// Human-friendly number: `1.2M`, `12,345`, `4.5`
///
/// The band is chosen after rounding, so `999.96` prints `1,000` rather
/// than `1000.0`.
pub fn format_value(value: f64) -> String {
    let whole = value.round();
    if whole.abs() >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if ((value * 10.0).round() / 10.0).abs() >= 1_000.0 {
        group_thousands(whole as i64)
    } else {
        format!("{value:.1}")
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Attribution from the sources the rows actually came from
fn attribution(table: &Table, plan: &RetrievalPlan) -> String {
    let sources: BTreeSet<&str> = table.iter().map(|r| r.api_source.as_str()).collect();
    let mut platforms = sources.iter().filter_map(|s| s.parse::<Platform>().ok());
    match (sources.len(), platforms.next()) {
        (1, Some(platform)) => SourceApi::from(platform).attribution(),
        (n, _) if n > 1 => SourceApi::Multi.attribution(),
        _ => plan.api.attribution(),
    }
}
