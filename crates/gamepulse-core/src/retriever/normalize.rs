//! Turning heterogeneous JSON payloads into normalized tables

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::{DataFormat, Row, SortOrder, Table};

/// Fields that hold a list of records, in preference order
const LIST_FIELDS: &[&str] = &["data", "results", "alsoPlayed", "audienceOverlap", "ranks", "games"];

/// Aliases accepted when the label column is `name`
const NAME_ALIASES: &[&str] = &["game_name", "title", "app_name"];

/// Identifier and date fields that are never pivoted into statistics
const NON_STAT_FIELDS: &[&str] = &[
    "steamId",
    "appid",
    "id",
    "releaseDate",
    "firstReleaseDate",
    "EAReleaseDate",
    "timestamp",
];

/// Labels stamped on every row of one normalization
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    /// Stamped into `Row::api_source`
    pub api_source: &'a str,
    /// Stamped into `Row::data_type`
    pub data_type: &'a str,
    /// Maximum number of rows kept
    pub limit: usize,
}

/// Normalize `payload` according to `format`
///
/// Rows whose label or value cannot be read are dropped. Fails when the
/// declared columns are absent from every record.
pub fn normalize(payload: &Value, format: &DataFormat, ctx: RowContext<'_>) -> Result<Table> {
    if format.x_column == "metric" {
        return pivot(payload, format, ctx);
    }

    let records = locate_records(payload, format.x_column)
        .ok_or_else(|| Error::missing_columns(format.x_column, format.y_column))?;

    let has_x = records.iter().any(|r| label(r, format.x_column).is_some());
    let has_y = records.iter().any(|r| r.contains_key(format.y_column));
    if !has_x || !has_y {
        return Err(Error::missing_columns(format.x_column, format.y_column));
    }

    let rows: Vec<Row> = records
        .iter()
        .filter_map(|record| {
            let name = label(record, format.x_column)?;
            let value = coerce_number(record.get(format.y_column)?)? / format.value_divisor.unwrap_or(1.0);
            let mut row = Row::new(name, value, ctx.api_source, ctx.data_type).with_metric(format.y_column);
            if let Some(genres) = flatten_list(record.get("genres")) {
                row = row.with_category(genres);
            }
            Some(row)
        })
        .collect();

    finish(rows, format.sort, ctx.limit, format.y_column)
}

/// Rows for "what else do players of X play", from `alsoPlayed` or else
/// `audienceOverlap`, in source order
pub fn also_played(payload: &Value, ctx: RowContext<'_>) -> Result<Table> {
    let object = payload.as_object();
    let pick = |field: &str, default_link: f64| {
        object
            .and_then(|o| o.get(field))
            .and_then(Value::as_array)
            .filter(|items| !items.is_empty())
            .map(|items| (items, default_link))
    };
    let (items, default_link) = pick("alsoPlayed", 0.5)
        .or_else(|| pick("audienceOverlap", 0.3))
        .ok_or_else(|| Error::data_shape("No similar games data found"))?;

    let rows = items
        .iter()
        .filter_map(Value::as_object)
        .take(ctx.limit)
        .map(|game| {
            let name = label(game, "name").unwrap_or_else(|| "Unknown Game".to_string());
            let link = game.get("link").and_then(coerce_number).unwrap_or(default_link);
            let score = (link * 10.0 * 10.0).round() / 10.0;
            let row = Row::new(name, score, ctx.api_source, ctx.data_type).with_metric("similarity_score");
            match flatten_list(game.get("genres")) {
                Some(genres) => row.with_category(genres),
                None => row,
            }
        })
        .collect();
    Ok(Table::new(rows))
}

/// Read a number from a JSON value
///
/// Accepts numbers, numeric strings with thousands separators, and
/// `"a .. b"` ranges (the midpoint is used).
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => {
            let parse = |part: &str| part.trim().replace(',', "").parse::<f64>().ok();
            let n = match s.split_once("..") {
                Some((low, high)) => (parse(low)? + parse(high)?) / 2.0,
                None => parse(s)?,
            };
            n.is_finite().then_some(n)
        }
        _ => None,
    }
}

fn finish(mut rows: Vec<Row>, sort: SortOrder, limit: usize, y_column: &str) -> Result<Table> {
    rows.retain(|r| r.value.is_finite());
    if rows.is_empty() {
        return Err(Error::data_shape(format!("No usable {y_column} values in response")));
    }
    let mut table = Table::new(rows);
    if sort == SortOrder::ValueDesc {
        table.sort_by_value_desc();
    }
    table.truncate(limit);
    Ok(table)
}

/// Find the record list inside a payload
fn locate_records(payload: &Value, x_column: &str) -> Option<Vec<Map<String, Value>>> {
    match payload {
        Value::Array(items) => Some(objects(items)),
        Value::Object(map) => {
            // keyed map of records (appid -> game, genre -> stats)
            if !map.is_empty() && map.values().all(Value::is_object) {
                return Some(
                    map.iter()
                        .filter_map(|(key, record)| {
                            let mut record = record.as_object()?.clone();
                            if label(&record, x_column).is_none() {
                                record.insert(x_column.to_string(), Value::from(key.as_str()));
                            }
                            Some(record)
                        })
                        .collect(),
                );
            }

            let non_empty = |field: &str| {
                map.get(field)
                    .and_then(Value::as_array)
                    .filter(|items| items.iter().any(Value::is_object))
            };
            if let Some(items) = LIST_FIELDS.iter().find_map(|f| non_empty(f)) {
                return Some(objects(items));
            }
            map.values()
                .filter_map(Value::as_array)
                .find(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_object)
                        .any(|r| label(r, x_column).is_some())
                })
                .map(|items| objects(items))
        }
        _ => None,
    }
}

fn objects(items: &[Value]) -> Vec<Map<String, Value>> {
    items.iter().filter_map(Value::as_object).cloned().collect()
}

/// Row label from the x column (or a name alias), as text
fn label(record: &Map<String, Value>, x_column: &str) -> Option<String> {
    let aliases: &[&str] = if x_column == "name" { NAME_ALIASES } else { &[] };
    std::iter::once(x_column)
        .chain(aliases.iter().copied())
        .find_map(|key| match record.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Comma-join a list of strings (or of `{name}` objects)
fn flatten_list(value: Option<&Value>) -> Option<String> {
    let items = value?.as_array()?;
    let parts: Vec<&str> = items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(o) => o.get("name").and_then(Value::as_str),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// One row per numeric statistic of a single-game object
fn pivot(payload: &Value, format: &DataFormat, ctx: RowContext<'_>) -> Result<Table> {
    let object = match payload {
        Value::Object(map) => map,
        Value::Array(items) => items
            .first()
            .and_then(Value::as_object)
            .ok_or_else(|| Error::missing_columns(format.x_column, format.y_column))?,
        _ => return Err(Error::missing_columns(format.x_column, format.y_column)),
    };

    let rows = object
        .iter()
        .filter(|(key, value)| !NON_STAT_FIELDS.contains(&key.as_str()) && !value.is_boolean())
        .filter_map(|(key, value)| {
            let value = coerce_number(value)?;
            Some(Row::new(humanize(key), value, ctx.api_source, ctx.data_type).with_metric(key.as_str()))
        })
        .collect();
    finish(rows, format.sort, ctx.limit, format.y_column)
}

/// `copiesSold` -> `Copies Sold`, `players_2weeks` -> `Players 2weeks`
fn humanize(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    let mut prev_lower = false;
    for c in field.chars() {
        if c == '_' {
            out.push(' ');
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower {
            out.push(' ');
        }
        if out.is_empty() || out.ends_with(' ') {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
    }
    out
}
