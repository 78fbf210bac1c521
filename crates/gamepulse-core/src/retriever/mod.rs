//! Executing retrieval plans against the source clients
//!
//! The [`Retriever`] dispatches a [`RetrievalPlan`] to the client of its
//! source, counts the call in the usage tracker, unwraps the `{success,
//! data, error}` envelope some sources use, and normalizes the payload into
//! a [`Table`]. Failures come back as [`Error`] values whose `Display` text
//! is the user-facing reason.

mod combine;
mod normalize;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

pub use combine::combine;
pub use normalize::{also_played, coerce_number, normalize, RowContext};

use crate::error::{Error, Result, UpstreamError};
use crate::models::{Platform, Row, SourceApi, Table};
use crate::routing::RetrievalPlan;
use crate::sources::{static_steam_id, steam_id_from_search, SourceSet, StaticLookup};
use crate::usage::UsageTracker;

/// Runs plans against the configured sources
pub struct Retriever {
    sources: SourceSet,
    tracker: Arc<UsageTracker>,
}

impl Retriever {
    /// Retriever over `sources`, counting calls in `tracker`
    pub fn new(sources: SourceSet, tracker: Arc<UsageTracker>) -> Self {
        Self { sources, tracker }
    }

    /// Clients the retriever dispatches to
    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    /// Usage counters updated on every dispatch
    pub fn tracker(&self) -> &Arc<UsageTracker> {
        &self.tracker
    }

    /// Fetch and normalize the data for `plan`, trying its fallback on failure
    pub async fn retrieve(&self, plan: &RetrievalPlan) -> Result<Table> {
        match self.retrieve_one(plan).await {
            Ok(table) => Ok(table),
            Err(err) => match &plan.fallback {
                Some(fallback) => {
                    warn!(
                        api = plan.api.as_str(),
                        method = plan.method,
                        fallback = fallback.api.as_str(),
                        error = %err,
                        "Retrieval failed, trying fallback"
                    );
                    self.retrieve_one(fallback).await
                }
                None => Err(err),
            },
        }
    }

    async fn retrieve_one(&self, plan: &RetrievalPlan) -> Result<Table> {
        let data_type = plan.metric_key.unwrap_or(plan.method);
        let ctx = RowContext {
            api_source: plan.api.as_str(),
            data_type,
            limit: plan.count,
        };

        let result = match plan.api {
            SourceApi::Multi => self.game_stats(plan).await,
            SourceApi::GamalyticSimple => {
                let payload = self.fetch(Platform::Gamalytic, plan).await?;
                also_played(&payload, ctx)
            }
            api => {
                let platform = api
                    .platform()
                    .ok_or_else(|| Error::internal(format!("no platform behind {}", api.as_str())))?;
                let payload = self.fetch(platform, plan).await?;
                normalize(&payload, plan.data_format, ctx)
            }
        };

        match &result {
            Ok(table) => info!(api = plan.api.as_str(), method = plan.method, rows = table.len(), "Retrieved data"),
            Err(err) => warn!(api = plan.api.as_str(), method = plan.method, error = %err, "Retrieval failed"),
        }
        result
    }

    /// Call the plan's method, resolving a game name to a Steam id first when
    /// the Gamalytic endpoint is keyed by one
    async fn fetch(&self, platform: Platform, plan: &RetrievalPlan) -> Result<Value> {
        if !self.sources.contains(platform) {
            return Err(Error::MissingCredentials { platform });
        }

        let mut args = plan.args.clone();
        if platform == Platform::Gamalytic && plan.method != "search_games" {
            if let Some(Value::String(name)) = args.remove("game_name") {
                let steam_id = self.resolve_steam_id(&name).await?;
                args.insert("steam_id".into(), Value::from(steam_id));
            }
        }
        if platform == Platform::Twitch && plan.method == "get_top_games" {
            return self.twitch_top_games(&args, plan.count).await;
        }
        self.dispatch(platform, plan.method, &args).await
    }

    /// Twitch top categories, each annotated with the viewers of its top streams
    ///
    /// Every streams lookup is its own dispatch, so each one is throttled,
    /// timed out and counted separately.
    async fn twitch_top_games(&self, args: &Map<String, Value>, count: usize) -> Result<Value> {
        let top = self.dispatch(Platform::Twitch, "get_top_games", args).await?;
        let listed = match &top {
            Value::Array(items) => items.as_slice(),
            other => other.get("data").and_then(Value::as_array).map_or(&[][..], Vec::as_slice),
        };

        let mut games = Vec::new();
        for game in listed.iter().take(count) {
            let Some(id) = game.get("id").and_then(Value::as_str) else { continue };
            let streams = self
                .dispatch(
                    Platform::Twitch,
                    "get_game_streams",
                    &args_of(json!({ "game_id": id, "limit": 100 })),
                )
                .await;
            // A failed viewer lookup leaves the game in with zero viewers
            let viewer_count = match streams {
                Ok(streams) => streams
                    .get("data")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(|s| s.get("viewer_count").and_then(Value::as_u64))
                    .fold(0u64, u64::saturating_add),
                Err(err) => {
                    debug!(game_id = %id, error = %err, "Twitch viewer lookup failed");
                    0
                }
            };
            games.push(json!({
                "id": id,
                "name": game.get("name").cloned().unwrap_or(Value::Null),
                "viewer_count": viewer_count,
            }));
        }
        Ok(Value::Array(games))
    }

    /// One tracked, guarded call with the source envelope unwrapped
    pub async fn dispatch(&self, platform: Platform, method: &str, args: &Map<String, Value>) -> Result<Value> {
        let client = self
            .sources
            .get(platform)
            .ok_or(Error::MissingCredentials { platform })?;

        // every dispatched attempt counts, whatever its outcome
        self.tracker.track(platform.as_str(), 1);
        let raw = client.call(method, args).await?;
        unwrap_envelope(platform, raw)
    }

    /// Map a game name to a Steam app id
    ///
    /// Numeric input is taken as an id. Otherwise the Gamalytic search is
    /// used when available, and the built-in table only as a last resort.
    pub async fn resolve_steam_id(&self, game_name: &str) -> Result<String> {
        let trimmed = game_name.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Ok(trimmed.to_string());
        }

        if self.sources.contains(Platform::Gamalytic) {
            let mut args = Map::new();
            args.insert("game_name".into(), Value::from(trimmed));
            match self.dispatch(Platform::Gamalytic, "search_games", &args).await {
                Ok(payload) => {
                    if let Some(id) = steam_id_from_search(&payload, trimmed) {
                        debug!(game = %trimmed, steam_id = %id, "Resolved Steam id via search");
                        return Ok(id);
                    }
                }
                Err(err) => debug!(game = %trimmed, error = %err, "Steam id search failed"),
            }
        }

        match static_steam_id(trimmed) {
            StaticLookup::Found(id) => {
                debug!(game = %trimmed, steam_id = id, "Resolved Steam id from built-in table");
                Ok(id.to_string())
            }
            StaticLookup::NotOnSteam | StaticLookup::Unknown => Err(Error::GameNotFound(trimmed.to_string())),
        }
    }

    /// Statistics for one game gathered from RAWG and SteamSpy
    async fn game_stats(&self, plan: &RetrievalPlan) -> Result<Table> {
        let game = plan
            .game_name
            .as_deref()
            .ok_or_else(|| Error::internal("game statistics need a game name"))?;
        let data_type = plan.metric_key.unwrap_or("game_stats");

        let mut tables = BTreeMap::new();
        let mut last_error = None;

        if self.sources.contains(Platform::Rawg) {
            match self.rawg_stats(game, data_type).await {
                Ok(table) if !table.is_empty() => {
                    tables.insert(Platform::Rawg.as_str().to_string(), table);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(game = %game, source = "rawg", error = %err, "Skipping failed source");
                    last_error = Some(err);
                }
            }
        }
        if self.sources.contains(Platform::SteamSpy) {
            match self.steamspy_stats(game, data_type).await {
                Ok(table) if !table.is_empty() => {
                    tables.insert(Platform::SteamSpy.as_str().to_string(), table);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(game = %game, source = "steamspy", error = %err, "Skipping failed source");
                    last_error = Some(err);
                }
            }
        }

        if tables.is_empty() {
            return Err(last_error.unwrap_or_else(|| Error::data_shape(format!("No stats found for {game}"))));
        }
        Ok(combine(tables))
    }

    async fn rawg_stats(&self, game: &str, data_type: &str) -> Result<Table> {
        let mut args = Map::new();
        args.insert("query".into(), Value::from(game));
        args.insert("page_size".into(), Value::from(1));
        let payload = self.dispatch(Platform::Rawg, "search_games", &args).await?;

        let first = match &payload {
            Value::Array(items) => items.first(),
            Value::Object(map) => map.get("results").and_then(Value::as_array).and_then(|r| r.first()),
            _ => None,
        };
        let Some(details) = first.and_then(Value::as_object) else {
            return Ok(Table::empty());
        };

        let source = Platform::Rawg.as_str();
        let mut rows = Vec::new();
        if let Some(rating) = details.get("rating").and_then(coerce_number) {
            rows.push(Row::new("User Rating", rating, source, data_type).with_metric("rating"));
        }
        if let Some(score) = details.get("metacritic").and_then(coerce_number) {
            rows.push(Row::new("Metacritic Score", score, source, data_type).with_metric("metacritic"));
        }
        if let Some(year) = details
            .get("released")
            .and_then(Value::as_str)
            .and_then(|date| date.get(..4))
            .and_then(|year| year.parse::<f64>().ok())
        {
            rows.push(Row::new("Release Year", year, source, data_type).with_metric("released"));
        }
        Ok(Table::new(rows))
    }

    async fn steamspy_stats(&self, game: &str, data_type: &str) -> Result<Table> {
        let appid = self.resolve_steam_id(game).await?;
        let payload = self
            .dispatch(Platform::SteamSpy, "get_game_data_by_appid", &args_of(json!({ "appid": appid })))
            .await?;

        let source = Platform::SteamSpy.as_str();
        let mut rows = Vec::new();
        if let Some(owners) = payload.get("owners").and_then(coerce_number) {
            rows.push(
                Row::new("Estimated Owners (millions)", owners / 1_000_000.0, source, data_type)
                    .with_metric("owners"),
            );
        }
        if let Some(players) = payload.get("players_2weeks").and_then(coerce_number) {
            rows.push(Row::new("Players (last 2 weeks)", players, source, data_type).with_metric("players_2weeks"));
        }
        Ok(Table::new(rows))
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}

fn args_of(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Accept both plain payloads and `{success, data, error}` envelopes
fn unwrap_envelope(platform: Platform, raw: Value) -> Result<Value> {
    let payload = match raw {
        Value::Object(mut map) if map.contains_key("success") => {
            if map.get("success").and_then(Value::as_bool) == Some(true) {
                map.remove("data").unwrap_or(Value::Null)
            } else {
                let message = map
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error")
                    .to_string();
                return Err(reported(platform, message));
            }
        }
        Value::Object(map) if map.len() == 1 && map.get("error").map_or(false, Value::is_string) => {
            let message = map.get("error").and_then(Value::as_str).unwrap_or_default().to_string();
            return Err(reported(platform, message));
        }
        other => other,
    };

    let empty = match &payload {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    };
    if empty {
        return Err(UpstreamError::NoData(platform.display_name().to_string()).into());
    }
    Ok(payload)
}

fn reported(platform: Platform, message: String) -> Error {
    if message.contains("API key") || message.to_lowercase().contains("key required") {
        Error::MissingCredentials { platform }
    } else {
        UpstreamError::Reported(message).into()
    }
}
