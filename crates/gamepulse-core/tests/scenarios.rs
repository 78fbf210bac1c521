//! End-to-end answers over scripted data sources

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};

use gamepulse::config::{ClientConfig, Config, RoutingStrategy};
use gamepulse::error::UpstreamError;
use gamepulse::models::{Action, Platform, UsageStatus};
use gamepulse::respond::Assistant;
use gamepulse::retriever::Retriever;
use gamepulse::routing::{parse_intent, plan_for_metric, Registry, Router};
use gamepulse::sources::{GuardedClient, SourceClient, SourceSet};
use gamepulse::usage::{MemoryUsageStore, UsageTracker};

/// Answers every call to one method with a fixed payload
struct Fixed {
    platform: Platform,
    method: &'static str,
    payload: Value,
}

#[async_trait]
impl SourceClient for Fixed {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn invoke(&self, method: &str, _args: &Map<String, Value>) -> Result<Value, UpstreamError> {
        if method == self.method {
            Ok(self.payload.clone())
        } else {
            Err(UpstreamError::Status(404))
        }
    }
}

fn immediate() -> ClientConfig {
    ClientConfig {
        min_request_interval: Duration::ZERO,
        timeout: Duration::from_secs(5),
        breaker_threshold: 3,
    }
}

fn tracker() -> Arc<UsageTracker> {
    Arc::new(UsageTracker::new(Arc::new(MemoryUsageStore::new()), Config::default().usage.limits).unwrap())
}

fn assistant(strategy: RoutingStrategy, sources: SourceSet) -> Assistant {
    Assistant::new(
        Router::new(strategy, Registry::default()),
        Arc::new(Retriever::new(sources, tracker())),
    )
}

fn source(platform: Platform, method: &'static str, payload: Value) -> GuardedClient {
    GuardedClient::new(
        Arc::new(Fixed {
            platform,
            method,
            payload,
        }),
        &immediate(),
    )
}

#[tokio::test]
async fn top_steam_games_are_ranked_and_attributed() {
    let query = "What are the top games on Steam right now?";
    let intent = parse_intent(query).unwrap();
    assert_eq!(intent.platform, Platform::Steam);
    assert_eq!(intent.action, Action::TopGames);
    assert_eq!(intent.game_name, None);
    assert_eq!(intent.count, 10);

    // Twelve games, deliberately out of order
    let games: Vec<Value> = (0..12)
        .map(|i| {
            let players = 100_000 + ((i * 7) % 12) * 50_000;
            json!({"name": format!("Game {i}"), "current_players": players})
        })
        .collect();
    let sources = SourceSet::new().with(source(Platform::Steam, "get_top_games", Value::from(games)));

    let response = assistant(RoutingStrategy::Intent, sources).respond(query).await;

    let table = response.table.unwrap();
    assert_eq!(table.len(), 10);
    let values: Vec<f64> = table.iter().map(|r| r.value).collect();
    assert!(values.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(values[0], 650_000.0);

    let lines: Vec<&str> = response.text.lines().collect();
    assert_eq!(lines[0], "Here are the top games on steam by concurrent players:");
    let ranked: Vec<&str> = lines.iter().copied().filter(|l| l.contains(". Game ")).collect();
    assert_eq!(ranked.len(), 10);
    assert!(ranked[0].starts_with("1. Game "));
    assert!(ranked[0].ends_with(": 650,000"));
    assert_eq!(lines.last().copied(), Some("Data from Steam API"));

    let chart = response.chart.unwrap();
    assert_eq!(chart.y_title, "Current Players");
}

#[tokio::test]
async fn also_played_without_gamalytic_key_explains_remediation() {
    let query = "What other games do Elden Ring players also play?";
    let intent = parse_intent(query).unwrap();
    assert_eq!(intent.platform, Platform::Gamalytic);
    assert_eq!(intent.action, Action::AlsoPlayed);
    assert_eq!(intent.game_name.as_deref(), Some("Elden Ring"));

    let response = assistant(RoutingStrategy::Intent, SourceSet::new()).respond(query).await;
    assert!(response
        .text
        .contains("Unable to access Gamalytic API, please add an API key or check with your system admin."));
    assert_eq!(response.chart, None);
    assert_eq!(response.table, None);
}

#[test]
fn gamalytic_usage_at_ninety_percent_is_critical() {
    let tracker = tracker();
    tracker.track("gamalytic", 900);

    let summary = tracker.summary();
    let entry = &summary["gamalytic"];
    assert_eq!(entry.limit, Some(1000));
    assert_eq!(entry.status, UsageStatus::Critical);
    assert_eq!(entry.percentage, 90.0);
    assert_eq!(entry.remaining, Some(100));
}

#[tokio::test]
async fn gibberish_gets_help_without_chart() {
    for strategy in [RoutingStrategy::Registry, RoutingStrategy::Intent] {
        let response = assistant(strategy, SourceSet::new()).respond("asdfqwer").await;
        assert!(response.text.starts_with("I'm not sure what data you're looking for."));
        assert!(response.text.contains("Try asking something like:"));
        assert_eq!(response.chart, None);
    }
}

#[tokio::test]
async fn steamspy_owner_strings_become_millions() {
    let payload = json!({
        "730": {"appid": 730, "name": "Counter-Strike 2", "owners": "2,000,000"},
        "570": {"appid": 570, "name": "Dota 2", "owners": "500,000"},
        "999": {"appid": 999, "name": "Broken", "owners": "unknown"}
    });
    let metric = Registry::default().get_metric_info("steamspy_top_owned").unwrap();
    let plan = plan_for_metric(metric, None, 10);
    let sources = SourceSet::new().with(source(Platform::SteamSpy, metric.method, payload));
    let retriever = Retriever::new(sources, tracker());

    let table = retriever.retrieve(&plan).await.unwrap();
    let rows: Vec<(&str, f64)> = table.iter().map(|r| (r.name.as_str(), r.value)).collect();
    assert_eq!(rows, vec![("Counter-Strike 2", 2.0), ("Dota 2", 0.5)]);
    assert_eq!(retriever.tracker().usage("steamspy"), 1);
}

#[tokio::test]
async fn game_stats_survive_one_failed_source() {
    let steamspy = json!({
        "appid": 1245620,
        "name": "ELDEN RING",
        "owners": "20,000,000 .. 50,000,000",
        "players_2weeks": 1_200_000
    });
    let sources = SourceSet::new()
        // RAWG fails the search; SteamSpy still answers
        .with(source(Platform::Rawg, "get_game_details", json!({})))
        .with(source(Platform::SteamSpy, "get_game_data_by_appid", steamspy));
    let response = assistant(RoutingStrategy::Registry, sources)
        .respond("Tell me about Elden Ring")
        .await;

    assert!(response.text.starts_with("Here are the statistics for Elden Ring:"), "{}", response.text);
    let table = response.table.unwrap();
    let by_name: BTreeMap<&str, f64> = table.iter().map(|r| (r.name.as_str(), r.value)).collect();
    assert_eq!(by_name.get("Estimated Owners (millions)"), Some(&35.0));
    assert!(table.iter().all(|r| r.api_source == "steamspy"));
}
