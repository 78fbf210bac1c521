//! Generic HTTP implementation of [`SourceClient`]

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};
use tracing::debug;
use url::Url;

use super::game_ids::static_title;
use super::SourceClient;
use crate::config::SourceConfig;
use crate::error::{Error, Result, UpstreamError};
use crate::models::Platform;

/// How one named method maps onto an HTTP GET
struct Endpoint {
    method: &'static str,
    /// Path relative to the base URL; `{arg}` segments are filled from arguments
    path: &'static str,
    /// Query parameters always sent
    fixed: &'static [(&'static str, &'static str)],
    /// Argument name -> query parameter name
    renames: &'static [(&'static str, &'static str)],
}

const fn ep(method: &'static str, path: &'static str) -> Endpoint {
    Endpoint {
        method,
        path,
        fixed: &[],
        renames: &[],
    }
}

const STEAM_ENDPOINTS: &[Endpoint] = &[
    Endpoint {
        renames: &[("app_id", "appid")],
        ..ep("get_player_stats", "ISteamUserStats/GetNumberOfCurrentPlayers/v1")
    },
];

const TWITCH_ENDPOINTS: &[Endpoint] = &[
    Endpoint {
        renames: &[("limit", "first")],
        ..ep("get_top_games", "games/top")
    },
    Endpoint {
        renames: &[("limit", "first")],
        ..ep("get_game_streams", "streams")
    },
    ep("get_game_analytics", "analytics/games"),
    ep("get_extension_analytics", "analytics/extensions"),
    Endpoint {
        renames: &[("limit", "count")],
        ..ep("get_bits_leaderboard", "bits/leaderboard")
    },
    ep("get_extension_transactions", "extensions/transactions"),
];

const RAWG_ENDPOINTS: &[Endpoint] = &[
    Endpoint {
        renames: &[("query", "search"), ("limit", "page_size")],
        ..ep("search_games", "games")
    },
    ep("get_game_details", "games/{game_id}"),
    ep("get_genres", "genres"),
];

const STEAMSPY_TOP: &[(&str, &str)] = &[("request", "top100in2weeks")];

const STEAMSPY_ENDPOINTS: &[Endpoint] = &[
    Endpoint {
        fixed: STEAMSPY_TOP,
        ..ep("get_top_games", "api.php")
    },
    Endpoint {
        fixed: STEAMSPY_TOP,
        ..ep("get_top_owned_games", "api.php")
    },
    Endpoint {
        fixed: &[("request", "appdetails")],
        renames: &[("app_id", "appid"), ("steam_id", "appid")],
        ..ep("get_game_data_by_appid", "api.php")
    },
];

const GAMALYTIC_ENDPOINTS: &[Endpoint] = &[
    ep("get_game_details", "game/{steam_id}"),
    ep("get_other_games_players_play", "game/{steam_id}"),
    Endpoint {
        renames: &[("game_name", "search")],
        ..ep("search_games", "steam-games/list")
    },
    ep("get_genre_stats", "steam-games/genres/stats"),
];

/// Arguments that only steer local post-processing and are never sent
const LOCAL_ARGS: &[&str] = &["metric"];

fn endpoints(platform: Platform) -> &'static [Endpoint] {
    match platform {
        Platform::Steam => STEAM_ENDPOINTS,
        Platform::Twitch => TWITCH_ENDPOINTS,
        Platform::Rawg => RAWG_ENDPOINTS,
        Platform::SteamSpy => STEAMSPY_ENDPOINTS,
        Platform::Gamalytic => GAMALYTIC_ENDPOINTS,
    }
}

impl Endpoint {
    /// Fill path placeholders and turn the remaining arguments into query pairs
    fn render(&self, args: &Map<String, Value>) -> std::result::Result<(String, Vec<(String, String)>), UpstreamError> {
        let mut path = self.path.to_string();
        let mut used = Vec::new();
        while let Some(start) = path.find('{') {
            let end = path[start..]
                .find('}')
                .map(|i| start + i)
                .ok_or_else(|| UpstreamError::Reported(format!("Malformed endpoint {}", self.path)))?;
            let name = path[start + 1..end].to_string();
            let value = args
                .get(&name)
                .map(scalar_to_string)
                .ok_or_else(|| UpstreamError::Reported(format!("Missing argument '{name}' for {}", self.method)))?;
            path.replace_range(start..=end, &value);
            used.push(name);
        }

        let mut query: Vec<(String, String)> = self
            .fixed
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        for (name, value) in args {
            if used.contains(name) || LOCAL_ARGS.contains(&name.as_str()) || value.is_null() {
                continue;
            }
            let key = self
                .renames
                .iter()
                .find(|(from, _)| *from == name.as_str())
                .map_or(name.as_str(), |(_, to)| *to);
            query.push((key.to_string(), scalar_to_string(value)));
        }
        Ok((path, query))
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `reqwest`-backed client for one platform
pub struct HttpSource {
    platform: Platform,
    base_url: Url,
    credentials: SourceConfig,
    client: Client,
}

impl HttpSource {
    /// Client for `platform` with its credentials and request timeout
    pub fn new(platform: Platform, config: &SourceConfig, timeout: Duration) -> Result<Self> {
        let raw = config.base_url(platform);
        let base_url = Url::parse(raw)
            .map_err(|e| Error::config(format!("invalid base URL for {platform}: {raw} ({e})")))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gamepulse/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            platform,
            base_url,
            credentials: config.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> std::result::Result<Url, UpstreamError> {
        let joined = format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| UpstreamError::Transport(e.to_string()))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let creds = &self.credentials;
        match self.platform {
            Platform::Steam | Platform::Rawg => match &creds.api_key {
                Some(key) => request.query(&[("key", key)]),
                None => request,
            },
            Platform::Gamalytic => match &creds.api_key {
                Some(key) => request.header("X-API-Key", key),
                None => request,
            },
            Platform::Twitch => {
                let request = match &creds.client_id {
                    Some(id) => request.header("Client-Id", id),
                    None => request,
                };
                match &creds.access_token {
                    Some(token) => request.bearer_auth(token),
                    None => request,
                }
            }
            Platform::SteamSpy => request,
        }
    }

    async fn get(&self, path: &str, query: &[(String, String)]) -> std::result::Result<Value, UpstreamError> {
        let url = self.url(path)?;
        debug!(platform = %self.platform, url = %url, "GET");

        let response = self
            .authorize(self.client.get(url).header("Accept", "application/json"))
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Transport(format!("timed out: {e}"))
                } else {
                    UpstreamError::Transport(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::OK => response
                .json::<Value>()
                .await
                .map_err(|e| UpstreamError::Decode(e.to_string())),
            StatusCode::TOO_MANY_REQUESTS => Err(UpstreamError::RateLimited),
            status => Err(UpstreamError::Status(status.as_u16())),
        }
    }

    /// Steam's most played chart, one record per app with its current players
    async fn steam_top_games(&self, args: &Map<String, Value>) -> std::result::Result<Value, UpstreamError> {
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(10);
        let charts = self.get("ISteamChartsService/GetMostPlayedGames/v1", &[]).await?;
        let games: Vec<Value> = charts
            .pointer("/response/ranks")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(steam_rank)
            .take(limit)
            .collect();
        Ok(Value::Array(games))
    }

    /// SteamSpy has no genre ranking endpoint; aggregate the current top 100
    async fn steamspy_genre_popularity(&self) -> std::result::Result<Value, UpstreamError> {
        let top = self.get("api.php", &[("request".into(), "top100in2weeks".into())]).await?;
        Ok(Value::Array(aggregate_genres(&top)))
    }
}

#[async_trait]
impl SourceClient for HttpSource {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn invoke(&self, method: &str, args: &Map<String, Value>) -> std::result::Result<Value, UpstreamError> {
        match (self.platform, method) {
            (Platform::Steam, "get_top_games") => return self.steam_top_games(args).await,
            (Platform::SteamSpy, "analyze_genre_popularity") => {
                return self.steamspy_genre_popularity().await
            }
            _ => {}
        }

        let endpoint = endpoints(self.platform)
            .iter()
            .find(|e| e.method == method)
            .ok_or_else(|| {
                UpstreamError::Reported(format!("{} does not support {method}", self.platform))
            })?;
        let (path, query) = endpoint.render(args)?;
        self.get(&path, &query).await
    }
}

/// The chart only carries app ids; names come from the built-in table
fn steam_rank(rank: &Value) -> Option<Value> {
    let appid = rank.get("appid")?.as_u64()?;
    let players = rank
        .get("concurrent_in_game")
        .or_else(|| rank.get("peak_in_game"))?
        .clone();
    let name = static_title(&appid.to_string()).unwrap_or_else(|| format!("App {appid}"));
    Some(json!({
        "appid": appid,
        "name": name,
        "current_players": players,
        "peak_today": rank.get("peak_in_game").cloned().unwrap_or(Value::Null),
    }))
}

/// Genre buckets recognised in SteamSpy tags and genre strings
const GENRE_KEYWORDS: &[(&str, &[&str])] = &[
    ("Action", &["action"]),
    ("Adventure", &["adventure"]),
    ("RPG", &["rpg", "role-playing"]),
    ("Strategy", &["strategy"]),
    ("Simulation", &["simulation"]),
    ("Sports", &["sports"]),
    ("Racing", &["racing"]),
    ("Shooter", &["shooter", "fps"]),
    ("Indie", &["indie"]),
    ("Casual", &["casual"]),
    ("Free to Play", &["free to play"]),
    ("MMO", &["mmo", "massively multiplayer"]),
];

/// Group SteamSpy game records by genre, summing recent players and owners
fn aggregate_genres(top: &Value) -> Vec<Value> {
    #[derive(Default)]
    struct Bucket {
        games: u64,
        players_2weeks: u64,
        ccu: u64,
        owners: u64,
    }

    let records: Vec<&Value> = match top {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    };

    let mut buckets: BTreeMap<&'static str, Bucket> = BTreeMap::new();
    for game in records {
        let mut labels: Vec<String> = Vec::new();
        if let Some(tags) = game.get("tags").and_then(Value::as_object) {
            labels.extend(tags.keys().map(|t| t.to_lowercase()));
        }
        if let Some(genre) = game.get("genre").and_then(Value::as_str) {
            labels.extend(genre.split(',').map(|g| g.trim().to_lowercase()));
        }

        let mut genres: Vec<&'static str> = GENRE_KEYWORDS
            .iter()
            .filter(|(_, keys)| labels.iter().any(|l| keys.iter().any(|k| l.contains(k))))
            .map(|(genre, _)| *genre)
            .collect();
        if genres.is_empty() {
            genres.push("Action");
        }

        let players = game.get("players_2weeks").and_then(Value::as_u64).unwrap_or(0);
        let ccu = game.get("ccu").and_then(Value::as_u64).unwrap_or(0);
        let owners = game
            .get("owners")
            .and_then(Value::as_str)
            .and_then(owners_midpoint)
            .unwrap_or(0);
        for genre in genres {
            let bucket = buckets.entry(genre).or_default();
            bucket.games += 1;
            bucket.players_2weeks = bucket.players_2weeks.saturating_add(players);
            bucket.ccu = bucket.ccu.saturating_add(ccu);
            bucket.owners = bucket.owners.saturating_add(owners);
        }
    }

    buckets
        .into_iter()
        .map(|(genre, b)| {
            let primary = if b.ccu > 0 { b.ccu } else { b.players_2weeks };
            json!({
                "genre": genre,
                "total_games": b.games,
                "total_players_2weeks": b.players_2weeks,
                "total_ccu": b.ccu,
                "primary_activity": primary,
                "estimated_total_owners": b.owners,
            })
        })
        .collect()
}

fn owners_midpoint(range: &str) -> Option<u64> {
    let (low, high) = range.split_once("..")?;
    let parse = |s: &str| s.trim().replace(',', "").parse::<u64>().ok();
    Some(parse(low)?.saturating_add(parse(high)?) / 2)
}
