//! Configuration management for GamePulse

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::models::Platform;

/// Prefix for layered environment overrides (`GAMEPULSE__CLIENT__TIMEOUT=5s`)
pub const ENV_PREFIX: &str = "GAMEPULSE";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-source credentials and endpoints
    pub sources: SourcesConfig,

    /// Outbound call guarding
    pub client: ClientConfig,

    /// Usage counter settings
    pub usage: UsageConfig,

    /// Query routing
    pub routing: RoutingConfig,

    /// Conversational backend
    pub nlu: NluConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, an optional file, and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing .env is the common case
        if let Ok(dotenv) = dotenvy::dotenv() {
            debug!(path = %dotenv.display(), "Loaded .env file");
        }

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let mut cfg: Config = builder.build()?.try_deserialize()?;
        for (api, limit) in UsageConfig::default().limits {
            cfg.usage.limits.entry(api).or_insert(limit);
        }
        cfg.apply_credential_env(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    /// Fill credentials from the well-known variables, without overriding
    /// values set explicitly
    pub fn apply_credential_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let s = &mut self.sources;
        fill(&mut s.steam.api_key, get("STEAM_API_KEY"));
        fill(&mut s.twitch.client_id, get("TWITCH_CLIENT_ID"));
        fill(&mut s.twitch.access_token, get("TWITCH_ACCESS_TOKEN"));
        fill(&mut s.rawg.api_key, get("RAWG_API_KEY"));
        fill(&mut s.gamalytic.api_key, get("GAMALYTIC_API_KEY"));
        fill(&mut self.nlu.api_key, get("OPENAI_API_KEY"));
    }

    /// Settings for one platform
    pub fn source(&self, platform: Platform) -> &SourceConfig {
        match platform {
            Platform::Steam => &self.sources.steam,
            Platform::Twitch => &self.sources.twitch,
            Platform::Rawg => &self.sources.rawg,
            Platform::SteamSpy => &self.sources.steamspy,
            Platform::Gamalytic => &self.sources.gamalytic,
        }
    }
}

/// Public API root of each platform
pub fn default_base_url(platform: Platform) -> &'static str {
    match platform {
        Platform::Steam => "https://api.steampowered.com",
        Platform::Twitch => "https://api.twitch.tv/helix",
        Platform::Rawg => "https://api.rawg.io/api",
        Platform::SteamSpy => "https://steamspy.com",
        Platform::Gamalytic => "https://api.gamalytic.com",
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Platforms whose credentials are present; computed once at startup
pub fn available_platforms(config: &Config) -> BTreeSet<Platform> {
    Platform::ALL
        .into_iter()
        .filter(|p| config.source(*p).has_credentials(*p))
        .collect()
}

/// Credentials and endpoints for every source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Steam Web API
    pub steam: SourceConfig,
    /// Twitch Helix API
    pub twitch: SourceConfig,
    /// RAWG video game database
    pub rawg: SourceConfig,
    /// SteamSpy (no credentials needed)
    pub steamspy: SourceConfig,
    /// Gamalytic market data
    pub gamalytic: SourceConfig,
}

/// One source's settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Overrides the public endpoint, mostly for tests and proxies
    pub base_url: Option<String>,
    /// API key, sent the way the platform expects
    pub api_key: Option<String>,
    /// Twitch application client id
    pub client_id: Option<String>,
    /// Twitch OAuth token
    pub access_token: Option<String>,
}

impl SourceConfig {
    /// Configured base URL or the platform's public one
    pub fn base_url(&self, platform: Platform) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| default_base_url(platform))
    }

    /// Whether the credentials this platform needs are all set
    pub fn has_credentials(&self, platform: Platform) -> bool {
        match platform {
            Platform::SteamSpy => true,
            Platform::Twitch => self.client_id.is_some() && self.access_token.is_some(),
            Platform::Steam | Platform::Rawg | Platform::Gamalytic => self.api_key.is_some(),
        }
    }
}

/// Guards applied around every outbound call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Minimum delay between two calls to the same source
    #[serde(with = "humantime_serde")]
    pub min_request_interval: Duration,
    /// Per-call timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Consecutive failures before an endpoint is disabled
    pub breaker_threshold: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            min_request_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
            breaker_threshold: 3,
        }
    }
}

/// Usage counter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    /// Counter file; defaults to the platform data directory
    pub file: Option<PathBuf>,
    /// Monthly ceilings; `None` means unlimited
    pub limits: BTreeMap<String, Option<u64>>,
}

impl UsageConfig {
    /// Resolved counter file location
    pub fn file_path(&self) -> PathBuf {
        if let Some(file) = &self.file {
            return file.clone();
        }
        directories::ProjectDirs::from("com", "gamepulse", "gamepulse")
            .map(|dirs| dirs.data_dir().join("api_usage.json"))
            .unwrap_or_else(|| PathBuf::from("api_usage.json"))
    }
}

impl Default for UsageConfig {
    fn default() -> Self {
        let limits = [
            ("rawg", Some(20_000)),
            ("gamalytic", Some(1_000)),
            ("twitch", Some(800_000)),
            ("steam", None),
            ("steamspy", None),
            ("openai", Some(500)),
        ]
        .into_iter()
        .map(|(api, limit)| (api.to_string(), limit))
        .collect();
        Self { file: None, limits }
    }
}

/// Which router turns text into a retrieval plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingStrategy {
    /// Phrase scoring against the metric registry
    #[default]
    Registry,
    /// Keyword and regex intent parsing
    Intent,
}

impl std::str::FromStr for RoutingStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "registry" => Ok(Self::Registry),
            "intent" => Ok(Self::Intent),
            other => Err(format!("unknown routing strategy: {other}")),
        }
    }
}

/// Routing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// How free text is turned into a plan
    pub strategy: RoutingStrategy,
}

/// OpenAI-compatible chat backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NluConfig {
    /// Base URL of the chat-completions API
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Bearer key; falls back to `OPENAI_API_KEY`
    pub api_key: Option<String>,
    /// Upper bound on tool-call round trips per user message
    pub max_tool_rounds: usize,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            max_tool_rounds: 4,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.client.breaker_threshold, 3);
        assert_eq!(cfg.client.timeout, Duration::from_secs(10));
        assert_eq!(cfg.usage.limits["gamalytic"], Some(1_000));
        assert_eq!(cfg.usage.limits["steam"], None);
        assert_eq!(cfg.routing.strategy, RoutingStrategy::Registry);
    }

    #[test]
    fn test_only_keyless_sources_available_by_default() {
        let cfg = Config::default();
        let available: Vec<_> = available_platforms(&cfg).into_iter().collect();
        assert_eq!(available, vec![Platform::SteamSpy]);
    }

    #[test]
    fn test_credential_env_fills_missing_keys() {
        let mut cfg = Config::default();
        cfg.sources.rawg.api_key = Some("from-file".into());
        cfg.apply_credential_env(|name| match name {
            "RAWG_API_KEY" => Some("from-env".into()),
            "TWITCH_CLIENT_ID" => Some("client".into()),
            "TWITCH_ACCESS_TOKEN" => Some("token".into()),
            "GAMALYTIC_API_KEY" => Some("  ".into()),
            _ => None,
        });

        assert_eq!(cfg.sources.rawg.api_key.as_deref(), Some("from-file"));
        assert!(cfg.sources.gamalytic.api_key.is_none());

        let available = available_platforms(&cfg);
        assert!(available.contains(&Platform::Twitch));
        assert!(available.contains(&Platform::Rawg));
        assert!(!available.contains(&Platform::Gamalytic));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[client]
timeout = "3s"
breaker_threshold = 5

[routing]
strategy = "intent"

[sources.steam]
api_key = "abc"
"#
        )
        .unwrap();

        let cfg = Config::load(Some(file.path())).unwrap();
        assert_eq!(cfg.client.timeout, Duration::from_secs(3));
        assert_eq!(cfg.client.breaker_threshold, 5);
        assert_eq!(cfg.client.min_request_interval, Duration::from_secs(1));
        assert_eq!(cfg.routing.strategy, RoutingStrategy::Intent);
        assert_eq!(cfg.sources.steam.api_key.as_deref(), Some("abc"));
        assert_eq!(
            cfg.sources.steam.base_url(Platform::Steam),
            "https://api.steampowered.com"
        );
        assert_eq!(cfg.usage.limits["gamalytic"], Some(1_000));
    }
}
