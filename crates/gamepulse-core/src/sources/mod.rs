//! Clients for the external gaming data sources
//!
//! Every source is reached through the [`SourceClient`] trait: a named
//! method plus JSON arguments in, a JSON payload out. [`GuardedClient`] adds
//! the circuit breaker, client-side rate limit and timeout on top of any
//! implementation, and [`SourceSet`] holds one guarded client per platform
//! that has credentials.

mod breaker;
mod game_ids;
mod guarded;
mod http;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use breaker::CircuitBreaker;
pub use game_ids::{static_steam_id, static_title, steam_id_from_search, StaticLookup};
pub use guarded::GuardedClient;
pub use http::HttpSource;

use crate::config::{available_platforms, Config};
use crate::error::{Result, UpstreamError};
use crate::models::Platform;

/// A black-box data source: method name + arguments in, JSON out
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Platform this client talks to
    fn platform(&self) -> Platform;

    /// Run a named retrieval method
    async fn invoke(&self, method: &str, args: &Map<String, Value>) -> std::result::Result<Value, UpstreamError>;
}

/// Guarded clients for every platform that can currently be used
#[derive(Default)]
pub struct SourceSet {
    clients: BTreeMap<Platform, Arc<GuardedClient>>,
}

impl SourceSet {
    /// An empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP clients for every platform with credentials configured
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut set = Self::new();
        for platform in available_platforms(config) {
            let http = HttpSource::new(platform, config.source(platform), config.client.timeout)?;
            set.insert(GuardedClient::new(Arc::new(http), &config.client));
        }
        Ok(set)
    }

    /// Register a client, replacing any previous one for its platform
    pub fn insert(&mut self, client: GuardedClient) {
        self.clients.insert(client.platform(), Arc::new(client));
    }

    /// Builder-style [`SourceSet::insert`]
    pub fn with(mut self, client: GuardedClient) -> Self {
        self.insert(client);
        self
    }

    /// Guarded client of `platform`
    pub fn get(&self, platform: Platform) -> Option<&Arc<GuardedClient>> {
        self.clients.get(&platform)
    }

    /// Whether `platform` has a client
    pub fn contains(&self, platform: Platform) -> bool {
        self.clients.contains_key(&platform)
    }

    /// Platforms with a registered client
    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.clients.keys().copied()
    }
}

impl std::fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.clients.keys()).finish()
    }
}
