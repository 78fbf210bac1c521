//! Source identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An external data source with its own client, credentials and quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Steam Web API
    Steam,
    /// Twitch Helix API
    Twitch,
    /// RAWG video game database
    Rawg,
    /// SteamSpy ownership estimates
    SteamSpy,
    /// Gamalytic market analytics
    Gamalytic,
}

impl Platform {
    /// All platforms, in declaration order
    pub const ALL: [Platform; 5] = [
        Platform::Steam,
        Platform::Twitch,
        Platform::Rawg,
        Platform::SteamSpy,
        Platform::Gamalytic,
    ];

    /// Lowercase identifier, also used as the usage-tracker key
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Steam => "steam",
            Platform::Twitch => "twitch",
            Platform::Rawg => "rawg",
            Platform::SteamSpy => "steamspy",
            Platform::Gamalytic => "gamalytic",
        }
    }

    /// Human-readable name used in user-facing text
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Steam => "Steam",
            Platform::Twitch => "Twitch",
            Platform::Rawg => "RAWG",
            Platform::SteamSpy => "SteamSpy",
            Platform::Gamalytic => "Gamalytic",
        }
    }

    /// Whether the source can be used without any credentials
    pub fn is_keyless(&self) -> bool {
        matches!(self, Platform::SteamSpy)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "steam" => Ok(Platform::Steam),
            "twitch" => Ok(Platform::Twitch),
            "rawg" => Ok(Platform::Rawg),
            "steamspy" => Ok(Platform::SteamSpy),
            "gamalytic" => Ok(Platform::Gamalytic),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// The `api` field of a metric: a platform, a specialised handler, or a
/// multi-source aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceApi {
    /// Steam Web API
    #[serde(rename = "steam")]
    Steam,
    /// Twitch Helix API
    #[serde(rename = "twitch")]
    Twitch,
    /// RAWG database
    #[serde(rename = "rawg")]
    Rawg,
    /// SteamSpy estimates
    #[serde(rename = "steamspy")]
    SteamSpy,
    /// Gamalytic market data
    #[serde(rename = "gamalytic")]
    Gamalytic,
    /// Gamalytic "what else do players play" name list
    #[serde(rename = "gamalytic_simple")]
    GamalyticSimple,
    /// Combination of several sources
    #[serde(rename = "multi")]
    Multi,
}

impl SourceApi {
    /// Identifier as written in the registry
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceApi::Steam => "steam",
            SourceApi::Twitch => "twitch",
            SourceApi::Rawg => "rawg",
            SourceApi::SteamSpy => "steamspy",
            SourceApi::Gamalytic => "gamalytic",
            SourceApi::GamalyticSimple => "gamalytic_simple",
            SourceApi::Multi => "multi",
        }
    }

    /// The single platform backing this api, if any
    pub fn platform(&self) -> Option<Platform> {
        match self {
            SourceApi::Steam => Some(Platform::Steam),
            SourceApi::Twitch => Some(Platform::Twitch),
            SourceApi::Rawg => Some(Platform::Rawg),
            SourceApi::SteamSpy => Some(Platform::SteamSpy),
            SourceApi::Gamalytic | SourceApi::GamalyticSimple => Some(Platform::Gamalytic),
            SourceApi::Multi => None,
        }
    }

    /// One-line data-source attribution
    pub fn attribution(&self) -> String {
        match self.platform() {
            Some(platform) => format!("Data from {} API", platform.display_name()),
            None => "Data compiled from multiple sources".to_string(),
        }
    }
}

impl From<Platform> for SourceApi {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Steam => SourceApi::Steam,
            Platform::Twitch => SourceApi::Twitch,
            Platform::Rawg => SourceApi::Rawg,
            Platform::SteamSpy => SourceApi::SteamSpy,
            Platform::Gamalytic => SourceApi::Gamalytic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_round_trips_through_str() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>(), Ok(platform));
        }
    }

    #[test]
    fn test_attribution() {
        assert_eq!(SourceApi::Steam.attribution(), "Data from Steam API");
        assert_eq!(SourceApi::GamalyticSimple.attribution(), "Data from Gamalytic API");
        assert_eq!(SourceApi::Multi.attribution(), "Data compiled from multiple sources");
    }
}
