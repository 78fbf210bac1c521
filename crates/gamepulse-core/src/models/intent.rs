//! Structured intents extracted from free text

use std::fmt;

use serde::{Deserialize, Serialize};

use super::platform::Platform;

/// Coarse category of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Rankings of games
    Rankings,
    /// Genre breakdowns
    GenreAnalysis,
    /// Games shared by a player base
    AlsoPlayed,
}

/// Specific capability requested from a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Top games overall
    TopGames,
    /// Player counts
    PlayerCount,
    /// Concurrent players right now
    ConcurrentPlayers,
    /// Ranked lists
    Rankings,
    /// Live viewer counts
    ViewerCount,
    /// Streaming activity
    Streaming,
    /// Popularity in general
    Popular,
    /// What else players of a game play
    AlsoPlayed,
    /// Genre analysis
    GenreAnalysis,
    /// Genre list
    Genres,
    /// Genre statistics
    GenreStats,
    /// Ownership estimates
    Ownership,
    /// Owner counts
    Owners,
    /// Most owned games
    MostOwned,
}

impl Action {
    /// snake_case identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::TopGames => "top_games",
            Action::PlayerCount => "player_count",
            Action::ConcurrentPlayers => "concurrent_players",
            Action::Rankings => "rankings",
            Action::ViewerCount => "viewer_count",
            Action::Streaming => "streaming",
            Action::Popular => "popular",
            Action::AlsoPlayed => "also_played",
            Action::GenreAnalysis => "genre_analysis",
            Action::Genres => "genres",
            Action::GenreStats => "genre_stats",
            Action::Ownership => "ownership",
            Action::Owners => "owners",
            Action::MostOwned => "most_owned",
        }
    }

    /// Whether this action asks for genre-level aggregates
    pub fn is_genre(&self) -> bool {
        matches!(
            self,
            Action::GenreAnalysis | Action::Genres | Action::GenreStats
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of parsing a query; only produced when platform and action resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Source the question is about
    pub platform: Platform,
    /// Kind of data asked for, when recognised
    pub data_type: Option<DataType>,
    /// What the user wants done
    pub action: Action,
    /// Game the question names, if any
    pub game_name: Option<String>,
    /// Requested result size
    pub count: usize,
}
