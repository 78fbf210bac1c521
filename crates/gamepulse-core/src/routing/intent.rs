//! Keyword and regex intent parser

use once_cell::sync::Lazy;
use regex::Regex;

use super::registry::{
    ALSO_PLAYED_FORMAT, GENRE_POPULARITY_FORMAT, GENRE_STATS_FORMAT, STEAMSPY_OWNED_FORMAT,
    STEAM_TOP_FORMAT, TWITCH_TOP_FORMAT,
};
use super::title_case;
use crate::models::{Action, DataFormat, DataType, Intent, Platform};

/// Platform keywords, checked in priority order
const PLATFORM_KEYWORDS: &[(Platform, &[&str])] = &[
    (Platform::Steam, &["steam"]),
    (Platform::Twitch, &["twitch", "streaming", "streamer"]),
    (
        Platform::Gamalytic,
        &["gamalytic", "similar", "also play", "audience overlap"],
    ),
    (Platform::SteamSpy, &["steamspy", "ownership", "owned"]),
];

const GENRE_KEYWORDS: &[&str] = &["genre", "genres", "category", "categories", "type", "types"];
const RANKING_KEYWORDS: &[&str] = &["top", "best", "popular", "most", "ranking", "chart"];
const SIMILARITY_PHRASES: &[&str] = &["similar", "also play", "other games", "related", "like"];

/// Secondary keywords that pick the action of a ranking query
const RANKING_ACTIONS: &[(Action, &[&str])] = &[
    (Action::TopGames, &["games", "titles"]),
    (Action::PlayerCount, &["player", "concurrent", "playing"]),
    (Action::ViewerCount, &["viewer", "watching", "streaming"]),
    (Action::Ownership, &["owned", "ownership"]),
];

const NOT_A_GAME: &[&str] = &[
    "steam", "twitch", "what", "which", "the", "most", "top", "popular", "other", "games", "do",
];

/// Result count used when a question or tool call asks for none (or zero)
pub const DEFAULT_COUNT: usize = 10;

static GAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"what (?:other )?games? do ([a-zA-Z0-9\s:'-]+?) players? (?:also )?play",
        r"([a-zA-Z0-9\s:'-]+?) players? (?:also )?play",
        r"(?:games? (?:like|similar to)|similar to) ([a-zA-Z0-9\s:'-]+?)(?:\s|$)",
        r"(?:for|about|of) ([a-zA-Z0-9\s:'-]+?)(?:\s+players?|\s+also|\s*$)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("game pattern is valid"))
    .collect()
});

static COUNT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"top\s+(\d+)").expect("count pattern is valid"));

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Parse a free-text query into an actionable intent
///
/// Returns `None` when no platform or no action could be determined. The
/// parser is a best-effort heuristic; ambiguous text may resolve wrongly.
pub fn parse_intent(query: &str) -> Option<Intent> {
    let lower = query.to_lowercase();

    let mut platform = PLATFORM_KEYWORDS
        .iter()
        .find(|(_, keywords)| contains_any(&lower, keywords))
        .map(|(platform, _)| *platform);

    let mut data_type = None;
    let mut action = None;
    if contains_any(&lower, GENRE_KEYWORDS) {
        data_type = Some(DataType::GenreAnalysis);
        action = Some(Action::Genres);
        platform = platform.or(Some(Platform::Gamalytic));
    } else if contains_any(&lower, RANKING_KEYWORDS) {
        data_type = Some(DataType::Rankings);
        action = RANKING_ACTIONS
            .iter()
            .find(|(_, keywords)| contains_any(&lower, keywords))
            .map(|(action, _)| *action);
    } else if contains_any(&lower, SIMILARITY_PHRASES) {
        data_type = Some(DataType::AlsoPlayed);
        action = Some(Action::AlsoPlayed);
        platform = platform.or(Some(Platform::Gamalytic));
    }

    let game_name = extract_game_from_patterns(&lower);

    if game_name.is_some() && platform.is_none() {
        platform = Some(if data_type == Some(DataType::AlsoPlayed) {
            Platform::Gamalytic
        } else {
            Platform::Steam
        });
    }
    if platform.is_none() && contains_any(&lower, &["games", "gaming"]) {
        platform = Some(Platform::Steam);
    }

    let count = extract_count(&lower);

    Some(Intent {
        platform: platform?,
        data_type,
        action: action?,
        game_name,
        count,
    })
}

/// The `N` of "top N", or the default result size
pub fn extract_count(query: &str) -> usize {
    COUNT_PATTERN
        .captures(&query.to_lowercase())
        .and_then(|caps| caps[1].parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_COUNT)
}

/// First game-name capture from the ordered templates that is not a filler word
pub(crate) fn extract_game_from_patterns(lower: &str) -> Option<String> {
    GAME_PATTERNS.iter().find_map(|pattern| {
        let caps = pattern.captures(lower)?;
        let candidate = caps.get(1)?.as_str().trim();
        (!NOT_A_GAME.contains(&candidate) && candidate.len() > 2).then(|| title_case(candidate))
    })
}

/// What a platform does for a given action
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capability {
    /// Source method to call
    pub method: &'static str,
    /// Shape of the normalized rows
    pub data_format: &'static DataFormat,
    /// Description used for the plan
    pub description: &'static str,
    /// Tried when the primary call fails
    pub fallback: Option<(Platform, &'static str, &'static DataFormat)>,
}

/// Look up the method serving `action` on `platform`
pub fn capability(platform: Platform, action: Action) -> Option<Capability> {
    use Action::*;

    let plain = |method, data_format, description| Capability {
        method,
        data_format,
        description,
        fallback: None,
    };

    match (platform, action) {
        (Platform::Steam, TopGames | PlayerCount | ConcurrentPlayers | Rankings) => Some(plain(
            "get_top_games",
            &STEAM_TOP_FORMAT,
            "Top games on Steam by concurrent players",
        )),
        (Platform::Twitch, TopGames | ViewerCount | Streaming | Popular) => Some(plain(
            "get_top_games",
            &TWITCH_TOP_FORMAT,
            "Most popular games on Twitch by viewer count",
        )),
        (Platform::Gamalytic, AlsoPlayed) => Some(plain(
            "get_other_games_players_play",
            &ALSO_PLAYED_FORMAT,
            "Games that players also play",
        )),
        (Platform::Gamalytic, GenreAnalysis | Genres | GenreStats) => Some(Capability {
            method: "get_genre_stats",
            data_format: &GENRE_STATS_FORMAT,
            description: "Most popular game genres",
            fallback: Some((
                Platform::SteamSpy,
                "analyze_genre_popularity",
                &GENRE_POPULARITY_FORMAT,
            )),
        }),
        (Platform::SteamSpy, Ownership | Owners | MostOwned) => Some(plain(
            "get_top_owned_games",
            &STEAMSPY_OWNED_FORMAT,
            "Most owned games on Steam",
        )),
        (Platform::SteamSpy, GenreAnalysis | Genres) => Some(plain(
            "analyze_genre_popularity",
            &GENRE_POPULARITY_FORMAT,
            "Most popular game genres",
        )),
        _ => None,
    }
}
