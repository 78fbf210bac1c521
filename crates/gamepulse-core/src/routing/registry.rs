//! Static catalogue of metrics and phrase-based matching

use std::collections::{BTreeSet, HashSet};

use super::intent::extract_game_from_patterns;
use super::title_case;
use crate::models::{
    ArgValue, ChartType, DataFormat, MetricDefinition, Platform, SortOrder, SourceApi,
};

/// Twitch top categories by live viewers
pub const TWITCH_TOP_FORMAT: DataFormat = DataFormat {
    x_column: "name",
    y_column: "viewer_count",
    x_title: "Games",
    y_title: "Current Viewers",
    title_template: "Most Popular Games on Twitch",
    value_divisor: None,
    sort: SortOrder::ValueDesc,
};

/// Steam top games by concurrent players
pub const STEAM_TOP_FORMAT: DataFormat = DataFormat {
    x_column: "name",
    y_column: "current_players",
    x_title: "Games",
    y_title: "Current Players",
    title_template: "Top Games on Steam by Player Count",
    value_divisor: None,
    sort: SortOrder::ValueDesc,
};

/// SteamSpy ownership estimates, shown in millions
pub const STEAMSPY_OWNED_FORMAT: DataFormat = DataFormat {
    x_column: "name",
    y_column: "owners",
    x_title: "Games",
    y_title: "Estimated Owners (millions)",
    title_template: "Most Owned Games on Steam",
    value_divisor: Some(1_000_000.0),
    sort: SortOrder::ValueDesc,
};

/// Gamalytic "also played" list
pub const ALSO_PLAYED_FORMAT: DataFormat = DataFormat {
    x_column: "name",
    y_column: "similarity_score",
    x_title: "Games",
    y_title: "Similarity Score",
    title_template: "Other games that {game_name} players also play",
    value_divisor: None,
    sort: SortOrder::Preserve,
};

/// Gamalytic genre statistics
pub const GENRE_STATS_FORMAT: DataFormat = DataFormat {
    x_column: "genre",
    y_column: "players",
    x_title: "Genres",
    y_title: "Active Players",
    title_template: "Game Genres by Active Players",
    value_divisor: None,
    sort: SortOrder::ValueDesc,
};

/// Genre popularity derived from SteamSpy top games
pub const GENRE_POPULARITY_FORMAT: DataFormat = DataFormat {
    x_column: "genre",
    y_column: "primary_activity",
    x_title: "Genres",
    y_title: "Players (last 2 weeks)",
    title_template: "Genre Popularity on Steam",
    value_divisor: None,
    sort: SortOrder::ValueDesc,
};

const METRIC_VALUE_FORMAT: DataFormat = DataFormat {
    x_column: "metric",
    y_column: "value",
    x_title: "Metrics",
    y_title: "Values",
    title_template: "Game Statistics",
    value_divisor: None,
    sort: SortOrder::ValueDesc,
};

/// Every metric, in match priority order
pub const METRICS: &[MetricDefinition] = &[
    MetricDefinition {
        key: "twitch_top_games",
        description: "Most popular games on Twitch by viewer count",
        api: SourceApi::Twitch,
        method: "get_top_games",
        method_args: &[("limit", ArgValue::Int(10))],
        user_phrases: &[
            "twitch popular games",
            "twitch top games",
            "most watched twitch",
            "popular on twitch",
            "trending twitch",
            "twitch viewer count",
            "streaming games",
            "twitch rankings",
        ],
        chart_type: ChartType::Bar,
        data_format: TWITCH_TOP_FORMAT,
    },
    MetricDefinition {
        key: "steam_top_games",
        description: "Top games on Steam by concurrent players",
        api: SourceApi::Steam,
        method: "get_top_games",
        method_args: &[
            ("metric", ArgValue::Str("concurrent_players")),
            ("limit", ArgValue::Int(10)),
        ],
        user_phrases: &[
            "steam top games",
            "steam popular",
            "steam player count",
            "most played steam",
            "steam concurrent",
            "steam rankings",
            "top steam games",
            "steam charts",
        ],
        chart_type: ChartType::Bar,
        data_format: STEAM_TOP_FORMAT,
    },
    MetricDefinition {
        key: "steamspy_top_owned",
        description: "Most owned games on Steam",
        api: SourceApi::SteamSpy,
        method: "get_top_games",
        method_args: &[("limit", ArgValue::Int(10))],
        user_phrases: &[
            "most owned games",
            "steamspy owners",
            "game ownership",
            "steam ownership",
            "most owned steam",
            "popular ownership",
            "ownership statistics",
            "steamspy statistics",
            "ownership data",
        ],
        chart_type: ChartType::Bar,
        data_format: STEAMSPY_OWNED_FORMAT,
    },
    MetricDefinition {
        key: "rawg_top_rated",
        description: "Highest rated games from RAWG",
        api: SourceApi::Rawg,
        method: "search_games",
        method_args: &[
            ("ordering", ArgValue::Str("-rating")),
            ("page_size", ArgValue::Int(10)),
        ],
        user_phrases: &[
            "best rated games",
            "highest rated",
            "top rated games",
            "best games",
            "game ratings",
            "rawg ratings",
        ],
        chart_type: ChartType::Bar,
        data_format: DataFormat {
            x_column: "name",
            y_column: "rating",
            x_title: "Games",
            y_title: "Rating (out of 5)",
            title_template: "Highest Rated Games",
            value_divisor: None,
            sort: SortOrder::ValueDesc,
        },
    },
    MetricDefinition {
        key: "game_stats",
        description: "Individual game statistics",
        api: SourceApi::Multi,
        method: "game_stats",
        method_args: &[],
        user_phrases: &[
            "game stats",
            "game statistics",
            "tell me about",
            "game details",
            "game info",
            "analyze game",
        ],
        chart_type: ChartType::Bar,
        data_format: METRIC_VALUE_FORMAT,
    },
    MetricDefinition {
        key: "other_games_players_play",
        description: "What other games do players of this game also play",
        api: SourceApi::GamalyticSimple,
        method: "get_other_games_players_play",
        method_args: &[],
        user_phrases: &[
            "what other games",
            "other games players",
            "also play",
            "players also play",
            "what games do players",
            "games players play",
            "what do players also play",
        ],
        chart_type: ChartType::List,
        data_format: ALSO_PLAYED_FORMAT,
    },
    MetricDefinition {
        key: "gamalytic_game_analysis",
        description: "Comprehensive game analysis from Gamalytic",
        api: SourceApi::Gamalytic,
        method: "get_game_details",
        method_args: &[],
        user_phrases: &[
            "detailed analysis",
            "comprehensive analysis",
            "game analysis",
            "full breakdown",
            "complete stats",
            "deep dive",
            "market analysis",
            "detailed stats",
            "thorough analysis",
            "gamalytic data",
        ],
        chart_type: ChartType::Bar,
        data_format: DataFormat {
            title_template: "Comprehensive Analysis: {game_name}",
            ..METRIC_VALUE_FORMAT
        },
    },
    MetricDefinition {
        key: "gamalytic_playtime_distribution",
        description: "Player playtime distribution patterns",
        api: SourceApi::Gamalytic,
        method: "get_game_details",
        method_args: &[],
        user_phrases: &[
            "playtime distribution",
            "playtime patterns",
            "how long do players",
            "player engagement",
            "session length",
            "time spent playing",
            "engagement metrics",
            "playtime breakdown",
            "player hours",
        ],
        chart_type: ChartType::Bar,
        data_format: DataFormat {
            x_column: "time_range",
            y_column: "percentage",
            x_title: "Playtime Ranges",
            y_title: "Percentage of Players",
            title_template: "Playtime Distribution for {game_name}",
            value_divisor: None,
            sort: SortOrder::Preserve,
        },
    },
    MetricDefinition {
        key: "twitch_extension_analytics",
        description: "Extension analytics report from Twitch Analytics API",
        api: SourceApi::Twitch,
        method: "get_extension_analytics",
        method_args: &[],
        user_phrases: &[
            "extension analytics",
            "extension performance",
            "extension metrics",
            "extension insights",
            "extension engagement",
            "extension revenue",
            "extension downloads",
            "extension usage",
            "extension stats",
        ],
        chart_type: ChartType::Line,
        data_format: DataFormat {
            x_column: "date",
            y_column: "metric_value",
            x_title: "Date",
            y_title: "Metric Value",
            title_template: "Extension Analytics: {extension_name}",
            value_divisor: None,
            sort: SortOrder::Preserve,
        },
    },
    MetricDefinition {
        key: "twitch_game_analytics",
        description: "Game analytics report from Twitch Analytics API",
        api: SourceApi::Twitch,
        method: "get_game_analytics",
        method_args: &[],
        user_phrases: &[
            "game analytics",
            "viewership analytics",
            "streaming analytics",
            "twitch game metrics",
            "game viewership",
            "streaming metrics",
            "broadcast analytics",
            "viewer analytics",
            "stream performance",
        ],
        chart_type: ChartType::Line,
        data_format: DataFormat {
            x_column: "date",
            y_column: "view_count",
            x_title: "Date",
            y_title: "View Count",
            title_template: "Game Analytics: {game_name}",
            value_divisor: None,
            sort: SortOrder::Preserve,
        },
    },
    MetricDefinition {
        key: "twitch_bits_leaderboard",
        description: "Bits leaderboard for channel monetization analysis",
        api: SourceApi::Twitch,
        method: "get_bits_leaderboard",
        method_args: &[],
        user_phrases: &[
            "bits leaderboard",
            "top contributors",
            "channel points",
            "bits analytics",
            "monetization analytics",
            "top donors",
            "bits revenue",
            "supporter metrics",
        ],
        chart_type: ChartType::Bar,
        data_format: DataFormat {
            x_column: "user_name",
            y_column: "score",
            x_title: "Contributors",
            y_title: "Bits Contributed",
            title_template: "Top Bits Contributors",
            value_divisor: None,
            sort: SortOrder::ValueDesc,
        },
    },
    MetricDefinition {
        key: "twitch_extension_transactions",
        description: "Extension transaction analytics for monetization tracking",
        api: SourceApi::Twitch,
        method: "get_extension_transactions",
        method_args: &[],
        user_phrases: &[
            "extension transactions",
            "extension revenue",
            "bits transactions",
            "monetization tracking",
            "extension earnings",
            "transaction analytics",
            "extension monetization",
            "bits revenue analytics",
        ],
        chart_type: ChartType::Bar,
        data_format: DataFormat {
            x_column: "product_type",
            y_column: "amount",
            x_title: "Product Type",
            y_title: "Revenue Amount",
            title_template: "Extension Transaction Analytics",
            value_divisor: None,
            sort: SortOrder::ValueDesc,
        },
    },
    MetricDefinition {
        key: "similar_games",
        description: "Games similar to a specific game",
        api: SourceApi::Gamalytic,
        method: "get_game_details",
        method_args: &[],
        user_phrases: &[
            "similar games",
            "games like",
            "similar to",
            "recommendations",
            "games similar to",
            "find similar",
            "like this game",
        ],
        chart_type: ChartType::Bar,
        data_format: DataFormat {
            x_column: "name",
            y_column: "copiesSold",
            x_title: "Similar Games",
            y_title: "Estimated Copies Sold",
            title_template: "Games Similar to {game_name}",
            value_divisor: None,
            sort: SortOrder::ValueDesc,
        },
    },
];

/// A view over [`METRICS`], optionally restricted to usable sources
#[derive(Debug, Clone)]
pub struct Registry {
    metrics: Vec<&'static MetricDefinition>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            metrics: METRICS.iter().collect(),
        }
    }
}

impl Registry {
    /// Only metrics whose source can be reached with the given platforms
    pub fn available(platforms: &BTreeSet<Platform>) -> Self {
        let metrics = METRICS
            .iter()
            .filter(|m| match m.api.platform() {
                Some(platform) => platforms.contains(&platform),
                None => platforms.contains(&Platform::Rawg) || platforms.contains(&Platform::SteamSpy),
            })
            .collect();
        Self { metrics }
    }

    /// Best matching metric key for a free-text query
    ///
    /// A phrase found verbatim scores twice its word count; a phrase whose
    /// words all occur somewhere in the query scores its word count. Ties go
    /// to the metric registered first.
    pub fn find_metric(&self, query: &str) -> Option<&'static str> {
        let query = query.to_lowercase();
        let words: HashSet<&str> = query.split_whitespace().collect();

        let mut best: Option<&'static str> = None;
        let mut best_score = 0;
        for metric in &self.metrics {
            let score: usize = metric
                .user_phrases
                .iter()
                .map(|phrase| phrase_score(phrase, &query, &words))
                .sum();
            if score > best_score {
                best_score = score;
                best = Some(metric.key);
            }
        }
        best
    }

    /// Definition of `key`, if present
    pub fn get_metric_info(&self, key: &str) -> Option<&'static MetricDefinition> {
        self.metrics.iter().copied().find(|m| m.key == key)
    }

    /// `(key, description)` pairs in registration order
    pub fn list_all(&self) -> Vec<(&'static str, &'static str)> {
        self.metrics.iter().map(|m| (m.key, m.description)).collect()
    }

    /// Keys of every metric
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.metrics.iter().map(|m| m.key)
    }

    /// Every metric definition
    pub fn iter(&self) -> impl Iterator<Item = &'static MetricDefinition> + '_ {
        self.metrics.iter().copied()
    }

    /// Number of metrics
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

fn phrase_score(phrase: &str, query: &str, words: &HashSet<&str>) -> usize {
    let phrase = phrase.to_lowercase();
    let count = phrase.split_whitespace().count();
    if query.contains(&phrase) {
        return count * 2;
    }
    let phrase_words: HashSet<&str> = phrase.split_whitespace().collect();
    if phrase_words.is_subset(words) {
        phrase_words.len()
    } else {
        0
    }
}

/// Phrases after which the rest of the query names a game
const GAME_INDICATORS: &[&str] = &[
    "tell me about",
    "stats for",
    "statistics for",
    "analyze",
    "information about",
    "details about",
    "data on",
    "data about",
];

/// Spellings mapped to canonical titles; checked in order
const KNOWN_TITLES: &[(&str, Option<&str>)] = &[
    ("counter-strike", Some("Counter-Strike")),
    ("counter strike", Some("Counter-Strike")),
    ("cs2", Some("Counter-Strike 2")),
    ("cs:go", Some("Counter-Strike: Global Offensive")),
    ("csgo", Some("Counter-Strike: Global Offensive")),
    ("total war attila", Some("Total War: Attila")),
    ("total war", Some("Total War")),
    ("attila", Some("Total War: Attila")),
    ("league of legends", Some("League of Legends")),
    ("lol", Some("League of Legends")),
    ("dota 2", Some("Dota 2")),
    ("dota", Some("Dota 2")),
    ("world of warcraft", None),
    ("wow", None),
    ("valorant", Some("VALORANT")),
    ("apex legends", Some("Apex Legends")),
    ("fortnite", None),
    ("call of duty", Some("Call of Duty")),
    ("cod", Some("Call of Duty")),
    ("overwatch", None),
    ("minecraft", None),
    ("grand theft auto", Some("Grand Theft Auto")),
    ("gta", Some("Grand Theft Auto")),
    ("the witcher", Some("The Witcher 3")),
    ("cyberpunk", Some("Cyberpunk 2077")),
    ("red dead redemption", Some("Red Dead Redemption 2")),
    ("elden ring", Some("Elden Ring")),
    ("steam deck", None),
    ("battlefield", None),
    ("fifa", None),
    ("madden", None),
    ("rocket league", Some("Rocket League")),
    ("among us", Some("Among Us")),
    ("fall guys", Some("Fall Guys")),
    ("pubg", Some("PLAYERUNKNOWN'S BATTLEGROUNDS")),
    ("destiny", None),
    ("warframe", None),
    ("path of exile", Some("Path of Exile")),
    ("diablo", None),
    ("civilization", None),
    ("crusader kings", Some("Crusader Kings III")),
    ("europa universalis", Some("Europa Universalis IV")),
    ("age of empires", Some("Age of Empires")),
    ("starcraft", None),
    ("hearthstone", None),
];

/// Pull a game title out of a query routed through the registry
pub fn extract_game_name(query: &str) -> Option<String> {
    let lower = query.to_lowercase();
    let after = |marker: &str| lower.split_once(marker).map(|(_, rest)| rest.trim().to_string());
    let finish = |s: String| {
        let s = s.replace('?', "");
        let s = s.trim();
        (!s.is_empty()).then(|| title_case(s))
    };

    if let Some(rest) = after("players of") {
        let rest = rest.replace(" also play", "").replace(" play", "");
        if let Some(name) = finish(rest) {
            return Some(name);
        }
    }

    if lower.contains("similar") {
        if let Some(name) = after(" to ").and_then(finish) {
            return Some(name);
        }
    }

    if let Some(name) = after("games like").and_then(finish) {
        return Some(name);
    }

    for indicator in GAME_INDICATORS {
        if let Some(rest) = after(indicator) {
            let rest = rest.replace("the game", "").replace("game", "");
            if let Some(name) = finish(rest) {
                return Some(name);
            }
        }
    }

    if let Some(name) = extract_game_from_patterns(&lower) {
        return Some(name);
    }

    KNOWN_TITLES
        .iter()
        .find(|(spelling, _)| lower.contains(spelling))
        .map(|(spelling, canonical)| match canonical {
            Some(title) => (*title).to_string(),
            None => title_case(spelling),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_keys_are_unique() {
        let keys: HashSet<_> = METRICS.iter().map(|m| m.key).collect();
        assert_eq!(keys.len(), METRICS.len());
    }

    #[rstest]
    #[case("What are the twitch top games?", Some("twitch_top_games"))]
    #[case("show me steam charts", Some("steam_top_games"))]
    #[case("Which are the most owned games", Some("steamspy_top_owned"))]
    #[case("best rated games of all time", Some("rawg_top_rated"))]
    #[case("What other games do players of Elden Ring also play?", Some("other_games_players_play"))]
    #[case("bits leaderboard please", Some("twitch_bits_leaderboard"))]
    #[case("asdfqwer", None)]
    fn test_find_metric(#[case] query: &str, #[case] expected: Option<&str>) {
        assert_eq!(Registry::default().find_metric(query), expected);
    }

    #[test]
    fn test_exact_phrase_beats_scattered_words() {
        let registry = Registry::default();
        // "twitch top games" verbatim scores 6; scattered it only scores 3
        assert_eq!(registry.find_metric("twitch top games"), Some("twitch_top_games"));
        assert_eq!(
            registry.find_metric("games at the top on steam"),
            Some("steam_top_games")
        );
    }

    #[test]
    fn test_available_restricts_by_platform() {
        let only_spy: BTreeSet<_> = [Platform::SteamSpy].into_iter().collect();
        let registry = Registry::available(&only_spy);
        let keys: Vec<_> = registry.keys().collect();
        assert_eq!(keys, vec!["steamspy_top_owned", "game_stats"]);
        assert!(Registry::available(&BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_list_all_keeps_insertion_order() {
        let all = Registry::default().list_all();
        assert_eq!(all.len(), 13);
        assert_eq!(all[0].0, "twitch_top_games");
        assert_eq!(all[12].0, "similar_games");
    }

    #[rstest]
    #[case("What other games do players of elden ring also play?", Some("Elden Ring"))]
    #[case("find similar games to hollow knight", Some("Hollow Knight"))]
    #[case("games like stardew valley?", Some("Stardew Valley"))]
    #[case("tell me about the game terraria", Some("Terraria"))]
    #[case("deep dive into cs2 please", Some("Counter-Strike 2"))]
    #[case("comprehensive analysis", None)]
    fn test_extract_game_name(#[case] query: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract_game_name(query).as_deref(), expected);
    }

    proptest! {
        #[test]
        fn prop_find_metric_is_deterministic(query in "[a-z ]{0,40}") {
            let registry = Registry::default();
            prop_assert_eq!(registry.find_metric(&query), registry.find_metric(&query));
        }
    }
}
