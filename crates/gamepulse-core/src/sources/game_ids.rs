//! Mapping game names to Steam app ids

use serde_json::Value;

use crate::routing::title_case;

/// Result of consulting the built-in id table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticLookup {
    /// Steam app id of the title
    Found(&'static str),
    /// Known title that is not sold on Steam
    NotOnSteam,
    /// Title not in the table
    Unknown,
}

/// Hand-curated ids, used only when no search is possible. `None` marks
/// titles that are not on Steam.
const KNOWN_IDS: &[(&str, Option<&str>)] = &[
    ("elden ring", Some("1245620")),
    ("dota 2", Some("570")),
    ("counter-strike 2", Some("730")),
    ("counter-strike", Some("730")),
    ("cs2", Some("730")),
    ("pubg", Some("578080")),
    ("apex legends", Some("1172470")),
    ("cyberpunk 2077", Some("1091500")),
    ("the witcher 3", Some("292030")),
    ("witcher 3", Some("292030")),
    ("terraria", Some("105600")),
    ("left 4 dead 2", Some("550")),
    ("l4d2", Some("550")),
    ("grand theft auto v", Some("271590")),
    ("gta v", Some("271590")),
    ("gta 5", Some("271590")),
    ("total war rome ii", Some("214950")),
    ("rome total war 2", Some("214950")),
    ("total war rome 2", Some("214950")),
    ("rome 2", Some("214950")),
    ("destiny 2", Some("1085660")),
    ("rainbow six siege", Some("359550")),
    ("r6", Some("359550")),
    ("valorant", None),
    ("minecraft", None),
    ("fortnite", None),
    ("league of legends", None),
    ("call of duty warzone", Some("1962663")),
    ("cod warzone", Some("1962663")),
    ("warzone", Some("1962663")),
    ("rust", Some("252490")),
    ("among us", Some("945360")),
    ("fall guys", Some("1097150")),
    ("rocket league", Some("252950")),
    ("team fortress 2", Some("440")),
    ("tf2", Some("440")),
    ("garry's mod", Some("4000")),
    ("gmod", Some("4000")),
    ("half-life 2", Some("220")),
    ("portal 2", Some("620")),
    ("skyrim", Some("72850")),
    ("elder scrolls v skyrim", Some("72850")),
    ("fallout 4", Some("377160")),
    ("dark souls 3", Some("374320")),
    ("sekiro", Some("814380")),
    ("bloodborne", None),
    ("horizon zero dawn", Some("1151640")),
    ("monster hunter world", Some("582010")),
    ("red dead redemption 2", Some("1174180")),
    ("rdr2", Some("1174180")),
    ("assassin's creed valhalla", Some("2208920")),
];

/// Look a title up in the built-in table: exact match first, then a loose
/// word-overlap match against titles that are on Steam
pub fn static_steam_id(game_name: &str) -> StaticLookup {
    let wanted = game_name.trim().to_lowercase();
    if let Some((_, id)) = KNOWN_IDS.iter().find(|(title, _)| *title == wanted) {
        return match id {
            Some(id) => StaticLookup::Found(id),
            None => StaticLookup::NotOnSteam,
        };
    }

    let input_words: Vec<&str> = wanted.split_whitespace().collect();
    for (title, id) in KNOWN_IDS {
        let Some(id) = id else { continue };
        let title_words: Vec<&str> = title.split_whitespace().collect();
        let common = title_words.iter().filter(|w| input_words.contains(w)).count();
        if common > 0 && common >= title_words.len().min(2) {
            return StaticLookup::Found(id);
        }
    }
    StaticLookup::Unknown
}

/// Pick the Steam id of `game_name` out of a Gamalytic search payload,
/// preferring an exact (case-insensitive) title match over the first hit
pub fn steam_id_from_search(payload: &Value, game_name: &str) -> Option<String> {
    let results = match payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => ["result", "results", "data", "games"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .map(Vec::as_slice)?,
        _ => return None,
    };

    let title_of = |item: &Value| {
        ["name", "title"]
            .iter()
            .find_map(|key| item.get(*key).and_then(Value::as_str))
            .map(str::to_lowercase)
    };
    let wanted = game_name.trim().to_lowercase();
    let hit = results
        .iter()
        .find(|item| title_of(item).as_deref() == Some(wanted.as_str()))
        .or_else(|| results.first())?;

    ["steamId", "appid", "id"].iter().find_map(|key| match hit.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Display title for a Steam app id, from the first table spelling
pub fn static_title(steam_id: &str) -> Option<String> {
    KNOWN_IDS
        .iter()
        .find(|(_, id)| *id == Some(steam_id))
        .map(|(title, _)| title_case(title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exact_lookup() {
        assert_eq!(static_steam_id("Elden Ring"), StaticLookup::Found("1245620"));
        assert_eq!(static_steam_id("CS2"), StaticLookup::Found("730"));
        assert_eq!(static_steam_id("Fortnite"), StaticLookup::NotOnSteam);
    }

    #[test]
    fn test_loose_lookup() {
        assert_eq!(static_steam_id("the elden ring"), StaticLookup::Found("1245620"));
        assert_eq!(static_steam_id("Terraria 1.4"), StaticLookup::Found("105600"));
        assert_eq!(static_steam_id("Hollow Knight"), StaticLookup::Unknown);
    }

    #[test]
    fn test_search_prefers_exact_title() {
        let payload = json!({
            "result": [
                {"name": "Elden Ring Nightreign", "steamId": "2622380"},
                {"name": "ELDEN RING", "steamId": "1245620"}
            ]
        });
        assert_eq!(steam_id_from_search(&payload, "Elden Ring").as_deref(), Some("1245620"));
        assert_eq!(steam_id_from_search(&payload, "Nightreign").as_deref(), Some("2622380"));
        assert_eq!(steam_id_from_search(&json!({"result": []}), "x"), None);
    }

    #[test]
    fn test_search_accepts_numeric_ids() {
        let payload = json!([{"title": "Rust", "appid": 252490}]);
        assert_eq!(steam_id_from_search(&payload, "rust").as_deref(), Some("252490"));
    }

    #[test]
    fn test_static_title() {
        assert_eq!(static_title("730").as_deref(), Some("Counter-Strike 2"));
        assert_eq!(static_title("1245620").as_deref(), Some("Elden Ring"));
        assert_eq!(static_title("1"), None);
    }
}
