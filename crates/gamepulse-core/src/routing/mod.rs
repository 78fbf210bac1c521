//! Query routing
//!
//! Two strategies turn free text into a [`RetrievalPlan`]:
//!
//! - **Registry**: phrase scoring against the static metric catalogue
//! - **Intent**: keyword and regex parsing into `{platform, action, game, count}`
//!
//! [`Router`] selects one of them from configuration.

pub mod intent;
pub mod registry;
mod router;

pub use intent::{capability, extract_count, parse_intent, Capability, DEFAULT_COUNT};
pub use registry::{extract_game_name, Registry, METRICS};
pub use router::{plan_for_metric, render_title, Resolution, RetrievalPlan, Router};

/// Capitalise the first letter of every word, splitting on whitespace and `-`
pub(crate) fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        at_word_start = c.is_whitespace() || c == '-';
    }
    out
}

#[cfg(test)]
mod tests {
    use super::title_case;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("elden ring"), "Elden Ring");
        assert_eq!(title_case("counter-strike 2"), "Counter-Strike 2");
        assert_eq!(title_case("garry's MOD"), "Garry's Mod");
    }
}
