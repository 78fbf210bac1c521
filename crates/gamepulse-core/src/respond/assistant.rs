//! The rule-based question answering entry point

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use super::formatter::{format_response, Formatted};
use crate::config::Config;
use crate::error::{Error, ErrorKind, Result};
use crate::models::{ChartSpec, Table};
use crate::retriever::Retriever;
use crate::routing::{plan_for_metric, Registry, Resolution, Router, DEFAULT_COUNT};
use crate::sources::SourceSet;
use crate::usage::{FileUsageStore, UsageTracker};

const EXAMPLE_QUESTIONS: &[&str] = &[
    "What are the top games on Twitch?",
    "Show me Steam's most popular games",
    "Tell me about Counter-Strike 2 statistics",
    "What other games do Elden Ring players also play?",
];

const MISSING_GAME: &str =
    "I couldn't identify which game you're asking about. Please specify a game name.";

/// Answer to one user message
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Response {
    /// Answer text
    pub text: String,
    /// Chart of the rows, when the data is chartable
    pub chart: Option<ChartSpec>,
    /// Rows behind the answer, when data was retrieved
    pub table: Option<Table>,
}

impl Response {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Routes a question, retrieves the data and phrases the answer
pub struct Assistant {
    router: Router,
    retriever: Arc<Retriever>,
}

impl Assistant {
    /// Assistant over an existing router and retriever
    pub fn new(router: Router, retriever: Arc<Retriever>) -> Self {
        Self { router, retriever }
    }

    /// Wire up sources, usage tracking and routing from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let sources = SourceSet::from_config(config)?;
        let store = Arc::new(FileUsageStore::new(config.usage.file_path()));
        let tracker = Arc::new(UsageTracker::new(store, config.usage.limits.clone())?);
        let router = Router::new(config.routing.strategy, Registry::default());
        Ok(Self::new(router, Arc::new(Retriever::new(sources, tracker))))
    }

    /// Router used to plan answers
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Retriever used to fetch data
    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    /// Metrics whose source is currently configured
    pub fn available_registry(&self) -> Registry {
        let platforms: BTreeSet<_> = self.retriever.sources().platforms().collect();
        Registry::available(&platforms)
    }

    /// Answer `text`; every failure becomes an explanatory message
    pub async fn respond(&self, text: &str) -> Response {
        let query = text.trim();
        if query.is_empty() {
            return Response::text(self.help_text());
        }

        let plan = match self.router.resolve(query) {
            Resolution::Plan(plan) => plan,
            Resolution::NoMatch => return Response::text(self.help_text()),
            Resolution::MissingGame => return Response::text(MISSING_GAME),
            Resolution::Unsupported { platform, action } => {
                return Response::text(format!(
                    "Sorry, I can't get {action} data from {}.",
                    platform.as_str()
                ))
            }
        };

        info!(api = plan.api.as_str(), method = plan.method, game = ?plan.game_name, "Answering query");
        match self.retriever.retrieve(&plan).await {
            Ok(table) => {
                let Formatted { text, chart } = format_response(&table, &plan);
                Response {
                    text,
                    chart,
                    table: Some(table),
                }
            }
            Err(err) => Response::text(describe_failure(&err)),
        }
    }

    /// Retrieve a registry metric directly, bypassing routing
    pub async fn metric_data(
        &self,
        key: &str,
        game_name: Option<String>,
        count: Option<usize>,
    ) -> Result<(Table, Formatted)> {
        let metric = self
            .router
            .registry()
            .get_metric_info(key)
            .ok_or_else(|| Error::Routing(format!("Unknown metric: {key}")))?;
        if metric.requires_game() && game_name.is_none() {
            return Err(Error::Routing(MISSING_GAME.to_string()));
        }
        let count = count.filter(|n| *n > 0).unwrap_or(DEFAULT_COUNT);
        let plan = plan_for_metric(metric, game_name, count);
        let table = self.retriever.retrieve(&plan).await?;
        let formatted = format_response(&table, &plan);
        Ok((table, formatted))
    }

    /// What the assistant can answer, with example questions
    pub fn help_text(&self) -> String {
        let available = self.available_registry();
        let registry = if available.is_empty() {
            self.router.registry().clone()
        } else {
            available
        };

        let mut text = String::from("I'm not sure what data you're looking for. Here's what I can help you with:\n\n");
        for (_, description) in registry.list_all() {
            text.push_str(&format!("• {description}\n"));
        }
        text.push_str("\nTry asking something like:\n");
        for example in EXAMPLE_QUESTIONS {
            text.push_str(&format!("• '{example}'\n"));
        }
        text
    }
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("router", &self.router)
            .field("retriever", &self.retriever)
            .finish()
    }
}

/// User-facing text for a failed retrieval
fn describe_failure(err: &Error) -> String {
    match err.kind() {
        ErrorKind::Internal => {
            error!(error = %err, "Unexpected failure while answering");
            format!("I encountered an error: {err}")
        }
        _ => format!("Sorry, I couldn't retrieve the data: {err}"),
    }
}
