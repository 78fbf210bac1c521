//! One `resolve` entry point over both routing strategies

use serde_json::{Map, Value};
use tracing::debug;

use super::intent::{capability, extract_count, parse_intent};
use super::registry::{extract_game_name, Registry};
use crate::config::RoutingStrategy;
use crate::models::{Action, ChartType, DataFormat, MetricDefinition, Platform, SourceApi};

/// Everything the retriever needs to answer one query
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalPlan {
    /// Registry key, when routed through the registry
    pub metric_key: Option<&'static str>,
    /// Source to call
    pub api: SourceApi,
    /// Source method
    pub method: &'static str,
    /// Arguments of the call
    pub args: Map<String, Value>,
    /// Shape of the normalized rows
    pub data_format: &'static DataFormat,
    /// Preferred chart
    pub chart_type: ChartType,
    /// Rendered chart title
    pub title: String,
    /// Description of the data
    pub description: &'static str,
    /// Game the plan is about
    pub game_name: Option<String>,
    /// Number of rows wanted
    pub count: usize,
    /// Alternative plan tried when this one fails
    pub fallback: Option<Box<RetrievalPlan>>,
}

/// Outcome of routing a query
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Data to retrieve
    Plan(RetrievalPlan),
    /// Nothing in the query could be matched
    NoMatch,
    /// The matched metric is about one game but none was named
    MissingGame,
    /// The platform has no capability for the parsed action
    Unsupported { platform: Platform, action: Action },
}

/// Maps free text to a [`RetrievalPlan`] with the configured strategy
#[derive(Debug, Clone)]
pub struct Router {
    strategy: RoutingStrategy,
    registry: Registry,
}

impl Router {
    /// Router resolving with `strategy` over `registry`
    pub fn new(strategy: RoutingStrategy, registry: Registry) -> Self {
        Self { strategy, registry }
    }

    /// Strategy in use
    pub fn strategy(&self) -> RoutingStrategy {
        self.strategy
    }

    /// Metric catalogue
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Route `query` to a plan
    pub fn resolve(&self, query: &str) -> Resolution {
        let resolution = match self.strategy {
            RoutingStrategy::Registry => self.resolve_with_registry(query),
            RoutingStrategy::Intent => resolve_with_intent(query),
        };
        debug!(strategy = ?self.strategy, query = %query, resolution = resolution_label(&resolution), "Routed query");
        resolution
    }

    fn resolve_with_registry(&self, query: &str) -> Resolution {
        let Some(metric) = self
            .registry
            .find_metric(query)
            .and_then(|key| self.registry.get_metric_info(key))
        else {
            return Resolution::NoMatch;
        };

        let game_name = if metric.requires_game() {
            match extract_game_name(query) {
                Some(name) => Some(name),
                None => return Resolution::MissingGame,
            }
        } else {
            None
        };
        Resolution::Plan(plan_for_metric(metric, game_name, extract_count(query)))
    }
}

/// Build the plan for a registry metric, overriding `limit`/`page_size` with `count`
pub fn plan_for_metric(
    metric: &'static MetricDefinition,
    game_name: Option<String>,
    count: usize,
) -> RetrievalPlan {
    let mut args = metric.default_args();
    for key in ["limit", "page_size"] {
        if let Some(slot) = args.get_mut(key) {
            *slot = Value::from(count);
        }
    }
    if let Some(name) = &game_name {
        args.insert("game_name".into(), Value::from(name.as_str()));
    }

    RetrievalPlan {
        metric_key: Some(metric.key),
        api: metric.api,
        method: metric.method,
        args,
        data_format: &metric.data_format,
        chart_type: metric.chart_type,
        title: render_title(metric.data_format.title_template, game_name.as_deref()),
        description: metric.description,
        game_name,
        count,
        fallback: None,
    }
}

fn resolve_with_intent(query: &str) -> Resolution {
    let Some(intent) = parse_intent(query) else {
        return Resolution::NoMatch;
    };
    let Some(cap) = capability(intent.platform, intent.action) else {
        return Resolution::Unsupported {
            platform: intent.platform,
            action: intent.action,
        };
    };
    if intent.action == Action::AlsoPlayed && intent.game_name.is_none() {
        return Resolution::MissingGame;
    }

    let chart_type = if intent.action == Action::AlsoPlayed {
        ChartType::List
    } else {
        ChartType::Bar
    };
    let plan_on = |platform: Platform, method: &'static str, data_format: &'static DataFormat| {
        let mut args = Map::new();
        match platform {
            Platform::Steam => {
                args.insert("metric".into(), Value::from("concurrent_players"));
                args.insert("limit".into(), Value::from(intent.count));
            }
            Platform::Twitch => {
                args.insert("limit".into(), Value::from(intent.count));
            }
            _ => {}
        }
        if let Some(name) = &intent.game_name {
            args.insert("game_name".into(), Value::from(name.as_str()));
        }
        RetrievalPlan {
            metric_key: None,
            api: platform.into(),
            method,
            args,
            data_format,
            chart_type,
            title: render_title(data_format.title_template, intent.game_name.as_deref()),
            description: cap.description,
            game_name: intent.game_name.clone(),
            count: intent.count,
            fallback: None,
        }
    };

    let mut plan = plan_on(intent.platform, cap.method, cap.data_format);
    if let Some((platform, method, data_format)) = cap.fallback {
        plan.fallback = Some(Box::new(plan_on(platform, method, data_format)));
    }
    Resolution::Plan(plan)
}

/// Fill `{game_name}` in a title template, or cut unresolved placeholders off
pub fn render_title(template: &str, game_name: Option<&str>) -> String {
    let title = match game_name {
        Some(name) => template.replace("{game_name}", name),
        None => template.to_string(),
    };
    match title.find('{') {
        Some(idx) => {
            let mut head = title[..idx].trim_end_matches([':', ' ']);
            for suffix in [" for", " to"] {
                head = head.strip_suffix(suffix).unwrap_or(head);
            }
            head.trim_end().to_string()
        }
        None => title,
    }
}

fn resolution_label(resolution: &Resolution) -> &'static str {
    match resolution {
        Resolution::Plan(_) => "plan",
        Resolution::NoMatch => "no_match",
        Resolution::MissingGame => "missing_game",
        Resolution::Unsupported { .. } => "unsupported",
    }
}
