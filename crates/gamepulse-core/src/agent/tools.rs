//! Typed tools exposed to the language model

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::respond::Assistant;
use crate::usage::UsageTracker;

/// Name, description and JSON schema of a tool's arguments
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    /// Name the model calls the tool by
    pub name: String,
    /// What the tool does, shown to the model
    pub description: String,
    /// JSON schema of the arguments
    pub parameters: Value,
}

/// A callable tool with typed arguments
#[async_trait]
pub trait Tool: Send + Sync {
    /// Deserialized from the model's JSON arguments
    type Args: DeserializeOwned + Send;

    /// Description offered to the model
    fn spec(&self) -> ToolSpec;

    /// Run the tool
    async fn call(&self, args: Self::Args) -> Result<Value>;
}

#[async_trait]
trait ErasedTool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    async fn call_json(&self, arguments: &str) -> Value;
}

#[async_trait]
impl<T: Tool> ErasedTool for T {
    fn spec(&self) -> ToolSpec {
        Tool::spec(self)
    }

    async fn call_json(&self, arguments: &str) -> Value {
        let arguments = if arguments.trim().is_empty() { "{}" } else { arguments };
        let args: T::Args = match serde_json::from_str(arguments) {
            Ok(args) => args,
            Err(e) => {
                let name = Tool::spec(self).name;
                warn!(tool = %name, error = %e, "Malformed tool arguments");
                return failure(format!("Invalid arguments for {name}: {e}"));
            }
        };
        match self.call(args).await {
            Ok(data) => json!({ "success": true, "data": data }),
            Err(e) => failure(e.to_string()),
        }
    }
}

fn failure(error: String) -> Value {
    json!({ "success": false, "error": error })
}

/// Tools in registration order, dispatched by name
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn ErasedTool>>,
}

impl ToolRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard tool set over an assistant and its usage tracker
    pub fn standard(assistant: Arc<Assistant>) -> Self {
        let tracker = Arc::clone(assistant.retriever().tracker());
        let mut tools = Self::new();
        tools.register(MetricDataTool::new(assistant));
        tools.register(UsageSummaryTool::new(Arc::clone(&tracker)));
        tools.register(ResetUsageTool::new(tracker));
        tools
    }

    /// Add a tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.push(Box::new(tool));
    }

    /// Specs of every registered tool, in registration order
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tool is registered
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run the named tool; the result is always a `{success, data|error}` object
    pub async fn dispatch(&self, name: &str, arguments: &str) -> Value {
        debug!(tool = %name, "Dispatching tool call");
        match self.tools.iter().find(|t| t.spec().name == name) {
            Some(tool) => tool.call_json(arguments).await,
            None => failure(format!("Unknown tool: {name}")),
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(|t| t.spec().name))
            .finish()
    }
}

/// Arguments of [`MetricDataTool`]
#[derive(Debug, Deserialize)]
pub struct MetricArgs {
    /// Registry key of the metric
    pub metric: String,
    /// Game the metric is about
    #[serde(default)]
    pub game_name: Option<String>,
    /// Number of rows; zero or absent means the default
    #[serde(default)]
    pub count: Option<usize>,
}

/// Fetch any registry metric whose source is configured
pub struct MetricDataTool {
    assistant: Arc<Assistant>,
    metrics: Vec<&'static str>,
}

impl MetricDataTool {
    /// Offer every metric the assistant can currently serve
    pub fn new(assistant: Arc<Assistant>) -> Self {
        let metrics = assistant.available_registry().keys().collect();
        Self { assistant, metrics }
    }
}

#[async_trait]
impl Tool for MetricDataTool {
    type Args = MetricArgs;

    fn spec(&self) -> ToolSpec {
        let descriptions: Vec<String> = self
            .assistant
            .available_registry()
            .list_all()
            .into_iter()
            .map(|(key, description)| format!("{key}: {description}"))
            .collect();
        ToolSpec {
            name: "get_metric_data".into(),
            description: format!(
                "Retrieve gaming data for a predefined metric. Available metrics: {}",
                descriptions.join("; ")
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "metric": {
                        "type": "string",
                        "enum": self.metrics,
                        "description": "Metric key to retrieve"
                    },
                    "game_name": {
                        "type": "string",
                        "description": "Game name, required for game-specific metrics"
                    },
                    "count": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Number of results to return"
                    }
                },
                "required": ["metric"]
            }),
        }
    }

    async fn call(&self, args: MetricArgs) -> Result<Value> {
        if !self.metrics.contains(&args.metric.as_str()) {
            return Err(Error::Routing(format!("Metric {} is not available", args.metric)));
        }
        let (table, formatted) = self
            .assistant
            .metric_data(&args.metric, args.game_name, args.count)
            .await?;
        Ok(json!({
            "metric": args.metric,
            "summary": formatted.text,
            "chart": formatted.chart,
            "rows": table,
        }))
    }
}

/// Arguments of tools that take none
#[derive(Debug, Default, Deserialize)]
pub struct NoArgs {}

fn no_parameters() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// Monthly usage and estimated cost per API
pub struct UsageSummaryTool {
    tracker: Arc<UsageTracker>,
}

impl UsageSummaryTool {
    /// Report from `tracker`
    pub fn new(tracker: Arc<UsageTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl Tool for UsageSummaryTool {
    type Args = NoArgs;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "get_api_usage_summary".into(),
            description: "Show this month's API call counts, limits and estimated cost".into(),
            parameters: no_parameters(),
        }
    }

    async fn call(&self, _args: NoArgs) -> Result<Value> {
        Ok(json!({
            "usage": self.tracker.summary(),
            "cost": self.tracker.cost_estimate(),
            "last_reset": self.tracker.last_reset(),
        }))
    }
}

/// Zero all monthly counters
pub struct ResetUsageTool {
    tracker: Arc<UsageTracker>,
}

impl ResetUsageTool {
    /// Reset counters of `tracker`
    pub fn new(tracker: Arc<UsageTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl Tool for ResetUsageTool {
    type Args = NoArgs;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "reset_monthly_usage".into(),
            description: "Reset all monthly API usage counters to zero".into(),
            parameters: no_parameters(),
        }
    }

    async fn call(&self, _args: NoArgs) -> Result<Value> {
        self.tracker.reset()?;
        Ok(json!({ "message": "Monthly API usage counters have been reset" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, RoutingStrategy};
    use crate::retriever::Retriever;
    use crate::routing::{Registry, Router};
    use crate::sources::SourceSet;
    use crate::usage::MemoryUsageStore;
    use pretty_assertions::assert_eq;

    fn tools() -> (ToolRegistry, Arc<UsageTracker>) {
        let tracker = Arc::new(
            UsageTracker::new(Arc::new(MemoryUsageStore::new()), Config::default().usage.limits).unwrap(),
        );
        let retriever = Retriever::new(SourceSet::new(), Arc::clone(&tracker));
        let assistant = Assistant::new(Router::new(RoutingStrategy::Registry, Registry::default()), Arc::new(retriever));
        (ToolRegistry::standard(Arc::new(assistant)), tracker)
    }

    #[test]
    fn test_specs_in_registration_order() {
        let (tools, _) = tools();
        let names: Vec<_> = tools.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["get_metric_data", "get_api_usage_summary", "reset_monthly_usage"]);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (tools, _) = tools();
        assert_eq!(
            tools.dispatch("launch_rockets", "{}").await,
            json!({"success": false, "error": "Unknown tool: launch_rockets"})
        );
    }

    #[tokio::test]
    async fn test_malformed_arguments_are_reported() {
        let (tools, _) = tools();
        let result = tools.dispatch("get_metric_data", "{\"metric\": ").await;
        assert_eq!(result["success"], json!(false));
        assert!(result["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid arguments for get_metric_data"));

        let result = tools.dispatch("get_metric_data", "{\"count\": 3}").await;
        assert_eq!(result["success"], json!(false));
    }

    #[tokio::test]
    async fn test_unavailable_metric_is_rejected() {
        let (tools, _) = tools();
        let result = tools
            .dispatch("get_metric_data", r#"{"metric": "twitch_top_games"}"#)
            .await;
        assert_eq!(
            result,
            json!({"success": false, "error": "Metric twitch_top_games is not available"})
        );
    }

    #[tokio::test]
    async fn test_usage_tools() {
        let (tools, tracker) = tools();
        tracker.track("gamalytic", 900);

        let summary = tools.dispatch("get_api_usage_summary", "").await;
        assert_eq!(summary["data"]["usage"]["gamalytic"]["status"], json!("critical"));
        assert_eq!(summary["data"]["cost"]["total_estimated"], json!(9.0));

        let reset = tools.dispatch("reset_monthly_usage", "{}").await;
        assert_eq!(reset["success"], json!(true));
        assert_eq!(tracker.usage("gamalytic"), 0);
    }
}
