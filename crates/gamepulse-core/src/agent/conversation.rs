//! The tool-calling conversation loop

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ChatMessage, NluBackend, NluError, ToolRegistry};
use crate::models::{ChartSpec, Table};
use crate::respond::{Assistant, Response};
use crate::usage::UsageTracker;

/// Instructions sent as the first message of every conversation
pub const SYSTEM_PROMPT: &str = "You are GamePulse, an assistant for gaming industry data. \
Answer questions about games, players, viewers and ownership by calling the available tools. \
Use get_metric_data with the metric that best matches the question; pass game_name for \
game-specific metrics and count when the user asks for a number of results. \
Summarize the returned data concisely and mention which source it came from. \
If a tool reports an error, explain it to the user plainly.";

/// Usage counter key of the language model
const NLU_API: &str = "openai";

/// A conversation with a tool-calling model
pub struct ChatAgent {
    backend: Arc<dyn NluBackend>,
    tools: ToolRegistry,
    assistant: Arc<Assistant>,
    tracker: Arc<UsageTracker>,
    max_tool_rounds: usize,
    session_id: Uuid,
    history: Vec<ChatMessage>,
}

impl ChatAgent {
    /// Start a conversation with the standard tools over `assistant`
    pub fn new(backend: Arc<dyn NluBackend>, assistant: Arc<Assistant>, max_tool_rounds: usize) -> Self {
        let tracker = Arc::clone(assistant.retriever().tracker());
        Self {
            backend,
            tools: ToolRegistry::standard(Arc::clone(&assistant)),
            assistant,
            tracker,
            max_tool_rounds,
            session_id: Uuid::new_v4(),
            history: vec![ChatMessage::system(SYSTEM_PROMPT)],
        }
    }

    /// Replace the standard tool set
    #[must_use]
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Messages so far, system prompt first
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Identifies the conversation in logs; renewed by [`Self::clear_history`]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Forget everything but the system prompt and start a new session
    pub fn clear_history(&mut self) {
        self.history.truncate(1);
        self.session_id = Uuid::new_v4();
    }

    /// Answer one user message, calling tools as the model requests
    pub async fn respond(&mut self, text: &str) -> Response {
        self.history.push(ChatMessage::user(text));
        let specs = self.tools.specs();
        let mut chart: Option<ChartSpec> = None;
        let mut table: Option<Table> = None;

        for round in 0..=self.max_tool_rounds {
            self.tracker.track(NLU_API, 1);
            let reply = match self.backend.complete(&self.history, &specs).await {
                Ok(reply) => reply,
                Err(NluError::QuotaExceeded(detail)) => {
                    warn!(detail = %detail, "Language model quota exceeded, answering with rules");
                    let response = self.assistant.respond(text).await;
                    self.history.push(ChatMessage::assistant(response.text.clone()));
                    return response;
                }
                Err(e) => {
                    warn!(error = %e, "Language model call failed");
                    return Response {
                        text: format!("I encountered an error: {e}"),
                        chart,
                        table,
                    };
                }
            };

            if reply.tool_calls.is_empty() || round == self.max_tool_rounds {
                if !reply.tool_calls.is_empty() {
                    warn!(rounds = round, "Tool round limit reached");
                }
                let text = reply.content.clone().unwrap_or_default();
                self.history.push(ChatMessage::assistant(text.clone()));
                return Response { text, chart, table };
            }

            let calls = reply.tool_calls.clone();
            self.history.push(reply);
            for call in calls {
                info!(session = %self.session_id, tool = %call.name, round, "Model requested tool");
                let result = self.tools.dispatch(&call.name, &call.arguments).await;
                capture(&result, &mut chart, &mut table);
                self.history.push(ChatMessage::tool_result(call.id, result.to_string()));
            }
        }

        // The loop always returns on its last round
        Response::default()
    }
}

impl std::fmt::Debug for ChatAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatAgent")
            .field("tools", &self.tools)
            .field("session_id", &self.session_id)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

/// Keep the latest chart and rows a tool produced
fn capture(result: &Value, chart: &mut Option<ChartSpec>, table: &mut Option<Table>) {
    let Some(data) = result.get("data") else {
        return;
    };
    if let Some(spec) = data.get("chart").and_then(|c| serde_json::from_value(c.clone()).ok()) {
        *chart = Some(spec);
    }
    if let Some(rows) = data.get("rows") {
        match serde_json::from_value(rows.clone()) {
            Ok(rows) => *table = Some(rows),
            Err(e) => debug!(error = %e, "Tool rows are not a table"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Role, ToolCall, ToolSpec};
    use crate::config::{Config, RoutingStrategy};
    use crate::retriever::Retriever;
    use crate::routing::{Registry, Router};
    use crate::sources::SourceSet;
    use crate::usage::MemoryUsageStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    /// Replays canned replies and records what it was sent
    struct Scripted {
        replies: Mutex<Vec<Result<ChatMessage, NluError>>>,
        seen: Mutex<Vec<usize>>,
    }

    impl Scripted {
        fn new(mut replies: Vec<Result<ChatMessage, NluError>>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl NluBackend for Scripted {
        async fn complete(&self, messages: &[ChatMessage], _tools: &[ToolSpec]) -> Result<ChatMessage, NluError> {
            self.seen.lock().push(messages.len());
            self.replies
                .lock()
                .pop()
                .unwrap_or_else(|| Ok(ChatMessage::assistant("done")))
        }
    }

    fn calling(name: &str, arguments: &str) -> ChatMessage {
        ChatMessage {
            role: Role::Assistant,
            content: None,
            tool_calls: vec![ToolCall {
                id: format!("call_{name}"),
                name: name.into(),
                arguments: arguments.into(),
            }],
            tool_call_id: None,
        }
    }

    fn assistant() -> Arc<Assistant> {
        let tracker = UsageTracker::new(Arc::new(MemoryUsageStore::new()), Config::default().usage.limits).unwrap();
        Arc::new(Assistant::new(
            Router::new(RoutingStrategy::Registry, Registry::default()),
            Arc::new(Retriever::new(SourceSet::new(), Arc::new(tracker))),
        ))
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let backend = Scripted::new(vec![Ok(ChatMessage::assistant("Hello!"))]);
        let assistant = assistant();
        let mut agent = ChatAgent::new(backend, Arc::clone(&assistant), 4);

        let response = agent.respond("hi").await;
        assert_eq!(response.text, "Hello!");
        assert_eq!(agent.history().len(), 3);
        assert_eq!(assistant.retriever().tracker().usage("openai"), 1);
    }

    #[tokio::test]
    async fn test_tool_results_are_fed_back() {
        let backend = Scripted::new(vec![
            Ok(calling("get_api_usage_summary", "{}")),
            Ok(ChatMessage::assistant("You have used 1 call.")),
        ]);
        let assistant = assistant();
        let mut agent = ChatAgent::new(Arc::clone(&backend) as Arc<dyn NluBackend>, Arc::clone(&assistant), 4);

        let response = agent.respond("how much have I used?").await;
        assert_eq!(response.text, "You have used 1 call.");

        let history = agent.history();
        assert_eq!(history.len(), 5);
        assert_eq!(history[3].role, Role::Tool);
        assert_eq!(history[3].tool_call_id.as_deref(), Some("call_get_api_usage_summary"));
        let result: Value = serde_json::from_str(history[3].content.as_deref().unwrap()).unwrap();
        assert_eq!(result["success"], Value::Bool(true));

        assert_eq!(*backend.seen.lock(), vec![2, 4]);
        assert_eq!(assistant.retriever().tracker().usage("openai"), 2);
    }

    #[tokio::test]
    async fn test_malformed_arguments_do_not_abort() {
        let backend = Scripted::new(vec![
            Ok(calling("get_metric_data", "{not json")),
            Ok(ChatMessage::assistant("Sorry, that failed.")),
        ]);
        let mut agent = ChatAgent::new(backend, assistant(), 4);

        let response = agent.respond("top games").await;
        assert_eq!(response.text, "Sorry, that failed.");
        let result: Value = serde_json::from_str(agent.history()[3].content.as_deref().unwrap()).unwrap();
        assert_eq!(result["success"], Value::Bool(false));
    }

    #[tokio::test]
    async fn test_round_limit() {
        let backend = Scripted::new(vec![
            Ok(calling("get_api_usage_summary", "{}")),
            Ok(calling("get_api_usage_summary", "{}")),
            Ok(calling("get_api_usage_summary", "{}")),
        ]);
        let assistant = assistant();
        let mut agent = ChatAgent::new(backend, Arc::clone(&assistant), 1);

        let response = agent.respond("loop forever").await;
        assert_eq!(response.text, "");
        assert_eq!(assistant.retriever().tracker().usage("openai"), 2);
    }

    #[tokio::test]
    async fn test_quota_falls_back_to_rules() {
        let backend = Scripted::new(vec![Err(NluError::QuotaExceeded("insufficient_quota".into()))]);
        let mut agent = ChatAgent::new(backend, assistant(), 4);

        let response = agent.respond("asdfqwer").await;
        assert!(response.text.starts_with("I'm not sure what data you're looking for."));
    }

    #[tokio::test]
    async fn test_other_failures_are_reported() {
        let backend = Scripted::new(vec![Err(NluError::Request("connection refused".into()))]);
        let mut agent = ChatAgent::new(backend, assistant(), 4);

        let response = agent.respond("hi").await;
        assert_eq!(
            response.text,
            "I encountered an error: language model request failed: connection refused"
        );
    }

    #[tokio::test]
    async fn test_clear_history_keeps_prompt() {
        let backend = Scripted::new(vec![]);
        let mut agent = ChatAgent::new(backend, assistant(), 4);
        let session = agent.session_id();
        agent.respond("hi").await;
        agent.clear_history();
        assert_eq!(agent.history(), &[ChatMessage::system(SYSTEM_PROMPT)]);
        assert_ne!(agent.session_id(), session);
    }

    #[test]
    fn test_capture_reads_tool_data() {
        let result = serde_json::json!({
            "success": true,
            "data": {
                "chart": {
                    "chart_type": "bar",
                    "x_column": "name",
                    "y_column": "value",
                    "x_title": "Game",
                    "y_title": "Viewers",
                    "title": "Top Twitch Games"
                },
                "rows": {"rows": []}
            }
        });
        let (mut chart, mut table) = (None, None);
        capture(&result, &mut chart, &mut table);
        assert_eq!(chart.map(|c| c.title), Some("Top Twitch Games".to_string()));
        assert_eq!(table, Some(Table::empty()));
    }
}
