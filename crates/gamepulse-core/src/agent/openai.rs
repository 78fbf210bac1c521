//! OpenAI-compatible chat completions backend

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{ChatMessage, NluBackend, NluError, Role, ToolCall, ToolSpec};
use crate::config::NluConfig;
use crate::error::{Error, Result};

/// Calls `{base_url}/chat/completions` with function tools
pub struct OpenAiBackend {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiBackend {
    /// Requires `nlu.api_key`
    pub fn new(config: &NluConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::config("No OpenAI API key configured (set OPENAI_API_KEY)"))?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
        })
    }

    fn request_body(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Value {
        let messages: Vec<Value> = messages.iter().map(wire_message).collect();
        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if !tools.is_empty() {
            let tools: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::from(tools);
            body["tool_choice"] = Value::from("auto");
        }
        body
    }
}

#[async_trait]
impl NluBackend for OpenAiBackend {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> std::result::Result<ChatMessage, NluError> {
        debug!(model = %self.model, messages = messages.len(), tools = tools.len(), "Requesting chat completion");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(messages, tools))
            .send()
            .await
            .map_err(|e| NluError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Chat completion failed");
            return Err(
                if status == StatusCode::TOO_MANY_REQUESTS || body.to_lowercase().contains("quota") {
                    NluError::QuotaExceeded(body)
                } else {
                    NluError::Request(format!("status {status}: {body}"))
                },
            );
        }

        let completion: Completion = response
            .json()
            .await
            .map_err(|e| NluError::Decode(e.to_string()))?;
        let message = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| NluError::Decode("response has no choices".into()))?
            .message;

        Ok(ChatMessage {
            role: Role::Assistant,
            content: message.content,
            tool_calls: message
                .tool_calls
                .into_iter()
                .map(|c| ToolCall {
                    id: c.id,
                    name: c.function.name,
                    arguments: c.function.arguments,
                })
                .collect(),
            tool_call_id: None,
        })
    }
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

fn wire_message(message: &ChatMessage) -> Value {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let mut wire = json!({ "role": role, "content": message.content });
    if !message.tool_calls.is_empty() {
        wire["tool_calls"] = message
            .tool_calls
            .iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "type": "function",
                    "function": { "name": c.name, "arguments": c.arguments },
                })
            })
            .collect();
    }
    if let Some(id) = &message.tool_call_id {
        wire["tool_call_id"] = Value::from(id.as_str());
    }
    wire
}

#[derive(Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireReply,
}

#[derive(Deserialize)]
struct WireReply {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> OpenAiBackend {
        OpenAiBackend::new(&NluConfig {
            base_url: format!("{}/v1", server.uri()),
            api_key: Some("sk-test".into()),
            ..NluConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_requires_api_key() {
        let err = OpenAiBackend::new(&NluConfig::default()).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn test_parses_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(bearer_token("sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini", "tool_choice": "auto"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_metric_data", "arguments": "{\"metric\":\"steam_top_games\"}"}
                    }]
                }}]
            })))
            .mount(&server)
            .await;

        let tools = vec![ToolSpec {
            name: "get_metric_data".into(),
            description: "d".into(),
            parameters: json!({"type": "object"}),
        }];
        let reply = backend(&server)
            .complete(&[ChatMessage::user("top steam games")], &tools)
            .await
            .unwrap();
        assert_eq!(reply.content, None);
        assert_eq!(
            reply.tool_calls,
            vec![ToolCall {
                id: "call_1".into(),
                name: "get_metric_data".into(),
                arguments: "{\"metric\":\"steam_top_games\"}".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_quota_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("You exceeded your current quota"))
            .mount(&server)
            .await;

        let err = backend(&server)
            .complete(&[ChatMessage::user("hi")], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, NluError::QuotaExceeded(_)));
    }

    #[test]
    fn test_wire_format_of_tool_results() {
        let wire = wire_message(&ChatMessage::tool_result("call_1", "{\"success\":true}"));
        assert_eq!(
            wire,
            json!({"role": "tool", "content": "{\"success\":true}", "tool_call_id": "call_1"})
        );
    }
}
