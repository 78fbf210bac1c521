//! Conversational agent over a tool-calling language model
//!
//! The model is an opaque [`NluBackend`]: it receives the conversation and
//! the tool specs, and answers either with text or with tool calls. The
//! [`ChatAgent`] runs the calls through a [`ToolRegistry`], feeds the results
//! back and repeats until the model answers in text.

mod conversation;
mod openai;
mod tools;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use conversation::{ChatAgent, SYSTEM_PROMPT};
pub use openai::OpenAiBackend;
pub use tools::{
    MetricArgs, MetricDataTool, NoArgs, ResetUsageTool, Tool, ToolRegistry, ToolSpec, UsageSummaryTool,
};

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model
    System,
    /// The person asking
    User,
    /// The model
    Assistant,
    /// Output of a tool call
    Tool,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Id echoed back on the tool result
    pub id: String,
    /// Tool name
    pub name: String,
    /// Raw JSON text, possibly malformed
    pub arguments: String,
}

/// One message of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message
    pub role: Role,
    /// Text, absent on pure tool-call replies
    pub content: Option<String>,
    /// Tools the model asked to run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Set on tool results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// System instructions
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// A message typed by the user
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// A plain model reply
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Result of the tool call `call_id`
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::with_role(Role::Tool, content)
        }
    }
}

/// Failures of the language model backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NluError {
    /// Billing quota or rate limit exhausted
    #[error("language model quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Transport failure or non-success status
    #[error("language model request failed: {0}")]
    Request(String),

    /// Body that is not a chat completion
    #[error("invalid language model response: {0}")]
    Decode(String),
}

/// An opaque chat model that may answer with tool calls
#[async_trait]
pub trait NluBackend: Send + Sync {
    /// Next assistant message for `messages`, offering `tools`
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage, NluError>;
}
