use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The reason why a model turn has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFinishReason {
    /// The model needs to call a tool.
    ToolCalls,
    /// The model has finished generating text.
    Stop,
}

/// Describes a tool call request from the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The arguments to pass to the tool, as a JSON value.
    pub arguments: Value,
}

/// One assistant message, as it should be replayed in the history.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// The text content, if any.
    pub content: Option<String>,
    /// Tool calls requested in this message.
    pub tool_calls: Vec<ToolCallRequest>,
}

/// A complete turn received from the model provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelTurn {
    /// The assistant message produced in this turn.
    pub message: AssistantMessage,
    /// Why the model stopped generating.
    pub finish_reason: ModelFinishReason,
}

impl ModelTurn {
    /// Returns the text content of this turn, or an empty string.
    #[inline]
    pub fn content(&self) -> &str {
        self.message.content.as_deref().unwrap_or_default()
    }

    /// Returns the tool calls requested in this turn.
    #[inline]
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        &self.message.tool_calls
    }
}
