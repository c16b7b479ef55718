use pybox_model::ToolCallRequest;
use serde::{Deserialize, Serialize};

/// The preset turn for an assistant step.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct PresetTurn {
    /// The text content, if any.
    pub content: Option<String>,
    /// Tool calls requested in this turn.
    pub tool_calls: Vec<ToolCallRequest>,
}

impl PresetTurn {
    /// Creates a `PresetTurn` with the specified text content.
    #[inline]
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: vec![],
        }
    }

    /// Appends a tool call request to this turn.
    #[inline]
    pub fn with_tool_call(mut self, request: ToolCallRequest) -> Self {
        self.tool_calls.push(request);
        self
    }
}
