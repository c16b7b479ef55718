mod builder;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display};

use pybox_model::{
    ErrorKind as ModelErrorKind, ModelFinishReason, ModelMessage,
    ModelProviderError, ModelRequest, ToolCallResult,
};

use crate::conversation::Conversation;
use crate::model_client::ModelClient;
use crate::tool::Registry as ToolRegistry;
pub use builder::AgentBuilder;

/// Error produced when a whole turn fails before the model returns any
/// final text.
///
/// Tool failures never surface here: they are converted to result
/// strings and fed back to the model as data, so the model can attempt
/// self-correction. This error only covers the model provider itself
/// failing.
pub struct TurnError(Box<dyn ModelProviderError>);

impl TurnError {
    /// Returns the kind of the underlying provider error.
    #[inline]
    pub fn kind(&self) -> ModelErrorKind {
        self.0.kind()
    }
}

impl Debug for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TurnError").field(&self.0).finish()
    }
}

impl Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for TurnError {}

/// An agent instance, which owns a conversation, a model provider and a
/// toolset.
///
/// One agent serves one conversation: the history is append-only and
/// grows turn by turn. For surfaces that multiplex conversations (the
/// bot), create one agent per conversation key instead of sharing one
/// across them.
pub struct Agent {
    model_client: ModelClient,
    system_prompt: Option<String>,
    tools: ToolRegistry,
    conversation: Conversation,
}

impl Agent {
    /// Runs one conversation turn and resolves to the model's final
    /// text.
    ///
    /// The user input is appended to the history, then the model is
    /// called repeatedly: every assistant turn is appended as-is, every
    /// requested tool call is executed and answered with a tool result
    /// message, until the model stops requesting tools. The loop itself
    /// never retries anything; recovery from tool failures is driven by
    /// the model.
    pub async fn run_turn(
        &mut self,
        input: impl Into<String>,
    ) -> Result<String, TurnError> {
        self.conversation.push(ModelMessage::User(input.into()));

        loop {
            let request = self.build_model_request();
            let turn = self
                .model_client
                .send_request(request)
                .await
                .map_err(TurnError)?;
            self.conversation
                .push(ModelMessage::Assistant(turn.message.clone()));

            if turn.finish_reason != ModelFinishReason::ToolCalls
                || turn.tool_calls().is_empty()
            {
                return Ok(turn.content().to_owned());
            }

            for call in turn.tool_calls() {
                debug!("running tool `{}` ({})", call.name, call.id);
                let content = match self.tools.call(call).await {
                    Ok(content) => content,
                    Err(err) => {
                        // The model sees the failure as the tool's
                        // result and can fix its input on the next
                        // attempt.
                        warn!("tool `{}` failed: {}", call.name, err.reason());
                        format!("Error: {}", err.reason())
                    }
                };
                self.conversation.push(ModelMessage::Tool(ToolCallResult {
                    id: call.id.clone(),
                    content,
                }));
            }
        }
    }

    /// Returns the conversation held by this agent.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    fn build_model_request(&self) -> ModelRequest {
        let mut messages =
            Vec::with_capacity(self.conversation.messages().len() + 1);
        if let Some(system_prompt) = &self.system_prompt {
            messages.push(ModelMessage::System(system_prompt.clone()));
        }
        messages.extend(self.conversation.messages().iter().cloned());
        ModelRequest {
            messages,
            tools: self.tools.definitions(),
        }
    }
}
