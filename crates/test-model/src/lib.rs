//! A local fake model for testing purpose.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;

use pybox_model::{
    AssistantMessage, ErrorKind, ModelFinishReason, ModelProvider,
    ModelProviderError, ModelRequest, ModelTurn,
};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Clone)]
enum ConversationStep {
    UserInput,
    AssistantTurn(PresetTurn),
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script,
/// which is how the model should respond to a request. The added steps
/// will be selected according to the history messages in your request.
/// If there are no enough steps in the script, an error will be
/// returned.
///
/// Requests whose history ends with tool result messages advance the
/// script by those messages too, so a script models an entire turn
/// including tool round-trips.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    conversation_script: Vec<ConversationStep>,
}

impl TestModelProvider {
    /// Adds an assistant response step.
    #[inline]
    pub fn add_assistant_turn(&mut self, preset: PresetTurn) {
        self.conversation_script
            .push(ConversationStep::AssistantTurn(preset));
    }

    /// Adds a step for one incoming message (user input or a tool
    /// result).
    #[inline]
    pub fn add_incoming_step(&mut self) {
        self.conversation_script.push(ConversationStep::UserInput);
    }
}

impl ModelProvider for TestModelProvider {
    type Error = Error;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelTurn, Self::Error>> + Send + 'static
    {
        // The system message doesn't advance the script.
        let step_idx = req
            .messages
            .iter()
            .filter(|msg| {
                !matches!(msg, pybox_model::ModelMessage::System(_))
            })
            .count();

        let result = 'blk: {
            if step_idx >= self.conversation_script.len() {
                break 'blk Err(Error {
                    message: "no enough steps",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }

            let step = &self.conversation_script[step_idx];
            let preset = match step {
                ConversationStep::UserInput => {
                    break 'blk Err(Error {
                        message: "not an assistant turn step",
                        kind: ErrorKind::Moderated,
                    });
                }
                ConversationStep::AssistantTurn(preset) => preset.clone(),
            };

            let finish_reason = if preset.tool_calls.is_empty() {
                ModelFinishReason::Stop
            } else {
                ModelFinishReason::ToolCalls
            };
            Ok(ModelTurn {
                message: AssistantMessage {
                    content: preset.content,
                    tool_calls: preset.tool_calls,
                },
                finish_reason,
            })
        };
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use pybox_model::{ModelMessage, ToolCallRequest};
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestModelProvider::default();
        provider.add_incoming_step();
        provider.add_assistant_turn(PresetTurn::with_content(
            "Hello, world!",
        ));
        provider.add_incoming_step();
        provider.add_assistant_turn(
            PresetTurn::with_content("Sure, let me take a look.")
                .with_tool_call(ToolCallRequest {
                    id: "tool:1".to_owned(),
                    name: "execute_python".to_owned(),
                    arguments: json!({ "input": "print(1)" }),
                }),
        );

        let mut req = ModelRequest {
            messages: vec![
                ModelMessage::System("Be nice.".to_owned()),
                ModelMessage::User("Hi".to_owned()),
            ],
            tools: vec![],
        };
        let turn = provider.send_request(&req).await.unwrap();
        assert_eq!(turn.content(), "Hello, world!");
        assert_eq!(turn.finish_reason, ModelFinishReason::Stop);

        req.messages
            .push(ModelMessage::Assistant(turn.message.clone()));
        req.messages
            .push(ModelMessage::User("Run something".to_owned()));
        let turn = provider.send_request(&req).await.unwrap();
        assert_eq!(turn.finish_reason, ModelFinishReason::ToolCalls);
        assert_eq!(turn.tool_calls()[0].name, "execute_python");
    }

    #[tokio::test]
    async fn test_exhausted_script_is_an_error() {
        let provider = TestModelProvider::default();
        let req = ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            tools: vec![],
        };
        let err = provider.send_request(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
    }
}
