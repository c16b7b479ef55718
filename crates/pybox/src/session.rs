use std::env;
use std::path::PathBuf;

use pybox_core::{Agent, AgentBuilder, TurnError};
use pybox_model::ModelProvider;
use pybox_storage::BlobClient;

use crate::tools::PythonTool;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
    output_dir: Option<PathBuf>,
    blob: Option<BlobClient>,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider);
        Self {
            agent_builder,
            output_dir: None,
            blob: None,
        }
    }

    /// Sets the system prompt for the agent.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.agent_builder = self.agent_builder.with_system_prompt(prompt);
        self
    }

    /// Sets the directory that receives files the sandbox writes.
    ///
    /// Defaults to `output` under the OS temp dir.
    #[inline]
    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = Some(output_dir);
        self
    }

    /// Attaches a blob storage client. Sandbox artifacts are uploaded
    /// and returned as signed URLs instead of local paths.
    #[inline]
    pub fn with_blob_client(mut self, blob: BlobClient) -> Self {
        self.blob = Some(blob);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        let output_dir = self
            .output_dir
            .unwrap_or_else(|| env::temp_dir().join("output"));
        let agent = self
            .agent_builder
            .with_tool(PythonTool::new(output_dir, self.blob))
            .build();

        Session { agent }
    }
}

/// A chat session, like a window that displays messages and has an
/// input box.
///
/// The session holds a fully configured agent that you can use directly,
/// and it is basically a wrapper around [`Agent`].
pub struct Session {
    agent: Agent,
}

impl Session {
    /// Sends a message to the session and waits for the reply.
    ///
    /// The turn may involve any number of tool calls before the model
    /// settles on a final answer.
    #[inline]
    pub async fn send_message(
        &mut self,
        message: &str,
    ) -> Result<String, TurnError> {
        self.agent.run_turn(message).await
    }
}
