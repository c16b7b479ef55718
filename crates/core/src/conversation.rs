//! Conversation-related types.

use pybox_model::ModelMessage;

/// Represents a conversation.
///
/// The message sequence is append-only for the lifetime of the owning
/// agent; nothing here ever rewrites or drops history.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    messages: Vec<ModelMessage>,
}

impl Conversation {
    /// Returns the messages of this conversation, oldest first.
    #[inline]
    pub fn messages(&self) -> &[ModelMessage] {
        &self.messages
    }

    #[inline]
    pub(crate) fn push(&mut self, message: ModelMessage) {
        self.messages.push(message);
    }
}
