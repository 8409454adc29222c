//! Conversation state management

use relab_provider::{Message, MessageRole};

/// Ordered role-tagged messages forming the model context
///
/// Append-only during a run; `reset` and `restore` are the only ways to
/// drop messages.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    /// Create a new empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Start over with `[system, user]`
    pub fn reset(&mut self, system_prompt: impl Into<String>, user_message: impl Into<String>) {
        self.messages.clear();
        self.messages.push(Message::system(system_prompt));
        self.messages.push(Message::user(user_message));
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a user message
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    /// Append an assistant message
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Owned copy for persistence
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Replace the conversation with a saved one
    pub fn restore(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Number of assistant turns, i.e. completed iterations
    pub fn assistant_turns(&self) -> usize {
        self.messages.iter().filter(|m| m.is_assistant()).count()
    }

    /// System prompt, if the conversation starts with one
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Get message count
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
