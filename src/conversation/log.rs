//! In-memory ordered message log for the visible conversation.

use crate::error::{Result, TracelinkError};
use crate::types::Message;

/// Ordered log of messages exchanged in one conversation.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Ids must be unique within the log.
    pub fn push(&mut self, message: Message) -> Result<&Message> {
        if self.get(&message.id).is_some() {
            return Err(TracelinkError::InvalidArgument(format!(
                "duplicate message id {}",
                message.id
            )));
        }
        self.messages.push(message);
        Ok(&self.messages[self.messages.len() - 1])
    }

    /// Append a user message.
    pub fn push_user(&mut self, text: impl Into<String>, request_id: Option<String>) -> Result<&Message> {
        self.push(Message::user(text, request_id))
    }

    /// Append an empty assistant message awaiting the reply for `request_id`.
    pub fn push_placeholder(&mut self, request_id: &str) -> Result<&Message> {
        if self.find_by_request(request_id).is_some_and(Message::is_pending) {
            return Err(TracelinkError::InvalidState(format!(
                "request {request_id} already has a pending reply"
            )));
        }
        self.push(Message::assistant_placeholder(request_id))
    }

    /// Fill the pending assistant message for `request_id`.
    ///
    /// A placeholder is filled exactly once; later attempts are rejected.
    pub fn fill(&mut self, request_id: &str, content: impl Into<String>) -> Result<&Message> {
        let index = self
            .messages
            .iter()
            .position(|m| m.is_pending() && m.request_id.as_deref() == Some(request_id))
            .ok_or_else(|| {
                TracelinkError::InvalidState(format!("no pending reply for request {request_id}"))
            })?;
        let message = &mut self.messages[index];
        message.content = content.into();
        Ok(&self.messages[index])
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// The assistant message correlated with `request_id`, if any.
    pub fn find_by_request(&self, request_id: &str) -> Option<&Message> {
        self.messages.iter().rev().find(|m| {
            m.role == crate::types::Role::Assistant && m.request_id.as_deref() == Some(request_id)
        })
    }

    /// Replace the whole log, e.g. after loading another session's history.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
