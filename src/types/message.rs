//! Conversation message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// A message in the visible conversation.
///
/// Immutable once appended, except that a pending assistant message's
/// `content` is filled exactly once when the reply arrives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Message {
    fn new(role: Role, content: String, request_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
            request_id,
        }
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>, request_id: Option<String>) -> Self {
        Self::new(Role::User, text.into(), request_id)
    }

    /// Create an assistant message with known content.
    pub fn assistant(text: impl Into<String>, request_id: Option<String>) -> Self {
        Self::new(Role::Assistant, text.into(), request_id)
    }

    /// Create the empty assistant message that stands in for a pending reply.
    pub fn assistant_placeholder(request_id: impl Into<String>) -> Self {
        Self::new(Role::Assistant, String::new(), Some(request_id.into()))
    }

    /// Assistant message whose reply has not arrived yet.
    pub fn is_pending(&self) -> bool {
        self.role == Role::Assistant && self.content.is_empty()
    }
}

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}
