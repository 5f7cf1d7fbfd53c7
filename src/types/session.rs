//! Session summaries and stored history, as returned by the backend.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{Message, Role};

/// Read-only summary of a stored conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    #[serde(default)]
    pub last_message: String,
}

/// Body of `GET /sessions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionsResponse {
    #[serde(default)]
    pub sessions: Vec<Session>,
}

/// Metadata the backend stores next to each history entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HistoryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// One stored message of a session's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub metadata: HistoryMetadata,
}

impl HistoryEntry {
    /// Convert into a conversation message with a fresh local id.
    pub fn into_message(self) -> Message {
        let timestamp = self
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);
        Message {
            id: Uuid::new_v4().to_string(),
            role: self.role,
            content: self.content,
            timestamp,
            request_id: self.metadata.request_id,
        }
    }
}

/// Body of `GET /history/{session_id}`, oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HistoryResponse {
    #[serde(default, alias = "history")]
    pub messages: Vec<HistoryEntry>,
}

/// RFC 3339, or a naive ISO-8601 stamp interpreted as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Filter sessions by a search string.
///
/// Matches case-insensitively against the session id and the last message
/// preview. An empty or blank query keeps everything.
pub fn filter_sessions<'a>(sessions: &'a [Session], query: &str) -> Vec<&'a Session> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return sessions.iter().collect();
    }
    sessions
        .iter()
        .filter(|s| {
            s.session_id.to_lowercase().contains(&needle)
                || s.last_message.to_lowercase().contains(&needle)
        })
        .collect()
}
