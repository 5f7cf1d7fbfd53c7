//! Remote agent service interface and its HTTP implementation.

pub mod http;

pub use http::HttpAgentService;

use async_trait::async_trait;

use crate::error::TracelinkError;
use crate::types::{ChatReply, ChatRequest, HistoryEntry, Session, ToolCall};

/// The remote agent backend as seen by the client.
///
/// Treated as an opaque request/response service plus a pollable tool-call
/// log keyed by request id. Tests substitute in-memory implementations.
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Dispatch a query and wait for the assistant's reply.
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, TracelinkError>;

    /// Fetch the current tool-call list recorded for a request.
    ///
    /// An empty list is a valid answer, not an error.
    async fn fetch_tool_calls(&self, request_id: &str) -> Result<Vec<ToolCall>, TracelinkError>;

    /// Fetch up to `limit` stored messages of a session, oldest first.
    async fn fetch_history(
        &self,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<HistoryEntry>, TracelinkError>;

    /// List stored sessions with their last-message preview.
    async fn list_sessions(&self) -> Result<Vec<Session>, TracelinkError>;
}
