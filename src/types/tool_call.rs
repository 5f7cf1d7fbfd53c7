//! Tool-call records produced by the remote agent.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A single tool invocation recorded by the backend for one request.
///
/// The backend owns these records; the client only fetches and caches them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    #[serde(alias = "tool_name")]
    pub name: String,
    #[serde(default, alias = "input")]
    pub arguments: serde_json::Value,
    #[serde(default, alias = "output")]
    pub result: serde_json::Value,
    #[serde(default)]
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Lifecycle status of a tool call as reported by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolCallStatus {
    Running,
    #[default]
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Body of the tool-call polling endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolCallsResponse {
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}
