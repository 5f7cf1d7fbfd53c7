//! HTTP implementation of [`AgentService`] over `reqwest`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;

use super::AgentService;
use crate::config::{ClientConfig, Routes};
use crate::error::TracelinkError;
use crate::types::{
    ChatReply, ChatRequest, HistoryEntry, HistoryResponse, Session, SessionsResponse, ToolCall,
    ToolCallsResponse,
};
use crate::util::retry::RetryPolicy;

/// Talks to the agent backend's JSON endpoints.
#[derive(Debug, Clone)]
pub struct HttpAgentService {
    client: reqwest::Client,
    base_url: String,
    routes: Routes,
    read_retry: RetryPolicy,
}

impl HttpAgentService {
    /// Build a service with its own client from a validated config.
    pub fn new(config: &ClientConfig) -> Result<Self, TracelinkError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(json_headers())
            .build()?;
        Ok(Self::with_client(config, client))
    }

    /// Build a service around an existing client.
    pub fn with_client(config: &ClientConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            routes: config.routes.clone(),
            read_retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy used for session and history reads.
    pub fn with_read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    fn url(&self, route: &str) -> String {
        if route.starts_with('/') {
            format!("{}{}", self.base_url, route)
        } else {
            format!("{}/{}", self.base_url, route)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, TracelinkError> {
        let response = self.client.get(url).send().await?;
        decode(response).await
    }
}

/// Substitute a `{name}` placeholder with a percent-encoded path segment.
fn fill_route(template: &str, name: &str, value: &str) -> String {
    template.replace(&format!("{{{name}}}"), &urlencoding::encode(value))
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TracelinkError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(status_to_error(status.as_u16(), &body));
    }
    Ok(serde_json::from_str(&body)?)
}

/// Map a non-2xx status and body to an error.
pub fn status_to_error(status: u16, body: &str) -> TracelinkError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("detail")
                .or_else(|| v.get("error"))
                .and_then(|d| d.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string());
    match status {
        408 | 504 => TracelinkError::Timeout(0),
        _ => TracelinkError::api(status, message),
    }
}

#[async_trait]
impl AgentService for HttpAgentService {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, TracelinkError> {
        let url = self.url(&self.routes.chat);
        tracing::debug!(request_id = %request.request_id, session_id = ?request.session_id, "sending chat");
        let response = self.client.post(&url).json(request).send().await?;
        decode(response).await
    }

    async fn fetch_tool_calls(&self, request_id: &str) -> Result<Vec<ToolCall>, TracelinkError> {
        let url = self.url(&fill_route(&self.routes.tool_calls, "request_id", request_id));
        let body: ToolCallsResponse = self.get_json(&url).await?;
        Ok(body.tool_calls)
    }

    async fn fetch_history(
        &self,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<HistoryEntry>, TracelinkError> {
        let url = format!(
            "{}?limit={limit}",
            self.url(&fill_route(&self.routes.history, "session_id", session_id))
        );
        let body: HistoryResponse = self
            .read_retry
            .execute("fetch_history", || self.get_json(&url))
            .await?;
        Ok(body.messages)
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, TracelinkError> {
        let url = self.url(&self.routes.sessions);
        let body: SessionsResponse = self
            .read_retry
            .execute("list_sessions", || self.get_json(&url))
            .await?;
        Ok(body.sessions)
    }
}
