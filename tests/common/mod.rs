//! Shared test helpers and an in-memory agent service.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::oneshot;

use tracelink::error::TracelinkError;
use tracelink::poller::{ToolCallSink, ToolCallUpdate};
use tracelink::service::AgentService;
use tracelink::types::*;

/// How the mock answers the next chat request.
pub enum ChatScript {
    Reply { session_id: String, reply: String },
    Fail { status: u16, message: String },
    Gated(oneshot::Receiver<ChatScript>),
}

/// How the mock answers the next tool-call fetch for a request.
pub enum FetchScript {
    Calls(Vec<ToolCall>),
    Fail,
    Gated(oneshot::Receiver<Vec<ToolCall>>),
}

/// Agent service with scripted, optionally gated, responses.
///
/// Tool-call fetches without a queued script repeat the last list served
/// for that request (or an empty list).
#[derive(Default)]
pub struct MockAgentService {
    chat: Mutex<VecDeque<ChatScript>>,
    chat_requests: Mutex<Vec<ChatRequest>>,
    fetches: Mutex<HashMap<String, VecDeque<FetchScript>>>,
    last_served: Mutex<HashMap<String, Vec<ToolCall>>>,
    fetch_count: AtomicUsize,
    history: Mutex<HashMap<String, Vec<HistoryEntry>>>,
    history_fails: Mutex<bool>,
    sessions: Mutex<Vec<Session>>,
}

impl MockAgentService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queue_reply(&self, session_id: &str, reply: &str) {
        self.chat.lock().unwrap().push_back(ChatScript::Reply {
            session_id: session_id.to_string(),
            reply: reply.to_string(),
        });
    }

    pub fn queue_chat_failure(&self, status: u16, message: &str) {
        self.chat.lock().unwrap().push_back(ChatScript::Fail {
            status,
            message: message.to_string(),
        });
    }

    /// Queue a chat answer that waits until the returned sender fires.
    pub fn gate_chat(&self) -> oneshot::Sender<ChatScript> {
        let (tx, rx) = oneshot::channel();
        self.chat.lock().unwrap().push_back(ChatScript::Gated(rx));
        tx
    }

    pub fn queue_tool_calls(&self, request_id: &str, calls: Vec<ToolCall>) {
        self.push_fetch(request_id, FetchScript::Calls(calls));
    }

    pub fn queue_tool_call_failure(&self, request_id: &str) {
        self.push_fetch(request_id, FetchScript::Fail);
    }

    /// Queue a tool-call answer that waits until the returned sender fires.
    pub fn gate_tool_calls(&self, request_id: &str) -> oneshot::Sender<Vec<ToolCall>> {
        let (tx, rx) = oneshot::channel();
        self.push_fetch(request_id, FetchScript::Gated(rx));
        tx
    }

    pub fn set_history(&self, session_id: &str, entries: Vec<HistoryEntry>) {
        self.history
            .lock()
            .unwrap()
            .insert(session_id.to_string(), entries);
    }

    pub fn fail_history(&self) {
        *self.history_fails.lock().unwrap() = true;
    }

    pub fn set_sessions(&self, sessions: Vec<Session>) {
        *self.sessions.lock().unwrap() = sessions;
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.chat_requests.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    fn push_fetch(&self, request_id: &str, script: FetchScript) {
        self.fetches
            .lock()
            .unwrap()
            .entry(request_id.to_string())
            .or_default()
            .push_back(script);
    }
}

#[async_trait]
impl AgentService for MockAgentService {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, TracelinkError> {
        self.chat_requests.lock().unwrap().push(request.clone());
        let script = self.chat.lock().unwrap().pop_front();
        let script = match script {
            Some(ChatScript::Gated(rx)) => rx
                .await
                .map_err(|_| TracelinkError::InvalidState("chat gate dropped".into()))?,
            Some(other) => other,
            None => ChatScript::Reply {
                session_id: "mock-session".into(),
                reply: "mock reply".into(),
            },
        };
        match script {
            ChatScript::Reply { session_id, reply } => Ok(ChatReply {
                session_id,
                reply,
                request_id: Some(request.request_id.clone()),
            }),
            ChatScript::Fail { status, message } => Err(TracelinkError::api(status, message)),
            ChatScript::Gated(_) => Err(TracelinkError::InvalidState("nested chat gate".into())),
        }
    }

    async fn fetch_tool_calls(&self, request_id: &str) -> Result<Vec<ToolCall>, TracelinkError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let script = self
            .fetches
            .lock()
            .unwrap()
            .get_mut(request_id)
            .and_then(VecDeque::pop_front);
        let calls = match script {
            Some(FetchScript::Calls(calls)) => calls,
            Some(FetchScript::Fail) => {
                return Err(TracelinkError::api(503, "tool-call store unavailable"))
            }
            Some(FetchScript::Gated(rx)) => rx
                .await
                .map_err(|_| TracelinkError::InvalidState("fetch gate dropped".into()))?,
            None => {
                return Ok(self
                    .last_served
                    .lock()
                    .unwrap()
                    .get(request_id)
                    .cloned()
                    .unwrap_or_default())
            }
        };
        self.last_served
            .lock()
            .unwrap()
            .insert(request_id.to_string(), calls.clone());
        Ok(calls)
    }

    async fn fetch_history(
        &self,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<HistoryEntry>, TracelinkError> {
        if *self.history_fails.lock().unwrap() {
            return Err(TracelinkError::api(500, "history unavailable"));
        }
        let entries = self
            .history
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default();
        let skip = entries.len().saturating_sub(limit as usize);
        Ok(entries.into_iter().skip(skip).collect())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, TracelinkError> {
        Ok(self.sessions.lock().unwrap().clone())
    }
}

/// A completed tool call named `name`.
pub fn tool_call(name: &str) -> ToolCall {
    ToolCall {
        id: None,
        sequence: None,
        name: name.to_string(),
        arguments: json!({ "cmd": name }),
        result: json!("ok"),
        status: ToolCallStatus::Completed,
        timestamp: None,
    }
}

pub fn history_entry(role: Role, content: &str, request_id: Option<&str>) -> HistoryEntry {
    HistoryEntry {
        role,
        content: content.to_string(),
        timestamp: None,
        metadata: HistoryMetadata {
            request_id: request_id.map(str::to_string),
        },
    }
}

/// A sink that records every update it receives.
pub fn recording_sink() -> (ToolCallSink, Arc<Mutex<Vec<ToolCallUpdate>>>) {
    let updates = Arc::new(Mutex::new(Vec::new()));
    let recorded = updates.clone();
    let sink: ToolCallSink = Arc::new(move |update| recorded.lock().unwrap().push(update));
    (sink, updates)
}

/// Let spawned tasks on the current-thread runtime run to their next await.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub fn names(calls: &[ToolCall]) -> Vec<&str> {
    calls.iter().map(|c| c.name.as_str()).collect()
}
