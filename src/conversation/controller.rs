//! Conversation orchestration: sends, replies, live logs, session switching.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use super::correlator::{ActiveTurn, RequestCorrelator, TurnState};
use super::log::MessageLog;
use crate::config::ClientConfig;
use crate::error::{Result, TracelinkError};
use crate::poller::{ToolCallPoller, ToolCallSink, ToolCallUpdate};
use crate::service::{AgentService, HttpAgentService};
use crate::types::{ChatRequest, HistoryEntry, Message, Role, Session, ToolCall};

/// Prefix of the content written into an assistant message whose send failed.
pub const ERROR_MARKER_PREFIX: &str = "Error: ";

/// Why a send was refused without touching the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The text was empty after trimming.
    EmptyInput,
    /// Another turn of this conversation has not resolved yet.
    TurnInFlight,
}

/// Result of [`ConversationController::send_user_message`].
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Rejected(RejectReason),
    /// The reply arrived and filled the assistant message.
    Replied { request_id: String, reply: String },
    /// The send failed; the assistant message now carries an error marker.
    Failed { request_id: String, error: String },
    /// The turn was abandoned (session switch or shutdown) before the reply
    /// arrived; the reply, if any, was discarded.
    Abandoned { request_id: String },
}

/// What [`ConversationController::view_tool_calls`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallView {
    Hidden,
    /// The message is the active one; the live cache is shown.
    Live { request_id: String, tool_calls: Vec<ToolCall> },
    /// The message is resolved; the list was fetched on demand.
    Loaded { request_id: String, tool_calls: Vec<ToolCall> },
}

/// Point-in-time view of the conversation for UI consumers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversationSnapshot {
    pub session_id: Option<String>,
    pub message_count: usize,
    pub active_request_id: Option<String>,
    pub is_polling: bool,
    pub live_tool_calls: Vec<ToolCall>,
    pub last_error: Option<String>,
}

/// Construction options for a [`ConversationController`].
#[derive(Clone)]
pub struct ControllerOptions {
    pub poll_interval: Duration,
    pub history_limit: u32,
    /// Receives every delivered tool-call update.
    pub tool_call_sink: Option<ToolCallSink>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl ControllerOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            history_limit: config.history_limit,
            tool_call_sink: None,
        }
    }

    pub fn with_tool_call_sink(mut self, sink: ToolCallSink) -> Self {
        self.tool_call_sink = Some(sink);
        self
    }
}

#[derive(Default)]
struct ControllerState {
    session_id: Option<String>,
    log: MessageLog,
    correlator: RequestCorrelator,
    turn: Option<ActiveTurn>,
    visible_logs: HashSet<String>,
    epoch: u64,
    last_error: Option<String>,
}

/// Single orchestration point for one visible conversation.
///
/// All public methods are `&self`; wrap the controller in an `Arc` to share
/// it between tasks. At most one turn is in flight at a time, and the tool
/// call poller only ever watches that turn.
///
/// # Example
///
/// ```ignore
/// let controller = ConversationController::from_config(&ClientConfig::from_env()?)?;
/// let outcome = controller.send_user_message("list the files in /tmp").await?;
/// ```
pub struct ConversationController {
    service: Arc<dyn AgentService>,
    poller: ToolCallPoller,
    history_limit: u32,
    user_sink: Option<ToolCallSink>,
    state: Arc<Mutex<ControllerState>>,
    snapshot_tx: Arc<watch::Sender<ConversationSnapshot>>,
    snapshot_rx: watch::Receiver<ConversationSnapshot>,
}

impl ConversationController {
    pub fn new(service: Arc<dyn AgentService>, options: ControllerOptions) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(ConversationSnapshot::default());
        Self {
            poller: ToolCallPoller::new(service.clone(), options.poll_interval),
            service,
            history_limit: options.history_limit,
            user_sink: options.tool_call_sink,
            state: Arc::new(Mutex::new(ControllerState::default())),
            snapshot_tx: Arc::new(snapshot_tx),
            snapshot_rx,
        }
    }

    /// Build a controller talking HTTP to the configured backend.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let service = HttpAgentService::new(config)?;
        Ok(Self::new(Arc::new(service), ControllerOptions::from_config(config)))
    }

    /// Send a user message and wait for the assistant's reply.
    ///
    /// Empty input and sends while another turn is pending are rejected
    /// before any state change or network call.
    ///
    /// # Errors
    ///
    /// Only internal invariant violations are returned as errors. Transport
    /// failures resolve the turn and come back as [`SendOutcome::Failed`].
    pub async fn send_user_message(&self, text: impl AsRef<str>) -> Result<SendOutcome> {
        let query = text.as_ref().trim();
        if query.is_empty() {
            tracing::debug!("ignoring empty message");
            return Ok(SendOutcome::Rejected(RejectReason::EmptyInput));
        }

        let request = {
            let mut state = self.state.lock().await;
            if state.turn.as_ref().is_some_and(|t| !t.state.is_terminal()) {
                tracing::debug!("turn already in flight; ignoring send");
                return Ok(SendOutcome::Rejected(RejectReason::TurnInFlight));
            }

            let request_id = state.correlator.begin_turn(None);
            let mut turn = ActiveTurn::new(request_id.clone());
            state.log.push_user(query, Some(request_id.clone()))?;
            let placeholder_id = state.log.push_placeholder(&request_id)?.id.clone();
            state.visible_logs.insert(placeholder_id);

            self.poller.start_watching(request_id.clone(), self.poll_sink());
            turn.advance(TurnState::Pending)?;
            state.turn = Some(turn);
            state.last_error = None;
            self.publish(&state);

            ChatRequest {
                query: query.to_string(),
                session_id: state.session_id.clone(),
                request_id,
            }
        };

        tracing::debug!(request_id = %request.request_id, "turn started");
        let mut in_flight = InFlightSend {
            controller: self,
            request_id: Some(request.request_id.clone()),
        };
        let result = self.service.send_chat(&request).await;

        let mut state = self.state.lock().await;
        in_flight.disarm();
        let request_id = request.request_id;
        let pending = state
            .turn
            .as_ref()
            .is_some_and(|t| t.request_id == request_id && t.state == TurnState::Pending);
        if !pending {
            tracing::debug!(%request_id, "reply for abandoned turn discarded");
            return Ok(SendOutcome::Abandoned { request_id });
        }

        let outcome = match result {
            Ok(reply) => {
                if state.session_id.is_none() {
                    state.session_id = Some(reply.session_id.clone());
                }
                state.log.fill(&request_id, reply.reply.clone())?;
                SendOutcome::Replied {
                    request_id: request_id.clone(),
                    reply: reply.reply,
                }
            }
            Err(e) => {
                tracing::warn!(%request_id, error = %e, "chat request failed");
                state.log.fill(&request_id, format!("{ERROR_MARKER_PREFIX}{e}"))?;
                state.last_error = Some(e.to_string());
                SendOutcome::Failed {
                    request_id: request_id.clone(),
                    error: e.to_string(),
                }
            }
        };

        if let Some(mut turn) = state.turn.take() {
            turn.advance(TurnState::Resolved)?;
        }
        state.correlator.resolve();
        self.poller.stop_watching_request(&request_id);
        self.publish(&state);
        tracing::debug!(%request_id, "turn resolved");
        Ok(outcome)
    }

    /// Switch to another stored session and load its history.
    ///
    /// A pending turn is abandoned first: its poller stops immediately and
    /// its reply will be discarded. Server-side work is not cancelled.
    pub async fn switch_session(&self, session_id: impl Into<String>) -> Result<()> {
        let session_id = session_id.into();
        let epoch = {
            let mut state = self.state.lock().await;
            self.abandon(&mut state);
            state.session_id = Some(session_id.clone());
            self.publish(&state);
            state.epoch
        };

        let history = self
            .service
            .fetch_history(&session_id, self.history_limit)
            .await;

        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            tracing::debug!(%session_id, "history load superseded");
            return Ok(());
        }
        match history {
            Ok(entries) => {
                // Keep anything sent while the history was loading.
                let mut messages: Vec<Message> =
                    entries.into_iter().map(HistoryEntry::into_message).collect();
                messages.extend(state.log.messages().iter().cloned());
                state.log.replace_all(messages);
                self.publish(&state);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "failed to load history");
                state.last_error = Some(e.to_string());
                self.publish(&state);
                Err(e)
            }
        }
    }

    /// Start a fresh conversation; the next send asks the server for a new session.
    pub async fn new_session(&self) {
        let mut state = self.state.lock().await;
        self.abandon(&mut state);
        state.session_id = None;
        self.publish(&state);
    }

    /// Tear down live state, as when the view owning the conversation goes away.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if let Some(turn) = state.turn.as_mut() {
            if turn.advance(TurnState::Abandoned).is_ok() {
                tracing::debug!(request_id = %turn.request_id, "turn abandoned on shutdown");
            }
        }
        state.turn = None;
        state.correlator.clear();
        self.poller.stop_watching();
        self.publish(&state);
    }

    /// Toggle the tool-call log of an assistant message.
    ///
    /// Revealing the active message shows the live cache; revealing a
    /// resolved message fetches its list once. Other messages are untouched.
    pub async fn view_tool_calls(&self, message_id: &str) -> Result<ToolCallView> {
        let request_id = {
            let mut state = self.state.lock().await;
            let message = state.log.get(message_id).ok_or_else(|| {
                TracelinkError::InvalidArgument(format!("unknown message {message_id}"))
            })?;
            if message.role != Role::Assistant {
                return Err(TracelinkError::InvalidArgument(format!(
                    "message {message_id} is not an assistant message"
                )));
            }
            let request_id = message.request_id.clone().ok_or_else(|| {
                TracelinkError::InvalidArgument(format!("message {message_id} has no request id"))
            })?;
            let active = state.correlator.is_active(message);

            if state.visible_logs.remove(message_id) {
                return Ok(ToolCallView::Hidden);
            }
            if active {
                state.visible_logs.insert(message_id.to_string());
                return Ok(ToolCallView::Live {
                    tool_calls: self.poller.cached(&request_id).unwrap_or_default(),
                    request_id,
                });
            }
            request_id
        };

        let tool_calls = match self.poller.fetch_now(&request_id, self.user_sink.as_ref()).await {
            Ok(Some(tool_calls)) => tool_calls,
            Ok(None) => self.poller.cached(&request_id).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(%request_id, error = %e, "on-demand tool-call fetch failed");
                self.poller.cached(&request_id).unwrap_or_default()
            }
        };

        let mut state = self.state.lock().await;
        if state.log.get(message_id).is_some() {
            state.visible_logs.insert(message_id.to_string());
        }
        Ok(ToolCallView::Loaded {
            request_id,
            tool_calls,
        })
    }

    /// Whether a message's tool-call log is currently shown.
    pub async fn logs_visible(&self, message_id: &str) -> bool {
        self.state.lock().await.visible_logs.contains(message_id)
    }

    /// Whether `message` is the one the poller is watching live.
    pub async fn is_active(&self, message: &Message) -> bool {
        self.state.lock().await.correlator.is_active(message)
    }

    /// The in-flight turn, if any.
    pub async fn active_turn(&self) -> Option<ActiveTurn> {
        self.state.lock().await.turn.clone()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.log.messages().to_vec()
    }

    pub async fn session_id(&self) -> Option<String> {
        self.state.lock().await.session_id.clone()
    }

    /// Last known tool-call list for a request.
    pub fn tool_calls(&self, request_id: &str) -> Option<Vec<ToolCall>> {
        self.poller.cached(request_id)
    }

    /// List stored sessions from the backend.
    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        self.service.list_sessions().await
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn watch_snapshot(&self) -> watch::Receiver<ConversationSnapshot> {
        self.snapshot_rx.clone()
    }

    // -- Internal helpers --

    /// Drop the pending turn (if any) and reset per-conversation state.
    fn abandon(&self, state: &mut ControllerState) {
        if let Some(mut turn) = state.turn.take() {
            if turn.advance(TurnState::Abandoned).is_ok() {
                tracing::debug!(request_id = %turn.request_id, "turn abandoned");
            }
        }
        self.poller.stop_watching();
        state.correlator.clear();
        state.log.clear();
        state.visible_logs.clear();
        state.last_error = None;
        state.epoch += 1;
    }

    fn publish(&self, state: &ControllerState) {
        let active_request_id = state
            .turn
            .as_ref()
            .filter(|t| t.is_polling())
            .map(|t| t.request_id.clone());
        // Read before send_modify: the poll sink takes these locks in the opposite order.
        let cached = active_request_id
            .as_deref()
            .and_then(|id| self.poller.cached(id))
            .unwrap_or_default();
        self.snapshot_tx.send_modify(|snap| {
            // Same turn: the poll sink owns the live list and may be newer than `cached`.
            if snap.active_request_id != active_request_id {
                snap.live_tool_calls = cached;
            }
            snap.session_id = state.session_id.clone();
            snap.message_count = state.log.len();
            snap.is_polling = active_request_id.is_some();
            snap.active_request_id = active_request_id;
            snap.last_error = state.last_error.clone();
        });
    }

    /// Sink handed to the poller: refreshes the snapshot, then forwards.
    fn poll_sink(&self) -> ToolCallSink {
        let snapshot_tx = self.snapshot_tx.clone();
        let user_sink = self.user_sink.clone();
        Arc::new(move |update: ToolCallUpdate| {
            snapshot_tx.send_modify(|snap| {
                if snap.active_request_id.as_deref() == Some(update.request_id.as_str()) {
                    snap.live_tool_calls = update.tool_calls.clone();
                }
            });
            if let Some(ref sink) = user_sink {
                sink(update);
            }
        })
    }
}

/// Mark a pending turn abandoned if it is still the one for `request_id`.
fn abandon_pending(state: &mut ControllerState, request_id: &str) -> bool {
    if !state.turn.as_ref().is_some_and(|t| t.request_id == request_id) {
        return false;
    }
    if let Some(mut turn) = state.turn.take() {
        if turn.advance(TurnState::Abandoned).is_ok() {
            tracing::debug!(request_id, "send dropped before reply; turn abandoned");
        }
    }
    if state.correlator.current() == Some(request_id) {
        state.correlator.resolve();
    }
    true
}

/// Tears a turn down if the send future is dropped while awaiting the reply.
struct InFlightSend<'a> {
    controller: &'a ConversationController,
    request_id: Option<String>,
}

impl InFlightSend<'_> {
    fn disarm(&mut self) {
        self.request_id = None;
    }
}

impl Drop for InFlightSend<'_> {
    fn drop(&mut self) {
        let Some(request_id) = self.request_id.take() else {
            return;
        };
        let controller = self.controller;
        controller.poller.stop_watching_request(&request_id);

        if let Ok(mut state) = controller.state.try_lock() {
            if abandon_pending(&mut state, &request_id) {
                controller.publish(&state);
            }
            return;
        }

        // Someone holds the state lock; finish the teardown on the runtime.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(%request_id, "no runtime to abandon dropped turn");
            return;
        };
        let state = controller.state.clone();
        let snapshot_tx = controller.snapshot_tx.clone();
        handle.spawn(async move {
            let mut state = state.lock().await;
            if abandon_pending(&mut state, &request_id) {
                snapshot_tx.send_modify(|snap| {
                    if snap.active_request_id.as_deref() == Some(request_id.as_str()) {
                        snap.active_request_id = None;
                        snap.is_polling = false;
                        snap.live_tool_calls.clear();
                    }
                });
            }
        });
    }
}

impl std::fmt::Debug for ConversationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationController")
            .field("poller", &self.poller)
            .field("history_limit", &self.history_limit)
            .finish()
    }
}
