//! Request ids, turn lifecycle, and the "active message" decision.

use strum::Display;
use uuid::Uuid;

use crate::error::{Result, TracelinkError};
use crate::types::{Message, Role};

/// Lifecycle of one turn.
///
/// `Created -> Pending -> Resolved`, with `Abandoned` reachable from
/// `Created` or `Pending` on session switch or shutdown. Terminal states
/// never return to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TurnState {
    Created,
    Pending,
    Resolved,
    Abandoned,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Abandoned)
    }
}

/// The in-flight turn of a conversation. At most one exists at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTurn {
    pub request_id: String,
    pub state: TurnState,
}

impl ActiveTurn {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            state: TurnState::Created,
        }
    }

    /// Move to `next`, rejecting transitions outside the turn state machine.
    pub fn advance(&mut self, next: TurnState) -> Result<()> {
        use TurnState::*;
        let allowed = matches!(
            (self.state, next),
            (Created, Pending) | (Pending, Resolved) | (Pending, Abandoned) | (Created, Abandoned)
        );
        if !allowed {
            return Err(TracelinkError::InvalidState(format!(
                "turn {} cannot move from {} to {}",
                self.request_id, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Whether the poller should be watching this turn.
    pub fn is_polling(&self) -> bool {
        self.state == TurnState::Pending
    }
}

/// Tracks the current turn's request id and whether it has resolved.
#[derive(Debug, Clone, Default)]
pub struct RequestCorrelator {
    current: Option<String>,
    resolved: bool,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new current turn and return its request id.
    ///
    /// A provided id is reused as-is (resuming a known turn); otherwise a
    /// random UUID v4 is generated.
    pub fn begin_turn(&mut self, provided: Option<String>) -> String {
        let id = provided.unwrap_or_else(|| Uuid::new_v4().to_string());
        self.current = Some(id.clone());
        self.resolved = false;
        id
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Mark the current turn as resolved.
    pub fn resolve(&mut self) {
        self.resolved = true;
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Forget the current turn (session switch, new session).
    pub fn clear(&mut self) {
        self.current = None;
        self.resolved = false;
    }

    pub fn is_active(&self, message: &Message) -> bool {
        is_active_message(message, self.current(), self.resolved)
    }
}

/// Whether `message` is the assistant message of the unresolved current turn.
pub fn is_active_message(message: &Message, current_turn_id: Option<&str>, turn_resolved: bool) -> bool {
    if turn_resolved || message.role != Role::Assistant {
        return false;
    }
    match (message.request_id.as_deref(), current_turn_id) {
        (Some(id), Some(current)) => id == current,
        _ => false,
    }
}
