//! Conversation state: message log, turn correlation, and the controller.

pub mod controller;
pub mod correlator;
pub mod log;

pub use controller::{
    ControllerOptions, ConversationController, ConversationSnapshot, RejectReason, SendOutcome,
    ToolCallView, ERROR_MARKER_PREFIX,
};
pub use correlator::{is_active_message, ActiveTurn, RequestCorrelator, TurnState};
pub use log::MessageLog;
