//! Convenience re-exports for common use.

pub use crate::config::ClientConfig;
pub use crate::conversation::{
    ControllerOptions, ConversationController, ConversationSnapshot, RejectReason, SendOutcome,
    ToolCallView,
};
pub use crate::error::{Result, TracelinkError};
pub use crate::poller::{ToolCallPoller, ToolCallSink, ToolCallUpdate};
pub use crate::service::{AgentService, HttpAgentService};
pub use crate::types::{filter_sessions, Message, Role, Session, ToolCall, ToolCallStatus};
