//! Core types for Tracelink.

pub mod chat;
pub mod message;
pub mod session;
pub mod tool_call;

pub use chat::*;
pub use message::*;
pub use session::*;
pub use tool_call::*;
