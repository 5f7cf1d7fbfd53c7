//! Tracelink: live tool-call traces for remote agent chats.
//!
//! Links each chat request to the tool invocations the remote agent performs
//! while producing its reply. While a turn is in flight its tool-call log is
//! polled and kept live; once the reply arrives, or the user switches
//! session, polling stops and the trace is frozen.
//!
//! # Quick Start
//!
//! ```no_run
//! use tracelink::prelude::*;
//!
//! # async fn example() -> tracelink::error::Result<()> {
//! let config = ClientConfig::from_env()?;
//! let controller = ConversationController::from_config(&config)?;
//! if let SendOutcome::Replied { reply, .. } = controller.send_user_message("hello").await? {
//!     println!("{reply}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod conversation;
pub mod error;
pub mod poller;
pub mod prelude;
pub mod service;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
