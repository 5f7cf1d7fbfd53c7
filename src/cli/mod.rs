//! CLI argument definitions for Tracelink.

use clap::{Args, Parser, Subcommand};

/// Tracelink CLI
#[derive(Parser, Debug)]
#[command(name = "tracelink", version, about = "Chat with a remote agent and watch its tool calls")]
pub struct Cli {
    /// Backend base URL (overrides TRACELINK_BASE_URL and the config file)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a message and stream the agent's tool calls until it replies
    Chat(ChatArgs),
    /// List stored sessions
    Sessions(SessionsArgs),
    /// Print a session's message history
    History(HistoryArgs),
    /// Print the tool calls recorded for a request
    Logs(LogsArgs),
}

/// Arguments for the `chat` subcommand.
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Continue an existing session instead of starting a new one
    #[arg(short, long)]
    pub session: Option<String>,

    /// Message to send
    pub prompt: String,
}

/// Arguments for the `sessions` subcommand.
#[derive(Args, Debug)]
pub struct SessionsArgs {
    /// Only show sessions whose id or last message contains this text
    #[arg(short, long)]
    pub filter: Option<String>,
}

/// Arguments for the `history` subcommand.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    pub session_id: String,

    /// Maximum number of messages to fetch
    #[arg(short, long)]
    pub limit: Option<u32>,
}

/// Arguments for the `logs` subcommand.
#[derive(Args, Debug)]
pub struct LogsArgs {
    pub request_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chat_with_session() {
        let cli = Cli::try_parse_from(["tracelink", "chat", "-s", "sess-1", "hello"]).unwrap();
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.session.as_deref(), Some("sess-1"));
                assert_eq!(args.prompt, "hello");
            }
            other => panic!("expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn parse_global_base_url_after_subcommand() {
        let cli =
            Cli::try_parse_from(["tracelink", "sessions", "--base-url", "http://x/api"]).unwrap();
        assert_eq!(cli.base_url.as_deref(), Some("http://x/api"));
        assert!(matches!(cli.command, Commands::Sessions(SessionsArgs { filter: None })));
    }

    #[test]
    fn parse_history_with_limit() {
        let cli = Cli::try_parse_from(["tracelink", "history", "abc", "--limit", "5"]).unwrap();
        match cli.command {
            Commands::History(args) => {
                assert_eq!(args.session_id, "abc");
                assert_eq!(args.limit, Some(5));
            }
            other => panic!("expected History, got {other:?}"),
        }
    }

    #[test]
    fn chat_requires_prompt() {
        assert!(Cli::try_parse_from(["tracelink", "chat"]).is_err());
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["tracelink"]).is_err());
    }
}
