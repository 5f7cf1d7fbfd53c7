//! Tracelink CLI binary entry point.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracelink::cli::{ChatArgs, Cli, Commands, HistoryArgs, LogsArgs, SessionsArgs};
use tracelink::config::ClientConfig;
use tracelink::conversation::{ControllerOptions, ConversationController, SendOutcome};
use tracelink::poller::{ToolCallSink, ToolCallUpdate};
use tracelink::service::{AgentService, HttpAgentService};
use tracelink::types::{filter_sessions, ToolCall};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match load_config(cli.base_url) {
        Ok(config) => match cli.command {
            Commands::Chat(args) => handle_chat(&config, args).await,
            Commands::Sessions(args) => handle_sessions(&config, args).await,
            Commands::History(args) => handle_history(&config, args).await,
            Commands::Logs(args) => handle_logs(&config, args).await,
        },
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn load_config(base_url: Option<String>) -> tracelink::error::Result<ClientConfig> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = base_url {
        config = config.with_base_url(url);
        config.validate()?;
    }
    Ok(config)
}

fn print_tool_call(index: usize, call: &ToolCall) {
    let args = truncate(&value_text(&call.arguments), 200);
    let output = truncate(&value_text(&call.result), 300);
    eprintln!("[{}] {} ({})", index + 1, call.name.to_uppercase(), call.status);
    eprintln!("  Input: {args}");
    eprintln!("  Output: {output}");
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    // Find a valid UTF-8 char boundary at or before max
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

async fn handle_chat(config: &ClientConfig, args: ChatArgs) -> CliResult {
    // Tool-call lists are append-only, so only print what is new.
    let printed = Arc::new(AtomicUsize::new(0));
    let sink: ToolCallSink = {
        let printed = printed.clone();
        Arc::new(move |update: ToolCallUpdate| {
            let already = printed.load(Ordering::SeqCst);
            for (i, call) in update.tool_calls.iter().enumerate().skip(already) {
                print_tool_call(i, call);
            }
            printed.fetch_max(update.tool_calls.len(), Ordering::SeqCst);
        })
    };

    let service = Arc::new(HttpAgentService::new(config)?);
    let options = ControllerOptions::from_config(config).with_tool_call_sink(sink);
    let controller = ConversationController::new(service, options);

    if let Some(session) = args.session {
        controller.switch_session(session).await?;
    }

    let outcome = controller.send_user_message(&args.prompt).await?;
    controller.shutdown().await;

    match outcome {
        SendOutcome::Replied { request_id, reply } => {
            println!("{reply}");
            if let Some(session) = controller.session_id().await {
                eprintln!("\nsession: {session}  request: {request_id}");
            }
            Ok(())
        }
        SendOutcome::Failed { error, .. } => Err(error.into()),
        SendOutcome::Rejected(reason) => Err(format!("message rejected: {reason:?}").into()),
        SendOutcome::Abandoned { request_id } => {
            Err(format!("request {request_id} was abandoned").into())
        }
    }
}

async fn handle_sessions(config: &ClientConfig, args: SessionsArgs) -> CliResult {
    let service = HttpAgentService::new(config)?;
    let sessions = service.list_sessions().await?;
    let query = args.filter.unwrap_or_default();
    for session in filter_sessions(&sessions, &query) {
        let preview = if session.last_message.is_empty() {
            session.session_id.as_str()
        } else {
            session.last_message.as_str()
        };
        println!("{}  {}", session.session_id, truncate(preview, 80));
    }
    Ok(())
}

async fn handle_history(config: &ClientConfig, args: HistoryArgs) -> CliResult {
    let service = HttpAgentService::new(config)?;
    let limit = args.limit.unwrap_or(config.history_limit);
    for entry in service.fetch_history(&args.session_id, limit).await? {
        let message = entry.into_message();
        match message.request_id {
            Some(id) => println!("[{}] ({id}) {}", message.role, message.content),
            None => println!("[{}] {}", message.role, message.content),
        }
    }
    Ok(())
}

async fn handle_logs(config: &ClientConfig, args: LogsArgs) -> CliResult {
    let service = HttpAgentService::new(config)?;
    let calls = service.fetch_tool_calls(&args.request_id).await?;
    if calls.is_empty() {
        eprintln!("No tool calls found for request ID: {}", args.request_id);
    }
    for (i, call) in calls.iter().enumerate() {
        print_tool_call(i, call);
    }
    Ok(())
}
