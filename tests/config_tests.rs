//! Tests for configuration loading.

use std::io::Write;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tracelink::config::{ClientConfig, Routes, DEFAULT_BASE_URL};
use tracelink::error::TracelinkError;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 5] = [
    "TRACELINK_BASE_URL",
    "TRACELINK_POLL_INTERVAL_MS",
    "TRACELINK_HISTORY_LIMIT",
    "TRACELINK_REQUEST_TIMEOUT_SECS",
    "TRACELINK_TOOL_CALLS_ROUTE",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[test]
fn partial_toml_keeps_other_defaults() {
    let config = ClientConfig::from_toml_str(
        r#"
        base_url = "http://agent.internal:8080/api/v1"
        poll_interval_ms = 500
        "#,
    )
    .unwrap();

    assert_eq!(config.base_url, "http://agent.internal:8080/api/v1");
    assert_eq!(config.poll_interval, Duration::from_millis(500));
    assert_eq!(config.history_limit, 100);
    assert_eq!(config.routes, Routes::default());
}

#[test]
fn toml_routes_override_only_named_routes() {
    let config = ClientConfig::from_toml_str(
        r#"
        [routes]
        tool_calls = "/logs/{request_id}/tools"
        "#,
    )
    .unwrap();

    assert_eq!(config.routes.tool_calls, "/logs/{request_id}/tools");
    assert_eq!(config.routes.chat, "/chat");
    assert_eq!(config.routes.history, "/history/{session_id}");
}

#[test]
fn load_reads_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "history_limit = 25").unwrap();
    writeln!(file, "request_timeout_secs = 30").unwrap();

    let config = ClientConfig::load(file.path()).unwrap();

    assert_eq!(config.history_limit, 25);
    assert_eq!(config.request_timeout, Duration::from_secs(30));
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
}

#[test]
fn load_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ClientConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, TracelinkError::Io(_)));
}

#[test]
fn malformed_toml_is_rejected() {
    let err = ClientConfig::from_toml_str("base_url = [unterminated").unwrap_err();
    assert!(matches!(err, TracelinkError::Toml(_)));
}

#[test]
fn invalid_values_in_file_fail_validation() {
    let err = ClientConfig::from_toml_str("poll_interval_ms = 0").unwrap_err();
    assert!(matches!(err, TracelinkError::Configuration(_)));

    let err = ClientConfig::from_toml_str(
        r#"
        [routes]
        tool_calls = "/tool-calls"
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, TracelinkError::Configuration(message) if message.contains("{request_id}")));
}

#[test]
fn from_env_applies_overrides() {
    let _env_lock = env_lock_guard();
    let _env_guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }

    std::env::set_var("TRACELINK_BASE_URL", "http://localhost:9999/api/v1");
    std::env::set_var("TRACELINK_POLL_INTERVAL_MS", "250");
    std::env::set_var("TRACELINK_TOOL_CALLS_ROUTE", "/requests/{request_id}/tool-calls");

    let config = ClientConfig::from_env().unwrap();

    assert_eq!(config.base_url, "http://localhost:9999/api/v1");
    assert_eq!(config.poll_interval, Duration::from_millis(250));
    assert_eq!(config.routes.tool_calls, "/requests/{request_id}/tool-calls");
}

#[test]
fn from_env_rejects_non_numeric_interval() {
    let _env_lock = env_lock_guard();
    let _env_guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }

    std::env::set_var("TRACELINK_POLL_INTERVAL_MS", "soon");

    let err = ClientConfig::from_env().unwrap_err();
    match err {
        TracelinkError::Configuration(message) => {
            assert!(message.contains("TRACELINK_POLL_INTERVAL_MS"))
        }
        other => panic!("expected configuration error, got {other:?}"),
    }
}
