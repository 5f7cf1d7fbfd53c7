//! Configuration system (layered: code > env > config file > defaults).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, TracelinkError};

/// Default base URL of the agent backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api/v1";
/// Default tool-call polling period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
/// Default number of history messages requested when loading a session.
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;
/// Default HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Route templates relative to the base URL.
///
/// `{session_id}` and `{request_id}` are substituted at request time. The
/// tool-call route in particular varies between backend deployments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Routes {
    pub chat: String,
    pub history: String,
    pub sessions: String,
    pub tool_calls: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            chat: "/chat".to_string(),
            history: "/history/{session_id}".to_string(),
            sessions: "/sessions".to_string(),
            tool_calls: "/tool-calls/{request_id}".to_string(),
        }
    }
}

/// Client configuration for talking to the agent backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub history_limit: u32,
    pub request_timeout: Duration,
    pub routes: Routes,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            history_limit: DEFAULT_HISTORY_LIMIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            routes: Routes::default(),
        }
    }
}

/// On-disk representation; every field optional so files can be partial.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    base_url: Option<String>,
    poll_interval_ms: Option<u64>,
    history_limit: Option<u32>,
    request_timeout_secs: Option<u64>,
    routes: Option<Routes>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_history_limit(mut self, limit: u32) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_routes(mut self, routes: Routes) -> Self {
        self.routes = routes;
        self
    }

    /// Parse a TOML document on top of the defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(contents)?;
        let mut config = Self::default();
        config.apply_file(file);
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file on top of the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Platform config path (`<config dir>/tracelink/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "tracelink")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Defaults, then the platform config file if present, then environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = match Self::default_path() {
            Some(path) if path.is_file() => Self::load(path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides from a lookup function.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("TRACELINK_BASE_URL") {
            self.base_url = url;
        }
        if let Some(raw) = lookup("TRACELINK_POLL_INTERVAL_MS") {
            self.poll_interval = Duration::from_millis(parse_env_number("TRACELINK_POLL_INTERVAL_MS", &raw)?);
        }
        if let Some(raw) = lookup("TRACELINK_HISTORY_LIMIT") {
            let limit = parse_env_number("TRACELINK_HISTORY_LIMIT", &raw)?;
            self.history_limit = u32::try_from(limit).map_err(|_| {
                TracelinkError::Configuration(format!("TRACELINK_HISTORY_LIMIT out of range: {raw}"))
            })?;
        }
        if let Some(raw) = lookup("TRACELINK_REQUEST_TIMEOUT_SECS") {
            self.request_timeout = Duration::from_secs(parse_env_number("TRACELINK_REQUEST_TIMEOUT_SECS", &raw)?);
        }
        if let Some(route) = lookup("TRACELINK_TOOL_CALLS_ROUTE") {
            self.routes.tool_calls = route;
        }
        self.validate()
    }

    /// Reject configurations the client cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(TracelinkError::Configuration("base_url must not be empty".into()));
        }
        reqwest::Url::parse(&self.base_url).map_err(|e| {
            TracelinkError::Configuration(format!("invalid base_url '{}': {e}", self.base_url))
        })?;
        if self.poll_interval.is_zero() {
            return Err(TracelinkError::Configuration("poll interval must be positive".into()));
        }
        if self.history_limit == 0 {
            return Err(TracelinkError::Configuration("history limit must be positive".into()));
        }
        if !self.routes.tool_calls.contains("{request_id}") {
            return Err(TracelinkError::Configuration(
                "tool_calls route must contain {request_id}".into(),
            ));
        }
        if !self.routes.history.contains("{session_id}") {
            return Err(TracelinkError::Configuration(
                "history route must contain {session_id}".into(),
            ));
        }
        Ok(())
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(url) = file.base_url {
            self.base_url = url;
        }
        if let Some(ms) = file.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(limit) = file.history_limit {
            self.history_limit = limit;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(routes) = file.routes {
            self.routes = routes;
        }
    }
}

fn parse_env_number(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| TracelinkError::Configuration(format!("{key} must be a number, got '{raw}'")))
}
