//! Live tool-call polling for a single request id.
//!
//! A [`ToolCallPoller`] watches at most one request at a time. Each watch
//! runs as a spawned task on a fixed interval and is tagged with a
//! generation number; every stop or new watch bumps the generation, and a
//! fetch result is only delivered if the generation it was issued under is
//! still current. The check and the delivery happen under one lock, so once
//! [`ToolCallPoller::stop_watching`] returns no update from the stopped
//! watch can reach the sink, even if its HTTP request is still in flight.
//!
//! Time comes from tokio's clock; tests drive it with
//! `#[tokio::test(start_paused = true)]` and `tokio::time::advance`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::TracelinkError;
use crate::service::AgentService;
use crate::types::ToolCall;

/// Shortest poll period; shorter (including zero) intervals are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One delivered tool-call list.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallUpdate {
    pub request_id: String,
    pub generation: u64,
    pub tool_calls: Vec<ToolCall>,
}

/// Callback receiving tool-call updates.
///
/// Runs while delivery is serialized; it must not call back into the poller.
pub type ToolCallSink = Arc<dyn Fn(ToolCallUpdate) + Send + Sync>;

struct Watch {
    request_id: String,
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Shared {
    generation: u64,
    watch: Option<Watch>,
    manual_in_flight: usize,
    cache: HashMap<String, Vec<ToolCall>>,
}

type SharedState = Arc<Mutex<Shared>>;

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Polls the agent service for the tool calls of the watched request.
pub struct ToolCallPoller {
    service: Arc<dyn AgentService>,
    interval: Duration,
    shared: SharedState,
}

impl std::fmt::Debug for ToolCallPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = lock(&self.shared);
        f.debug_struct("ToolCallPoller")
            .field("interval", &self.interval)
            .field("generation", &shared.generation)
            .field("watching", &shared.watch.as_ref().map(|w| &w.request_id))
            .finish()
    }
}

impl ToolCallPoller {
    pub fn new(service: Arc<dyn AgentService>, interval: Duration) -> Self {
        if interval < MIN_POLL_INTERVAL {
            tracing::warn!(?interval, min = ?MIN_POLL_INTERVAL, "poll interval too short; clamping");
        }
        Self {
            service,
            interval: interval.max(MIN_POLL_INTERVAL),
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current poll generation.
    pub fn generation(&self) -> u64 {
        lock(&self.shared).generation
    }

    /// Request id currently being watched, if any.
    pub fn watching(&self) -> Option<String> {
        lock(&self.shared).watch.as_ref().map(|w| w.request_id.clone())
    }

    /// Last delivered tool-call list for a request.
    pub fn cached(&self, request_id: &str) -> Option<Vec<ToolCall>> {
        lock(&self.shared).cache.get(request_id).cloned()
    }

    /// Start periodic polling for `request_id` and return the watch generation.
    ///
    /// The first fetch is issued immediately, then one per interval. Watching
    /// the same request again is a no-op; watching a different one stops the
    /// previous watch first. Must be called within a tokio runtime.
    pub fn start_watching(&self, request_id: impl Into<String>, sink: ToolCallSink) -> u64 {
        let request_id = request_id.into();
        let mut shared = lock(&self.shared);

        if let Some(watch) = &shared.watch {
            if watch.request_id == request_id {
                return watch.generation;
            }
        }
        stop_locked(&mut shared);

        shared.generation += 1;
        let generation = shared.generation;
        let cancel = CancellationToken::new();
        shared.watch = Some(Watch {
            request_id: request_id.clone(),
            generation,
            cancel: cancel.clone(),
        });
        drop(shared);

        tracing::debug!(%request_id, generation, "tool-call watch started");
        tokio::spawn(poll_loop(
            self.service.clone(),
            self.shared.clone(),
            request_id,
            generation,
            self.interval,
            cancel,
            sink,
        ));
        generation
    }

    /// Stop the current watch. Calling it again is a no-op.
    ///
    /// In-flight fetches are not aborted, but their results are dropped.
    pub fn stop_watching(&self) {
        stop_locked(&mut lock(&self.shared));
    }

    /// Stop only if `request_id` is the one being watched.
    pub fn stop_watching_request(&self, request_id: &str) -> bool {
        let mut shared = lock(&self.shared);
        let matches = shared
            .watch
            .as_ref()
            .is_some_and(|w| w.request_id == request_id);
        if matches {
            stop_locked(&mut shared);
        }
        matches
    }

    /// Fetch once and deliver, without entering periodic mode.
    ///
    /// Returns `Ok(None)` when the result went stale (a stop or new watch
    /// happened while the fetch was in flight) and was dropped.
    pub async fn fetch_now(
        &self,
        request_id: &str,
        sink: Option<&ToolCallSink>,
    ) -> Result<Option<Vec<ToolCall>>, TracelinkError> {
        let issued = {
            let mut shared = lock(&self.shared);
            shared.manual_in_flight += 1;
            shared.generation
        };
        let _in_flight = ManualFetch(&self.shared);

        let tool_calls = self.service.fetch_tool_calls(request_id).await?;

        let mut shared = lock(&self.shared);
        if shared.generation != issued {
            tracing::debug!(request_id, issued, current = shared.generation, "dropping stale manual fetch");
            return Ok(None);
        }
        shared.cache.insert(request_id.to_string(), tool_calls.clone());
        if let Some(sink) = sink {
            sink(ToolCallUpdate {
                request_id: request_id.to_string(),
                generation: issued,
                tool_calls: tool_calls.clone(),
            });
        }
        Ok(Some(tool_calls))
    }
}

/// Keeps `manual_in_flight` accurate even if a manual fetch is dropped mid-await.
struct ManualFetch<'a>(&'a Mutex<Shared>);

impl Drop for ManualFetch<'_> {
    fn drop(&mut self) {
        let mut shared = lock(self.0);
        shared.manual_in_flight = shared.manual_in_flight.saturating_sub(1);
    }
}

impl Drop for ToolCallPoller {
    fn drop(&mut self) {
        stop_locked(&mut lock(&self.shared));
    }
}

fn stop_locked(shared: &mut Shared) {
    let watch = shared.watch.take();
    if watch.is_none() && shared.manual_in_flight == 0 {
        return;
    }
    shared.generation += 1;
    if let Some(watch) = watch {
        watch.cancel.cancel();
        tracing::debug!(
            request_id = %watch.request_id,
            generation = watch.generation,
            "tool-call watch stopped"
        );
    }
}

async fn poll_loop(
    service: Arc<dyn AgentService>,
    shared: SharedState,
    request_id: String,
    generation: u64,
    period: Duration,
    cancel: CancellationToken,
    sink: ToolCallSink,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let tool_calls = match service.fetch_tool_calls(&request_id).await {
            Ok(tool_calls) => tool_calls,
            Err(e) => {
                tracing::warn!(%request_id, generation, error = %e, "tool-call poll failed");
                continue;
            }
        };

        if !deliver(&shared, &request_id, generation, tool_calls, &sink) {
            break;
        }
    }

    tracing::debug!(%request_id, generation, "poll loop exited");
}

/// Cache and deliver a periodic result if its generation is still current.
fn deliver(
    shared: &Mutex<Shared>,
    request_id: &str,
    generation: u64,
    tool_calls: Vec<ToolCall>,
    sink: &ToolCallSink,
) -> bool {
    let mut state = lock(shared);
    if state.generation != generation {
        tracing::debug!(request_id, generation, current = state.generation, "dropping stale poll result");
        return false;
    }
    state.cache.insert(request_id.to_string(), tool_calls.clone());
    sink(ToolCallUpdate {
        request_id: request_id.to_string(),
        generation,
        tool_calls,
    });
    true
}
