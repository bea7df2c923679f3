use super::{
    HttpBackend, PollCursor, RunWorkflowRequest, WorkflowBackend, WorkflowQuery, WorkflowResult,
};
use crate::config::{Config, DEFAULT_POLL_INTERVAL};
use crate::types::{ConceptApplications, ConceptData};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

// ============================================
// Listener
// ============================================

/// Receives change notifications from the poll loop.
///
/// Both methods fire at most once per tick, concepts first, and only when
/// new data was detected.
///
/// Callbacks run with the poll state locked, so once `stop_polling` or
/// `submit_query` returns no callback from the stopped loop is in progress or
/// still to come. They must not call back into the `WorkflowClient`; hand the
/// data off instead, as `ChannelListener` does.
pub trait WorkflowListener: Send + Sync {
    fn on_concepts(&self, concepts: &[ConceptData], timestamp: f64);

    fn on_applications(&self, applications: &ConceptApplications, timestamp: f64);
}

/// A change notification as a value, for consumers that prefer a channel.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkflowUpdate {
    Concepts {
        concepts: Vec<ConceptData>,
        timestamp: f64,
    },
    Applications {
        applications: ConceptApplications,
        timestamp: f64,
    },
}

/// Forwards notifications into an unbounded channel.
pub struct ChannelListener {
    sender: mpsc::UnboundedSender<WorkflowUpdate>,
}

impl ChannelListener {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<WorkflowUpdate>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), receiver)
    }

    fn send(&self, update: WorkflowUpdate) {
        if self.sender.send(update).is_err() {
            tracing::debug!("workflow update dropped, receiver is gone");
        }
    }
}

impl WorkflowListener for ChannelListener {
    fn on_concepts(&self, concepts: &[ConceptData], timestamp: f64) {
        self.send(WorkflowUpdate::Concepts {
            concepts: concepts.to_vec(),
            timestamp,
        });
    }

    fn on_applications(&self, applications: &ConceptApplications, timestamp: f64) {
        self.send(WorkflowUpdate::Applications {
            applications: applications.clone(),
            timestamp,
        });
    }
}

// ============================================
// Client
// ============================================

struct PollHandle {
    generation: u64,
    task: JoinHandle<()>,
}

struct PollState {
    cursor: Mutex<PollCursor>,
    /// Generation of the running loop, 0 when stopped
    active: AtomicU64,
    counter: AtomicU64,
}

impl PollState {
    fn cursor(&self) -> MutexGuard<'_, PollCursor> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_active(&self, generation: u64) -> bool {
        self.active.load(Ordering::SeqCst) == generation
    }
}

/// Client for the workflow backend. Owns the polling cursor and at most one
/// polling loop.
pub struct WorkflowClient {
    backend: Arc<dyn WorkflowBackend>,
    interval: Duration,
    state: Arc<PollState>,
    poller: Mutex<Option<PollHandle>>,
}

impl WorkflowClient {
    pub fn new(backend: Arc<dyn WorkflowBackend>) -> Self {
        Self {
            backend,
            interval: DEFAULT_POLL_INTERVAL,
            state: Arc::new(PollState {
                cursor: Mutex::new(PollCursor::default()),
                active: AtomicU64::new(0),
                counter: AtomicU64::new(0),
            }),
            poller: Mutex::new(None),
        }
    }

    /// HTTP client for the configured backend URL and poll interval.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(HttpBackend::new(config.backend_url.clone())))
            .with_poll_interval(config.poll_interval)
    }

    /// Sets the poll period. A zero period falls back to the default.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        if interval.is_zero() {
            tracing::warn!(
                default_ms = DEFAULT_POLL_INTERVAL.as_millis() as u64,
                "zero poll interval, using default"
            );
            self.interval = DEFAULT_POLL_INTERVAL;
        } else {
            self.interval = interval;
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.interval
    }

    /// Copy of the current change-detection state.
    pub fn cursor(&self) -> PollCursor {
        self.state.cursor().clone()
    }

    pub fn is_polling(&self) -> bool {
        self.poller().is_some()
    }

    fn poller(&self) -> MutexGuard<'_, Option<PollHandle>> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a new workflow run in the background.
    ///
    /// Any running poll loop is stopped and the cursor is reset before the
    /// request goes out, whatever its outcome. Failures are logged; the
    /// returned handle may be dropped, or awaited to learn the outcome.
    pub fn submit_query(&self, query: WorkflowQuery) -> JoinHandle<WorkflowResult<()>> {
        self.stop_polling();
        self.state.cursor().reset();

        let request = RunWorkflowRequest::from(&query);
        tracing::info!(
            query = %request.user_query,
            file_name = %request.file_name,
            "submitting workflow"
        );

        let backend = self.backend.clone();
        tokio::spawn(async move {
            let outcome = backend.run_workflow(&request).await;
            if let Err(err) = &outcome {
                tracing::warn!(error = %err, "workflow submission failed");
            }
            outcome
        })
    }

    /// Starts polling the workflow state every interval, with one fetch
    /// right away. Returns `false` without doing anything if a loop is
    /// already running.
    pub fn start_polling(&self, listener: Arc<dyn WorkflowListener>) -> bool {
        let mut poller = self.poller();
        if poller.is_some() {
            tracing::info!("already polling");
            return false;
        }

        let generation = self.state.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.active.store(generation, Ordering::SeqCst);
        tracing::info!(generation, interval_ms = self.interval.as_millis() as u64, "start polling");

        let task = tokio::spawn(poll_loop(
            self.backend.clone(),
            self.state.clone(),
            listener,
            self.interval,
            generation,
        ));
        *poller = Some(PollHandle { generation, task });
        true
    }

    /// Stops the poll loop. Returns `false` when nothing was running.
    ///
    /// A fetch still in flight is dropped; if it completes anyway its result
    /// is discarded. A tick already delivering callbacks finishes first.
    pub fn stop_polling(&self) -> bool {
        let Some(handle) = self.poller().take() else {
            return false;
        };
        {
            // Waits out a tick that is reconciling or notifying
            let _cursor = self.state.cursor();
            // Only clear the marker if no newer loop has claimed it
            let _ = self.state.active.compare_exchange(
                handle.generation,
                0,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
        handle.task.abort();
        tracing::info!(generation = handle.generation, "stop polling");
        true
    }
}

impl Drop for WorkflowClient {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

// ============================================
// Poll loop
// ============================================

async fn poll_loop(
    backend: Arc<dyn WorkflowBackend>,
    state: Arc<PollState>,
    listener: Arc<dyn WorkflowListener>,
    interval: Duration,
    generation: u64,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        poll_once(backend.as_ref(), &state, listener.as_ref(), generation).await;
    }
}

async fn poll_once(
    backend: &dyn WorkflowBackend,
    state: &PollState,
    listener: &dyn WorkflowListener,
    generation: u64,
) {
    let response = match backend.get_workflow_state().await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "polling error");
            return;
        }
    };
    let snapshot = response.data.unwrap_or_default();

    // Held through the callbacks so a stop cannot slip in between
    let mut cursor = state.cursor();
    if !state.is_active(generation) {
        tracing::debug!(generation, "discarding state fetched by a stopped poller");
        return;
    }
    let outcome = cursor.reconcile(&snapshot, now_millis());

    if outcome.is_empty() {
        tracing::debug!(generation, "no new workflow data");
    }
    if let Some((concepts, timestamp)) = outcome.concepts {
        tracing::info!(count = concepts.len(), timestamp, "concepts updated");
        listener.on_concepts(&concepts, timestamp);
    }
    if let Some((applications, timestamp)) = outcome.applications {
        tracing::info!(concepts = applications.len(), timestamp, "applications updated");
        listener.on_applications(&applications, timestamp);
    }
    drop(cursor);
}

fn now_millis() -> f64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_millis_is_epoch_milliseconds() {
        // 2020-01-01T00:00:00Z
        assert!(now_millis() > 1_577_836_800_000.0);
    }

    #[tokio::test]
    async fn channel_listener_forwards_in_order() {
        let (listener, mut updates) = ChannelListener::new();
        listener.on_concepts(&[ConceptData::default()], 1.0);
        listener.on_applications(&ConceptApplications::new(), 2.0);

        assert!(matches!(
            updates.recv().await,
            Some(WorkflowUpdate::Concepts { timestamp, .. }) if timestamp == 1.0
        ));
        assert!(matches!(
            updates.recv().await,
            Some(WorkflowUpdate::Applications { timestamp, .. }) if timestamp == 2.0
        ));
    }

    #[test]
    fn zero_poll_interval_falls_back_to_default() {
        let backend = Arc::new(HttpBackend::new("http://localhost:8000"));
        let client = WorkflowClient::new(backend).with_poll_interval(Duration::ZERO);
        assert_eq!(client.poll_interval(), DEFAULT_POLL_INTERVAL);

        let backend = Arc::new(HttpBackend::new("http://localhost:8000"));
        let client = WorkflowClient::new(backend).with_poll_interval(Duration::from_millis(250));
        assert_eq!(client.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn channel_listener_survives_closed_receiver() {
        let (listener, updates) = ChannelListener::new();
        drop(updates);
        listener.on_concepts(&[], 1.0);
    }
}
