/// Remote workflow client
///
/// The backend computes concepts, applications and roadmaps asynchronously.
/// This module starts a run and then polls the backend's state on a fixed
/// interval, notifying a listener only when something actually changed.
///
/// # Architecture
///
/// - `backend` - `WorkflowBackend` trait and its reqwest implementation
/// - `cursor` - last-seen timestamps and snapshot, plus the change test
/// - `diff` - structural comparison of roadmap content
/// - `client` - `WorkflowClient`, owner of the polling loop
///
/// # Usage
///
/// ```rust,no_run
/// use motivaty::config::Config;
/// use motivaty::workflow::{ChannelListener, WorkflowClient, WorkflowQuery};
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = WorkflowClient::from_config(&Config::from_env());
/// let (listener, mut updates) = ChannelListener::new();
/// client.submit_query(WorkflowQuery::new("explain FFT"));
/// client.start_polling(listener);
/// while let Some(update) = updates.recv().await {
///     println!("{update:?}");
/// }
/// # Ok(())
/// # }
/// ```
mod backend;
mod client;
mod cursor;
mod diff;
mod wire;

pub use backend::{HttpBackend, WorkflowBackend};
pub use client::{ChannelListener, WorkflowClient, WorkflowListener, WorkflowUpdate};
pub use cursor::{PollCursor, Reconciliation};
pub use diff::{applications_changed, roadmap_data_changed};
pub use wire::{RunWorkflowRequest, WorkflowQuery, WorkflowState, WorkflowStateResponse};

/// Errors raised while talking to the workflow backend.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid workflow state: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
