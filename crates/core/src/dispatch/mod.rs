//! Completion signaling for workflow runs.
//!
//! In `await` mode the caller gets the run's result directly. In
//! `background` mode the run is spawned onto the dispatcher's task set and
//! its completion is observable through the [`RunTracker`]. Spawned runs
//! are drained by [`WorkflowDispatcher::shutdown`].

mod tracker;

pub use tracker::{RunRecord, RunStatus, RunTracker};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::workflow::{ContactEvent, TicketReconciliationWorkflow, WorkflowError, WorkflowOutcome};

/// When the automation platform gets its response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMode {
    /// Respond after every CRM write has resolved.
    #[default]
    Await,
    /// Respond immediately and finish the run in a background task.
    Background,
}

/// Dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub completion: CompletionMode,
    /// Number of runs kept for status queries.
    #[serde(default = "default_max_tracked_runs")]
    pub max_tracked_runs: usize,
    /// How long shutdown waits for background runs to finish.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_max_tracked_runs() -> usize {
    1000
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            completion: CompletionMode::default(),
            max_tracked_runs: default_max_tracked_runs(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

/// Result of handing an event to the dispatcher.
#[derive(Debug)]
pub enum Dispatched {
    /// The run finished before returning.
    Completed {
        run_id: Uuid,
        result: Result<WorkflowOutcome, WorkflowError>,
    },
    /// The run continues in a background task.
    Spawned { run_id: Uuid },
}

impl Dispatched {
    pub fn run_id(&self) -> Uuid {
        match self {
            Dispatched::Completed { run_id, .. } | Dispatched::Spawned { run_id, .. } => *run_id,
        }
    }
}

/// Runs the workflow per event and records each run.
pub struct WorkflowDispatcher {
    workflow: Arc<TicketReconciliationWorkflow>,
    tracker: Arc<RunTracker>,
    mode: CompletionMode,
    background: Mutex<JoinSet<()>>,
}

impl WorkflowDispatcher {
    pub fn new(workflow: TicketReconciliationWorkflow, config: &DispatchConfig) -> Self {
        Self {
            workflow: Arc::new(workflow),
            tracker: Arc::new(RunTracker::new(config.max_tracked_runs)),
            mode: config.completion,
            background: Mutex::new(JoinSet::new()),
        }
    }

    pub fn mode(&self) -> CompletionMode {
        self.mode
    }

    pub fn tracker(&self) -> &RunTracker {
        &self.tracker
    }

    pub async fn dispatch(&self, event: ContactEvent) -> Dispatched {
        let run_id = self.tracker.start(event.contact_id()).await;

        match self.mode {
            CompletionMode::Await => {
                let result = execute(&self.workflow, &self.tracker, run_id, &event).await;
                Dispatched::Completed { run_id, result }
            }
            CompletionMode::Background => {
                let workflow = Arc::clone(&self.workflow);
                let tracker = Arc::clone(&self.tracker);
                let mut background = self.background.lock().await;
                // Reap finished runs so the set only holds live tasks
                while background.try_join_next().is_some() {}
                background.spawn(async move {
                    let _ = execute(&workflow, &tracker, run_id, &event).await;
                });
                Dispatched::Spawned { run_id }
            }
        }
    }

    /// Wait up to `timeout` for background runs to finish.
    ///
    /// Runs still going when the timeout expires are aborted. Returns how
    /// many were aborted.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        let mut background = std::mem::take(&mut *self.background.lock().await);
        if background.is_empty() {
            return 0;
        }

        info!("Waiting for {} background run(s) to finish", background.len());
        let drained = tokio::time::timeout(timeout, async {
            while let Some(result) = background.join_next().await {
                if let Err(e) = result {
                    error!("Background run task failed: {}", e);
                }
            }
        })
        .await;

        if drained.is_ok() {
            return 0;
        }

        let aborted = background.len();
        warn!(
            "{} background run(s) still running after {:?}; aborting",
            aborted, timeout
        );
        background.shutdown().await;
        aborted
    }
}

async fn execute(
    workflow: &TicketReconciliationWorkflow,
    tracker: &RunTracker,
    run_id: Uuid,
    event: &ContactEvent,
) -> Result<WorkflowOutcome, WorkflowError> {
    let result = workflow.run(event).await;
    match &result {
        Ok(outcome) => info!(
            "Run {} finished for contact {} (created ticket: {:?}, associated: {})",
            run_id,
            outcome.contact_id,
            outcome.created_ticket_id,
            outcome.associated_ticket_ids.len()
        ),
        Err(e) => error!(
            "Run {} failed at {} (retryable: {}): {}",
            run_id,
            e.stage().as_str(),
            e.is_retryable(),
            e
        ),
    }
    tracker.finish(run_id, &result).await;
    result
}
