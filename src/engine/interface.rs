use std::time::Duration;

use crate::render::RunSummary;
use crate::types::{TrackedRepository, WorkflowDefinition};

/// Channel the coordinator publishes [`Event`]s on.
///
/// Sends never block; if the receiver is gone the events are dropped.
pub type EventSender = tokio::sync::mpsc::UnboundedSender<Event>;

/// Totals for one `refresh_all` cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub repositories: usize,
    pub batches: usize,
    pub failed_repositories: usize,
    pub failed_workflows: usize,
}

/// Everything the coordinator tells the presentation layer.
#[derive(Debug, Clone)]
pub enum Event {
    // -----------------------------------------------------------------------
    // Refresh cycle
    // -----------------------------------------------------------------------
    /// A cycle began over this registry snapshot. When `background` is false
    /// the view should reset every card to a loading placeholder.
    RefreshStarted {
        repositories: Vec<TrackedRepository>,
        background: bool,
    },
    RefreshCompleted {
        report: RefreshReport,
    },

    // -----------------------------------------------------------------------
    // Per repository / per workflow results
    // -----------------------------------------------------------------------
    RepoLoading {
        repo: TrackedRepository,
    },
    WorkflowsFetched {
        repo: TrackedRepository,
        workflows: Vec<WorkflowDefinition>,
    },
    RunSummaryReady {
        repo: TrackedRepository,
        workflow_id: u64,
        summary: RunSummary,
    },
    WorkflowError {
        repo: TrackedRepository,
        workflow_id: u64,
        workflow_name: String,
        message: String,
    },
    RepoError {
        repo: TrackedRepository,
        message: String,
    },
    RepoRemoved {
        repo: TrackedRepository,
    },

    // -----------------------------------------------------------------------
    // Polling session
    // -----------------------------------------------------------------------
    PollingRestarted {
        attempt: u32,
        delay: Duration,
        error: String,
    },
    PollingStopped {
        reason: String,
    },
}
