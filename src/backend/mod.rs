// backend module: HTTP client for the dashboard backend

mod client;
mod error;
mod workflows;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::types::{WorkflowDefinition, WorkflowRun};

pub use client::BackendClient;
pub use error::{CancelReason, FetchError};

/// Where the refresh engine gets workflow data from.
///
/// Implemented by [`BackendClient`] for real traffic and by
/// [`StubSource`](crate::engine::StubSource) for tests.
pub trait WorkflowSource: Send + Sync + 'static {
    /// Workflow definitions of `owner/repo`. `force` skips any response cache.
    fn fetch_workflows(
        &self,
        owner: &str,
        repo: &str,
        force: bool,
    ) -> impl Future<Output = Result<Vec<WorkflowDefinition>, FetchError>> + Send;

    /// At most `limit` runs of one workflow, newest first.
    ///
    /// Resolves to `FetchError::Cancelled` once `cancel` fires.
    fn fetch_latest_runs(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: u64,
        limit: u32,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<WorkflowRun>, FetchError>> + Send;
}
