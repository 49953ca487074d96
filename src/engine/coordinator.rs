use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backend::{CancelReason, FetchError, WorkflowSource};
use crate::config::types::AppConfig;
use crate::registry::{self, Registry, RegistryError};
use crate::render::{RenderOptions, RunSummary, latest_run, summarize};
use crate::storage::StorageError;
use crate::types::{TrackedRepository, WorkflowDefinition};

use super::inflight::{InFlightTable, Ticket};
use super::interface::{Event, EventSender, RefreshReport};
use super::refresh::{PollingState, RestartPolicy};

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

/// A refresh cycle that could not run at all.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("reading tracked repositories: {0}")]
    Registry(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum AddRepoError {
    #[error("Repository not found or access denied")]
    NotFound { full_name: String },
    #[error("This repository has already been added")]
    Duplicate { full_name: String },
    #[error("invalid repository {input:?}: expected owner/name")]
    InvalidName { input: String },
    #[error("Failed to add repository: {0}")]
    Fetch(#[source] FetchError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<RegistryError> for AddRepoError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Duplicate { full_name } => Self::Duplicate { full_name },
            RegistryError::InvalidName { input } => Self::InvalidName { input },
            RegistryError::Storage(e) => Self::Storage(e),
        }
    }
}

/// Result of refreshing one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoOutcome {
    Refreshed {
        workflows: usize,
        failed_workflows: usize,
    },
    Failed {
        message: String,
    },
    /// Cancelled, timed out, or removed mid-flight. Not an error.
    Skipped,
}

/// Result of refreshing one workflow's runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Applied(Box<RunSummary>),
    Failed { message: String },
    /// Superseded, aborted or timed out; nothing was published.
    Discarded,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CoordinatorSettings {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub runs_per_page: u32,
    pub run_timeout: Duration,
    pub restart: RestartPolicy,
    pub render: RenderOptions,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl CoordinatorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let refresh = &config.refresh;
        Self {
            batch_size: refresh.batch_size(),
            batch_delay: Duration::from_millis(refresh.batch_delay_ms),
            runs_per_page: refresh.runs_per_page(),
            run_timeout: Duration::from_secs(refresh.run_timeout_secs.max(1)),
            restart: RestartPolicy::from_config(refresh),
            render: RenderOptions {
                date_format: config.display.date_format.clone(),
                commit_message_width: config.display.commit_message_width,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

struct Shared<S> {
    source: S,
    registry: Mutex<Registry>,
    in_flight: Mutex<InFlightTable>,
    events: EventSender,
    settings: CoordinatorSettings,
    active_cycles: AtomicUsize,
}

struct PollingSession {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the polling timer, the per-workflow request table and the registry.
///
/// Construct once at startup; every refresh, add and remove goes through it.
pub struct RefreshCoordinator<S: WorkflowSource> {
    shared: Arc<Shared<S>>,
    session: Option<PollingSession>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: WorkflowSource> RefreshCoordinator<S> {
    pub fn new(
        source: S,
        registry: Registry,
        events: EventSender,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                registry: Mutex::new(registry),
                in_flight: Mutex::new(InFlightTable::new()),
                events,
                settings,
                active_cycles: AtomicUsize::new(0),
            }),
            session: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.shared.source
    }

    pub fn state(&self) -> PollingState {
        if self.shared.active_cycles.load(Ordering::SeqCst) > 0 {
            PollingState::Refreshing
        } else if self.is_polling() {
            PollingState::Polling
        } else {
            PollingState::Idle
        }
    }

    pub fn is_polling(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.task.is_finished())
    }

    // -----------------------------------------------------------------------
    // Polling session
    // -----------------------------------------------------------------------

    /// Start polling every `interval`, with an immediate first refresh.
    ///
    /// Restarts the session if one is already running; there is never more
    /// than one timer.
    pub fn start(&mut self, interval: Duration) {
        self.stop();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            Arc::clone(&self.shared),
            interval.max(Duration::from_millis(1)),
            cancel.clone(),
        ));
        tracing::debug!("engine: polling started every {interval:?}");
        self.session = Some(PollingSession { cancel, task });
    }

    /// Stop polling. Safe to call when already stopped.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
            session.task.abort();
            tracing::debug!("engine: polling stopped");
        }
    }

    // -----------------------------------------------------------------------
    // Refresh operations
    // -----------------------------------------------------------------------

    /// Refresh every tracked repository in registry order, `batch_size` at a
    /// time.
    pub async fn refresh_all(
        &self,
        force: bool,
        background: bool,
    ) -> Result<RefreshReport, RefreshError> {
        self.shared.refresh_all(force, background).await
    }

    /// Refresh a single repository right away, outside the batch schedule.
    pub async fn refresh_one(&self, repo: &TrackedRepository, force: bool) -> RepoOutcome {
        self.shared.refresh_repo(repo, force, false).await
    }

    /// Fetch and publish the latest run of one workflow, superseding any
    /// fetch still outstanding for the same workflow id.
    pub async fn refresh_workflow(
        &self,
        repo: &TrackedRepository,
        workflow: &WorkflowDefinition,
    ) -> WorkflowOutcome {
        self.shared.refresh_workflow(repo, workflow).await
    }

    /// Abandon the outstanding run fetch for `workflow_id`, e.g. when its
    /// display goes away. Silent; returns whether anything was cancelled.
    pub fn cancel_workflow(&self, workflow_id: u64) -> bool {
        lock(&self.shared.in_flight).cancel(workflow_id)
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.shared.in_flight).len()
    }

    // -----------------------------------------------------------------------
    // Registry operations
    // -----------------------------------------------------------------------

    pub fn repositories(&self) -> Result<Vec<TrackedRepository>, StorageError> {
        lock(&self.shared.registry).list()
    }

    /// Verify `owner/name` against the backend, track it, then refresh it.
    pub async fn add_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<TrackedRepository, AddRepoError> {
        let (owner, name) = (owner.trim(), name.trim());
        registry::validate_name(owner, name)?;
        if lock(&self.shared.registry).contains(owner, name)? {
            return Err(AddRepoError::Duplicate {
                full_name: format!("{owner}/{name}"),
            });
        }

        let workflows = match self.shared.source.fetch_workflows(owner, name, true).await {
            Ok(workflows) => workflows,
            Err(FetchError::NotFound { .. }) => {
                tracing::debug!("engine: add {owner}/{name}: not found");
                return Err(AddRepoError::NotFound {
                    full_name: format!("{owner}/{name}"),
                });
            }
            Err(e) => return Err(AddRepoError::Fetch(e)),
        };

        let repo = lock(&self.shared.registry).add(owner, name)?;
        tracing::info!("engine: tracking {}", repo.full_name);
        // The verification above already returned the workflow list.
        self.shared.emit(Event::RepoLoading { repo: repo.clone() });
        self.shared.publish_workflows(&repo, workflows).await;
        Ok(repo)
    }

    /// Stop tracking `owner/name`; a no-op when it is not tracked.
    pub fn remove_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<TrackedRepository>, StorageError> {
        let removed = lock(&self.shared.registry).remove(owner, name)?;
        if let Some(repo) = &removed {
            let cancelled = lock(&self.shared.in_flight).cancel_repo(&repo.key());
            tracing::info!(
                "engine: untracked {} ({cancelled} fetches cancelled)",
                repo.full_name
            );
            self.shared.emit(Event::RepoRemoved { repo: repo.clone() });
        }
        Ok(removed)
    }

    pub fn auto_refresh_enabled(&self) -> Result<bool, StorageError> {
        lock(&self.shared.registry).auto_refresh_enabled()
    }

    pub fn set_auto_refresh(&self, enabled: bool) -> Result<(), StorageError> {
        lock(&self.shared.registry).set_auto_refresh(enabled)
    }
}

impl<S: WorkflowSource> Drop for RefreshCoordinator<S> {
    fn drop(&mut self) {
        self.stop();
        lock(&self.shared.in_flight).cancel_all();
    }
}

// ---------------------------------------------------------------------------
// Refresh internals
// ---------------------------------------------------------------------------

/// Counts a running refresh cycle for `PollingState::Refreshing`.
struct CycleGuard<'a>(&'a AtomicUsize);

impl<'a> CycleGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Holds an in-flight slot until the fetch settles. Dropping it unsettled,
/// e.g. when a polling task is aborted mid-cycle, abandons the slot.
struct InFlightSlot<'a> {
    table: &'a Mutex<InFlightTable>,
    ticket: Option<Ticket>,
}

impl<'a> InFlightSlot<'a> {
    fn begin(table: &'a Mutex<InFlightTable>, workflow_id: u64, repo_key: &str) -> Self {
        let ticket = lock(table).begin(workflow_id, repo_key);
        Self {
            table,
            ticket: Some(ticket),
        }
    }

    fn token(&self) -> CancellationToken {
        self.ticket
            .as_ref()
            .map(|t| t.token.clone())
            .unwrap_or_default()
    }

    /// Release the slot; `true` when the result may still be applied.
    fn finish(mut self) -> bool {
        self.ticket
            .take()
            .is_some_and(|ticket| lock(self.table).finish(&ticket))
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            tracing::debug!("engine: run fetch of workflow {} abandoned", ticket.workflow_id);
            lock(self.table).abandon(&ticket);
        }
    }
}

impl<S: WorkflowSource> Shared<S> {
    fn emit(&self, event: Event) {
        // Ignore errors: nobody listening just means nothing to draw.
        let _ = self.events.send(event);
    }

    fn is_tracked(&self, repo: &TrackedRepository) -> bool {
        lock(&self.registry)
            .contains(&repo.owner, &repo.name)
            .unwrap_or(true)
    }

    async fn refresh_all(
        &self,
        force: bool,
        background: bool,
    ) -> Result<RefreshReport, RefreshError> {
        let _cycle = CycleGuard::enter(&self.active_cycles);
        let repos = lock(&self.registry).list()?;
        tracing::debug!(
            "engine: refresh_all repos={} force={force} background={background}",
            repos.len()
        );
        self.emit(Event::RefreshStarted {
            repositories: repos.clone(),
            background,
        });

        let mut report = RefreshReport {
            repositories: repos.len(),
            ..RefreshReport::default()
        };
        for (idx, batch) in repos.chunks(self.settings.batch_size.max(1)).enumerate() {
            if idx > 0 && !self.settings.batch_delay.is_zero() {
                tokio::time::sleep(self.settings.batch_delay).await;
            }
            report.batches += 1;

            let pending: Vec<_> = batch
                .iter()
                .map(|repo| self.refresh_repo(repo, force, background))
                .collect();
            for outcome in join_all(pending).await {
                match outcome {
                    RepoOutcome::Refreshed {
                        failed_workflows, ..
                    } => report.failed_workflows += failed_workflows,
                    RepoOutcome::Failed { .. } => report.failed_repositories += 1,
                    RepoOutcome::Skipped => {}
                }
            }
        }

        tracing::debug!("engine: refresh_all done {report:?}");
        self.emit(Event::RefreshCompleted { report });
        Ok(report)
    }

    async fn refresh_repo(
        &self,
        repo: &TrackedRepository,
        force: bool,
        background: bool,
    ) -> RepoOutcome {
        if !background {
            self.emit(Event::RepoLoading { repo: repo.clone() });
        }

        let workflows = match self
            .source
            .fetch_workflows(&repo.owner, &repo.name, force)
            .await
        {
            Ok(workflows) => workflows,
            Err(e) if e.is_cancellation() => {
                tracing::debug!("engine: workflows of {} {e}", repo.full_name);
                return RepoOutcome::Skipped;
            }
            Err(e) => {
                tracing::warn!("engine: workflows of {} failed: {e}", repo.full_name);
                let message = format!("Failed to load workflows: {e}");
                self.emit(Event::RepoError {
                    repo: repo.clone(),
                    message: message.clone(),
                });
                return RepoOutcome::Failed { message };
            }
        };

        self.publish_workflows(repo, workflows).await
    }

    /// Publish a freshly fetched workflow list and refresh each workflow's
    /// latest run.
    async fn publish_workflows(
        &self,
        repo: &TrackedRepository,
        workflows: Vec<WorkflowDefinition>,
    ) -> RepoOutcome {
        // Removed while the request was outstanding.
        if !self.is_tracked(repo) {
            tracing::debug!("engine: {} no longer tracked, dropping result", repo.full_name);
            return RepoOutcome::Skipped;
        }

        self.emit(Event::WorkflowsFetched {
            repo: repo.clone(),
            workflows: workflows.clone(),
        });

        let pending: Vec<_> = workflows
            .iter()
            .map(|workflow| self.refresh_workflow(repo, workflow))
            .collect();
        let failed_workflows = join_all(pending)
            .await
            .iter()
            .filter(|o| matches!(o, WorkflowOutcome::Failed { .. }))
            .count();

        RepoOutcome::Refreshed {
            workflows: workflows.len(),
            failed_workflows,
        }
    }

    async fn refresh_workflow(
        &self,
        repo: &TrackedRepository,
        workflow: &WorkflowDefinition,
    ) -> WorkflowOutcome {
        let slot = InFlightSlot::begin(&self.in_flight, workflow.id, &repo.key());
        let token = slot.token();
        let fetch = self.source.fetch_latest_runs(
            &repo.owner,
            &repo.name,
            workflow.id,
            self.settings.runs_per_page,
            &token,
        );

        let result = tokio::select! {
            biased;
            () = token.cancelled() => Err(FetchError::Cancelled {
                reason: CancelReason::Aborted,
            }),
            res = tokio::time::timeout(self.settings.run_timeout, fetch) => {
                res.unwrap_or(Err(FetchError::Cancelled {
                    reason: CancelReason::TimedOut,
                }))
            }
        };
        let current = slot.finish();

        match result {
            Ok(runs) if current => {
                let summary = summarize(latest_run(&runs), &workflow.name, &self.settings.render);
                self.emit(Event::RunSummaryReady {
                    repo: repo.clone(),
                    workflow_id: workflow.id,
                    summary: summary.clone(),
                });
                WorkflowOutcome::Applied(Box::new(summary))
            }
            Ok(_) => {
                tracing::debug!("engine: discarding stale runs of workflow {}", workflow.id);
                WorkflowOutcome::Discarded
            }
            Err(FetchError::Cancelled { reason }) => {
                let reason = if current { reason } else { CancelReason::Superseded };
                tracing::debug!("engine: runs of workflow {} {reason}", workflow.id);
                WorkflowOutcome::Discarded
            }
            Err(e) if !current => {
                tracing::debug!("engine: ignoring error of superseded fetch {}: {e}", workflow.id);
                WorkflowOutcome::Discarded
            }
            Err(e) => {
                tracing::warn!(
                    "engine: runs of {} / {} failed: {e}",
                    repo.full_name,
                    workflow.name
                );
                let message = format!("Failed to load workflow runs: {e}");
                self.emit(Event::WorkflowError {
                    repo: repo.clone(),
                    workflow_id: workflow.id,
                    workflow_name: workflow.name.clone(),
                    message: message.clone(),
                });
                WorkflowOutcome::Failed { message }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Polling loop
// ---------------------------------------------------------------------------

async fn poll_loop<S: WorkflowSource>(
    shared: Arc<Shared<S>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let policy = shared.settings.restart.clone();
    let mut failures: u32 = 0;

    loop {
        // Every (re)start gets a fresh timer whose first tick fires at once.
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut background = false;

        let error = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                res = shared.refresh_all(false, background) => res,
            };
            background = true;
            match result {
                Ok(_) => failures = 0,
                Err(e) => break e,
            }
        };

        failures += 1;
        let Some(delay) = policy.backoff(failures) else {
            tracing::warn!("engine: polling gave up after {failures} failures: {error}");
            shared.emit(Event::PollingStopped {
                reason: format!("refresh failed {failures} times in a row: {error}"),
            });
            return;
        };

        tracing::warn!("engine: refresh cycle failed ({error}); restarting in {delay:?}");
        shared.emit(Event::PollingRestarted {
            attempt: failures,
            delay,
            error: error.to_string(),
        });
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }
    }
}
