use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backend::{CancelReason, FetchError, WorkflowSource};
use crate::types::{WorkflowDefinition, WorkflowRun};

/// One scripted answer to a run fetch.
#[derive(Clone)]
struct StubResponse {
    delay: Option<Duration>,
    result: Result<Vec<WorkflowRun>, u16>,
}

/// A workflow source that serves pre-loaded fixture data without any network
/// calls.
///
/// Useful for engine tests and demos that must not require a backend. Every
/// call sleeps for the configured latency (so paused tokio time controls
/// ordering) and is recorded for later inspection.
#[derive(Default)]
pub struct StubSource {
    workflows: HashMap<String, Vec<WorkflowDefinition>>,
    failing_repos: HashMap<String, u16>,
    runs: Mutex<HashMap<u64, VecDeque<StubResponse>>>,
    latency: Duration,
    in_flight: AtomicUsize,
    workflow_log: Mutex<Vec<(String, usize)>>,
    run_calls: AtomicUsize,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to every call without a scripted delay of its own.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Serve `workflows` for `full_name` (matched case-insensitively).
    pub fn with_repo(mut self, full_name: &str, workflows: Vec<WorkflowDefinition>) -> Self {
        self.workflows.insert(full_name.to_lowercase(), workflows);
        self
    }

    /// Make `fetch_workflows` for `full_name` answer with HTTP `status`.
    pub fn with_failing_repo(mut self, full_name: &str, status: u16) -> Self {
        self.failing_repos.insert(full_name.to_lowercase(), status);
        self
    }

    /// Queue `runs` as the next answer for `workflow_id`.
    ///
    /// Queued answers are consumed in order; the last one is repeated.
    pub fn with_runs(self, workflow_id: u64, runs: Vec<WorkflowRun>) -> Self {
        self.push(workflow_id, None, Ok(runs))
    }

    /// Like [`with_runs`](Self::with_runs) with a per-answer delay.
    pub fn with_delayed_runs(self, workflow_id: u64, delay: Duration, runs: Vec<WorkflowRun>) -> Self {
        self.push(workflow_id, Some(delay), Ok(runs))
    }

    /// Queue an HTTP `status` failure as the next answer for `workflow_id`.
    pub fn with_failing_runs(self, workflow_id: u64, status: u16) -> Self {
        self.push(workflow_id, None, Err(status))
    }

    fn push(
        self,
        workflow_id: u64,
        delay: Option<Duration>,
        result: Result<Vec<WorkflowRun>, u16>,
    ) -> Self {
        self.runs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(workflow_id)
            .or_default()
            .push_back(StubResponse { delay, result });
        self
    }

    /// `(full_name, concurrent fetches including this one)` for every
    /// `fetch_workflows` call, in call order.
    pub fn workflow_fetch_log(&self) -> Vec<(String, usize)> {
        self.workflow_log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Highest number of `fetch_workflows` calls outstanding at once.
    pub fn max_concurrent_workflow_fetches(&self) -> usize {
        self.workflow_fetch_log()
            .iter()
            .map(|(_, n)| *n)
            .max()
            .unwrap_or(0)
    }

    pub fn run_fetch_count(&self) -> usize {
        self.run_calls.load(Ordering::SeqCst)
    }

    fn next_response(&self, workflow_id: u64) -> Option<StubResponse> {
        let mut runs = self
            .runs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let queue = runs.get_mut(&workflow_id)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

/// Decrements the in-flight counter even when the call is dropped mid-way.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkflowSource for StubSource {
    async fn fetch_workflows(
        &self,
        owner: &str,
        repo: &str,
        _force: bool,
    ) -> Result<Vec<WorkflowDefinition>, FetchError> {
        let key = format!("{owner}/{repo}").to_lowercase();
        let concurrent = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.in_flight);
        self.workflow_log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((key.clone(), concurrent));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(&status) = self.failing_repos.get(&key) {
            return Err(FetchError::Http {
                status,
                body: String::new(),
            });
        }
        self.workflows
            .get(&key)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                owner: owner.to_owned(),
                repo: repo.to_owned(),
            })
    }

    async fn fetch_latest_runs(
        &self,
        _owner: &str,
        _repo: &str,
        workflow_id: u64,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<WorkflowRun>, FetchError> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        let response = self.next_response(workflow_id);
        let delay = response
            .as_ref()
            .and_then(|r| r.delay)
            .unwrap_or(self.latency);

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(FetchError::Cancelled { reason: CancelReason::Aborted });
            }
            () = tokio::time::sleep(delay) => {}
        }

        match response.map(|r| r.result) {
            None => Ok(Vec::new()),
            Some(Ok(mut runs)) => {
                runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                runs.truncate(limit as usize);
                Ok(runs)
            }
            Some(Err(status)) => Err(FetchError::Http {
                status,
                body: String::new(),
            }),
        }
    }
}
