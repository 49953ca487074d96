//! Maps raw workflow runs to display-ready summaries.
//!
//! Everything here is pure: no IO, no clock.

use serde::Serialize;

use crate::types::WorkflowRun;
use crate::util::{DEFAULT_DATE_FORMAT, expand_emoji, format_date, truncate_to_width};

/// Display status of a workflow that has never run.
pub const NO_RUNS: &str = "no runs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Success,
    Failure,
    Warning,
    Neutral,
    Info,
}

impl StatusCategory {
    /// Fixed mapping from a display status to its category.
    pub fn from_display_status(status: &str) -> Self {
        match status {
            "success" | "completed" => Self::Success,
            "failure" | "failed" | "error" | "timed_out" | "startup_failure" => Self::Failure,
            "in_progress" | "queued" | "pending" | "waiting" | "requested" => Self::Warning,
            "cancelled" | "skipped" | "neutral" | "stale" | NO_RUNS => Self::Neutral,
            _ => Self::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub date_format: String,
    pub commit_message_width: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_owned(),
            commit_message_width: 50,
        }
    }
}

/// Display-ready view of a workflow's latest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub workflow_name: String,
    pub run_id: Option<u64>,
    pub run_number: Option<u64>,
    pub display_status: String,
    pub status_category: StatusCategory,
    pub branch: String,
    pub actor: String,
    /// First line of the commit message, untruncated.
    pub commit_message: String,
    pub short_commit_message: String,
    pub duration_seconds: Option<i64>,
    pub formatted_date: Option<String>,
    pub html_url: Option<String>,
}

impl RunSummary {
    /// Sentinel summary for a workflow without runs.
    pub fn no_runs(workflow_name: &str) -> Self {
        Self {
            workflow_name: workflow_name.to_owned(),
            run_id: None,
            run_number: None,
            display_status: NO_RUNS.to_owned(),
            status_category: StatusCategory::Neutral,
            branch: "unknown".to_owned(),
            actor: "Unknown".to_owned(),
            commit_message: String::new(),
            short_commit_message: String::new(),
            duration_seconds: None,
            formatted_date: None,
            html_url: None,
        }
    }

    pub fn is_no_runs(&self) -> bool {
        self.run_id.is_none() && self.display_status == NO_RUNS
    }
}

/// The run with the greatest `created_at`, regardless of input order.
///
/// Runs without a timestamp only win when no run has one.
pub fn latest_run(runs: &[WorkflowRun]) -> Option<&WorkflowRun> {
    runs.iter().max_by_key(|r| r.created_at)
}

/// Summarize the newest of `runs` with default options.
pub fn summarize_latest(runs: &[WorkflowRun], workflow_name: &str) -> RunSummary {
    summarize(latest_run(runs), workflow_name, &RenderOptions::default())
}

pub fn summarize(run: Option<&WorkflowRun>, workflow_name: &str, opts: &RenderOptions) -> RunSummary {
    let Some(run) = run else {
        return RunSummary::no_runs(workflow_name);
    };

    let display_status = run.display_status().to_owned();
    let status_category = StatusCategory::from_display_status(&display_status);

    let branch = run
        .head_branch
        .clone()
        .or_else(|| run.head_ref.clone())
        .unwrap_or_else(|| "unknown".to_owned());

    let commit_message = run
        .commit_message
        .as_deref()
        .and_then(|m| m.lines().next())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map_or_else(|| "No commit message".to_owned(), |m| expand_emoji(m).into_owned());
    let short_commit_message =
        truncate_to_width(&commit_message, opts.commit_message_width).into_owned();

    let duration_seconds = match (run.created_at, run.updated_at) {
        (Some(start), Some(end)) => Some((end - start).num_seconds().max(0)),
        _ => None,
    };

    RunSummary {
        workflow_name: workflow_name.to_owned(),
        run_id: Some(run.id),
        run_number: run.run_number,
        display_status,
        status_category,
        branch,
        actor: run.actor.clone().unwrap_or_else(|| "Unknown".to_owned()),
        commit_message,
        short_commit_message,
        duration_seconds,
        formatted_date: run
            .commit_timestamp
            .or(run.created_at)
            .map(|dt| format_date(&dt, &opts.date_format)),
        html_url: run.html_url.clone(),
    }
}
