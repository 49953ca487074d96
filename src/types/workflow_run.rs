use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// WorkflowRun-specific enums
// ---------------------------------------------------------------------------

/// Lifecycle state of a run. Values this crate does not know are kept verbatim
/// in `Other` so they still reach the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Requested,
    Waiting,
    Pending,
    Queued,
    InProgress,
    Completed,
    Cancelled,
    Other(String),
}

impl RunStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "requested" => Self::Requested,
            "waiting" => Self::Waiting,
            "pending" => Self::Pending,
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Requested => "requested",
            Self::Waiting => "waiting",
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for RunStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Other(raw) => raw,
            known => known.as_str().to_owned(),
        }
    }
}

/// Outcome of a finished run. Unrecognised values are kept in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunConclusion {
    Success,
    Failure,
    Neutral,
    Cancelled,
    TimedOut,
    ActionRequired,
    Skipped,
    Stale,
    StartupFailure,
    Other(String),
}

impl RunConclusion {
    pub fn parse(s: &str) -> Self {
        match s {
            "success" => Self::Success,
            "failure" => Self::Failure,
            "neutral" => Self::Neutral,
            "cancelled" => Self::Cancelled,
            "timed_out" => Self::TimedOut,
            "action_required" => Self::ActionRequired,
            "skipped" => Self::Skipped,
            "stale" => Self::Stale,
            "startup_failure" => Self::StartupFailure,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Neutral => "neutral",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
            Self::ActionRequired => "action_required",
            Self::Skipped => "skipped",
            Self::Stale => "stale",
            Self::StartupFailure => "startup_failure",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for RunConclusion {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<RunConclusion> for String {
    fn from(conclusion: RunConclusion) -> Self {
        match conclusion {
            RunConclusion::Other(raw) => raw,
            known => known.as_str().to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition domain type
// ---------------------------------------------------------------------------

/// A CI pipeline definition. Fetched fresh on every refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
}

// ---------------------------------------------------------------------------
// WorkflowRun domain type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub run_number: Option<u64>,
    pub status: Option<RunStatus>,
    /// Only populated once `status` is `completed`.
    pub conclusion: Option<RunConclusion>,
    pub head_branch: Option<String>,
    /// Secondary branch field, used when `head_branch` is missing.
    pub head_ref: Option<String>,
    pub head_sha: Option<String>,
    /// Login of the user that triggered the run, else the commit author name.
    pub actor: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub html_url: Option<String>,
    pub commit_message: Option<String>,
    /// When the head commit was authored; preferred over `created_at` for
    /// the displayed date.
    #[serde(default)]
    pub commit_timestamp: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    /// `conclusion`, else `status`, else `"unknown"`.
    pub fn display_status(&self) -> &str {
        self.conclusion
            .as_ref()
            .map(RunConclusion::as_str)
            .or_else(|| self.status.as_ref().map(RunStatus::as_str))
            .unwrap_or("unknown")
    }
}
