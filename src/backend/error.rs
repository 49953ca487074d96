use std::fmt;

use thiserror::Error;

/// Why a request stopped before producing a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// A newer request for the same workflow replaced this one.
    Superseded,
    /// The caller no longer needs the result.
    Aborted,
    /// No response within the request timeout.
    TimedOut,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Superseded => "superseded",
            Self::Aborted => "aborted",
            Self::TimedOut => "timed out",
        })
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("HTTP error! status: {status}{}", body_suffix(.body))]
    Http { status: u16, body: String },
    #[error("Repository not found or access denied: {owner}/{repo}")]
    NotFound { owner: String, repo: String },
    #[error("request {reason}")]
    Cancelled { reason: CancelReason },
    #[error("malformed response from {path}: {detail}")]
    Malformed { path: String, detail: String },
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(", response: {body}")
    }
}

impl FetchError {
    /// Cancellations are silent: never shown to the user, never retried.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub(crate) fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Cancelled {
                reason: CancelReason::TimedOut,
            }
        } else {
            Self::Network(error)
        }
    }
}
