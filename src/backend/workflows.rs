use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::types::common::lenient_date;
use crate::types::{
    RepositorySummary, RunConclusion, RunStatus, WorkflowDefinition, WorkflowRun,
};

use super::WorkflowSource;
use super::client::{BackendClient, CacheMode};
use super::error::{CancelReason, FetchError};

// ---------------------------------------------------------------------------
// Raw API response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawReposResponse {
    items: Vec<RepositorySummary>,
}

#[derive(Deserialize)]
struct RawWorkflowsResponse {
    workflows: Vec<RawWorkflow>,
}

#[derive(Deserialize)]
struct RawWorkflow {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Deserialize)]
struct RawRunsResponse {
    runs: Vec<RawWorkflowRun>,
}

#[derive(Deserialize)]
struct RawWorkflowRun {
    id: u64,
    #[serde(default)]
    run_number: Option<u64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    conclusion: Option<String>,
    #[serde(default)]
    head_branch: Option<String>,
    #[serde(default)]
    head_ref: Option<String>,
    #[serde(default)]
    head_sha: Option<String>,
    #[serde(default)]
    actor: Option<RawActor>,
    #[serde(default, deserialize_with = "lenient_date::deserialize")]
    created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, deserialize_with = "lenient_date::deserialize")]
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    head_commit: Option<RawHeadCommit>,
}

#[derive(Deserialize)]
struct RawActor {
    login: String,
}

#[derive(Deserialize)]
struct RawHeadCommit {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    author: Option<RawAuthor>,
    #[serde(default, deserialize_with = "lenient_date::deserialize")]
    timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

/// The backend sends either a bare author name or a GitHub-style object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAuthor {
    Name(String),
    Detailed {
        #[serde(default)]
        name: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

fn into_domain(raw: RawWorkflowRun) -> WorkflowRun {
    let status = non_empty(raw.status).as_deref().map(RunStatus::parse);
    // A conclusion on an unfinished run is stale data from the upstream API.
    let conclusion = match status {
        Some(RunStatus::Completed) | None => {
            non_empty(raw.conclusion).as_deref().map(RunConclusion::parse)
        }
        Some(_) => None,
    };
    let (commit_message, commit_author, commit_timestamp) = match raw.head_commit {
        Some(commit) => (
            non_empty(commit.message),
            commit.author.and_then(|a| match a {
                RawAuthor::Name(name) => Some(name),
                RawAuthor::Detailed { name } => name,
            }),
            commit.timestamp,
        ),
        None => (None, None, None),
    };

    WorkflowRun {
        id: raw.id,
        run_number: raw.run_number,
        status,
        conclusion,
        head_branch: non_empty(raw.head_branch),
        head_ref: non_empty(raw.head_ref),
        head_sha: non_empty(raw.head_sha),
        actor: raw
            .actor
            .map(|a| a.login)
            .or_else(|| non_empty(commit_author)),
        created_at: raw.created_at,
        updated_at: raw.updated_at,
        html_url: non_empty(raw.html_url),
        commit_message,
        commit_timestamp,
    }
}

fn decode<T: DeserializeOwned>(body: &str, path: &str) -> Result<T, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::Malformed {
        path: path.to_owned(),
        detail: e.to_string(),
    })
}

/// Parse a `{workflows: [...]}` payload, skipping entries without id or name.
pub(crate) fn parse_workflows(body: &str, path: &str) -> Result<Vec<WorkflowDefinition>, FetchError> {
    let raw: RawWorkflowsResponse = decode(body, path)?;
    Ok(raw
        .workflows
        .into_iter()
        .filter_map(|w| {
            let id = w.id.filter(|&id| id != 0)?;
            let name = non_empty(w.name)?;
            Some(WorkflowDefinition {
                id,
                name,
                path: w.path,
            })
        })
        .collect())
}

/// Parse a `{runs: [...]}` payload into at most `limit` runs, newest first.
pub(crate) fn parse_runs(body: &str, path: &str, limit: u32) -> Result<Vec<WorkflowRun>, FetchError> {
    let raw: RawRunsResponse = decode(body, path)?;
    let mut runs: Vec<WorkflowRun> = raw.runs.into_iter().map(into_domain).collect();
    // Option ordering puts missing timestamps last when sorting descending.
    runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    runs.truncate(limit as usize);
    Ok(runs)
}

/// Parse an `{items: [...]}` payload, private repositories first, then by name.
pub(crate) fn parse_repos(body: &str, path: &str) -> Result<Vec<RepositorySummary>, FetchError> {
    let raw: RawReposResponse = decode(body, path)?;
    let mut repos = raw.items;
    for repo in &mut repos {
        if repo.full_name.is_empty() {
            repo.full_name = format!("{}/{}", repo.owner.login, repo.name);
        }
    }
    repos.sort_by(|a, b| {
        b.private
            .cmp(&a.private)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    Ok(repos)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl BackendClient {
    /// List the authenticated user's repositories, filtered by `query` when
    /// non-empty.
    pub async fn search_repos(
        &self,
        query: Option<&str>,
        force: bool,
    ) -> Result<Vec<RepositorySummary>, FetchError> {
        let mut url = self.url_for(&["api", "my-repos"]);
        if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
            url.query_pairs_mut().append_pair("q", q);
        }
        let path = url.path().to_owned();
        let body = self
            .get_text(url, CacheMode::cached(force), || FetchError::Http {
                status: 404,
                body: String::new(),
            })
            .await?;
        parse_repos(&body, &path)
    }
}

impl WorkflowSource for BackendClient {
    async fn fetch_workflows(
        &self,
        owner: &str,
        repo: &str,
        force: bool,
    ) -> Result<Vec<WorkflowDefinition>, FetchError> {
        let url = self.url_for(&["api", "workflows", owner, repo]);
        let path = url.path().to_owned();
        let body = self
            .get_text(url, CacheMode::cached(force), || FetchError::NotFound {
                owner: owner.to_owned(),
                repo: repo.to_owned(),
            })
            .await?;
        parse_workflows(&body, &path)
    }

    async fn fetch_latest_runs(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: u64,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<WorkflowRun>, FetchError> {
        let id = workflow_id.to_string();
        let mut url = self.url_for(&["api", "runs", owner, repo, &id]);
        url.query_pairs_mut()
            .append_pair("per_page", &limit.to_string());
        let path = url.path().to_owned();

        let body = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(FetchError::Cancelled { reason: CancelReason::Aborted });
            }
            res = self.get_text(url, CacheMode::Bypass, || FetchError::NotFound {
                owner: owner.to_owned(),
                repo: repo.to_owned(),
            }) => res?,
        };
        parse_runs(&body, &path, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflows_without_id_or_name_are_skipped() {
        let body = r#"{"workflows": [
            {"id": 1, "name": "CI", "path": ".github/workflows/ci.yml"},
            {"id": 2},
            {"name": "orphan"},
            {"id": 3, "name": "  "},
            {"id": 4, "name": "Release"}
        ]}"#;
        let workflows = parse_workflows(body, "/api/workflows/o/r").unwrap();
        let ids: Vec<u64> = workflows.iter().map(|w| w.id).collect();
        assert_eq!(ids, [1, 4]);
        assert_eq!(workflows[0].path.as_deref(), Some(".github/workflows/ci.yml"));
    }

    #[test]
    fn missing_workflows_key_is_malformed() {
        let err = parse_workflows(r#"{"items": []}"#, "/api/workflows/o/r").unwrap_err();
        assert!(matches!(err, FetchError::Malformed { .. }));
    }

    #[test]
    fn runs_are_sorted_newest_first_and_limited() {
        let body = r#"{"runs": [
            {"id": 1, "created_at": "2025-05-01T10:00:00Z"},
            {"id": 2, "created_at": null},
            {"id": 3, "created_at": "2025-05-03T10:00:00Z"},
            {"id": 4, "created_at": "2025-05-02T10:00:00"}
        ]}"#;
        let runs = parse_runs(body, "/api/runs/o/r/9", 3).unwrap();
        let ids: Vec<u64> = runs.iter().map(|r| r.id).collect();
        assert_eq!(ids, [3, 4, 1]);
    }

    #[test]
    fn conclusion_is_dropped_for_unfinished_runs() {
        let body = r#"{"runs": [
            {"id": 1, "status": "in_progress", "conclusion": "failure"},
            {"id": 2, "status": "completed", "conclusion": "success"}
        ]}"#;
        let runs = parse_runs(body, "/p", 5).unwrap();
        let by_id = |id| runs.iter().find(|r| r.id == id).unwrap();
        assert_eq!(by_id(1).conclusion, None);
        assert_eq!(by_id(2).conclusion, Some(RunConclusion::Success));
    }

    #[test]
    fn unrecognised_conclusions_survive_parsing() {
        let body = r#"{"runs": [
            {"id": 1, "status": "completed", "conclusion": "error"},
            {"id": 2, "status": "completed", "conclusion": ""}
        ]}"#;
        let runs = parse_runs(body, "/p", 5).unwrap();
        let by_id = |id| runs.iter().find(|r| r.id == id).unwrap();
        assert_eq!(by_id(1).display_status(), "error");
        assert_eq!(by_id(2).conclusion, None);
        assert_eq!(by_id(2).display_status(), "completed");
    }

    #[test]
    fn head_commit_author_accepts_both_shapes() {
        let body = r#"{"runs": [
            {"id": 1, "head_commit": {"message": "fix", "author": "Mona"}},
            {"id": 2, "head_commit": {"message": "feat", "author": {"name": "Hubot", "email": "h@x"}}},
            {"id": 3, "actor": {"login": "octocat"}, "head_commit": {"author": "ignored"}}
        ]}"#;
        let runs = parse_runs(body, "/p", 5).unwrap();
        let actor = |id| runs.iter().find(|r| r.id == id).unwrap().actor.clone();
        assert_eq!(actor(1).as_deref(), Some("Mona"));
        assert_eq!(actor(2).as_deref(), Some("Hubot"));
        assert_eq!(actor(3).as_deref(), Some("octocat"));
    }

    #[test]
    fn head_commit_timestamp_is_carried_through() {
        let body = r#"{"runs": [
            {"id": 1, "created_at": "2025-05-26T18:30:00Z",
             "head_commit": {"message": "fix", "timestamp": "2025-05-26T17:00:00Z"}},
            {"id": 2, "head_commit": {"message": "feat", "timestamp": "not a date"}}
        ]}"#;
        let runs = parse_runs(body, "/p", 5).unwrap();
        let stamp = |id| runs.iter().find(|r| r.id == id).unwrap().commit_timestamp;
        assert_eq!(
            stamp(1).map(|t| t.to_rfc3339()).as_deref(),
            Some("2025-05-26T17:00:00+00:00")
        );
        assert_eq!(stamp(2), None);
    }

    #[test]
    fn repos_are_ordered_private_first_then_by_name() {
        let body = r#"{"items": [
            {"name": "zeta", "owner": {"login": "me"}, "private": false},
            {"name": "beta", "owner": {"login": "me"}, "private": true},
            {"name": "Alpha", "owner": {"login": "me"}, "private": false, "updated_at": ""}
        ]}"#;
        let repos = parse_repos(body, "/api/my-repos").unwrap();
        let names: Vec<&str> = repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["beta", "Alpha", "zeta"]);
        assert_eq!(repos[0].full_name, "me/beta");
    }
}
