use std::time::Duration;

use tokio_util::sync::CancellationToken;

use actions_board::backend::{CancelReason, FetchError, WorkflowSource};
use actions_board::engine::StubSource;
use actions_board::types::{WorkflowDefinition, WorkflowRun};

fn load_fixture_runs() -> Vec<WorkflowRun> {
    (1..=5)
        .map(|id| WorkflowRun {
            id,
            run_number: Some(id),
            status: None,
            conclusion: None,
            head_branch: None,
            head_ref: None,
            head_sha: None,
            actor: None,
            created_at: chrono::DateTime::from_timestamp(1_700_000_000 + id as i64 * 60, 0),
            updated_at: None,
            html_url: None,
            commit_message: None,
            commit_timestamp: None,
        })
        .collect()
}

#[tokio::test]
async fn stub_source_serves_fixture_workflows() {
    let stub = StubSource::new().with_repo(
        "octocat/Hello-World",
        vec![WorkflowDefinition {
            id: 7,
            name: "CI".into(),
            path: Some(".github/workflows/ci.yml".into()),
        }],
    );

    let workflows = stub
        .fetch_workflows("Octocat", "hello-world", false)
        .await
        .unwrap();
    assert_eq!(workflows.len(), 1);
    assert_eq!(workflows[0].name, "CI");
    assert_eq!(stub.workflow_fetch_log(), [("octocat/hello-world".to_owned(), 1)]);
}

#[tokio::test]
async fn stub_source_unknown_repo_is_not_found() {
    let err = StubSource::new()
        .fetch_workflows("ghost", "repo", false)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::NotFound { .. }));
}

#[tokio::test]
async fn stub_source_returns_newest_runs_first() {
    let stub = StubSource::new().with_runs(3, load_fixture_runs());
    let runs = stub
        .fetch_latest_runs("octocat", "Hello-World", 3, 2, &CancellationToken::new())
        .await
        .unwrap();
    let ids: Vec<u64> = runs.iter().map(|r| r.id).collect();
    assert_eq!(ids, [5, 4]);
    assert_eq!(stub.run_fetch_count(), 1);
}

#[tokio::test]
async fn stub_source_scripted_answers_are_consumed_in_order() {
    let stub = StubSource::new()
        .with_failing_runs(1, 503)
        .with_runs(1, load_fixture_runs());
    let token = CancellationToken::new();

    let first = stub.fetch_latest_runs("o", "r", 1, 3, &token).await;
    assert!(matches!(first, Err(FetchError::Http { status: 503, .. })));
    // The last answer repeats.
    for _ in 0..2 {
        let runs = stub.fetch_latest_runs("o", "r", 1, 3, &token).await.unwrap();
        assert_eq!(runs.len(), 3);
    }
}

#[tokio::test(start_paused = true)]
async fn stub_source_honours_cancellation() {
    let stub = StubSource::new().with_delayed_runs(1, Duration::from_secs(60), load_fixture_runs());
    let token = CancellationToken::new();

    let (result, ()) = tokio::join!(stub.fetch_latest_runs("o", "r", 1, 3, &token), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });
    assert!(matches!(
        result,
        Err(FetchError::Cancelled {
            reason: CancelReason::Aborted
        })
    ));
}
