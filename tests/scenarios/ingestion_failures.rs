//! Test: ingestion failures, timeouts and cancellation

use crate::helpers::*;
use stageboard::ingest::StaticStageSource;
use stageboard::{IngestError, Ingestor, LoadState, MergeStrategy, StoreHandle};
use std::time::Duration;

/// A failing source leaves the store `Failed` and empty
#[tokio::test]
async fn test_source_error_fails_load() {
    let store = StoreHandle::spawn(16);
    store.load_succeeded(vec![a_yml()]).await.unwrap();

    let result = Ingestor::new(FailingSource, Duration::from_secs(5))
        .run(&store, MergeStrategy::Replace)
        .await;

    assert!(matches!(result, Err(IngestError::Source(_))));
    assert_eq!(store.load_state(), LoadState::Failed);
    assert!(store.all_pipelines().is_empty());
}

/// A source that never answers in time fails the load
#[tokio::test]
async fn test_timeout_fails_load() {
    let store = StoreHandle::spawn(16);
    let source = SlowSource {
        delay: Duration::from_secs(10),
        records: vec![record("a.yml", "default", &[("s1", "done")])],
    };

    let result = Ingestor::new(source, Duration::from_millis(50))
        .run(&store, MergeStrategy::Replace)
        .await;

    assert!(matches!(result, Err(IngestError::Timeout(d)) if d == Duration::from_millis(50)));
    assert_eq!(store.load_state(), LoadState::Failed);
    assert!(store.all_pipelines().is_empty());
}

/// Cancelling an in-flight ingestion fails the load instead of leaving it `Loading`
#[tokio::test]
async fn test_cancellation_fails_load() {
    let store = StoreHandle::spawn(16);
    let source = SlowSource {
        delay: Duration::from_secs(10),
        records: Vec::new(),
    };
    let ingestor = Ingestor::new(source, Duration::from_secs(30));
    let cancel = ingestor.cancellation_token();

    let task = {
        let store = store.clone();
        tokio::spawn(async move { ingestor.run(&store, MergeStrategy::Replace).await })
    };

    let mut watcher = store.watch();
    while watcher.borrow_and_update().load_state() != LoadState::Loading {
        watcher.changed().await.unwrap();
    }
    cancel.cancel();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(IngestError::Cancelled)));
    assert_eq!(store.load_state(), LoadState::Failed);
}

/// An incremental ingestion that fails does not touch the store
#[tokio::test]
async fn test_union_failure_leaves_store_untouched() {
    let store = StoreHandle::spawn(16);
    store.load_succeeded(vec![a_yml()]).await.unwrap();
    let before = store.snapshot();

    let result = Ingestor::new(FailingSource, Duration::from_secs(5))
        .run(&store, MergeStrategy::Union)
        .await;

    assert!(result.is_err());
    assert_eq!(*store.snapshot(), *before);
    assert_eq!(store.load_state(), LoadState::Loaded);
}

/// Mutations arriving while a full resync is in flight are superseded by it
#[tokio::test]
async fn test_mutations_during_loading_are_lost() {
    let store = StoreHandle::spawn(16);
    store.begin_load().await.unwrap();

    let outcome = store
        .apply_step_update("a.yml", stageboard::StepUpdate::new("s1", stageboard::StepStatus::Done))
        .await
        .unwrap();
    assert!(outcome.is_not_found());

    store.load_succeeded(vec![a_yml()]).await.unwrap();
    assert_eq!(store.pipeline_status("a.yml"), Some(a_yml().status));
}

/// A later successful load recovers from a failure
#[tokio::test]
async fn test_recover_after_failure() {
    let store = StoreHandle::spawn(16);

    let _ = Ingestor::new(FailingSource, Duration::from_secs(5))
        .run(&store, MergeStrategy::Replace)
        .await;
    assert_eq!(store.load_state(), LoadState::Failed);

    Ingestor::new(StaticStageSource::new(vec![record("a.yml", "default", &[("s1", "done")])]), Duration::from_secs(5))
        .run(&store, MergeStrategy::Replace)
        .await
        .unwrap();
    assert_eq!(store.load_state(), LoadState::Loaded);
    assert_eq!(store.all_pipelines().len(), 1);
}

/// A batch with numeric backend status codes loads instead of failing
#[tokio::test]
async fn test_numeric_statuses_do_not_fail_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stages.json");
    std::fs::write(
        &path,
        r#"[
          {"pipelineFile": "a.yml", "name": "default", "status": 2,
           "steps": [{"name": "s1", "status": 2}, {"name": "s2", "status": 1}]},
          {"pipelineFile": "b.yml", "name": "default", "status": 0,
           "steps": [{"name": "s1", "status": 3}, {"name": "s2", "status": 4}, {"name": "s3", "status": false}]}
        ]"#,
    )
    .unwrap();

    let store = StoreHandle::spawn(16);
    let count = Ingestor::new(stageboard::ingest::FileStageSource::new(&path), Duration::from_secs(5))
        .run(&store, MergeStrategy::Replace)
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(store.load_state(), LoadState::Loaded);
    assert_eq!(store.pipeline_status("a.yml"), Some(a_yml().status));
    assert_eq!(
        store.pipeline_status("b.yml"),
        Some(stageboard::PipelineStatus { total: 3, running: 0, error: 1, done: 0 })
    );
}

/// A numeric status inside a command feed does not reject the feed
#[tokio::test]
async fn test_numeric_status_in_command_feed() {
    let store = StoreHandle::spawn(16);
    store.load_succeeded(vec![a_yml()]).await.unwrap();

    let commands = stageboard::Command::parse_lines(
        r#"{"type": "applyStepUpdate", "payload": {"pipelineId": "a.yml", "step": {"name": "s1", "status": 3}}}"#,
    )
    .unwrap();
    for command in commands {
        store.dispatch(command).await.unwrap();
    }
    assert_eq!(store.pipeline_status("a.yml").map(|s| s.error), Some(1));
}
