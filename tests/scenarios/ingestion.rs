//! Test: successful ingestion into the store

use crate::helpers::*;
use stageboard::ingest::StaticStageSource;
use stageboard::{Ingestor, LoadState, MergeStrategy, PipelineStatus, StepStatus, StepUpdate, StoreHandle};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Records spread over several stages group into one pipeline per file
#[tokio::test]
async fn test_ingest_groups_by_file() {
    let store = StoreHandle::spawn(16);
    let source = StaticStageSource::new(vec![
        record("a.yml", "build", &[("compile", "done")]),
        record("b.yml", "build", &[("compile", "failed")]),
        record("a.yml", "test", &[("unit", "running"), ("lint", "garbage")]),
    ]);

    let count = Ingestor::new(source, TIMEOUT)
        .run(&store, MergeStrategy::Replace)
        .await
        .unwrap();
    assert_eq!(count, 2);
    assert_eq!(store.load_state(), LoadState::Loaded);

    assert_eq!(
        store.pipeline_status("a.yml"),
        Some(PipelineStatus { total: 3, running: 1, error: 0, done: 1 })
    );
    assert_eq!(
        store.pipeline_status("b.yml"),
        Some(PipelineStatus { total: 1, running: 0, error: 1, done: 0 })
    );

    let snapshot = store.snapshot();
    let a = snapshot.pipeline("a.yml").unwrap();
    let lint = a.step("lint", None).unwrap();
    assert_eq!(lint.status, StepStatus::NotStarted);
}

/// A full resync with the same data twice equals doing it once
#[tokio::test]
async fn test_replace_is_idempotent() {
    let records = vec![
        record("a.yml", "default", &[("s1", "start"), ("s2", "done")]),
        record("b.yml", "default", &[("s1", "error")]),
    ];

    let once = StoreHandle::spawn(16);
    Ingestor::new(StaticStageSource::new(records.clone()), TIMEOUT)
        .run(&once, MergeStrategy::Replace)
        .await
        .unwrap();

    let twice = StoreHandle::spawn(16);
    let ingestor = Ingestor::new(StaticStageSource::new(records), TIMEOUT);
    ingestor.run(&twice, MergeStrategy::Replace).await.unwrap();
    ingestor.run(&twice, MergeStrategy::Replace).await.unwrap();

    assert_eq!(sorted(once.all_pipelines()), sorted(twice.all_pipelines()));
    assert_eq!(once.load_state(), twice.load_state());
}

/// A resync drops pipelines the source no longer reports
#[tokio::test]
async fn test_replace_drops_stale_pipelines() {
    let store = StoreHandle::spawn(16);
    let source = Arc::new(ScriptedSource::new(vec![
        vec![record("a.yml", "default", &[("s1", "done")]), record("old.yml", "default", &[("s1", "done")])],
        vec![record("a.yml", "default", &[("s1", "running")])],
    ]));
    let ingestor = Ingestor::new(source.clone(), TIMEOUT);

    ingestor.run(&store, MergeStrategy::Replace).await.unwrap();
    assert_eq!(store.all_pipelines().len(), 2);

    ingestor.run(&store, MergeStrategy::Replace).await.unwrap();
    let files: Vec<_> = store.all_pipelines().into_iter().map(|p| p.pipeline_file).collect();
    assert_eq!(files, vec!["a.yml"]);
    assert_eq!(source.calls(), 2);
}

/// Incremental ingestion keeps the entry already in the store
#[tokio::test]
async fn test_union_keeps_existing_entry() {
    let store = StoreHandle::spawn(16);
    store.load_succeeded(vec![a_yml()]).await.unwrap();
    store
        .apply_step_update("a.yml", StepUpdate::new("s1", StepStatus::Error))
        .await
        .unwrap();

    let source = StaticStageSource::new(vec![
        record("a.yml", "default", &[("s1", "done"), ("s2", "done")]),
        record("c.yml", "default", &[("s1", "start")]),
    ]);
    let count = Ingestor::new(source, TIMEOUT)
        .run(&store, MergeStrategy::Union)
        .await
        .unwrap();
    assert_eq!(count, 2);

    let files: Vec<_> = store.all_pipelines().into_iter().map(|p| p.pipeline_file).collect();
    assert_eq!(files, vec!["a.yml", "c.yml"]);
    assert_eq!(
        store.pipeline_status("a.yml"),
        Some(PipelineStatus { total: 2, running: 0, error: 1, done: 1 })
    );
    assert_eq!(store.load_state(), LoadState::Loaded);
}

/// Live updates after a load act on the ingested pipelines
#[tokio::test]
async fn test_updates_after_ingest() {
    let store = StoreHandle::spawn(16);
    Ingestor::new(StaticStageSource::new(vec![record("a.yml", "default", &[("s1", "start")])]), TIMEOUT)
        .run(&store, MergeStrategy::Replace)
        .await
        .unwrap();

    store
        .apply_step_update("a.yml", StepUpdate::new("s1", StepStatus::Done))
        .await
        .unwrap();

    let status = store.pipeline_status("a.yml").unwrap();
    assert!(status.is_complete());
    assert_eq!(status.done, 1);
}
