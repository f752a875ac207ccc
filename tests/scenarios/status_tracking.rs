//! Test: status tracking through the store handle

use crate::helpers::*;
use stageboard::{LoadState, MutationOutcome, PipelineStatus, StepStatus, StepUpdate, StoreHandle};

/// Load, update, reset and remove: the walkthrough every UI action relies on
#[tokio::test]
async fn test_status_walkthrough() {
    let store = StoreHandle::spawn(16);

    store.begin_load().await.unwrap();
    assert_eq!(store.load_state(), LoadState::Loading);
    assert!(store.all_pipelines().is_empty());

    store.load_succeeded(vec![a_yml()]).await.unwrap();
    assert_eq!(
        store.pipeline_status("a.yml"),
        Some(PipelineStatus { total: 2, running: 1, error: 0, done: 1 })
    );

    store
        .apply_step_update("a.yml", StepUpdate::new("s1", StepStatus::normalize("error")))
        .await
        .unwrap();
    assert_eq!(
        store.pipeline_status("a.yml"),
        Some(PipelineStatus { total: 2, running: 0, error: 1, done: 1 })
    );

    store.reset_status("a.yml").await.unwrap();
    assert_eq!(
        store.pipeline_status("a.yml"),
        Some(PipelineStatus { total: 2, running: 0, error: 0, done: 0 })
    );
    let pipelines = store.all_pipelines();
    assert!(pipelines[0].steps().all(|s| s.status == StepStatus::NotStarted));

    store.remove_pipelines(["a.yml"]).await.unwrap();
    assert!(store.all_pipelines().iter().all(|p| p.pipeline_file != "a.yml"));
    assert_eq!(store.pipeline_status("a.yml"), None);
}

/// Updates for pipelines or steps the store has never seen are no-ops
#[tokio::test]
async fn test_updates_ahead_of_state_are_ignored() {
    let store = StoreHandle::spawn(16);
    store.load_succeeded(vec![a_yml()]).await.unwrap();
    let before = store.snapshot();

    let outcome = store
        .apply_step_update("later.yml", StepUpdate::new("s1", StepStatus::Done))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        MutationOutcome::PipelineNotFound { pipeline_file: "later.yml".into() }
    );

    let outcome = store
        .apply_step_update("a.yml", StepUpdate::new("s3", StepStatus::Done))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        MutationOutcome::StepNotFound { pipeline_file: "a.yml".into(), step: "s3".into() }
    );

    assert!(store.set_pipeline_status("gone.yml").await.unwrap().is_not_found());
    assert_eq!(*store.snapshot(), *before);
}

/// Recomputing twice without step changes yields the same status
#[tokio::test]
async fn test_set_pipeline_status_idempotent() {
    let store = StoreHandle::spawn(16);
    store.load_succeeded(vec![a_yml()]).await.unwrap();

    store.set_pipeline_status("a.yml").await.unwrap();
    let first = store.pipeline_status("a.yml");
    store.set_pipeline_status("a.yml").await.unwrap();
    assert_eq!(first, store.pipeline_status("a.yml"));
}

/// Removing a step shrinks the total
#[tokio::test]
async fn test_remove_step_updates_total() {
    let store = StoreHandle::spawn(16);
    store.load_succeeded(vec![a_yml()]).await.unwrap();

    assert!(store.remove_step("a.yml", "s2").await.unwrap().is_applied());
    assert_eq!(
        store.pipeline_status("a.yml"),
        Some(PipelineStatus { total: 1, running: 1, error: 0, done: 0 })
    );
}

/// A stage-scoped update leaves same-named steps in other stages alone
#[tokio::test]
async fn test_stage_scoped_update() {
    let store = StoreHandle::spawn(16);
    let pipeline = stageboard::Pipeline::from_stages(
        "multi.yml",
        vec![
            record("multi.yml", "linux", &[("test", "start")]),
            record("multi.yml", "windows", &[("test", "start")]),
        ],
    );
    store.load_succeeded(vec![pipeline]).await.unwrap();

    store
        .apply_step_update("multi.yml", StepUpdate::new("test", StepStatus::Done).in_stage("windows"))
        .await
        .unwrap();

    let snapshot = store.snapshot();
    let pipeline = snapshot.pipeline("multi.yml").unwrap();
    assert_eq!(pipeline.stages[0].steps[0].status, StepStatus::Running);
    assert_eq!(pipeline.stages[1].steps[0].status, StepStatus::Done);
    assert_eq!(pipeline.status, PipelineStatus { total: 2, running: 1, error: 0, done: 1 });
}

/// Commands decoded from their JSON envelopes drive the store like direct calls
#[tokio::test]
async fn test_dispatch_json_commands() {
    let store = StoreHandle::spawn(16);
    store.load_succeeded(vec![a_yml()]).await.unwrap();

    let commands = stageboard::Command::parse_lines(
        r#"
{"type": "applyStepUpdate", "payload": {"pipelineId": "a.yml", "step": {"name": "s1", "status": "Done"}}}
{"type": "setPipelineStatus", "payload": {"pipelineId": "a.yml"}}
"#,
    )
    .unwrap();
    for command in commands {
        assert!(store.dispatch(command).await.unwrap().is_applied());
    }

    assert_eq!(
        store.pipeline_status("a.yml"),
        Some(PipelineStatus { total: 2, running: 0, error: 0, done: 2 })
    );
}

/// Event handlers see every mutation in order
#[tokio::test]
async fn test_event_handler_observes_mutations() {
    let store = StoreHandle::spawn(16);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    store.add_event_handler(move |event| {
        let _ = tx.send(event.command);
    });

    store.load_succeeded(vec![a_yml()]).await.unwrap();
    store.reset_status("a.yml").await.unwrap();
    store.clear().await.unwrap();

    let mut seen = Vec::new();
    while seen.len() < 3 {
        seen.push(rx.recv().await.unwrap());
    }
    assert_eq!(seen, vec!["loadSucceeded", "resetStatus", "clear"]);
    assert_eq!(store.load_state(), LoadState::Idle);
}
