//! Serialized command dispatch in front of the pipeline store
//!
//! A single task owns the [`PipelineStore`] and applies commands one at a
//! time. After every command it publishes an immutable snapshot, so readers
//! only ever observe the store between mutations, and broadcasts a
//! [`StoreEvent`] to observers.

use crate::core::{LoadState, Pipeline, PipelineStatus, StepUpdate};
use crate::store::{
    command::Command,
    merge::MergeStrategy,
    state::{MutationOutcome, PipelineStore},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Capacity of the observer broadcast channel
const EVENT_CAPACITY: usize = 256;

/// Error returned when the dispatcher is gone
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("store dispatcher has shut down")]
    Closed,
}

/// Notification emitted after every applied command
#[derive(Debug, Clone)]
pub struct StoreEvent {
    /// Wire name of the command
    pub command: &'static str,

    /// Pipeline the command addressed, if any
    pub pipeline_id: Option<String>,

    /// What the command did
    pub outcome: MutationOutcome,

    /// Load state after the command
    pub load_state: LoadState,

    /// When the command was applied
    pub applied_at: DateTime<Utc>,
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(StoreEvent) + Send + Sync>;

struct Envelope {
    command: Command,
    reply: oneshot::Sender<MutationOutcome>,
}

/// Cloneable handle to a running store dispatcher
#[derive(Clone)]
pub struct StoreHandle {
    commands: mpsc::Sender<Envelope>,
    snapshot: watch::Receiver<Arc<PipelineStore>>,
    events: broadcast::Sender<StoreEvent>,
}

impl StoreHandle {
    /// Spawn a dispatcher over an empty store
    pub fn spawn(capacity: usize) -> Self {
        Self::spawn_with(PipelineStore::new(), capacity)
    }

    /// Spawn a dispatcher over an existing store
    pub fn spawn_with(store: PipelineStore, capacity: usize) -> Self {
        let (commands, rx) = mpsc::channel(capacity.max(1));
        let (snapshot_tx, snapshot) = watch::channel(Arc::new(store.clone()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let dispatcher = Dispatcher {
            store,
            commands: rx,
            snapshot: snapshot_tx,
            events: events.clone(),
        };
        tokio::spawn(dispatcher.run());

        Self {
            commands,
            snapshot,
            events,
        }
    }

    /// Send a command and wait for it to be applied
    pub async fn dispatch(&self, command: Command) -> Result<MutationOutcome, DispatchError> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(Envelope { command, reply })
            .await
            .map_err(|_| DispatchError::Closed)?;
        outcome.await.map_err(|_| DispatchError::Closed)
    }

    pub async fn begin_load(&self) -> Result<MutationOutcome, DispatchError> {
        self.dispatch(Command::BeginLoad).await
    }

    pub async fn load_succeeded(&self, pipelines: Vec<Pipeline>) -> Result<MutationOutcome, DispatchError> {
        self.dispatch(Command::LoadSucceeded { pipelines }).await
    }

    pub async fn load_failed(&self) -> Result<MutationOutcome, DispatchError> {
        self.dispatch(Command::LoadFailed).await
    }

    pub async fn merge_pipelines(
        &self,
        pipelines: Vec<Pipeline>,
        strategy: MergeStrategy,
    ) -> Result<MutationOutcome, DispatchError> {
        self.dispatch(Command::MergePipelines { pipelines, strategy }).await
    }

    pub async fn apply_step_update(
        &self,
        pipeline_id: impl Into<String>,
        step: StepUpdate,
    ) -> Result<MutationOutcome, DispatchError> {
        self.dispatch(Command::ApplyStepUpdate {
            pipeline_id: pipeline_id.into(),
            step,
        })
        .await
    }

    pub async fn remove_step(
        &self,
        pipeline_id: impl Into<String>,
        step_name: impl Into<String>,
    ) -> Result<MutationOutcome, DispatchError> {
        self.dispatch(Command::RemoveStep {
            pipeline_id: pipeline_id.into(),
            step_name: step_name.into(),
        })
        .await
    }

    pub async fn remove_pipelines<I, S>(&self, file_names: I) -> Result<MutationOutcome, DispatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let file_names = file_names.into_iter().map(Into::into).collect();
        self.dispatch(Command::RemovePipelines { file_names }).await
    }

    pub async fn reset_status(&self, pipeline_id: impl Into<String>) -> Result<MutationOutcome, DispatchError> {
        self.dispatch(Command::ResetStatus {
            pipeline_id: pipeline_id.into(),
        })
        .await
    }

    pub async fn set_pipeline_status(
        &self,
        pipeline_id: impl Into<String>,
    ) -> Result<MutationOutcome, DispatchError> {
        self.dispatch(Command::SetPipelineStatus {
            pipeline_id: pipeline_id.into(),
        })
        .await
    }

    pub async fn clear(&self) -> Result<MutationOutcome, DispatchError> {
        self.dispatch(Command::Clear).await
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<PipelineStore> {
        self.snapshot.borrow().clone()
    }

    /// All pipelines, in insertion order
    pub fn all_pipelines(&self) -> Vec<Pipeline> {
        self.snapshot
            .borrow()
            .all_pipelines()
            .iter()
            .map(|p| Pipeline::clone(p))
            .collect()
    }

    /// Current load state
    pub fn load_state(&self) -> LoadState {
        self.snapshot.borrow().load_state()
    }

    /// Aggregate status of one pipeline
    pub fn pipeline_status(&self, pipeline_id: &str) -> Option<PipelineStatus> {
        self.snapshot.borrow().pipeline_status(pipeline_id)
    }

    /// Receiver that is woken whenever a new snapshot is published
    pub fn watch(&self) -> watch::Receiver<Arc<PipelineStore>> {
        self.snapshot.clone()
    }

    /// Subscribe to store events
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Add an event handler, called for every event emitted after this call
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(StoreEvent) + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        let mut events = self.events.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => handler(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Event handler lagged, {} events skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

struct Dispatcher {
    store: PipelineStore,
    commands: mpsc::Receiver<Envelope>,
    snapshot: watch::Sender<Arc<PipelineStore>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Dispatcher {
    async fn run(mut self) {
        debug!("Store dispatcher started");

        while let Some(Envelope { command, reply }) = self.commands.recv().await {
            let name = command.name();
            let pipeline_id = command.pipeline_id().map(str::to_string);

            let outcome = self.store.apply(command);
            self.snapshot.send_replace(Arc::new(self.store.clone()));

            // no subscribers is fine
            let _ = self.events.send(StoreEvent {
                command: name,
                pipeline_id,
                outcome: outcome.clone(),
                load_state: self.store.load_state(),
                applied_at: Utc::now(),
            });

            if reply.send(outcome).is_err() {
                debug!("Caller of {} went away before the reply", name);
            }
        }

        info!("Store dispatcher stopped");
    }
}
