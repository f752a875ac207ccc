//! Pipeline store and its mutation API

pub mod command;
pub mod dispatcher;
pub mod merge;
pub mod state;

pub use command::Command;
pub use dispatcher::{DispatchError, EventHandler, StoreEvent, StoreHandle};
pub use merge::{merge, MergeStrategy};
pub use state::{MutationOutcome, PipelineStore};
