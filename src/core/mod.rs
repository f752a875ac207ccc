//! Core domain models
//!
//! This module defines the pipelines, stages and steps tracked by the store,
//! their status types, and the aggregate status computation.

pub mod aggregate;
pub mod config;
pub mod pipeline;
pub mod state;
pub mod step;

pub use aggregate::compute_status;
pub use pipeline::*;
pub use state::*;
pub use step::*;
