//! Scenario-based tests for stageboard

mod ingestion;
mod ingestion_failures;
mod status_tracking;
