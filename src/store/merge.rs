//! Merge strategies for keyed pipeline lists

use crate::core::Pipeline;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashSet;

/// How an incoming batch of pipelines is combined with the store's
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Discard the current pipelines and install the batch (full resync)
    #[default]
    Replace,
    /// Keep current pipelines by key and append unseen ones (incremental)
    Union,
}

/// Merge `incoming` into `existing`.
///
/// Both strategies keep at most one pipeline per `pipeline_file`, the first
/// one seen in iteration order. Output order is first-occurrence order.
/// Works on owned or shared pipelines alike.
pub fn merge<P: Borrow<Pipeline>>(existing: Vec<P>, incoming: Vec<P>, strategy: MergeStrategy) -> Vec<P> {
    let base = match strategy {
        MergeStrategy::Replace => Vec::new(),
        MergeStrategy::Union => existing,
    };

    let mut seen: HashSet<String> = HashSet::with_capacity(base.len() + incoming.len());
    base.into_iter()
        .chain(incoming)
        .filter(|p| seen.insert(<P as Borrow<Pipeline>>::borrow(p).pipeline_file.clone()))
        .collect()
}
