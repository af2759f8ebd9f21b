//! Enrichment passes and batch plumbing for stargazer.
//!
//! This crate ties the GitHub and LinkedIn clients into the end-to-end
//! passes (profile enrichment, URL extraction, browser search, LLM lookup)
//! plus the checkpoint, merge, and snapshot machinery they share.

pub mod checkpoint;
pub mod enrich;
pub mod extract;
pub mod llm_pass;
pub mod merge;
pub mod progress;
pub mod search;
pub mod snapshot;

use std::sync::{Arc, Mutex};

use stargazer_shared::UserRecord;

/// Batch accumulator shared between a running pass and the interrupt
/// handler, so a cancelled run can still flush what it has.
pub type SharedBatch = Arc<Mutex<Vec<UserRecord>>>;

/// Fresh empty accumulator.
pub fn new_shared_batch() -> SharedBatch {
    Arc::new(Mutex::new(Vec::new()))
}

/// Snapshot the accumulator's current contents.
pub fn drain_shared_batch(batch: &SharedBatch) -> Vec<UserRecord> {
    batch.lock().map(|guard| guard.clone()).unwrap_or_default()
}
