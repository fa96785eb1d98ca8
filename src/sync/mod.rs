//! Version reconciliation and the carrier update orchestrator.

mod engine;
mod reconcile;

pub use engine::SyncEngine;
pub use reconcile::{classify, SyncAction};
