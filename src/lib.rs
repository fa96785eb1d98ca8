//! Carrier schedule synchronization and versioning engine.
//!
//! Pulls versioned tabular schedule datasets from a remote document store
//! and materializes them into a local SQLite store. Each carrier's schedule
//! row-set is replaced as a unit and versioned through a metadata ledger, so
//! a failed or partial sync never corrupts previously-good local data.

pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod net;
pub mod parser;
pub mod sync;
pub mod update;

pub use config::Config;
pub use db::Repository;
pub use errors::SyncError;
pub use models::{
    BusSchedule, CarrierDirectoryEntry, CarrierMetadata, RemoteConfig, ScheduleStop, SyncOutcome,
    SyncStatus, UpdateCheck, Weekday,
};
pub use net::{Connectivity, HttpSource, RemoteSource};
pub use sync::{classify, SyncAction, SyncEngine};
pub use update::{KeyValueStore, UpdateGate};

#[cfg(test)]
mod tests;
