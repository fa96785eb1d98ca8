//! Parsers for the remote tabular documents.
//!
//! All parsers are pure functions over decoded rows. Directory and schedule
//! parsing is best-effort per row: a malformed row is logged and skipped so
//! one authoring mistake never aborts the rest of the document.

mod decoder;
mod directory;
mod remote_config;
mod schedule;

pub use decoder::decode;
pub use directory::parse_directory;
pub use remote_config::{parse_remote_config, parse_version_sheet, VersionSheet};
pub use schedule::parse_schedules;
