//! Data models for the carrier sync engine.

mod carrier;
mod outcome;
mod remote;
mod schedule;

pub use carrier::*;
pub use outcome::*;
pub use remote::*;
pub use schedule::*;
