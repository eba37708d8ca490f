//! Shared identifiers used across the rollback engine crates.

pub mod types;

pub use types::{CommandId, SnapshotIndex, Timestamp};
