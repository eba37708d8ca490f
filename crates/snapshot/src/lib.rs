//! Snapshots: isolated copies of managed state, their history, and their archived form.
//!
//! # Invariants
//! - A payload is a detached byte copy; mutating live state never changes it.
//! - Deserializing a payload always builds a fresh value.
//! - Snapshot indices are monotonic and never renumbered, even after eviction.

pub mod archive;
pub mod history;
pub mod snapshot;

pub use archive::{ARCHIVE_SCHEMA_VERSION, SnapshotArchive, SnapshotRecord};
pub use history::{SnapshotEntry, SnapshotHistory};
pub use snapshot::{Payload, SnapshotError, StateSnapshot};
