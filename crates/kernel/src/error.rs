use rollback_command::CommandError;
use rollback_common::{CommandId, SnapshotIndex};
use rollback_snapshot::SnapshotError;

/// Errors from state manager operations.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// A command failed to execute, redo or undo.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// A snapshot could not be encoded, decoded or verified.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("snapshot {index} not found ({retained} retained)")]
    SnapshotNotFound {
        index: SnapshotIndex,
        retained: usize,
    },
    /// An earlier undo failed, so the live state can no longer be trusted.
    #[error("state corrupted by failed undo of command {command}; restore a snapshot")]
    Corrupted { command: CommandId },
    #[error("archive contains no snapshots")]
    EmptyArchive,
}

impl ManagerError {
    /// Whether the error leaves the manager unusable until a restore.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Command(err) => err.is_fatal(),
            Self::Corrupted { .. } => true,
            _ => false,
        }
    }
}
