use crate::config::ManagerConfig;
use crate::error::ManagerError;
use crate::view::StateView;
use rollback_command::{Command, CommandError, CommandManager};
use rollback_common::{CommandId, SnapshotIndex};
use rollback_logger::{Severity, StateLogger};
use rollback_snapshot::{Payload, SnapshotArchive, SnapshotHistory, StateSnapshot};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Bounds every managed state must satisfy: plain serializable data that
/// can be cloned and shared across tasks.
pub trait ManagedState: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> ManagedState for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Owns one managed state and everything needed to move it around in time.
///
/// Commands go through the embedded [`CommandManager`], checkpoints into a
/// [`SnapshotHistory`], and every transition is journaled by a
/// [`StateLogger`]. The state itself lives behind a shared lock so that
/// [`StateView`]s handed out earlier keep observing it, including across
/// restores.
pub struct StateManager<S> {
    state: Arc<RwLock<S>>,
    commands: CommandManager<S>,
    snapshots: SnapshotHistory,
    logger: StateLogger,
    config: ManagerConfig,
    corrupted_by: Option<CommandId>,
}

impl<S: ManagedState> StateManager<S> {
    pub fn new(initial: S) -> Self {
        Self::with_config(initial, ManagerConfig::default())
    }

    pub fn with_config(initial: S, config: ManagerConfig) -> Self {
        tracing::debug!(?config, "state manager created");
        Self {
            state: Arc::new(RwLock::new(initial)),
            commands: CommandManager::new(),
            snapshots: SnapshotHistory::with_retention(config.snapshot_retention),
            logger: StateLogger::new(config.log_level).with_max_depth(config.max_diff_depth),
            config,
            corrupted_by: None,
        }
    }

    /// Rebuild a manager from an exported archive.
    ///
    /// The live state starts as the newest archived snapshot; the command
    /// history starts empty.
    pub fn from_archive(
        archive: SnapshotArchive,
        config: ManagerConfig,
    ) -> Result<Self, ManagerError> {
        let snapshots = archive.into_history(config.snapshot_retention)?;
        let latest = snapshots
            .latest_index()
            .and_then(|index| snapshots.get(index))
            .ok_or(ManagerError::EmptyArchive)?;
        latest.verify()?;
        let state = StateSnapshot::<S>::deserialize(&latest.payload)?.into_state();

        let mut manager = Self::with_config(state, config);
        manager.snapshots = snapshots;
        manager.logger.log(
            "imported snapshot archive",
            Some(json!({ "snapshots": manager.snapshots.len() })),
            Severity::Info,
        );
        Ok(manager)
    }

    /// Read-only handle on the live state.
    pub fn view(&self) -> StateView<S> {
        StateView::new(Arc::clone(&self.state))
    }

    /// Execute a command against the managed state and record it.
    ///
    /// With staging enabled the command runs against a copy, so a failure
    /// leaves the live state untouched.
    pub async fn apply_command(&mut self, command: Box<dyn Command<S>>) -> Result<(), ManagerError> {
        self.ensure_healthy()?;
        let label = format!("apply {}", command.name());

        let state = Arc::clone(&self.state);
        let mut live = state.write().await;
        let before = self.config.diff_commands.then(|| live.clone());

        let result = if self.config.stage_commands {
            let mut staged = live.clone();
            let result = self.commands.execute_command(&mut staged, command).await;
            if result.is_ok() {
                *live = staged;
            }
            result
        } else {
            self.commands.execute_command(&mut live, command).await
        };

        match result {
            Ok(()) => {
                self.record_transition(before.as_ref(), &live, &label);
                Ok(())
            }
            Err(err) => Err(self.record_failure(err)),
        }
    }

    /// Undo the most recent command. Returns `None` when there is nothing
    /// to undo.
    ///
    /// A failed undo leaves the manager corrupted until
    /// [`restore_snapshot`](Self::restore_snapshot) succeeds.
    pub async fn undo(&mut self) -> Result<Option<CommandId>, ManagerError> {
        self.ensure_healthy()?;
        let state = Arc::clone(&self.state);
        let mut live = state.write().await;
        let before = self.config.diff_commands.then(|| live.clone());

        let result = if self.config.stage_commands {
            let mut staged = live.clone();
            let result = self.commands.undo(&mut staged).await;
            if result.is_ok() {
                *live = staged;
            }
            result
        } else {
            self.commands.undo(&mut live).await
        };

        match result {
            Ok(Some(id)) => {
                self.record_transition(before.as_ref(), &live, "undo");
                Ok(Some(id))
            }
            Ok(None) => Ok(None),
            Err(err) => Err(self.record_failure(err)),
        }
    }

    /// Redo the next undone command. Returns `None` when there is nothing
    /// to redo.
    pub async fn redo(&mut self) -> Result<Option<CommandId>, ManagerError> {
        self.ensure_healthy()?;
        let state = Arc::clone(&self.state);
        let mut live = state.write().await;
        let before = self.config.diff_commands.then(|| live.clone());

        let result = if self.config.stage_commands {
            let mut staged = live.clone();
            let result = self.commands.redo(&mut staged).await;
            if result.is_ok() {
                *live = staged;
            }
            result
        } else {
            self.commands.redo(&mut live).await
        };

        match result {
            Ok(Some(id)) => {
                self.record_transition(before.as_ref(), &live, "redo");
                Ok(Some(id))
            }
            Ok(None) => Ok(None),
            Err(err) => Err(self.record_failure(err)),
        }
    }

    /// Capture the current state and append it to the snapshot history.
    pub async fn take_snapshot(&mut self) -> Result<SnapshotIndex, ManagerError> {
        self.ensure_healthy()?;
        let payload = {
            let live = self.state.read().await;
            Payload::encode(&*live)?
        };
        let bytes = payload.len();
        let index = self.snapshots.push(payload);

        tracing::info!(%index, bytes, "snapshot taken");
        self.logger.log(
            format!("snapshot {index} taken"),
            Some(json!({ "index": index.0, "bytes": bytes })),
            Severity::Info,
        );
        Ok(index)
    }

    /// Overwrite the managed state with a stored snapshot.
    ///
    /// The state is replaced in place, so existing views see the restored
    /// value. Command history is cleared because its undo data describes a
    /// timeline that no longer exists. Restoring also lifts corruption.
    pub async fn restore_snapshot(&mut self, index: SnapshotIndex) -> Result<(), ManagerError> {
        let entry = self
            .snapshots
            .get(index)
            .ok_or_else(|| ManagerError::SnapshotNotFound {
                index,
                retained: self.snapshots.len(),
            })?;
        entry.verify()?;
        let restored = StateSnapshot::<S>::deserialize(&entry.payload)?.into_state();

        let state = Arc::clone(&self.state);
        let mut live = state.write().await;
        let before = self.config.diff_commands.then(|| live.clone());
        *live = restored;

        let discarded = self.commands.len();
        self.commands.clear();
        let recovered = self.corrupted_by.take();

        tracing::info!(%index, discarded, recovered = recovered.is_some(), "snapshot restored");
        self.logger.log(
            format!("restored snapshot {index}"),
            Some(json!({ "index": index.0, "discarded_commands": discarded })),
            Severity::Info,
        );
        self.record_transition(before.as_ref(), &live, &format!("restore {index}"));
        Ok(())
    }

    /// Clone of the current state.
    pub async fn get_state(&self) -> S {
        self.state.read().await.clone()
    }

    /// Copy every retained snapshot into a portable archive.
    pub fn export_archive(&self) -> SnapshotArchive {
        SnapshotArchive::from_history(&self.snapshots)
    }

    fn ensure_healthy(&self) -> Result<(), ManagerError> {
        match self.corrupted_by {
            Some(command) => Err(ManagerError::Corrupted { command }),
            None => Ok(()),
        }
    }

    fn record_failure(&mut self, err: CommandError) -> ManagerError {
        if err.is_fatal() {
            self.corrupted_by = Some(err.command());
            self.logger.log(
                format!("state corrupted: {err}"),
                Some(json!({ "command": err.command().to_string() })),
                Severity::Error,
            );
        } else {
            self.logger.warn(err.to_string());
        }
        err.into()
    }

    fn record_transition(&mut self, before: Option<&S>, after: &S, label: &str) {
        let Some(before) = before else {
            return;
        };
        if let Err(err) = self.logger.diff(before, after, label) {
            tracing::warn!(error = %err, label, "state diff failed");
            self.logger.warn(format!("{label}: diff unavailable: {err}"));
        }
    }
}

impl<S> StateManager<S> {
    pub fn command_manager(&self) -> &CommandManager<S> {
        &self.commands
    }

    pub fn snapshots(&self) -> &SnapshotHistory {
        &self.snapshots
    }

    pub fn logger(&self) -> &StateLogger {
        &self.logger
    }

    pub fn logger_mut(&mut self) -> &mut StateLogger {
        &mut self.logger
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Whether a failed undo left the state untrusted.
    pub fn is_corrupted(&self) -> bool {
        self.corrupted_by.is_some()
    }
}

impl<S> fmt::Debug for StateManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateManager")
            .field("commands", &self.commands)
            .field("snapshots", &self.snapshots.len())
            .field("journal", &self.logger.len())
            .field("corrupted_by", &self.corrupted_by)
            .finish()
    }
}
