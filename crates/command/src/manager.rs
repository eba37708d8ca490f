use crate::command::{Command, CommandFailure};
use rollback_common::CommandId;
use std::fmt;

/// Errors from command history operations.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// `execute` failed. History and cursor are unchanged and the command
    /// must not have committed any mutation.
    #[error("command {name} ({command}) failed to execute: {source}")]
    Execution {
        command: CommandId,
        name: &'static str,
        #[source]
        source: CommandFailure,
    },
    /// `undo` failed. The true value of the state is unknown from here on.
    #[error("command {name} ({command}) failed to undo: {source}")]
    Undo {
        command: CommandId,
        name: &'static str,
        #[source]
        source: CommandFailure,
    },
}

impl CommandError {
    /// Id of the command that failed.
    pub fn command(&self) -> CommandId {
        match self {
            Self::Execution { command, .. } | Self::Undo { command, .. } => *command,
        }
    }

    /// Whether the failure leaves the state in an unknown condition.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Undo { .. })
    }
}

/// Read-only view of one history slot, for tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: CommandId,
    pub name: &'static str,
    /// `true` below the cursor, `false` for the redoable tail.
    pub undoable: bool,
}

/// Linear undo/redo history over a managed state `S`.
///
/// Holds every executed command in order plus a cursor. Commands below the
/// cursor can be undone, commands at or above it can be redone. Owned by a
/// single state manager; there is no process-wide instance.
pub struct CommandManager<S> {
    history: Vec<Box<dyn Command<S>>>,
    cursor: usize,
}

impl<S: Send> CommandManager<S> {
    /// Create an empty history.
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            cursor: 0,
        }
    }

    /// Execute a command and record it.
    ///
    /// On success the redoable tail is discarded, the command is appended and
    /// the cursor advances. On failure nothing is recorded.
    pub async fn execute_command(
        &mut self,
        state: &mut S,
        mut command: Box<dyn Command<S>>,
    ) -> Result<(), CommandError> {
        let id = command.id();
        let name = command.name();
        if let Err(source) = command.execute(state).await {
            tracing::warn!(command = %id, name, error = %source, "command execution failed");
            return Err(CommandError::Execution {
                command: id,
                name,
                source,
            });
        }

        if self.cursor < self.history.len() {
            tracing::debug!(
                discarded = self.history.len() - self.cursor,
                "discarding redo tail"
            );
            self.history.truncate(self.cursor);
        }
        self.history.push(command);
        self.cursor += 1;
        tracing::debug!(command = %id, name, cursor = self.cursor, "command executed");
        Ok(())
    }

    /// Undo the command just below the cursor.
    ///
    /// Returns the id of the undone command, or `None` when there is nothing
    /// to undo.
    pub async fn undo(&mut self, state: &mut S) -> Result<Option<CommandId>, CommandError> {
        if self.cursor == 0 {
            return Ok(None);
        }
        let command = &mut self.history[self.cursor - 1];
        let id = command.id();
        let name = command.name();
        if let Err(source) = command.undo(state).await {
            tracing::error!(command = %id, name, error = %source, "command undo failed");
            return Err(CommandError::Undo {
                command: id,
                name,
                source,
            });
        }
        self.cursor -= 1;
        tracing::debug!(command = %id, name, cursor = self.cursor, "command undone");
        Ok(Some(id))
    }

    /// Re-execute the command at the cursor.
    ///
    /// Returns the id of the redone command, or `None` when the cursor is
    /// already at the head of the history.
    pub async fn redo(&mut self, state: &mut S) -> Result<Option<CommandId>, CommandError> {
        if self.cursor == self.history.len() {
            return Ok(None);
        }
        let command = &mut self.history[self.cursor];
        let id = command.id();
        let name = command.name();
        if let Err(source) = command.execute(state).await {
            tracing::warn!(command = %id, name, error = %source, "command redo failed");
            return Err(CommandError::Execution {
                command: id,
                name,
                source,
            });
        }
        self.cursor += 1;
        tracing::debug!(command = %id, name, cursor = self.cursor, "command redone");
        Ok(Some(id))
    }

    /// Drop the entire history.
    pub fn clear(&mut self) {
        self.history.clear();
        self.cursor = 0;
    }
}

impl<S: Send> CommandManager<S> {
    /// Boundary between undoable and redoable commands.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Every recorded command, oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history
            .iter()
            .enumerate()
            .map(|(i, command)| HistoryEntry {
                id: command.id(),
                name: command.name(),
                undoable: i < self.cursor,
            })
            .collect()
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Number of commands that can be undone.
    pub fn undo_count(&self) -> usize {
        self.cursor
    }

    /// Number of commands that can be redone.
    pub fn redo_count(&self) -> usize {
        self.history.len() - self.cursor
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.history.len()
    }
}

impl<S: Send> Default for CommandManager<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for CommandManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandManager")
            .field("len", &self.history.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}
