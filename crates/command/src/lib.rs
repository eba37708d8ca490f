//! Commands: reversible state transitions and the undo/redo history that sequences them.
//!
//! # Invariants
//! - `0 <= cursor <= history.len()` at all times.
//! - A failed `execute` leaves history and cursor untouched.
//! - Executing a new command after an undo discards the redoable tail.
//! - Redo re-executes the command; it never replays a cached result.

pub mod command;
pub mod manager;

pub use command::{Command, CommandFailure};
pub use manager::{CommandError, CommandManager, HistoryEntry};
