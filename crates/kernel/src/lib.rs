//! Rollback Kernel: sequences commands against a managed state, checkpoints it, rolls it back.
//!
//! # Invariants
//! - The state manager is the only writer of the managed state; collaborators get a read-only view.
//! - At most one operation is in flight per managed state.
//! - A failed command never commits a partial mutation (when staging is enabled).
//! - After a failed undo the manager refuses further work until a snapshot is restored.

pub mod config;
pub mod error;
pub mod handle;
pub mod manager;
pub mod view;

pub use config::{ConfigError, ManagerConfig};
pub use error::ManagerError;
pub use handle::ManagerHandle;
pub use manager::{ManagedState, StateManager};
pub use view::StateView;
