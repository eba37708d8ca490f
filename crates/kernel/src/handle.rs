use crate::error::ManagerError;
use crate::manager::{ManagedState, StateManager};
use crate::view::StateView;
use rollback_command::Command;
use rollback_common::{CommandId, SnapshotIndex};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Cloneable handle for driving one state manager from many tasks.
///
/// Every operation takes the manager lock for its whole duration, so
/// operations from concurrent sources are applied one at a time in lock
/// acquisition order.
pub struct ManagerHandle<S> {
    inner: Arc<Mutex<StateManager<S>>>,
    view: StateView<S>,
}

impl<S: ManagedState> ManagerHandle<S> {
    pub fn new(manager: StateManager<S>) -> Self {
        let view = manager.view();
        Self {
            inner: Arc::new(Mutex::new(manager)),
            view,
        }
    }

    /// Read-only view of the managed state. Does not take the manager lock.
    pub fn view(&self) -> StateView<S> {
        self.view.clone()
    }

    /// Exclusive access for sequences that must not interleave with other
    /// sources, e.g. snapshot-then-apply.
    pub async fn lock(&self) -> MutexGuard<'_, StateManager<S>> {
        self.inner.lock().await
    }

    pub async fn apply_command(&self, command: Box<dyn Command<S>>) -> Result<(), ManagerError> {
        self.inner.lock().await.apply_command(command).await
    }

    pub async fn undo(&self) -> Result<Option<CommandId>, ManagerError> {
        self.inner.lock().await.undo().await
    }

    pub async fn redo(&self) -> Result<Option<CommandId>, ManagerError> {
        self.inner.lock().await.redo().await
    }

    pub async fn take_snapshot(&self) -> Result<SnapshotIndex, ManagerError> {
        self.inner.lock().await.take_snapshot().await
    }

    pub async fn restore_snapshot(&self, index: SnapshotIndex) -> Result<(), ManagerError> {
        self.inner.lock().await.restore_snapshot(index).await
    }

    pub async fn get_state(&self) -> S {
        self.view.get().await
    }
}

impl<S> Clone for ManagerHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            view: self.view.clone(),
        }
    }
}
