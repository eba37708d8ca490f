use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};

/// Read-only handle on a managed state.
///
/// Given to renderers, resolvers and other collaborators that need to see
/// the live state. Mutation is only possible through the owning state
/// manager. A view keeps observing the same state across restores.
#[derive(Debug)]
pub struct StateView<S> {
    state: Arc<RwLock<S>>,
}

impl<S> StateView<S> {
    pub(crate) fn new(state: Arc<RwLock<S>>) -> Self {
        Self { state }
    }

    /// Wait for any in-flight operation to finish and borrow the state.
    pub async fn read(&self) -> RwLockReadGuard<'_, S> {
        self.state.read().await
    }

    /// Borrow the state unless an operation is in flight.
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, S>> {
        self.state.try_read().ok()
    }

    /// Clone of the current state.
    pub async fn get(&self) -> S
    where
        S: Clone,
    {
        self.state.read().await.clone()
    }
}

impl<S> Clone for StateView<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}
