use super::SessionState;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared slot holding the latest committed [`SessionState`].
///
/// Readers take an `Arc` snapshot and never block the writer for longer than
/// the pointer copy; the writer swaps in a whole new state, so a reader sees
/// either the state before a commit or the one after it.
pub struct SessionStateCell {
    current: Arc<RwLock<Arc<SessionState>>>,
}

impl SessionStateCell {
    pub fn new(initial: SessionState) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    /// Latest committed state.
    pub async fn snapshot(&self) -> Arc<SessionState> {
        self.current.read().await.clone()
    }

    /// Publishes `next` and returns the state it replaced.
    pub async fn replace(&self, next: SessionState) -> Arc<SessionState> {
        let mut current = self.current.write().await;
        std::mem::replace(&mut *current, Arc::new(next))
    }
}

impl Clone for SessionStateCell {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
        }
    }
}
