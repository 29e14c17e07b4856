// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - First cycle after a restart treats every source as a first observation
//   and announces a baseline again
//
// ## When to Use
//
// - Testing environments
// - Dry runs where repeated baseline announcements are harmless

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::Snapshot;
use crate::traits::state_store::{SourceState, StateStore};

/// In-memory state store implementation
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<HashMap<String, SourceState>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of sources in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_state(&self, source_id: &str) -> Result<Option<SourceState>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(source_id).cloned())
    }

    async fn put_snapshot(&self, source_id: &str, snapshot: &Snapshot) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(
            source_id.to_string(),
            SourceState::new(source_id, snapshot.clone()),
        );
        Ok(())
    }

    async fn set_state(&self, state: &SourceState) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(state.source_id.clone(), state.clone());
        Ok(())
    }

    async fn list_sources(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        let mut ids: Vec<String> = guard.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScalarSnapshot;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStateStore::new();
        assert!(store.is_empty().await);

        let snapshot = Snapshot::from(ScalarSnapshot::new(2));
        store.put_snapshot("registration_bans", &snapshot).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(
            store.get_snapshot("registration_bans").await.unwrap(),
            Some(snapshot)
        );
        assert_eq!(store.get_state("roster").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_overwrite_keeps_one_record() {
        let store = MemoryStateStore::new();
        store
            .put_snapshot("registration_bans", &Snapshot::from(ScalarSnapshot::new(1)))
            .await
            .unwrap();
        store
            .put_snapshot("registration_bans", &Snapshot::from(ScalarSnapshot::new(4)))
            .await
            .unwrap();

        assert_eq!(store.list_sources().await.unwrap(), vec!["registration_bans"]);
        assert_eq!(
            store.get_snapshot("registration_bans").await.unwrap(),
            Some(Snapshot::from(ScalarSnapshot::new(4)))
        );
    }

    #[tokio::test]
    async fn test_memory_store_clone_shares_state() {
        let store = MemoryStateStore::new();
        let shared = store.clone();

        let state = SourceState::new("roster", Snapshot::from(ScalarSnapshot::new(0)));
        shared.set_state(&state).await.unwrap();

        assert_eq!(store.get_state("roster").await.unwrap(), Some(state));
    }
}
