// # State Store Trait
//
// Defines the interface for persistent per-source state.
//
// ## Purpose
//
// The state store holds the last accepted snapshot of every source. It is
// the single source of truth for "what was last announced", which gives the
// at-most-one-notification guarantee across restarts:
//
// - crash before persisting: the next cycle recomputes the same diff
// - crash after persisting: the change is not announced again
//
// ## Implementations
//
// - File-based: JSON file with atomic rewrite and backup
// - In-memory: tests and ephemeral runs
//
// ## Usage
//
// ```rust
// use clubwatch_core::StateStore;
// use clubwatch_core::model::{ScalarSnapshot, Snapshot};
//
// #[tokio::main]
// async fn main() -> Result<(), Box<dyn std::error::Error>> {
//     let store = /* StateStore implementation */;
//
//     // Previous snapshot, if any
//     let previous = store.get_snapshot("registration_bans").await?;
//
//     // Record after a completed notify-and-diff cycle
//     store.put_snapshot("registration_bans", &Snapshot::from(ScalarSnapshot::new(3))).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::model::Snapshot;

/// Durable record of one source
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SourceState {
    /// The source this record belongs to
    pub source_id: String,
    /// The last accepted snapshot
    pub last_snapshot: Snapshot,
    /// When the snapshot was accepted
    pub last_updated_at: chrono::DateTime<chrono::Utc>,
}

impl SourceState {
    /// Create a state record stamped with the current time
    pub fn new(source_id: impl Into<String>, last_snapshot: Snapshot) -> Self {
        Self {
            source_id: source_id.into(),
            last_snapshot,
            last_updated_at: chrono::Utc::now(),
        }
    }
}

/// Trait for state store implementations
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage
/// - ✅ Cache state in memory (with explicit flush)
///
/// ## Forbidden Capabilities
/// - ❌ Decide when to persist (owned by `WatchEngine`)
/// - ❌ Delete records (state is never deleted)
/// - ❌ Partially update a record (records are written as a whole)
///
/// A record is read once and written at most once per source per cycle.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the full state record of a source
    ///
    /// # Returns
    ///
    /// - `Ok(Some(SourceState))`: The stored record
    /// - `Ok(None)`: Source never accepted a snapshot
    /// - `Err(Error)`: Storage error
    async fn get_state(&self, source_id: &str) -> Result<Option<SourceState>, crate::Error>;

    /// Get only the last accepted snapshot of a source
    async fn get_snapshot(&self, source_id: &str) -> Result<Option<Snapshot>, crate::Error> {
        Ok(self.get_state(source_id).await?.map(|state| state.last_snapshot))
    }

    /// Accept a snapshot as the source's last known state
    ///
    /// Creates or overwrites the record, stamped with the current time.
    async fn put_snapshot(&self, source_id: &str, snapshot: &Snapshot) -> Result<(), crate::Error>;

    /// Store a full record as-is
    async fn set_state(&self, state: &SourceState) -> Result<(), crate::Error>;

    /// List all source ids in the store
    async fn list_sources(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing state stores from configuration
#[async_trait]
pub trait StateStoreFactory: Send + Sync {
    /// Create a StateStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::StateStoreConfig,
    ) -> Result<Box<dyn StateStore>, crate::Error>;
}
