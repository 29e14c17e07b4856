// # State Store Implementations
//
// This module provides implementations of the StateStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use async_trait::async_trait;

use crate::config::StateStoreConfig;
use crate::traits::{StateStore, StateStoreFactory};

/// Factory for the built-in state stores
pub struct BuiltinStateStoreFactory;

#[async_trait]
impl StateStoreFactory for BuiltinStateStoreFactory {
    async fn create(&self, config: &StateStoreConfig) -> Result<Box<dyn StateStore>, crate::Error> {
        match config {
            StateStoreConfig::File { path } => {
                tracing::info!("Using file state store at {}", path);
                Ok(Box::new(FileStateStore::new(path).await?))
            }
            StateStoreConfig::Memory => {
                tracing::warn!("Using in-memory state store; baselines repeat after restart");
                Ok(Box::new(MemoryStateStore::new()))
            }
        }
    }
}
