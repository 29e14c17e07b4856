//! Plugin-based factory registry
//!
//! Source, notifier and state store implementations live in their own crates
//! and register a factory under their configuration type name. The daemon
//! builds everything from configuration through the registry.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use clubwatch_core::registry::WatchRegistry;
//!
//! let registry = WatchRegistry::with_builtin_state_stores();
//! clubwatch_source_json::register(&registry);
//!
//! let source = registry.create_source(&config.sources[0])?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{NotifierConfig, SourceConfig, StateStoreConfig};
use crate::error::{Error, Result};
use crate::state::BuiltinStateStoreFactory;
use crate::traits::{Notifier, NotifierFactory, Source, SourceFactory, StateStore, StateStoreFactory};

/// Registry mapping configuration type names to factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct WatchRegistry {
    sources: RwLock<HashMap<String, Box<dyn SourceFactory>>>,
    notifiers: RwLock<HashMap<String, Box<dyn NotifierFactory>>>,
    state_stores: RwLock<HashMap<String, Arc<dyn StateStoreFactory>>>,
}

// A panic while holding a registry lock leaves the maps usable
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl WatchRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the file and memory state stores registered
    pub fn with_builtin_state_stores() -> Self {
        let registry = Self::new();
        let builtin: Arc<dyn StateStoreFactory> = Arc::new(BuiltinStateStoreFactory);
        let mut stores = write(&registry.state_stores);
        stores.insert("file".to_string(), Arc::clone(&builtin));
        stores.insert("memory".to_string(), builtin);
        drop(stores);
        registry
    }

    /// Register a source factory under a source type name ("count", "form_roster")
    pub fn register_source(&self, name: impl Into<String>, factory: Box<dyn SourceFactory>) {
        write(&self.sources).insert(name.into(), factory);
    }

    /// Register a notifier factory under a notifier type name ("webhook", "log")
    pub fn register_notifier(&self, name: impl Into<String>, factory: Box<dyn NotifierFactory>) {
        write(&self.notifiers).insert(name.into(), factory);
    }

    /// Register a state store factory
    pub fn register_state_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn StateStoreFactory>,
    ) {
        write(&self.state_stores).insert(name.into(), Arc::from(factory));
    }

    /// Create a source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn Source>)`: Created source instance
    /// - `Err(Error)`: If the source type is not registered or creation fails
    pub fn create_source(&self, config: &SourceConfig) -> Result<Box<dyn Source>> {
        let source_type = config.type_name();
        let sources = read(&self.sources);

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown source type: {}", source_type)))?;

        factory.create(config)
    }

    /// Create a notifier from configuration
    pub fn create_notifier(&self, config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
        let notifier_type = config.type_name();
        let notifiers = read(&self.notifiers);

        let factory = notifiers
            .get(notifier_type)
            .ok_or_else(|| Error::config(format!("Unknown notifier type: {}", notifier_type)))?;

        factory.create(config)
    }

    /// Create a state store from configuration
    pub async fn create_state_store(&self, config: &StateStoreConfig) -> Result<Box<dyn StateStore>> {
        let store_type = config.type_name();

        // Release the lock before calling async create
        let factory = read(&self.state_stores)
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown state store type: {}", store_type)))?;

        factory.create(config).await
    }

    /// Check if a source type is registered
    pub fn has_source(&self, name: &str) -> bool {
        read(&self.sources).contains_key(name)
    }

    /// Check if a notifier type is registered
    pub fn has_notifier(&self, name: &str) -> bool {
        read(&self.notifiers).contains_key(name)
    }

    /// List all registered source types
    pub fn list_sources(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.sources).keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered notifier types
    pub fn list_notifiers(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.notifiers).keys().cloned().collect();
        names.sort();
        names
    }
}
