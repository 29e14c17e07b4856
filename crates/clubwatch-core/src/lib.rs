// # clubwatch-core
//
// Core library for the club regulatory/roster watcher.
//
// ## Architecture Overview
//
// This library provides the polling → diffing → notification pipeline:
// - **Source**: Trait for adapters normalizing a remote source into a Snapshot
// - **Notifier**: Trait for sending notification texts
// - **StateStore**: Trait for the persisted last snapshot per source
// - **diff**: Pure comparison of two snapshots into ordered ChangeEvents
// - **WatchEngine**: Scheduler loop sequencing poll → diff → notify → persist
// - **WatchRegistry**: Plugin-based registry building implementations from config
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Adapters, notifier and storage are injected
// 2. **Errors are values**: The engine pattern-matches classified failures
// 3. **At-most-once per change**: State moves forward only after a send
// 4. **Library-First**: All core functionality can be used as a library

pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod message;
pub mod model;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{
    CountSourceConfig, EngineConfig, FormFilters, FormRosterConfig, NotifierConfig,
    RosterColumns, SourceConfig, StateStoreConfig, TableLookup, WatchConfig,
};
pub use diff::{DiffError, diff};
pub use engine::{CycleReport, EngineEvent, SourceOutcome, WatchEngine};
pub use error::{Error, FetchError, NotifyError, Result};
pub use message::MessageFormatter;
pub use model::{
    ChangeEvent, NotificationId, PlayerField, PlayerRecord, RosterSnapshot, ScalarSnapshot,
    Snapshot,
};
pub use registry::WatchRegistry;
pub use state::{BuiltinStateStoreFactory, FileStateStore, MemoryStateStore};
pub use traits::{
    BaselinePersistence, Notifier, NotifierFactory, Source, SourceFactory, SourceState,
    StateStore, StateStoreFactory,
};
