//! Core traits for clubwatch
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`Source`]: Normalize a remote source into a snapshot
//! - [`Notifier`]: Send notification texts
//! - [`StateStore`]: Persistent per-source state

pub mod notifier;
pub mod source;
pub mod state_store;

pub use notifier::{Notifier, NotifierFactory};
pub use source::{BaselinePersistence, Source, SourceFactory};
pub use state_store::{SourceState, StateStore, StateStoreFactory};
