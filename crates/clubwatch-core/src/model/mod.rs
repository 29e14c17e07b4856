//! Data model: snapshots, change events and notification ids

pub mod change;
pub mod snapshot;

pub use change::ChangeEvent;
pub use snapshot::{PlayerField, PlayerRecord, RosterSnapshot, ScalarSnapshot, Snapshot};

use serde::{Deserialize, Serialize};

/// Identifier assigned by the notification transport to a sent message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
