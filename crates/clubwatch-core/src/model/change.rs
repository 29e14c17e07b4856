//! Change events produced by the diff engine
//!
//! Change events are never persisted. The engine consumes them once, within
//! the cycle that produced them, to build a notification message.

use super::snapshot::{PlayerField, PlayerRecord};

/// One observed difference between two snapshots of the same source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Scalar count changed
    CountChanged { old: u64, new: u64 },

    /// Player present in the new roster only
    PlayerAdded { record: PlayerRecord },

    /// Player present in the old roster only
    PlayerRemoved { record: PlayerRecord },

    /// A tracked field of a player present in both rosters changed
    PlayerStatusChanged {
        name: String,
        field: PlayerField,
        old_value: String,
        new_value: String,
    },
}

impl std::fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeEvent::CountChanged { old, new } => write!(f, "count {} -> {}", old, new),
            ChangeEvent::PlayerAdded { record } => {
                write!(f, "+ {} ({}, {})", record.name, record.position, record.license_status)
            }
            ChangeEvent::PlayerRemoved { record } => write!(f, "- {}", record.name),
            ChangeEvent::PlayerStatusChanged {
                name,
                field,
                old_value,
                new_value,
            } => write!(f, "{} {}: {} -> {}", name, field, old_value, new_value),
        }
    }
}
