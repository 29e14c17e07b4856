//! Diff engine
//!
//! Pure comparison of two snapshots of the same source. No I/O, no clock.
//!
//! ## Ordering
//!
//! Events are emitted in a fixed order so that two diffs over identical
//! inputs are identical:
//!
//! 1. `PlayerAdded`, sorted by name
//! 2. `PlayerRemoved`, sorted by name
//! 3. `PlayerStatusChanged`, sorted by name, then by [`PlayerField::TRACKED`] order
//!
//! ## Baseline
//!
//! When there is no previous snapshot the diff is empty. The first
//! observation of a source is a baseline, not a change; announcing it is the
//! engine's business.

use crate::model::{ChangeEvent, PlayerField, RosterSnapshot, ScalarSnapshot, Snapshot};
use thiserror::Error;

/// Diff failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    /// The two snapshots are of different kinds and cannot be compared
    #[error("cannot diff a {old} snapshot against a {new} snapshot")]
    KindMismatch {
        old: &'static str,
        new: &'static str,
    },
}

/// Compare a previous snapshot (if any) against a new one
///
/// # Returns
///
/// - `Ok(vec![])`: no previous snapshot, or nothing changed
/// - `Ok(events)`: ordered change events
/// - `Err(DiffError::KindMismatch)`: snapshots of different kinds
pub fn diff(old: Option<&Snapshot>, new: &Snapshot) -> Result<Vec<ChangeEvent>, DiffError> {
    let Some(old) = old else {
        return Ok(Vec::new());
    };

    match (old, new) {
        (Snapshot::Scalar(old), Snapshot::Scalar(new)) => Ok(diff_scalar(old, new)),
        (Snapshot::Roster(old), Snapshot::Roster(new)) => Ok(diff_roster(old, new)),
        (old, new) => Err(DiffError::KindMismatch {
            old: old.kind(),
            new: new.kind(),
        }),
    }
}

/// Scalar diff: one event when the count differs
pub fn diff_scalar(old: &ScalarSnapshot, new: &ScalarSnapshot) -> Vec<ChangeEvent> {
    if old.count == new.count {
        return Vec::new();
    }
    vec![ChangeEvent::CountChanged {
        old: old.count,
        new: new.count,
    }]
}

/// Roster diff keyed by player name
pub fn diff_roster(old: &RosterSnapshot, new: &RosterSnapshot) -> Vec<ChangeEvent> {
    // BTreeMap iteration is sorted by name, which gives the per-group order.
    let added = new
        .players
        .iter()
        .filter(|(name, _)| !old.players.contains_key(*name))
        .map(|(_, record)| ChangeEvent::PlayerAdded {
            record: record.clone(),
        });

    let removed = old
        .players
        .iter()
        .filter(|(name, _)| !new.players.contains_key(*name))
        .map(|(_, record)| ChangeEvent::PlayerRemoved {
            record: record.clone(),
        });

    let changed = old.players.iter().flat_map(|(name, old_record)| {
        let new_record = new.players.get(name);
        PlayerField::TRACKED.into_iter().filter_map(move |field| {
            let new_record = new_record?;
            let old_value = field.value(old_record);
            let new_value = field.value(new_record);
            (old_value != new_value).then(|| ChangeEvent::PlayerStatusChanged {
                name: name.clone(),
                field,
                old_value: old_value.to_string(),
                new_value: new_value.to_string(),
            })
        })
    });

    added.chain(removed).chain(changed).collect()
}
