// # Snapshots
//
// A snapshot is the normalized output of one adapter invocation. Two kinds
// exist: a scalar count and a roster of players keyed by name.
//
// ## Persisted Format
//
// Snapshots are stored inside `SourceState` records, tagged by kind:
//
// ```json
// { "kind": "scalar", "count": 3 }
// { "kind": "roster", "players": { "Ali": { "name": "Ali", ... } } }
// ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Normalized point-in-time data of one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Snapshot {
    /// A single non-negative count
    Scalar(ScalarSnapshot),
    /// A set of players keyed by name
    Roster(RosterSnapshot),
}

impl Snapshot {
    /// Kind name, used in logs and mismatch errors
    pub fn kind(&self) -> &'static str {
        match self {
            Snapshot::Scalar(_) => "scalar",
            Snapshot::Roster(_) => "roster",
        }
    }
}

impl From<ScalarSnapshot> for Snapshot {
    fn from(snapshot: ScalarSnapshot) -> Self {
        Snapshot::Scalar(snapshot)
    }
}

impl From<RosterSnapshot> for Snapshot {
    fn from(snapshot: RosterSnapshot) -> Self {
        Snapshot::Roster(snapshot)
    }
}

/// Scalar snapshot (e.g. number of registration bans for a club)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarSnapshot {
    pub count: u64,
}

impl ScalarSnapshot {
    pub fn new(count: u64) -> Self {
        Self { count }
    }
}

/// One player row of a roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Identity key within a roster
    pub name: String,
    pub position: String,
    /// Free-form license status as shown by the remote page
    pub license_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
}

impl PlayerRecord {
    /// Create a record with the mandatory fields set
    pub fn new(
        name: impl Into<String>,
        position: impl Into<String>,
        license_status: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            position: position.into(),
            license_status: license_status.into(),
            birth_date: None,
            nationality: None,
        }
    }

    pub fn with_birth_date(mut self, birth_date: impl Into<String>) -> Self {
        self.birth_date = Some(birth_date.into());
        self
    }

    pub fn with_nationality(mut self, nationality: impl Into<String>) -> Self {
        self.nationality = Some(nationality.into());
        self
    }
}

/// Player fields compared by the diff engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerField {
    LicenseStatus,
    Position,
    BirthDate,
    Nationality,
}

impl PlayerField {
    /// Tracked fields, in the order status changes are reported
    pub const TRACKED: [PlayerField; 4] = [
        PlayerField::LicenseStatus,
        PlayerField::Position,
        PlayerField::BirthDate,
        PlayerField::Nationality,
    ];

    /// Read this field from a record; absent optional fields read as ""
    pub fn value<'a>(&self, record: &'a PlayerRecord) -> &'a str {
        match self {
            PlayerField::LicenseStatus => &record.license_status,
            PlayerField::Position => &record.position,
            PlayerField::BirthDate => record.birth_date.as_deref().unwrap_or(""),
            PlayerField::Nationality => record.nationality.as_deref().unwrap_or(""),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerField::LicenseStatus => "license_status",
            PlayerField::Position => "position",
            PlayerField::BirthDate => "birth_date",
            PlayerField::Nationality => "nationality",
        }
    }
}

impl std::fmt::Display for PlayerField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roster snapshot: a set of players keyed by name
///
/// The map is ordered so iteration (and therefore serialization and diff
/// output) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSnapshot {
    pub players: BTreeMap<String, PlayerRecord>,
}

impl RosterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a roster from records; on duplicate names the first record wins
    pub fn from_records(records: impl IntoIterator<Item = PlayerRecord>) -> Self {
        let mut roster = Self::new();
        for record in records {
            roster.insert(record);
        }
        roster
    }

    /// Insert a record unless its name is already present
    ///
    /// Returns `false` when the name was already taken.
    pub fn insert(&mut self, record: PlayerRecord) -> bool {
        if self.players.contains_key(&record.name) {
            return false;
        }
        self.players.insert(record.name.clone(), record);
        true
    }

    pub fn get(&self, name: &str) -> Option<&PlayerRecord> {
        self.players.get(name)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Player names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.players.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_duplicate_wins() {
        let roster = RosterSnapshot::from_records([
            PlayerRecord::new("Ali", "Forvet", "Faal"),
            PlayerRecord::new("Ali", "Kaleci", "Pasif"),
        ]);

        assert_eq!(roster.len(), 1);
        assert_eq!(roster.get("Ali").unwrap().position, "Forvet");
    }

    #[test]
    fn snapshot_json_is_tagged_by_kind() {
        let scalar = Snapshot::from(ScalarSnapshot::new(3));
        let json = serde_json::to_value(&scalar).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "scalar", "count": 3 }));

        let roster = Snapshot::from(RosterSnapshot::from_records([PlayerRecord::new(
            "Veli", "Defans", "Faal",
        )
        .with_nationality("TR")]));
        let json = serde_json::to_value(&roster).unwrap();
        assert_eq!(json["kind"], "roster");
        assert_eq!(json["players"]["Veli"]["nationality"], "TR");
        assert!(json["players"]["Veli"].get("birth_date").is_none());

        let parsed: Snapshot = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, roster);
    }

    #[test]
    fn optional_fields_read_as_empty() {
        let record = PlayerRecord::new("Ali", "Forvet", "Faal");
        assert_eq!(PlayerField::BirthDate.value(&record), "");
        assert_eq!(PlayerField::LicenseStatus.value(&record), "Faal");
    }
}
