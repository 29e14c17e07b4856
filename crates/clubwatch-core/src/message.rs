//! Notification message formatting
//!
//! One message is produced per source per cycle: either a baseline
//! announcement or a summary of every change event of that cycle.

use crate::model::{ChangeEvent, Snapshot};

/// Ellipsis appended to truncated messages
const ELLIPSIS: char = '…';

/// Formats notification texts for one watched club
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    /// Display name of the club (e.g. "Kayserispor")
    club_name: String,
    /// Platform length limit, in characters
    max_chars: usize,
}

impl MessageFormatter {
    pub fn new(club_name: impl Into<String>, max_chars: usize) -> Self {
        Self {
            club_name: club_name.into(),
            max_chars,
        }
    }

    /// First observation of a source
    pub fn baseline(&self, snapshot: &Snapshot) -> String {
        let text = match snapshot {
            Snapshot::Scalar(scalar) => format!(
                "{} currently has {} registration ban file(s).",
                self.club_name, scalar.count
            ),
            Snapshot::Roster(roster) => {
                let mut text = format!(
                    "{} roster is now being tracked: {} licensed player(s).",
                    self.club_name,
                    roster.len()
                );
                for record in roster.players.values() {
                    text.push_str(&format!("\n{} ({}, {})", record.name, record.position, record.license_status));
                }
                text
            }
        };
        self.truncate(text)
    }

    /// Summary of the change events observed for one source in one cycle
    pub fn changes(&self, events: &[ChangeEvent]) -> String {
        let mut lines = Vec::with_capacity(events.len() + 1);

        for event in events {
            match event {
                ChangeEvent::CountChanged { old, new } => lines.push(format!(
                    "{} registration ban count changed! New count: {} (was {})",
                    self.club_name, new, old
                )),
                ChangeEvent::PlayerAdded { record } => lines.push(format!(
                    "New player: {} ({}, license: {})",
                    record.name, record.position, record.license_status
                )),
                ChangeEvent::PlayerRemoved { record } => {
                    lines.push(format!("Player left the roster: {}", record.name))
                }
                ChangeEvent::PlayerStatusChanged {
                    name,
                    field,
                    old_value,
                    new_value,
                } => lines.push(format!("{}: {} {} -> {}", name, field, old_value, new_value)),
            }
        }

        let roster_events = events
            .iter()
            .filter(|e| !matches!(e, ChangeEvent::CountChanged { .. }))
            .count();
        if roster_events > 0 {
            lines.insert(0, format!("{} roster update ({} change(s)):", self.club_name, roster_events));
        }

        self.truncate(lines.join("\n"))
    }

    /// Cut the text to the platform limit, ending with an ellipsis
    fn truncate(&self, text: String) -> String {
        if text.chars().count() <= self.max_chars {
            return text;
        }
        let mut cut: String = text.chars().take(self.max_chars.saturating_sub(1)).collect();
        cut.push(ELLIPSIS);
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PlayerField, PlayerRecord, RosterSnapshot, ScalarSnapshot};

    fn formatter() -> MessageFormatter {
        MessageFormatter::new("Kayserispor", 280)
    }

    #[test]
    fn count_change_mentions_new_count() {
        let text = formatter().changes(&[ChangeEvent::CountChanged { old: 3, new: 5 }]);
        assert!(text.contains('5'));
        assert!(text.contains("Kayserispor"));
    }

    #[test]
    fn scalar_baseline_mentions_count() {
        let text = formatter().baseline(&Snapshot::Scalar(ScalarSnapshot::new(4)));
        assert_eq!(text, "Kayserispor currently has 4 registration ban file(s).");
    }

    #[test]
    fn roster_changes_are_summarized_in_one_message() {
        let events = vec![
            ChangeEvent::PlayerAdded {
                record: PlayerRecord::new("Veli", "Defans", "Faal"),
            },
            ChangeEvent::PlayerStatusChanged {
                name: "Ali".into(),
                field: PlayerField::LicenseStatus,
                old_value: "Faal".into(),
                new_value: "Pasif".into(),
            },
        ];

        let text = formatter().changes(&events);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Kayserispor roster update (2 change(s)):",
                "New player: Veli (Defans, license: Faal)",
                "Ali: license_status Faal -> Pasif",
            ]
        );
    }

    #[test]
    fn long_messages_are_truncated() {
        let roster = RosterSnapshot::from_records(
            (0..50).map(|i| PlayerRecord::new(format!("Oyuncu {}", i), "Orta Saha", "Faal")),
        );
        let text = MessageFormatter::new("Kayserispor", 100).baseline(&Snapshot::Roster(roster));

        assert_eq!(text.chars().count(), 100);
        assert!(text.ends_with(ELLIPSIS));
    }
}
