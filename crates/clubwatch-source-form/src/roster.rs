//! Roster table parsing

use clubwatch_core::config::RosterColumns;
use clubwatch_core::model::{PlayerRecord, RosterSnapshot};
use clubwatch_core::FetchError;
use scraper::Html;

use crate::table::{TableLocator, row_cells, table_rows};

/// Rows with a first cell this short (after trimming) are noise
const MIN_NAME_CHARS: usize = 3;

/// Parse the roster out of a search result page
///
/// The first row of the located table is the header and is skipped. Rows
/// with fewer than two cells, or whose first cell is too short to be a name,
/// are skipped. On duplicate names the first row wins.
///
/// # Returns
///
/// - `Ok(RosterSnapshot)`: Possibly empty
/// - `Err(FetchError::Protocol)`: No table at all on the page
pub fn parse_roster(
    html: &str,
    locator: &TableLocator,
    columns: &RosterColumns,
) -> Result<RosterSnapshot, FetchError> {
    let document = Html::parse_document(html);
    let table = locator
        .locate(&document)
        .ok_or_else(|| FetchError::protocol("roster table not found"))?;

    let mut roster = RosterSnapshot::new();
    for row in table_rows(table).into_iter().skip(1) {
        let cells = row_cells(row);
        let Some(record) = player_record(&cells, columns) else {
            continue;
        };

        let name = record.name.clone();
        if !roster.insert(record) {
            tracing::debug!("Dropping duplicate roster row for {}", name);
        }
    }

    Ok(roster)
}

fn player_record(cells: &[String], columns: &RosterColumns) -> Option<PlayerRecord> {
    if cells.len() < 2 {
        return None;
    }
    if cells[0].trim().chars().count() < MIN_NAME_CHARS {
        return None;
    }

    let cell = |index: Option<usize>| {
        index
            .and_then(|i| cells.get(i))
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    };

    let name = cell(Some(columns.name))?;
    let mut record = PlayerRecord::new(
        name,
        cell(columns.position).unwrap_or_default(),
        cell(columns.license_status).unwrap_or_default(),
    );
    if let Some(birth_date) = cell(columns.birth_date) {
        record = record.with_birth_date(birth_date);
    }
    if let Some(nationality) = cell(columns.nationality) {
        record = record.with_nationality(nationality);
    }

    Some(record)
}
