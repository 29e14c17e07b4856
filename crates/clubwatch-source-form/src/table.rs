//! Roster table lookup
//!
//! The roster page layout is not under our control, so the table is located
//! through an ordered chain of [`TableMatcher`] strategies. The first
//! strategy that selects a table wins.
//!
//! Default chain:
//!
//! 1. [`ExactId`]: `id` attribute equal to a configured value
//! 2. [`IdContains`]: `id` attribute containing a substring
//! 3. [`HasClass`]: class list containing a class name
//! 4. [`TextContains`]: table text containing a keyword
//! 5. [`LargestTable`]: the table with the most rows

use clubwatch_core::config::TableLookup;
use scraper::{ElementRef, Html, Selector};

/// A strategy selecting the roster table out of a parsed page
pub trait TableMatcher: Send + Sync {
    /// Name used in debug logs
    fn name(&self) -> &'static str;

    /// Select a table among `tables` (all `<table>` elements, document order)
    fn select<'a>(&self, tables: &[ElementRef<'a>]) -> Option<ElementRef<'a>>;
}

/// Table whose `id` equals a value
pub struct ExactId(pub String);

impl TableMatcher for ExactId {
    fn name(&self) -> &'static str {
        "exact_id"
    }

    fn select<'a>(&self, tables: &[ElementRef<'a>]) -> Option<ElementRef<'a>> {
        tables
            .iter()
            .find(|t| t.value().id() == Some(self.0.as_str()))
            .copied()
    }
}

/// First table whose `id` contains a substring
pub struct IdContains(pub String);

impl TableMatcher for IdContains {
    fn name(&self) -> &'static str {
        "id_contains"
    }

    fn select<'a>(&self, tables: &[ElementRef<'a>]) -> Option<ElementRef<'a>> {
        tables
            .iter()
            .find(|t| t.value().id().is_some_and(|id| id.contains(self.0.as_str())))
            .copied()
    }
}

/// First table carrying a class
pub struct HasClass(pub String);

impl TableMatcher for HasClass {
    fn name(&self) -> &'static str {
        "has_class"
    }

    fn select<'a>(&self, tables: &[ElementRef<'a>]) -> Option<ElementRef<'a>> {
        tables
            .iter()
            .find(|t| t.value().classes().any(|class| class == self.0))
            .copied()
    }
}

/// Innermost table whose text contains a keyword
///
/// Layout tables wrap the roster, so the last match in document order
/// (the most deeply nested one) is preferred.
pub struct TextContains(pub String);

impl TableMatcher for TextContains {
    fn name(&self) -> &'static str {
        "text_contains"
    }

    fn select<'a>(&self, tables: &[ElementRef<'a>]) -> Option<ElementRef<'a>> {
        tables
            .iter()
            .rev()
            .find(|t| t.text().collect::<String>().contains(self.0.as_str()))
            .copied()
    }
}

/// Table with the most rows of its own; the first one on ties
pub struct LargestTable;

impl TableMatcher for LargestTable {
    fn name(&self) -> &'static str {
        "largest_table"
    }

    fn select<'a>(&self, tables: &[ElementRef<'a>]) -> Option<ElementRef<'a>> {
        let mut best: Option<(ElementRef<'a>, usize)> = None;
        for table in tables {
            let rows = table_rows(*table).len();
            if best.is_none_or(|(_, most)| rows > most) {
                best = Some((*table, rows));
            }
        }
        best.map(|(table, _)| table)
    }
}

/// Ordered matcher chain
pub struct TableLocator {
    matchers: Vec<Box<dyn TableMatcher>>,
}

impl TableLocator {
    pub fn new(matchers: Vec<Box<dyn TableMatcher>>) -> Self {
        Self { matchers }
    }

    /// Build the default chain; disabled lookups are left out
    pub fn from_lookup(lookup: &TableLookup) -> Self {
        let mut matchers: Vec<Box<dyn TableMatcher>> = Vec::with_capacity(5);
        if let Some(id) = &lookup.exact_id {
            matchers.push(Box::new(ExactId(id.clone())));
        }
        if let Some(fragment) = &lookup.id_contains {
            matchers.push(Box::new(IdContains(fragment.clone())));
        }
        if let Some(class) = &lookup.class_name {
            matchers.push(Box::new(HasClass(class.clone())));
        }
        if let Some(keyword) = &lookup.keyword {
            matchers.push(Box::new(TextContains(keyword.clone())));
        }
        matchers.push(Box::new(LargestTable));
        Self { matchers }
    }

    /// Locate the roster table of a parsed page
    pub fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let selector = Selector::parse("table").ok()?;
        let tables: Vec<ElementRef<'a>> = document.select(&selector).collect();
        if tables.is_empty() {
            return None;
        }

        self.matchers.iter().find_map(|matcher| {
            let table = matcher.select(&tables)?;
            tracing::debug!("Roster table selected by {}", matcher.name());
            Some(table)
        })
    }
}

impl Default for TableLocator {
    fn default() -> Self {
        Self::from_lookup(&TableLookup::default())
    }
}

/// Rows belonging to `table` itself, excluding rows of nested tables
pub fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let Ok(selector) = Selector::parse("tr") else {
        return Vec::new();
    };

    table
        .select(&selector)
        .filter(|row| {
            row.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|element| element.value().name() == "table")
                .is_some_and(|owner| owner == table)
        })
        .collect()
}

/// Cells (`td`/`th`) that are direct children of a row, whitespace-normalized
pub fn row_cells(row: ElementRef<'_>) -> Vec<String> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
        .map(|cell| {
            cell.text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}
