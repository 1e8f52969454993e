//! Seed the catalog from a JSON file.

use crate::db::{Database, NewBook};
use crate::error::{AppError, Result};
use crate::library::book::parse_date;
use serde::Deserialize;
use std::path::Path;

/// One book in a catalog file. The category is given by name and created on demand.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    /// Book fields.
    #[serde(flatten)]
    pub book: NewBook,
    /// Category name.
    #[serde(default)]
    pub category: Option<String>,
}

/// Parse a catalog file's content.
pub fn parse_catalog(content: &str) -> Result<Vec<CatalogEntry>> {
    serde_json::from_str(content)
        .map_err(|e| AppError::InvalidRequest(format!("Failed to parse catalog: {}", e)))
}

/// Check every entry, then insert them all in one transaction.
///
/// Returns how many books were added. A bad entry leaves the catalog untouched.
pub fn import_entries(db: &Database, entries: Vec<CatalogEntry>) -> Result<usize> {
    let mut books = Vec::with_capacity(entries.len());

    for entry in entries {
        parse_date(&entry.book.publication_date)?;
        if entry.book.page_count <= 0 {
            return Err(AppError::InvalidRequest(format!(
                "Book '{}' has no pages",
                entry.book.title
            )));
        }

        let category = entry
            .category
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        books.push((entry.book, category));
    }

    let created = db.import_books(&books)?;
    for book in &created {
        tracing::debug!(id = book.id, title = %book.title, "Imported book");
    }

    Ok(created.len())
}

/// Import a catalog file from disk.
pub fn import_file(db: &Database, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)?;
    let entries = parse_catalog(&content)?;
    import_entries(db, entries)
}
