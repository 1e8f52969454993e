//! Personal shelves, book views and catalog seeding.

pub mod book;
pub mod import;

use crate::db::{Book, Database, ReadingTotals, User};
use crate::error::{AppError, Result};
use serde::Serialize;

/// Sort order for a user's shelf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShelfOrder {
    /// Most recently added first.
    #[default]
    RecentlyAdded,
    /// Title, ascending.
    Title,
    /// Author, ascending.
    Author,
    /// Publication date, ascending.
    PublicationDate,
}

impl ShelfOrder {
    /// Parse the numeric `ordering` query parameter (1-4).
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            1 => Ok(ShelfOrder::RecentlyAdded),
            2 => Ok(ShelfOrder::Title),
            3 => Ok(ShelfOrder::Author),
            4 => Ok(ShelfOrder::PublicationDate),
            other => Err(AppError::InvalidRequest(format!(
                "Unknown ordering: {}",
                other
            ))),
        }
    }

    /// SQL ORDER BY clause over `lb` (library_books) and `b` (books).
    pub(crate) fn order_clause(self) -> &'static str {
        match self {
            ShelfOrder::RecentlyAdded => "lb.created_at DESC, lb.id DESC",
            ShelfOrder::Title => "b.title ASC, b.id ASC",
            ShelfOrder::Author => "b.author ASC, b.id ASC",
            ShelfOrder::PublicationDate => "b.publication_date ASC, b.id ASC",
        }
    }
}

/// A user's reading totals and a book to read next.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingSummary {
    /// Number of reading attempts recorded.
    pub total_book_count: i64,
    /// Minutes read across all attempts.
    pub total_read_time: i64,
    /// Suggested next book.
    pub recommend_book: Option<book::BookSummary>,
}

/// Pick a book for the user: the newest book of the category they read most,
/// or the newest book overall when they have not read anything yet.
pub fn recommend_book(
    db: &Database,
    user_id: i64,
    totals: ReadingTotals,
    today: &str,
) -> Result<Option<Book>> {
    if totals.total_time > 0
        && let Some(category_id) = db.user_top_category(user_id)?
        && let Some(book) = db.newest_book(Some(category_id), today)?
    {
        return Ok(Some(book));
    }

    db.newest_book(None, today)
}

/// Header of a user's library page. Missing images render as empty strings.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LibraryInfo {
    /// Library name.
    pub library_name: String,
    /// Library image URL.
    pub library_image: String,
    /// Owner nickname.
    pub user_name: String,
    /// Owner image URL.
    pub user_image: String,
}

/// Library page header for `user`, or `None` if they have no library yet.
pub fn library_info(db: &Database, user: &User) -> Result<Option<LibraryInfo>> {
    let Some(library) = db.get_library(user.id)? else {
        return Ok(None);
    };

    Ok(Some(LibraryInfo {
        library_name: library.name,
        library_image: library.image_url.unwrap_or_default(),
        user_name: user.nickname.clone(),
        user_image: user.image_url.clone().unwrap_or_default(),
    }))
}

/// Build the reading summary shown on a user's library page.
pub fn reading_summary(db: &Database, user_id: i64, today: &str) -> Result<ReadingSummary> {
    let totals = db.user_reading_totals(user_id)?;
    let recommend = recommend_book(db, user_id, totals, today)?;

    Ok(ReadingSummary {
        total_book_count: totals.book_count,
        total_read_time: totals.total_time,
        recommend_book: recommend.as_ref().map(book::BookSummary::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shelf_order_codes() {
        assert_eq!(ShelfOrder::from_code(1).unwrap(), ShelfOrder::RecentlyAdded);
        assert_eq!(ShelfOrder::from_code(4).unwrap(), ShelfOrder::PublicationDate);
        assert!(ShelfOrder::from_code(0).is_err());
        assert!(ShelfOrder::from_code(5).is_err());
    }
}
