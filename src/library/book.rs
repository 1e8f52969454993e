//! JSON views of catalog books.

use crate::db::{Book, BookDetail, ReviewEntry, ShelvedBook, timestamp_to_datetime};
use crate::error::{AppError, Result};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

/// Date format used for publication dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Today's date as stored in the database.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Format a date the way publication dates are stored.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a stored publication date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid date '{}': {}", value, e)))
}

/// Short book card used in listings.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookSummary {
    /// Book ID.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Cover image URL.
    pub image: Option<String>,
    /// Author.
    pub author: String,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            image: book.image_url.clone(),
            author: book.author.clone(),
        }
    }
}

/// Search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// Book ID.
    pub id: i64,
    /// Author.
    pub author: String,
    /// Title.
    pub title: String,
    /// Cover image URL.
    pub image_url: Option<String>,
    /// Publisher.
    pub company: Option<String>,
}

impl From<&Book> for SearchResult {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            author: book.author.clone(),
            title: book.title.clone(),
            image_url: book.image_url.clone(),
            company: book.company.clone(),
        }
    }
}

/// Book on a user's shelf.
#[derive(Debug, Clone, Serialize)]
pub struct ShelfBook {
    /// Book card.
    #[serde(flatten)]
    pub book: BookSummary,
    /// Publication date.
    pub publication_date: String,
    /// Date the book was shelved (YYYY.MM.DD).
    pub added_at: String,
}

impl From<&ShelvedBook> for ShelfBook {
    fn from(shelved: &ShelvedBook) -> Self {
        Self {
            book: BookSummary::from(&shelved.book),
            publication_date: shelved.book.publication_date.clone(),
            added_at: timestamp_to_datetime(shelved.added_at)
                .format("%Y.%m.%d")
                .to_string(),
        }
    }
}

/// Book that is not published yet.
#[derive(Debug, Clone, Serialize)]
pub struct UpcomingBook {
    /// Book ID.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Cover image URL.
    pub image: Option<String>,
    /// Author.
    pub author: String,
    /// Days until publication.
    pub date: i64,
}

impl UpcomingBook {
    /// Build from a book, counting days from `today`.
    pub fn new(book: &Book, today: NaiveDate) -> Result<Self> {
        let published = parse_date(&book.publication_date).map_err(|e| {
            AppError::Internal(format!("Book {} has a bad stored date: {}", book.id, e))
        })?;
        Ok(Self {
            id: book.id,
            title: book.title.clone(),
            image: book.image_url.clone(),
            author: book.author.clone(),
            date: (published - today).num_days(),
        })
    }
}

/// Full book page.
#[derive(Debug, Clone, Serialize)]
pub struct BookDetailView {
    /// Book ID.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Subtitle.
    pub subtitle: Option<String>,
    /// Cover image URL.
    pub image_url: Option<String>,
    /// Publisher.
    pub company: Option<String>,
    /// Author.
    pub author: String,
    /// Table of contents.
    pub contents: Option<String>,
    /// Publisher's review.
    pub company_review: Option<String>,
    /// Page count.
    pub page: i64,
    /// Publication date.
    pub publication_date: String,
    /// Description.
    pub description: Option<String>,
    /// Category name.
    pub category: Option<String>,
    /// Number of reviews.
    pub review_count: i64,
    /// Number of distinct readers.
    pub reader: i64,
}

impl From<BookDetail> for BookDetailView {
    fn from(detail: BookDetail) -> Self {
        let BookDetail {
            book,
            category,
            review_count,
            reader_count,
        } = detail;

        Self {
            id: book.id,
            title: book.title,
            subtitle: book.subtitle,
            image_url: book.image_url,
            company: book.company,
            author: book.author,
            contents: book.contents,
            company_review: book.company_review,
            page: book.page_count,
            publication_date: book.publication_date,
            description: book.description,
            category,
            review_count,
            reader: reader_count,
        }
    }
}

/// Review as listed under a book.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    /// Review ID.
    pub review_id: i64,
    /// Author nickname.
    pub nick_name: String,
    /// Author image.
    pub user_img: Option<String>,
    /// Review text.
    pub content: String,
    /// Creation date (YYYY.MM.DD).
    pub created_at: String,
    /// Number of likes.
    pub like_count: i64,
}

impl From<ReviewEntry> for ReviewView {
    fn from(entry: ReviewEntry) -> Self {
        Self {
            review_id: entry.review.id,
            nick_name: entry.nickname,
            user_img: entry.user_image,
            content: entry.review.contents,
            created_at: timestamp_to_datetime(entry.review.created_at)
                .format("%Y.%m.%d")
                .to_string(),
            like_count: entry.like_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book() -> Book {
        Book {
            id: 7,
            title: "Title".to_string(),
            subtitle: None,
            image_url: Some("cover.jpg".to_string()),
            company: Some("Press".to_string()),
            author: "Author".to_string(),
            contents: None,
            company_review: None,
            page_count: 120,
            publication_date: "2021-03-22".to_string(),
            description: None,
            category_id: None,
        }
    }

    #[test]
    fn test_upcoming_days() {
        let today = NaiveDate::from_ymd_opt(2021, 3, 20).unwrap();
        let upcoming = UpcomingBook::new(&sample_book(), today).unwrap();
        assert_eq!(upcoming.date, 2);
    }

    #[test]
    fn test_upcoming_bad_stored_date_is_internal() {
        let today = NaiveDate::from_ymd_opt(2021, 3, 20).unwrap();
        let book = Book {
            publication_date: "someday".to_string(),
            ..sample_book()
        };
        assert!(matches!(
            UpcomingBook::new(&book, today),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("2021-13-40").is_err());
        assert_eq!(
            format_date(parse_date("2020-02-22").unwrap()),
            "2020-02-22"
        );
    }

    #[test]
    fn test_review_date_format() {
        let entry = ReviewEntry {
            review: crate::db::Review {
                id: 1,
                user_id: 1,
                book_id: 7,
                contents: "GOOD".to_string(),
                created_at: 1_616_284_800, // 2021-03-21T00:00:00Z
            },
            nickname: "hello".to_string(),
            user_image: None,
            like_count: 0,
        };
        let view = ReviewView::from(entry);
        assert_eq!(view.created_at, "2021.03.21");
    }
}
