mod schema;

pub use schema::Database;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Display nickname.
    pub nickname: String,
    /// Argon2 password hash (absent for OAuth-only accounts).
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Profile image URL.
    pub image_url: Option<String>,
    /// Phone number used for password sign-in.
    pub phone_number: Option<String>,
    /// Kakao account ID.
    pub kakao_id: Option<String>,
    /// Account creation timestamp.
    pub created_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Fields for a user that does not exist yet.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    /// Display nickname.
    pub nickname: String,
    /// Argon2 password hash.
    pub password_hash: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Profile image URL.
    pub image_url: Option<String>,
    /// Phone number.
    pub phone_number: Option<String>,
    /// Kakao account ID.
    pub kakao_id: Option<String>,
}

/// Authentication session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session token.
    pub token: String,
    /// User ID.
    pub user_id: i64,
    /// Expiration timestamp.
    pub expires_at: i64,
}

/// Book category (genre).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Category ID.
    pub id: i64,
    /// Category name.
    pub name: String,
}

/// Catalog book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
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
    /// Total number of pages.
    pub page_count: i64,
    /// Publication date (YYYY-MM-DD).
    pub publication_date: String,
    /// Book description.
    pub description: Option<String>,
    /// Category ID.
    pub category_id: Option<i64>,
}

/// Book fields before insertion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewBook {
    /// Title.
    pub title: String,
    /// Subtitle.
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Cover image URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Publisher.
    #[serde(default)]
    pub company: Option<String>,
    /// Author.
    pub author: String,
    /// Table of contents.
    #[serde(default)]
    pub contents: Option<String>,
    /// Publisher's review.
    #[serde(default)]
    pub company_review: Option<String>,
    /// Total number of pages.
    pub page_count: i64,
    /// Publication date (YYYY-MM-DD).
    pub publication_date: String,
    /// Book description.
    #[serde(default)]
    pub description: Option<String>,
    /// Category ID.
    #[serde(default)]
    pub category_id: Option<i64>,
}

/// Book joined with its category name and counters.
#[derive(Debug, Clone)]
pub struct BookDetail {
    /// The book itself.
    pub book: Book,
    /// Category name, if any.
    pub category: Option<String>,
    /// Number of reviews.
    pub review_count: i64,
    /// Number of distinct users with progress rows.
    pub reader_count: i64,
}

/// One reading attempt of a user against a book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBook {
    /// Row ID.
    pub id: i64,
    /// User ID.
    pub user_id: i64,
    /// Book ID.
    pub book_id: i64,
    /// Pages read in this attempt.
    pub pages_read: i64,
    /// Minutes spent.
    pub time: i64,
    /// Creation timestamp.
    pub created_at: i64,
}

/// Aggregate over a set of progress rows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressAggregate {
    /// Number of progress rows.
    pub total: i64,
    /// Rows with `pages_read >= page_count`.
    pub completed: i64,
    /// Mean time over completed rows.
    pub avg_completed_time: Option<f64>,
}

/// Per-user reading totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadingTotals {
    /// Number of progress rows.
    pub book_count: i64,
    /// Sum of minutes across rows.
    pub total_time: i64,
}

/// Review on a book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    /// Review ID.
    pub id: i64,
    /// Author user ID.
    pub user_id: i64,
    /// Book ID.
    pub book_id: i64,
    /// Review text.
    pub contents: String,
    /// Creation timestamp.
    pub created_at: i64,
}

/// Review with author info and like count, for listings.
#[derive(Debug, Clone)]
pub struct ReviewEntry {
    /// The review.
    pub review: Review,
    /// Author nickname.
    pub nickname: String,
    /// Author image URL.
    pub user_image: Option<String>,
    /// Number of likes.
    pub like_count: i64,
}

/// Personal library (shelf).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    /// Library ID.
    pub id: i64,
    /// Owner user ID.
    pub user_id: i64,
    /// Library name.
    pub name: String,
    /// Library image URL.
    pub image_url: Option<String>,
}

/// Book placed on a shelf.
#[derive(Debug, Clone)]
pub struct ShelvedBook {
    /// The book.
    pub book: Book,
    /// When it was added.
    pub added_at: i64,
}

/// Pending SMS verification.
#[derive(Debug, Clone)]
pub struct SmsAuthRequest {
    /// Phone number.
    pub phone_number: String,
    /// Six-digit code.
    pub auth_number: u32,
    /// Issue timestamp.
    pub updated_at: i64,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert timestamp to DateTime.
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}
