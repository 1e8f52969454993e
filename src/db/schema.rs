use crate::db::*;
use crate::error::{AppError, Resource, Result};
use crate::library::ShelfOrder;
use crate::library::book::parse_date;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::path::Path;
use std::sync::Arc;

/// Book columns, in the order `book_from_row` reads them.
const BOOK_COLUMNS: &str = "b.id, b.title, b.subtitle, b.image_url, b.company, b.author, \
     b.contents, b.company_review, b.page_count, b.publication_date, b.description, b.category_id";

const USER_COLUMNS: &str = "id, nickname, password_hash, email, image_url, phone_number, \
     kakao_id, created_at, updated_at";

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        subtitle: row.get(2)?,
        image_url: row.get(3)?,
        company: row.get(4)?,
        author: row.get(5)?,
        contents: row.get(6)?,
        company_review: row.get(7)?,
        page_count: row.get(8)?,
        publication_date: row.get(9)?,
        description: row.get(10)?,
        category_id: row.get(11)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        nickname: row.get(1)?,
        password_hash: row.get(2)?,
        email: row.get(3)?,
        image_url: row.get(4)?,
        phone_number: row.get(5)?,
        kakao_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn upsert_category(conn: &Connection, name: &str) -> Result<Category> {
    conn.execute(
        "INSERT INTO categories (name) VALUES (?1) ON CONFLICT (name) DO NOTHING",
        params![name],
    )
    .map_err(|e| AppError::Internal(format!("Failed to create category: {}", e)))?;

    conn.query_row(
        "SELECT id, name FROM categories WHERE name = ?1",
        params![name],
        |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )
    .map_err(|e| AppError::Internal(format!("Failed to get category: {}", e)))
}

/// Stored dates always parse, so listings never see a malformed one.
fn insert_book(conn: &Connection, book: &NewBook) -> Result<Book> {
    parse_date(&book.publication_date)?;

    conn.execute(
        "INSERT INTO books
         (title, subtitle, image_url, company, author, contents, company_review,
          page_count, publication_date, description, category_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            book.title,
            book.subtitle,
            book.image_url,
            book.company,
            book.author,
            book.contents,
            book.company_review,
            book.page_count,
            book.publication_date,
            book.description,
            book.category_id,
        ],
    )
    .map_err(|e| AppError::Internal(format!("Failed to save book: {}", e)))?;

    Ok(Book {
        id: conn.last_insert_rowid(),
        title: book.title.clone(),
        subtitle: book.subtitle.clone(),
        image_url: book.image_url.clone(),
        company: book.company.clone(),
        author: book.author.clone(),
        contents: book.contents.clone(),
        company_review: book.company_review.clone(),
        page_count: book.page_count,
        publication_date: book.publication_date.clone(),
        description: book.description.clone(),
        category_id: book.category_id,
    })
}

/// Escape LIKE wildcards so user input matches literally.
fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for c in value.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Users table
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nickname TEXT NOT NULL,
                password_hash TEXT,
                email TEXT,
                image_url TEXT,
                phone_number TEXT UNIQUE,
                kakao_id TEXT UNIQUE,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Sessions table
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Categories table
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL
            );

            -- Books table
            CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                subtitle TEXT,
                image_url TEXT,
                company TEXT,
                author TEXT NOT NULL,
                contents TEXT,
                company_review TEXT,
                page_count INTEGER NOT NULL,
                publication_date TEXT NOT NULL,
                description TEXT,
                category_id INTEGER,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL
            );

            -- Reading progress, one row per attempt
            CREATE TABLE IF NOT EXISTS user_books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                book_id INTEGER NOT NULL,
                pages_read INTEGER NOT NULL,
                time_minutes INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- Reviews table
            CREATE TABLE IF NOT EXISTS reviews (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                book_id INTEGER NOT NULL,
                contents TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- Review likes
            CREATE TABLE IF NOT EXISTS likes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                review_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (user_id, review_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (review_id) REFERENCES reviews(id) ON DELETE CASCADE
            );

            -- Personal libraries
            CREATE TABLE IF NOT EXISTS libraries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER UNIQUE NOT NULL,
                name TEXT NOT NULL,
                image_url TEXT,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Books on a library shelf
            CREATE TABLE IF NOT EXISTS library_books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                library_id INTEGER NOT NULL,
                book_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (library_id, book_id),
                FOREIGN KEY (library_id) REFERENCES libraries(id) ON DELETE CASCADE,
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- SMS verification codes
            CREATE TABLE IF NOT EXISTS sms_auth_requests (
                phone_number TEXT PRIMARY KEY,
                auth_number INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_books_category ON books(category_id);
            CREATE INDEX IF NOT EXISTS idx_books_published ON books(publication_date);
            CREATE INDEX IF NOT EXISTS idx_user_books_book ON user_books(book_id);
            CREATE INDEX IF NOT EXISTS idx_user_books_user ON user_books(user_id);
            CREATE INDEX IF NOT EXISTS idx_reviews_book ON reviews(book_id);
            CREATE INDEX IF NOT EXISTS idx_likes_review ON likes(review_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== USER OPERATIONS ==========

    /// Create a new user.
    pub fn create_user(&self, new_user: &NewUser) -> Result<User> {
        let conn = self.conn.lock();
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO users (nickname, password_hash, email, image_url, phone_number, kakao_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                new_user.nickname,
                new_user.password_hash,
                new_user.email,
                new_user.image_url,
                new_user.phone_number,
                new_user.kakao_id,
                now,
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::Conflict("INVALID_REQUEST")
            } else {
                AppError::Internal(format!("Failed to create user: {}", e))
            }
        })?;

        Ok(User {
            id: conn.last_insert_rowid(),
            nickname: new_user.nickname.clone(),
            password_hash: new_user.password_hash.clone(),
            email: new_user.email.clone(),
            image_url: new_user.image_url.clone(),
            phone_number: new_user.phone_number.clone(),
            kakao_id: new_user.kakao_id.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Get user by ID.
    pub fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// Get user by phone number.
    pub fn get_user_by_phone(&self, phone_number: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE phone_number = ?1", USER_COLUMNS),
            params![phone_number],
            user_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// Get user by Kakao account ID.
    pub fn get_user_by_kakao_id(&self, kakao_id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE kakao_id = ?1", USER_COLUMNS),
            params![kakao_id],
            user_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let users = stmt
            .query_map([], user_from_row)
            .map_err(|e| AppError::Internal(format!("Failed to list users: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect users: {}", e)))?;

        Ok(users)
    }

    /// Update the password hash of the user with this phone number.
    pub fn update_user_password(&self, phone_number: &str, password_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE phone_number = ?3",
                params![password_hash, now_timestamp(), phone_number],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update password: {}", e)))?;
        Ok(rows > 0)
    }

    /// Delete the user with this phone number.
    pub fn delete_user(&self, phone_number: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM users WHERE phone_number = ?1",
                params![phone_number],
            )
            .map_err(|e| AppError::Internal(format!("Failed to delete user: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== SESSION OPERATIONS ==========

    /// Create session.
    pub fn create_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![session.token, session.user_id, session.expires_at],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create session: {}", e)))?;
        Ok(())
    }

    /// Get session by token.
    pub fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT token, user_id, expires_at FROM sessions WHERE token = ?1",
            params![token],
            |row| {
                Ok(Session {
                    token: row.get(0)?,
                    user_id: row.get(1)?,
                    expires_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get session: {}", e)))
    }

    /// Delete session.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .map_err(|e| AppError::Internal(format!("Failed to delete session: {}", e)))?;
        Ok(())
    }

    /// Remove expired sessions.
    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM sessions WHERE expires_at < ?1",
            params![now_timestamp()],
        )
        .map_err(|e| AppError::Internal(format!("Failed to cleanup sessions: {}", e)))
    }

    // ========== CATEGORY OPERATIONS ==========

    /// Get or create a category by name.
    pub fn ensure_category(&self, name: &str) -> Result<Category> {
        let conn = self.conn.lock();
        upsert_category(&conn, name)
    }

    /// List all categories.
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, name FROM categories ORDER BY name")
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let categories = stmt
            .query_map([], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .map_err(|e| AppError::Internal(format!("Failed to list categories: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect categories: {}", e)))?;

        Ok(categories)
    }

    // ========== BOOK OPERATIONS ==========

    /// Insert a book.
    pub fn create_book(&self, book: &NewBook) -> Result<Book> {
        let conn = self.conn.lock();
        insert_book(&conn, book)
    }

    /// Insert a batch of books with optional category names in one transaction.
    ///
    /// Categories are created on demand. Nothing is written if any book fails.
    pub fn import_books(&self, books: &[(NewBook, Option<String>)]) -> Result<Vec<Book>> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        let mut created = Vec::with_capacity(books.len());
        for (book, category) in books {
            let book = match category {
                Some(name) => NewBook {
                    category_id: Some(upsert_category(&tx, name)?.id),
                    ..book.clone()
                },
                None => book.clone(),
            };
            created.push(insert_book(&tx, &book)?);
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit import: {}", e)))?;

        Ok(created)
    }

    /// Get book by ID.
    pub fn get_book(&self, id: i64) -> Result<Option<Book>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM books b WHERE b.id = ?1", BOOK_COLUMNS),
            params![id],
            book_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get book: {}", e)))
    }

    /// Get book with category name, review count and reader count.
    pub fn get_book_detail(&self, id: i64) -> Result<Option<BookDetail>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "SELECT {},
                        c.name,
                        (SELECT COUNT(*) FROM reviews r WHERE r.book_id = b.id),
                        (SELECT COUNT(DISTINCT ub.user_id) FROM user_books ub WHERE ub.book_id = b.id)
                 FROM books b LEFT JOIN categories c ON c.id = b.category_id
                 WHERE b.id = ?1",
                BOOK_COLUMNS
            ),
            params![id],
            |row| {
                Ok(BookDetail {
                    book: book_from_row(row)?,
                    category: row.get(12)?,
                    review_count: row.get(13)?,
                    reader_count: row.get(14)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get book detail: {}", e)))
    }

    /// Run a book query and collect the rows.
    fn query_books(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Book>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map(params, book_from_row)
            .map_err(|e| AppError::Internal(format!("Failed to query books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?;

        Ok(books)
    }

    /// List all books.
    pub fn list_books(&self) -> Result<Vec<Book>> {
        self.query_books(
            &format!("SELECT {} FROM books b ORDER BY b.id", BOOK_COLUMNS),
            [],
        )
    }

    /// Case-insensitive substring search, OR-combined over the given fields.
    pub fn search_books(
        &self,
        author: Option<&str>,
        title: Option<&str>,
        company: Option<&str>,
    ) -> Result<Vec<Book>> {
        let mut conditions = Vec::new();
        let mut values = Vec::new();

        for (column, value) in [("b.author", author), ("b.title", title), ("b.company", company)] {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                values.push(like_pattern(value));
                conditions.push(format!(
                    "LOWER({}) LIKE ?{} ESCAPE '\\'",
                    column,
                    values.len()
                ));
            }
        }

        if conditions.is_empty() {
            return Ok(Vec::new());
        }

        self.query_books(
            &format!(
                "SELECT {} FROM books b WHERE {} ORDER BY b.id",
                BOOK_COLUMNS,
                conditions.join(" OR ")
            ),
            params_from_iter(values.iter()),
        )
    }

    /// Books published between two dates (inclusive), newest first.
    pub fn books_published_between(&self, from: &str, to: &str, limit: i64) -> Result<Vec<Book>> {
        self.query_books(
            &format!(
                "SELECT {} FROM books b
                 WHERE b.publication_date BETWEEN ?1 AND ?2
                 ORDER BY b.publication_date DESC, b.id DESC
                 LIMIT ?3",
                BOOK_COLUMNS
            ),
            params![from, to, limit],
        )
    }

    /// Books published after a date, soonest first.
    pub fn books_published_after(&self, date: &str, limit: i64) -> Result<Vec<Book>> {
        self.query_books(
            &format!(
                "SELECT {} FROM books b
                 WHERE b.publication_date > ?1
                 ORDER BY b.publication_date ASC, b.id ASC
                 LIMIT ?2",
                BOOK_COLUMNS
            ),
            params![date, limit],
        )
    }

    /// Books that have a cover image.
    pub fn books_with_cover(&self, limit: i64) -> Result<Vec<Book>> {
        self.query_books(
            &format!(
                "SELECT {} FROM books b
                 WHERE b.image_url IS NOT NULL AND b.image_url <> ''
                 ORDER BY b.id
                 LIMIT ?1",
                BOOK_COLUMNS
            ),
            params![limit],
        )
    }

    /// Books ordered by number of distinct readers.
    pub fn best_sellers(&self, limit: i64) -> Result<Vec<Book>> {
        self.query_books(
            &format!(
                "SELECT {} FROM books b
                 LEFT JOIN user_books ub ON ub.book_id = b.id
                 GROUP BY b.id
                 ORDER BY COUNT(DISTINCT ub.user_id) DESC, b.id ASC
                 LIMIT ?1",
                BOOK_COLUMNS
            ),
            params![limit],
        )
    }

    /// Newest book published on or before `today`, optionally within a category.
    pub fn newest_book(&self, category_id: Option<i64>, today: &str) -> Result<Option<Book>> {
        let books = match category_id {
            Some(category_id) => self.query_books(
                &format!(
                    "SELECT {} FROM books b
                     WHERE b.category_id = ?1 AND b.publication_date <= ?2
                     ORDER BY b.publication_date DESC, b.id DESC
                     LIMIT 1",
                    BOOK_COLUMNS
                ),
                params![category_id, today],
            )?,
            None => self.query_books(
                &format!(
                    "SELECT {} FROM books b
                     WHERE b.publication_date <= ?1
                     ORDER BY b.publication_date DESC, b.id DESC
                     LIMIT 1",
                    BOOK_COLUMNS
                ),
                params![today],
            )?,
        };

        Ok(books.into_iter().next())
    }

    // ========== PROGRESS OPERATIONS ==========

    /// Record one reading attempt.
    pub fn add_progress(
        &self,
        user_id: i64,
        book_id: i64,
        pages_read: i64,
        time: i64,
    ) -> Result<UserBook> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        let exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM books WHERE id = ?1)",
                params![book_id],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Internal(format!("Failed to check book: {}", e)))?;
        if !exists {
            return Err(AppError::NotExist(Resource::Book));
        }

        let now = now_timestamp();
        tx.execute(
            "INSERT INTO user_books (user_id, book_id, pages_read, time_minutes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, book_id, pages_read, time, now],
        )
        .map_err(|e| AppError::Internal(format!("Failed to save progress: {}", e)))?;
        let id = tx.last_insert_rowid();

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit progress: {}", e)))?;

        Ok(UserBook {
            id,
            user_id,
            book_id,
            pages_read,
            time,
            created_at: now,
        })
    }

    /// Category of a book; `None` when the book is unknown or uncategorized.
    pub fn get_book_category(&self, book_id: i64) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        let category: Option<Option<i64>> = conn
            .query_row(
                "SELECT category_id FROM books WHERE id = ?1",
                params![book_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to get book category: {}", e)))?;
        Ok(category.flatten())
    }

    /// Run a progress aggregate filtered by `filter` (a condition on `ub`/`b`).
    fn progress_aggregate(&self, filter: &str, id: i64) -> Result<ProgressAggregate> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN ub.pages_read >= b.page_count THEN 1 ELSE 0 END), 0),
                        AVG(CASE WHEN ub.pages_read >= b.page_count THEN ub.time_minutes END)
                 FROM user_books ub JOIN books b ON b.id = ub.book_id
                 WHERE {}",
                filter
            ),
            params![id],
            |row| {
                Ok(ProgressAggregate {
                    total: row.get(0)?,
                    completed: row.get(1)?,
                    avg_completed_time: row.get(2)?,
                })
            },
        )
        .map_err(|e| AppError::Internal(format!("Failed to aggregate progress: {}", e)))
    }

    /// Completion counts for one book.
    pub fn book_progress_aggregate(&self, book_id: i64) -> Result<ProgressAggregate> {
        self.progress_aggregate("ub.book_id = ?1", book_id)
    }

    /// Completion counts across every book of a category.
    pub fn category_progress_aggregate(&self, category_id: i64) -> Result<ProgressAggregate> {
        self.progress_aggregate("b.category_id = ?1", category_id)
    }

    /// Number of progress rows and total minutes for a user.
    pub fn user_reading_totals(&self, user_id: i64) -> Result<ReadingTotals> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(time_minutes), 0) FROM user_books WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(ReadingTotals {
                    book_count: row.get(0)?,
                    total_time: row.get(1)?,
                })
            },
        )
        .map_err(|e| AppError::Internal(format!("Failed to get reading totals: {}", e)))
    }

    /// Category the user has the most progress rows in.
    pub fn user_top_category(&self, user_id: i64) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT b.category_id
             FROM user_books ub JOIN books b ON b.id = ub.book_id
             WHERE ub.user_id = ?1 AND b.category_id IS NOT NULL
             GROUP BY b.category_id
             ORDER BY COUNT(*) DESC, b.category_id ASC
             LIMIT 1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get top category: {}", e)))
    }

    // ========== REVIEW OPERATIONS ==========

    /// Create a review on an existing book.
    pub fn create_review(&self, user_id: i64, book_id: i64, contents: &str) -> Result<Review> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        let exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM books WHERE id = ?1)",
                params![book_id],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Internal(format!("Failed to check book: {}", e)))?;
        if !exists {
            return Err(AppError::NotExist(Resource::Book));
        }

        let now = now_timestamp();
        tx.execute(
            "INSERT INTO reviews (user_id, book_id, contents, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, book_id, contents, now],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create review: {}", e)))?;
        let id = tx.last_insert_rowid();

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit review: {}", e)))?;

        Ok(Review {
            id,
            user_id,
            book_id,
            contents: contents.to_string(),
            created_at: now,
        })
    }

    /// Get review by ID.
    pub fn get_review(&self, id: i64) -> Result<Option<Review>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, user_id, book_id, contents, created_at FROM reviews WHERE id = ?1",
            params![id],
            |row| {
                Ok(Review {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    book_id: row.get(2)?,
                    contents: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get review: {}", e)))
    }

    /// Reviews of a book with author info, oldest first.
    pub fn list_reviews(&self, book_id: i64) -> Result<Vec<ReviewEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT r.id, r.user_id, r.book_id, r.contents, r.created_at,
                        u.nickname, u.image_url,
                        (SELECT COUNT(*) FROM likes l WHERE l.review_id = r.id)
                 FROM reviews r JOIN users u ON u.id = r.user_id
                 WHERE r.book_id = ?1
                 ORDER BY r.created_at, r.id",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let reviews = stmt
            .query_map(params![book_id], |row| {
                Ok(ReviewEntry {
                    review: Review {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        book_id: row.get(2)?,
                        contents: row.get(3)?,
                        created_at: row.get(4)?,
                    },
                    nickname: row.get(5)?,
                    user_image: row.get(6)?,
                    like_count: row.get(7)?,
                })
            })
            .map_err(|e| AppError::Internal(format!("Failed to get reviews: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect reviews: {}", e)))?;

        Ok(reviews)
    }

    /// Delete a review of `book_id` written by `user_id`.
    pub fn delete_review(&self, review_id: i64, book_id: i64, user_id: i64) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        let author: i64 = tx
            .query_row(
                "SELECT user_id FROM reviews WHERE id = ?1 AND book_id = ?2",
                params![review_id, book_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to get review: {}", e)))?
            .ok_or(AppError::NotExist(Resource::Review))?;

        if author != user_id {
            return Err(AppError::Unauthorized);
        }

        tx.execute("DELETE FROM reviews WHERE id = ?1", params![review_id])
            .map_err(|e| AppError::Internal(format!("Failed to delete review: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit review delete: {}", e)))?;
        Ok(())
    }

    // ========== LIKE OPERATIONS ==========

    /// Toggle a like. Returns `true` when the review is now liked.
    pub fn toggle_like(&self, user_id: i64, review_id: i64) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        let exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM reviews WHERE id = ?1)",
                params![review_id],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Internal(format!("Failed to check review: {}", e)))?;
        if !exists {
            return Err(AppError::NotExist(Resource::Review));
        }

        let removed = tx
            .execute(
                "DELETE FROM likes WHERE user_id = ?1 AND review_id = ?2",
                params![user_id, review_id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to remove like: {}", e)))?;

        if removed == 0 {
            tx.execute(
                "INSERT INTO likes (user_id, review_id, created_at) VALUES (?1, ?2, ?3)",
                params![user_id, review_id, now_timestamp()],
            )
            .map_err(|e| AppError::Internal(format!("Failed to add like: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit like: {}", e)))?;
        Ok(removed == 0)
    }

    /// Number of likes on a review.
    pub fn count_likes(&self, review_id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM likes WHERE review_id = ?1",
            params![review_id],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Internal(format!("Failed to count likes: {}", e)))
    }

    // ========== LIBRARY OPERATIONS ==========

    /// Get the library owned by a user.
    pub fn get_library(&self, user_id: i64) -> Result<Option<Library>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, user_id, name, image_url FROM libraries WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(Library {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                    image_url: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get library: {}", e)))
    }

    /// Put a book on the user's shelf, creating the library named `library_name`
    /// if the user has none. Returns `true` when the library was created.
    pub fn add_to_library(&self, user_id: i64, library_name: &str, book_id: i64) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        let book_exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM books WHERE id = ?1)",
                params![book_id],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Internal(format!("Failed to check book: {}", e)))?;
        if !book_exists {
            return Err(AppError::NotExist(Resource::Book));
        }

        let now = now_timestamp();
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM libraries WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to get library: {}", e)))?;

        let (library_id, created) = match existing {
            Some(id) => (id, false),
            None => {
                tx.execute(
                    "INSERT INTO libraries (user_id, name, created_at) VALUES (?1, ?2, ?3)",
                    params![user_id, library_name, now],
                )
                .map_err(|e| AppError::Internal(format!("Failed to create library: {}", e)))?;
                (tx.last_insert_rowid(), true)
            }
        };

        let shelved: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM library_books WHERE library_id = ?1 AND book_id = ?2)",
                params![library_id, book_id],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Internal(format!("Failed to check shelf: {}", e)))?;
        if shelved {
            return Err(AppError::Conflict("ALREADY_EXIST"));
        }

        tx.execute(
            "INSERT INTO library_books (library_id, book_id, created_at) VALUES (?1, ?2, ?3)",
            params![library_id, book_id, now],
        )
        .map_err(|e| AppError::Internal(format!("Failed to shelve book: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit shelf: {}", e)))?;
        Ok(created)
    }

    /// Books on a user's shelf in the requested order.
    pub fn list_library_books(&self, user_id: i64, order: ShelfOrder) -> Result<Vec<ShelvedBook>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {}, lb.created_at
                 FROM library_books lb
                 JOIN libraries l ON l.id = lb.library_id
                 JOIN books b ON b.id = lb.book_id
                 WHERE l.user_id = ?1
                 ORDER BY {}",
                BOOK_COLUMNS,
                order.order_clause()
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map(params![user_id], |row| {
                Ok(ShelvedBook {
                    book: book_from_row(row)?,
                    added_at: row.get(12)?,
                })
            })
            .map_err(|e| AppError::Internal(format!("Failed to get shelf: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect shelf: {}", e)))?;

        Ok(books)
    }

    // ========== SMS OPERATIONS ==========

    /// Store a fresh code for a phone number, replacing any previous one.
    pub fn save_sms_request(&self, phone_number: &str, auth_number: u32) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sms_auth_requests (phone_number, auth_number, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (phone_number) DO UPDATE SET
                auth_number = excluded.auth_number,
                updated_at = excluded.updated_at",
            params![phone_number, auth_number, now_timestamp()],
        )
        .map_err(|e| AppError::Internal(format!("Failed to save sms request: {}", e)))?;
        Ok(())
    }

    /// Get the pending code for a phone number.
    pub fn get_sms_request(&self, phone_number: &str) -> Result<Option<SmsAuthRequest>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT phone_number, auth_number, updated_at FROM sms_auth_requests
             WHERE phone_number = ?1",
            params![phone_number],
            |row| {
                Ok(SmsAuthRequest {
                    phone_number: row.get(0)?,
                    auth_number: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get sms request: {}", e)))
    }

    /// Whether the code matches one issued at or after `since`.
    pub fn check_sms_request(&self, phone_number: &str, auth_number: u32, since: i64) -> Result<bool> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sms_auth_requests
                           WHERE phone_number = ?1 AND auth_number = ?2 AND updated_at >= ?3)",
            params![phone_number, auth_number, since],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Internal(format!("Failed to check sms request: {}", e)))
    }
}
