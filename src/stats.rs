//! Completion rate and expected reading time per book and per category.
//!
//! A progress row is complete when `pages_read >= page_count`. Expected
//! reading time is the mean `time` of complete rows only.

use crate::db::{Database, ProgressAggregate};
use crate::error::Result;
use serde::Serialize;

/// Reading numbers shown on a book page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReadingNumeric {
    /// Percentage of attempts on this book that were completed.
    pub avg_finish: f64,
    /// Mean minutes of completed attempts, truncated.
    pub expected_reading_minutes: i64,
    /// Same percentage across the book's category.
    pub category_avg_finish: f64,
    /// Same mean across the book's category.
    pub category_expected_reading_minutes: i64,
}

/// Completion rate (percent) and expected minutes for one aggregate.
pub fn completion_metrics(aggregate: &ProgressAggregate) -> (f64, i64) {
    if aggregate.total == 0 || aggregate.completed == 0 {
        return (0.0, 0);
    }

    let rate = aggregate.completed as f64 / aggregate.total as f64 * 100.0;
    let minutes = aggregate.avg_completed_time.unwrap_or(0.0).trunc() as i64;
    (rate, minutes)
}

/// Reading numbers for a book.
///
/// A book nobody has read and a book id that does not exist both yield the
/// zeroed default; callers that need to tell them apart check the book first.
pub fn reading_numeric(db: &Database, book_id: i64) -> Result<ReadingNumeric> {
    let book = db.book_progress_aggregate(book_id)?;
    if book.total == 0 {
        return Ok(ReadingNumeric::default());
    }

    let (avg_finish, expected_reading_minutes) = completion_metrics(&book);

    let (category_avg_finish, category_expected_reading_minutes) =
        match db.get_book_category(book_id)? {
            Some(category_id) => completion_metrics(&db.category_progress_aggregate(category_id)?),
            None => (0.0, 0),
        };

    Ok(ReadingNumeric {
        avg_finish,
        expected_reading_minutes,
        category_avg_finish,
        category_expected_reading_minutes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_empty() {
        assert_eq!(completion_metrics(&ProgressAggregate::default()), (0.0, 0));
    }

    #[test]
    fn test_metrics_none_completed() {
        let aggregate = ProgressAggregate {
            total: 3,
            completed: 0,
            avg_completed_time: None,
        };
        assert_eq!(completion_metrics(&aggregate), (0.0, 0));
    }

    #[test]
    fn test_metrics_truncates_minutes() {
        let aggregate = ProgressAggregate {
            total: 4,
            completed: 1,
            avg_completed_time: Some(277.5),
        };
        assert_eq!(completion_metrics(&aggregate), (25.0, 277));
    }
}
