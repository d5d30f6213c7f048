//! Error types for candidate selection.

use thiserror::Error;

/// Errors raised while producing the candidate list.
#[derive(Debug, Error)]
pub enum CandidateError {
    /// Connecting to or querying the metadata database failed.
    #[error("metadata database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row came back in a shape the query does not expect.
    #[error("unexpected candidate row: {reason}")]
    InvalidRow {
        /// What was wrong with the row.
        reason: String,
    },

    /// The date window is empty.
    #[error("start date {start} is after end date {end}")]
    InvalidRange {
        /// Requested lower bound.
        start: chrono::NaiveDate,
        /// Requested upper bound.
        end: chrono::NaiveDate,
    },
}
