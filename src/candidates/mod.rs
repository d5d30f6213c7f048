//! Candidate selection: which records a run should try to export.
//!
//! A [`CandidateSource`] turns a [`CandidateFilter`] into an ordered list of
//! [`CandidateRecord`]s. Handles are passed through unvalidated; the exporter
//! validates each one and skips malformed entries.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::record::{CandidateRecord, RecordId};

mod db;
mod error;

pub use db::DatabaseCandidateSource;
pub use error::CandidateError;

/// Record types eligible for export (`dc.type` values).
pub const EXPORT_TYPES: [&str; 11] = [
    "Article",
    "Book",
    "Book Chapter",
    "Conference Paper",
    "Dissertation",
    "Patent",
    "Preprint",
    "Protocol",
    "Report",
    "Technical Report",
    "Thesis",
];

/// Selection criteria for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFilter {
    /// Communities whose records are eligible.
    pub communities: Vec<RecordId>,
    /// Only records that gained a file on or after this date.
    pub start: Option<NaiveDate>,
    /// Only records that gained a file on or before this date.
    pub end: Option<NaiveDate>,
    /// Reference date for embargo checks.
    pub today: NaiveDate,
}

impl CandidateFilter {
    /// Creates an unbounded filter over `communities`, embargo-checked against today.
    #[must_use]
    pub fn new(communities: Vec<RecordId>) -> Self {
        Self {
            communities,
            start: None,
            end: None,
            today: chrono::Local::now().date_naive(),
        }
    }

    /// Sets the optional date window.
    #[must_use]
    pub fn with_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Overrides the embargo reference date.
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Checks that the window is not empty.
    ///
    /// # Errors
    ///
    /// Returns [`CandidateError::InvalidRange`] when `start` is after `end`.
    pub fn validate(&self) -> Result<(), CandidateError> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start > end => {
                Err(CandidateError::InvalidRange { start, end })
            }
            _ => Ok(()),
        }
    }
}

/// Producer of export candidates.
///
/// The list is materialized once per run; the exporter consumes it in order.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Returns the candidates matching `filter`, embargo flags set.
    async fn candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<CandidateRecord>, CandidateError>;
}

#[async_trait]
impl CandidateSource for Vec<CandidateRecord> {
    async fn candidates(
        &self,
        _filter: &CandidateFilter,
    ) -> Result<Vec<CandidateRecord>, CandidateError> {
        Ok(self.clone())
    }
}
