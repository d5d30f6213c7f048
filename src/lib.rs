//! libsafe export library
//!
//! Incremental, resumable export of repository records into a flat
//! `metadata.csv` plus one PDF per record, for the libsafe archive.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`record`] - Validated identifiers (handles, bitstream ids) and candidates
//! - [`source`] - Repository REST client with retry and login fallback
//! - [`store`] - Append-only ledger and atomic file writes
//! - [`export`] - The resumable per-record pipeline
//! - [`candidates`] - Candidate selection from the metadata database
//! - [`config`] - Environment-driven run configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod candidates;
pub mod config;
pub mod export;
pub mod record;
pub mod source;
pub mod store;
#[cfg(test)]
pub(crate) mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use candidates::{
    CandidateError, CandidateFilter, CandidateSource, DatabaseCandidateSource, EXPORT_TYPES,
};
pub use config::{ConfigError, ExportConfig};
pub use export::{
    ExportError, ExportSummary, FailureStage, RecordOutcome, ResumableBatchExporter, SkipReason,
    build_row,
};
pub use record::{BitstreamRef, CandidateRecord, ObjectUuid, RecordId, ValidationError};
pub use source::{
    AuthSession, ContentSource, Credentials, DownloadResult, FailureType, RecordMetadata,
    RepositoryClient, RetryDecision, RetryPolicy, SourceError, classify_error,
};
pub use store::{ExportedRow, LEDGER_FILE_NAME, OutputStore, StoreError};
