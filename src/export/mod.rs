//! Resumable batch export.
//!
//! [`ResumableBatchExporter`] walks the candidate list strictly in order, one
//! record at a time:
//!
//! 1. embargoed candidates are skipped
//! 2. the handle is validated (malformed ones are skipped)
//! 3. records already in the ledger are skipped
//! 4. metadata, then the primary PDF, are fetched
//! 5. the PDF is written, then the ledger row is appended
//!
//! A failure in steps 4-5 marks only that record failed. The exception is the
//! ledger append: a row that cannot be made durable stops the run.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::candidates::{CandidateError, CandidateFilter, CandidateSource};
use crate::record::{CandidateRecord, RecordId};
use crate::source::{ContentSource, SourceError};
use crate::store::{OutputStore, StoreError};

mod progress;
mod row;

pub use row::{VALUE_SEPARATOR, build_row};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum ExportError {
    /// A ledger row could not be made durable.
    #[error("ledger write failed, stopping run: {0}")]
    Ledger(#[source] StoreError),

    /// The candidate list could not be produced.
    #[error("could not load export candidates: {0}")]
    Candidates(#[from] CandidateError),
}

/// Why a candidate was skipped without contacting the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The ledger already has a row for it.
    AlreadyDone,
    /// Under an active embargo.
    Embargoed,
    /// The handle is malformed.
    ValidationFailed,
}

/// Step at which a record failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Resolving the handle / reading metadata.
    Metadata,
    /// Finding or downloading the PDF.
    Bitstream,
    /// Writing the PDF to the export directory.
    Write,
}

/// Result of processing one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// File written and ledger row appended.
    Exported {
        /// The exported record.
        id: RecordId,
        /// Where the PDF landed.
        path: PathBuf,
    },
    /// Nothing was attempted.
    Skipped(SkipReason),
    /// The record was attempted and nothing was persisted.
    Failed {
        /// The record that failed.
        id: RecordId,
        /// Where it failed.
        stage: FailureStage,
        /// Error description.
        message: String,
    },
}

/// Totals for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Candidates consumed.
    pub candidates: usize,
    /// Records exported in this run.
    pub exported: usize,
    /// Skipped because the ledger already had them.
    pub already_done: usize,
    /// Skipped because of an active embargo.
    pub embargoed: usize,
    /// Skipped because the handle did not validate.
    pub invalid: usize,
    /// Attempted and failed.
    pub failed: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
    /// Ledger file.
    pub ledger_path: PathBuf,
    /// Export cap for this run, if any.
    pub limit: Option<usize>,
    /// True when the run stopped because the cap was reached.
    pub limit_reached: bool,
}

impl ExportSummary {
    fn new(ledger_path: PathBuf, limit: Option<usize>) -> Self {
        Self {
            candidates: 0,
            exported: 0,
            already_done: 0,
            embargoed: 0,
            invalid: 0,
            failed: 0,
            elapsed: Duration::ZERO,
            ledger_path,
            limit,
            limit_reached: false,
        }
    }

    /// Total skipped for any reason.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.already_done + self.embargoed + self.invalid
    }

    fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Exported { .. } => self.exported += 1,
            RecordOutcome::Skipped(SkipReason::AlreadyDone) => self.already_done += 1,
            RecordOutcome::Skipped(SkipReason::Embargoed) => self.embargoed += 1,
            RecordOutcome::Skipped(SkipReason::ValidationFailed) => self.invalid += 1,
            RecordOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Drives a [`ContentSource`] into an [`OutputStore`].
#[derive(Debug)]
pub struct ResumableBatchExporter<S> {
    source: S,
    store: OutputStore,
    limit: Option<usize>,
    show_progress: bool,
}

impl<S: ContentSource> ResumableBatchExporter<S> {
    /// Creates an exporter with no limit and no progress bar.
    pub fn new(source: S, store: OutputStore) -> Self {
        Self {
            source,
            store,
            limit: None,
            show_progress: false,
        }
    }

    /// Stops the run after `limit` exports; `0` means unlimited.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    /// Enables the terminal progress bar.
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// The output store.
    #[must_use]
    pub fn store(&self) -> &OutputStore {
        &self.store
    }

    /// The content source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Consumes the exporter, returning its parts.
    pub fn into_parts(self) -> (S, OutputStore) {
        (self.source, self.store)
    }

    /// Loads candidates from `candidates` and runs the export.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Candidates`] when the candidate list cannot be
    /// produced, or [`ExportError::Ledger`] as described in [`run`](Self::run).
    pub async fn run_from(
        &mut self,
        candidates: &dyn CandidateSource,
        filter: &CandidateFilter,
    ) -> Result<ExportSummary, ExportError> {
        let list = candidates.candidates(filter).await?;
        self.run(list).await
    }

    /// Processes candidates in order until they run out or the limit is hit.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Ledger`] when a ledger row cannot be appended.
    /// Records finished before that point stay exported.
    pub async fn run<I>(&mut self, candidates: I) -> Result<ExportSummary, ExportError>
    where
        I: IntoIterator<Item = CandidateRecord>,
        I::IntoIter: Send,
    {
        let started = Instant::now();
        let candidates = candidates.into_iter();
        let (lower, upper) = candidates.size_hint();
        let bar = progress::export_progress_bar(self.show_progress, upper.unwrap_or(lower));
        let mut summary = ExportSummary::new(self.store.ledger_path().to_path_buf(), self.limit);

        info!(
            already_done = self.store.len(),
            limit = ?self.limit,
            "starting export run"
        );

        for candidate in candidates {
            if self.limit_reached(&summary) {
                info!(limit = ?self.limit, "export limit reached");
                break;
            }

            summary.candidates += 1;
            bar.set_message(candidate.handle.clone());

            let outcome = match self.process_record(&candidate).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    bar.abandon_with_message(format!("stopped: {error}"));
                    return Err(error);
                }
            };
            summary.record(&outcome);
            bar.inc(1);
        }

        bar.finish_and_clear();
        summary.limit_reached = self.limit_reached(&summary);
        summary.elapsed = started.elapsed();

        info!(
            candidates = summary.candidates,
            exported = summary.exported,
            skipped = summary.skipped(),
            already_done = summary.already_done,
            embargoed = summary.embargoed,
            invalid = summary.invalid,
            failed = summary.failed,
            elapsed_ms = summary.elapsed.as_millis(),
            ledger = %summary.ledger_path.display(),
            limit_reached = summary.limit_reached,
            "export run finished"
        );
        Ok(summary)
    }

    fn limit_reached(&self, summary: &ExportSummary) -> bool {
        self.limit.is_some_and(|limit| summary.exported >= limit)
    }

    /// Processes one candidate.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Ledger`] only when the ledger append fails;
    /// every other problem is reported as [`RecordOutcome::Failed`].
    #[instrument(skip(self, candidate), fields(handle = %candidate.handle))]
    pub async fn process_record(
        &mut self,
        candidate: &CandidateRecord,
    ) -> Result<RecordOutcome, ExportError> {
        if candidate.embargoed {
            debug!("skipping embargoed record");
            return Ok(RecordOutcome::Skipped(SkipReason::Embargoed));
        }

        let id = match RecordId::parse(&candidate.handle) {
            Ok(id) => id,
            Err(error) => {
                warn!(error = %error, "skipping candidate with invalid handle");
                return Ok(RecordOutcome::Skipped(SkipReason::ValidationFailed));
            }
        };

        if self.store.is_done(&id) {
            debug!("already exported");
            return Ok(RecordOutcome::Skipped(SkipReason::AlreadyDone));
        }

        let metadata = match self.source.fetch_metadata(&id).await {
            Ok(metadata) => metadata,
            Err(error) => return Ok(failed(id, FailureStage::Metadata, &error)),
        };

        let download = match self.source.fetch_primary_bitstream(&metadata).await {
            Ok(download) => download,
            Err(error) => return Ok(failed(id, FailureStage::Bitstream, &error)),
        };

        let path = match self.store.write_file(&id, &download.bytes).await {
            Ok(path) => path,
            Err(error) => {
                warn!(error = %error, "could not write PDF");
                return Ok(RecordOutcome::Failed {
                    id,
                    stage: FailureStage::Write,
                    message: error.to_string(),
                });
            }
        };

        let row = build_row(&metadata);
        self.store
            .append_row(&id, &row)
            .map_err(ExportError::Ledger)?;

        info!(
            bitstream = %download.bitstream,
            bytes = download.content_length,
            path = %path.display(),
            "record exported"
        );
        Ok(RecordOutcome::Exported { id, path })
    }
}

fn failed(id: RecordId, stage: FailureStage, error: &SourceError) -> RecordOutcome {
    warn!(stage = ?stage, kind = error.kind(), error = %error, "record failed");
    RecordOutcome::Failed {
        id,
        stage,
        message: error.to_string(),
    }
}
