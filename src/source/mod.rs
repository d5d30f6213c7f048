//! Content source: record metadata and PDF bitstreams from the repository API.
//!
//! The exporter talks to the repository only through the [`ContentSource`]
//! trait. [`RepositoryClient`] is the HTTP implementation; tests substitute
//! in-memory fakes.
//!
//! # Features
//!
//! - Unauthenticated first, bearer-token login only on a 401/403
//! - One cached session per client, renewed when it expires
//! - Exponential backoff with jitter for transient failures (3 attempts by default)
//! - Size cap enforced before and during the body read (100 MiB by default)
//!
//! # Example
//!
//! ```no_run
//! use libsafe_export::record::RecordId;
//! use libsafe_export::source::{ContentSource, RepositoryClient};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = Url::parse("https://repository.example.edu/server/api/")?;
//! let mut client = RepositoryClient::new(api)?;
//! let id = RecordId::parse("10754/662345")?;
//! let metadata = client.fetch_metadata(&id).await?;
//! let pdf = client.fetch_primary_bitstream(&metadata).await?;
//! println!("{} bytes", pdf.content_length);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::record::{BitstreamRef, RecordId};

mod client;
pub mod constants;
mod error;
mod metadata;
mod retry;
mod session;

pub use client::RepositoryClient;
pub use error::SourceError;
pub use metadata::{BitstreamCandidate, RecordMetadata};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error,
    parse_retry_after,
};
pub use session::{AuthSession, Credentials};

/// A downloaded bitstream held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    /// Body bytes.
    pub bytes: Vec<u8>,
    /// Number of bytes received.
    pub content_length: u64,
    /// The bitstream that was downloaded.
    pub bitstream: BitstreamRef,
    /// Bundle the bitstream came from.
    pub bundle_name: String,
    /// Repository file name, when known.
    pub file_name: Option<String>,
}

/// Read access to repository records.
///
/// Methods take `&mut self` because implementations may cache an
/// authenticated session between calls.
#[async_trait]
pub trait ContentSource: Send {
    /// Resolves a handle to its item and metadata fields.
    async fn fetch_metadata(&mut self, id: &RecordId) -> Result<RecordMetadata, SourceError>;

    /// Downloads one bitstream's content.
    async fn fetch_bitstream(
        &mut self,
        bitstream: &BitstreamRef,
    ) -> Result<DownloadResult, SourceError>;

    /// Downloads the record's primary PDF from its ORIGINAL bundle.
    ///
    /// When several PDFs exist the first one that downloads is returned.
    async fn fetch_primary_bitstream(
        &mut self,
        metadata: &RecordMetadata,
    ) -> Result<DownloadResult, SourceError>;
}
