//! Record identifiers and candidate descriptors.
//!
//! Every identifier that ends up in an outbound request or a filesystem path
//! is parsed through this module first. [`RecordId`] and [`BitstreamRef`] can
//! only be constructed by parsing, so holding one means the value is valid.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

/// Date format accepted for run-level date filters.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Base URL used for the `Handle` column of exported rows.
pub const HANDLE_URL_BASE: &str = "http://hdl.handle.net/";

/// Malformed identifier or date.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Value is not `<prefix>/<suffix>` with two positive integers.
    #[error("invalid handle {value:?}: expected <prefix>/<suffix>, e.g. 10754/123456")]
    Handle {
        /// The rejected input.
        value: String,
    },

    /// Value is not a canonical hyphenated UUID.
    #[error("invalid bitstream reference {value:?}: expected a canonical UUID")]
    BitstreamRef {
        /// The rejected input.
        value: String,
    },

    /// Repository object id (item, bundle) is not a canonical UUID.
    #[error("invalid object id {value:?}: expected a canonical UUID")]
    ObjectUuid {
        /// The rejected input.
        value: String,
    },

    /// Value is not a `YYYY-MM-DD` calendar date.
    #[error("invalid date {value:?}: expected format YYYY-MM-DD")]
    Date {
        /// The rejected input.
        value: String,
    },
}

/// Stable repository identifier (`<prefix>/<suffix>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    prefix: String,
    suffix: String,
}

impl RecordId {
    /// Parses a handle of the form `10754/123456`.
    ///
    /// Both parts must be ASCII digits only and greater than zero; signs,
    /// whitespace and extra separators are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Handle`] for anything else.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::Handle {
            value: value.to_string(),
        };
        let (prefix, suffix) = value.split_once('/').ok_or_else(invalid)?;
        if !is_positive_integer(prefix) || !is_positive_integer(suffix) {
            return Err(invalid());
        }
        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    /// Extracts the handle from a ledger `Handle` cell.
    ///
    /// Accepts both the resolver URL form (`http://hdl.handle.net/10754/1`)
    /// and a bare handle (`10754/1`).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Handle`] when the trailing two path segments
    /// are not a valid handle.
    pub fn from_handle_url(value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim().trim_end_matches('/');
        let mut parts = trimmed.rsplitn(3, '/');
        match (parts.next(), parts.next()) {
            (Some(suffix), Some(prefix)) => Self::parse(&format!("{prefix}/{suffix}")),
            _ => Err(ValidationError::Handle {
                value: value.to_string(),
            }),
        }
    }

    /// Numeric naming authority part.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Numeric item part, used for output file names.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Resolver URL written to the ledger.
    #[must_use]
    pub fn handle_url(&self) -> String {
        format!("{HANDLE_URL_BASE}{self}")
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix, self.suffix)
    }
}

impl FromStr for RecordId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_positive_integer(part: &str) -> bool {
    !part.is_empty()
        && part.bytes().all(|b| b.is_ascii_digit())
        && part.bytes().any(|b| b != b'0')
}

/// Reference to one bitstream (file) in the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitstreamRef(Uuid);

impl BitstreamRef {
    /// Parses a canonical hyphenated UUID (`8-4-4-4-12` hex digits).
    ///
    /// Braced, URN and simple (unhyphenated) forms are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::BitstreamRef`] for anything else.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        parse_canonical_uuid(value)
            .map(Self)
            .ok_or_else(|| ValidationError::BitstreamRef {
                value: value.to_string(),
            })
    }
}

impl fmt::Display for BitstreamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Id of a non-bitstream repository object (item or bundle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectUuid(Uuid);

impl ObjectUuid {
    /// Parses a canonical hyphenated UUID.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ObjectUuid`] for anything else.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        parse_canonical_uuid(value)
            .map(Self)
            .ok_or_else(|| ValidationError::ObjectUuid {
                value: value.to_string(),
            })
    }
}

impl fmt::Display for ObjectUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

fn parse_canonical_uuid(value: &str) -> Option<Uuid> {
    if value.len() != 36 {
        return None;
    }
    Uuid::parse_str(value).ok()
}

/// Validates a `YYYY-MM-DD` date filter.
///
/// # Errors
///
/// Returns [`ValidationError::Date`] when the value is not a real calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| ValidationError::Date {
        value: value.to_string(),
    })
}

/// One record proposed for export by the candidate query.
///
/// The handle is kept as the raw string the query produced; the exporter
/// validates it so a malformed row is skipped instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    /// Raw handle as stored in the metadata database.
    pub handle: String,
    /// Active embargo; embargoed records are never exported.
    pub embargoed: bool,
    /// When the record (or its newest file) was added, if known.
    pub created: Option<String>,
}

impl CandidateRecord {
    /// Convenience constructor for an unembargoed candidate.
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            embargoed: false,
            created: None,
        }
    }

    /// Marks the candidate as embargoed.
    #[must_use]
    pub fn embargoed(mut self) -> Self {
        self.embargoed = true;
        self
    }
}
