//! Run configuration read from environment variables.
//!
//! [`ExportConfig`] is built once at startup and passed by reference. Parsing
//! goes through a lookup function so tests never touch the process
//! environment.

use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::record::RecordId;
use crate::source::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_MAX_CONTENT_LENGTH, READ_TIMEOUT_SECS,
};
use crate::source::{Credentials, DEFAULT_MAX_ATTEMPTS};

/// Repository REST API base URL (required).
pub const API_URL_VAR: &str = "REPOSITORY_API_URL";
/// Login e-mail for restricted content.
pub const USER_VAR: &str = "REPOSITORY_USER";
/// Password paired with the login e-mail.
pub const PASSWORD_VAR: &str = "REPOSITORY_PASSWORD";
/// Directory receiving `metadata.csv` and the PDFs.
pub const EXPORT_DIR_VAR: &str = "LIBSAFE_EXPORT_DIRECTORY";
/// Metadata database URL (`mysql://` or `sqlite:`).
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
/// Research community handle.
pub const RESEARCH_HANDLE_VAR: &str = "KAUST_RESEARCH_HANDLE";
/// Theses and dissertations community handle.
pub const ETD_HANDLE_VAR: &str = "KAUST_ETD_HANDLE";
/// Largest accepted PDF in bytes.
pub const MAX_FILE_SIZE_VAR: &str = "EXPORT_MAX_FILE_SIZE";
/// Attempts per request for transient failures.
pub const MAX_ATTEMPTS_VAR: &str = "EXPORT_MAX_ATTEMPTS";
/// TCP connect timeout in seconds.
pub const CONNECT_TIMEOUT_VAR: &str = "EXPORT_CONNECT_TIMEOUT_SECS";
/// Per-read timeout in seconds.
pub const READ_TIMEOUT_VAR: &str = "EXPORT_READ_TIMEOUT_SECS";

/// Default export directory.
pub const DEFAULT_EXPORT_DIR: &str = "/tmp/";
/// Default research community handle.
pub const DEFAULT_RESEARCH_HANDLE: &str = "10754/324602";
/// Default theses and dissertations community handle.
pub const DEFAULT_ETD_HANDLE: &str = "10754/124545";

const MAX_ATTEMPTS_RANGE: std::ops::RangeInclusive<u32> = 1..=10;
const TIMEOUT_RANGE: std::ops::RangeInclusive<u64> = 1..=3600;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required environment variable {var}")]
    Missing {
        /// Variable name.
        var: &'static str,
    },

    /// A variable is set but unusable.
    #[error("invalid value for {var}: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// What is wrong (never includes secret values).
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

/// Immutable settings for one export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Repository REST API base (ends in `/`).
    pub api_url: Url,
    /// Login used when anonymous access is refused.
    pub credentials: Option<Credentials>,
    /// Where `metadata.csv` and the PDFs go.
    pub export_dir: PathBuf,
    /// Metadata database for the candidate query.
    pub database_url: Option<String>,
    /// Research community handle.
    pub research_handle: RecordId,
    /// Theses and dissertations community handle.
    pub etd_handle: RecordId,
    /// Largest accepted PDF in bytes.
    pub max_file_size: u64,
    /// Attempts per request for transient failures.
    pub max_attempts: u32,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    pub read_timeout_secs: u64,
}

impl ExportConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`from_lookup`](Self::from_lookup).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `REPOSITORY_API_URL` is unset and
    /// [`ConfigError::Invalid`] for any value that does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_url = get(API_URL_VAR).ok_or(ConfigError::Missing { var: API_URL_VAR })?;
        let api_url = parse_api_url(&api_url)?;

        // Passwords are taken verbatim; surrounding spaces may be significant.
        let password = lookup(PASSWORD_VAR).filter(|p| !p.is_empty());
        let credentials = match (get(USER_VAR), password) {
            (Some(user), Some(password)) => Some(Credentials::new(user, password)),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::invalid(
                    PASSWORD_VAR,
                    format!("must be set together with {USER_VAR}"),
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::invalid(
                    USER_VAR,
                    format!("must be set together with {PASSWORD_VAR}"),
                ));
            }
        };

        let export_dir =
            PathBuf::from(get(EXPORT_DIR_VAR).unwrap_or_else(|| DEFAULT_EXPORT_DIR.to_string()));

        let research_handle = parse_handle(
            RESEARCH_HANDLE_VAR,
            get(RESEARCH_HANDLE_VAR).as_deref().unwrap_or(DEFAULT_RESEARCH_HANDLE),
        )?;
        let etd_handle = parse_handle(
            ETD_HANDLE_VAR,
            get(ETD_HANDLE_VAR).as_deref().unwrap_or(DEFAULT_ETD_HANDLE),
        )?;

        let max_file_size =
            parse_number(MAX_FILE_SIZE_VAR, get(MAX_FILE_SIZE_VAR), DEFAULT_MAX_CONTENT_LENGTH)?;
        if max_file_size == 0 {
            return Err(ConfigError::invalid(
                MAX_FILE_SIZE_VAR,
                "must be greater than 0",
            ));
        }

        let max_attempts =
            parse_number(MAX_ATTEMPTS_VAR, get(MAX_ATTEMPTS_VAR), DEFAULT_MAX_ATTEMPTS)?;
        check_range(MAX_ATTEMPTS_VAR, max_attempts, &MAX_ATTEMPTS_RANGE)?;

        let connect_timeout_secs =
            parse_number(CONNECT_TIMEOUT_VAR, get(CONNECT_TIMEOUT_VAR), CONNECT_TIMEOUT_SECS)?;
        check_range(CONNECT_TIMEOUT_VAR, connect_timeout_secs, &TIMEOUT_RANGE)?;
        let read_timeout_secs =
            parse_number(READ_TIMEOUT_VAR, get(READ_TIMEOUT_VAR), READ_TIMEOUT_SECS)?;
        check_range(READ_TIMEOUT_VAR, read_timeout_secs, &TIMEOUT_RANGE)?;

        Ok(Self {
            api_url,
            credentials,
            export_dir,
            database_url: get(DATABASE_URL_VAR),
            research_handle,
            etd_handle,
            max_file_size,
            max_attempts,
            connect_timeout_secs,
            read_timeout_secs,
        })
    }

    /// Communities whose records are exported.
    #[must_use]
    pub fn communities(&self) -> Vec<RecordId> {
        vec![self.research_handle.clone(), self.etd_handle.clone()]
    }

    /// The database URL, required by the binary.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `DATABASE_URL` is unset.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing { var: DATABASE_URL_VAR })
    }
}

fn parse_api_url(value: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(value).map_err(|e| ConfigError::invalid(API_URL_VAR, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(API_URL_VAR, "must be an http or https URL"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_handle(var: &'static str, value: &str) -> Result<RecordId, ConfigError> {
    RecordId::parse(value).map_err(|e| ConfigError::invalid(var, e.to_string()))
}

fn parse_number<T>(var: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(value) => value
            .parse()
            .map_err(|e| ConfigError::invalid(var, format!("{value:?}: {e}"))),
        None => Ok(default),
    }
}

fn check_range<T>(
    var: &'static str,
    value: T,
    range: &std::ops::RangeInclusive<T>,
) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            var,
            format!("{value}. Expected range: {}..={}", range.start(), range.end()),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ExportConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ExportConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_with_only_api_url() {
        let config = config(&[(API_URL_VAR, "https://repository.example.edu/server/api")]).unwrap();

        assert_eq!(config.api_url.as_str(), "https://repository.example.edu/server/api/");
        assert_eq!(config.export_dir, PathBuf::from("/tmp/"));
        assert!(config.credentials.is_none());
        assert!(config.database_url.is_none());
        assert_eq!(config.research_handle.to_string(), "10754/324602");
        assert_eq!(config.etd_handle.to_string(), "10754/124545");
        assert_eq!(config.max_file_size, 104_857_600);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.read_timeout_secs, 30);
        assert_eq!(config.communities().len(), 2);
    }

    #[test]
    fn test_missing_api_url() {
        assert_eq!(config(&[]), Err(ConfigError::Missing { var: API_URL_VAR }));
        assert_eq!(
            config(&[(API_URL_VAR, "   ")]),
            Err(ConfigError::Missing { var: API_URL_VAR })
        );
    }

    #[test]
    fn test_non_http_api_url_rejected() {
        let result = config(&[(API_URL_VAR, "ftp://repository.example.edu/")]);
        assert!(matches!(result, Err(ConfigError::Invalid { var: API_URL_VAR, .. })));
    }

    #[test]
    fn test_credentials_must_come_in_pairs() {
        let result = config(&[
            (API_URL_VAR, "https://repository.example.edu/server/api/"),
            (USER_VAR, "archivist@example.edu"),
        ]);
        assert!(matches!(result, Err(ConfigError::Invalid { var: PASSWORD_VAR, .. })));

        let config = config(&[
            (API_URL_VAR, "https://repository.example.edu/server/api/"),
            (USER_VAR, "archivist@example.edu"),
            (PASSWORD_VAR, " spaced secret "),
        ])
        .unwrap();
        let credentials = config.credentials.unwrap();
        assert_eq!(credentials.user, "archivist@example.edu");
        assert_eq!(credentials.password, " spaced secret ");
    }

    #[test]
    fn test_overrides_and_ranges() {
        let config = config(&[
            (API_URL_VAR, "https://repository.example.edu/server/api/"),
            (EXPORT_DIR_VAR, "/srv/libsafe"),
            (DATABASE_URL_VAR, "mysql://irts@db/irts"),
            (MAX_FILE_SIZE_VAR, "1048576"),
            (MAX_ATTEMPTS_VAR, "5"),
            (READ_TIMEOUT_VAR, "60"),
        ])
        .unwrap();
        assert_eq!(config.export_dir, PathBuf::from("/srv/libsafe"));
        assert_eq!(config.require_database_url().unwrap(), "mysql://irts@db/irts");
        assert_eq!(config.max_file_size, 1_048_576);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.read_timeout_secs, 60);
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let base = (API_URL_VAR, "https://repository.example.edu/server/api/");
        for (var, value) in [
            (MAX_ATTEMPTS_VAR, "0"),
            (MAX_ATTEMPTS_VAR, "11"),
            (MAX_ATTEMPTS_VAR, "three"),
            (MAX_FILE_SIZE_VAR, "0"),
            (MAX_FILE_SIZE_VAR, "-1"),
            (CONNECT_TIMEOUT_VAR, "0"),
        ] {
            let result = config(&[base, (var, value)]);
            assert!(
                matches!(result, Err(ConfigError::Invalid { .. })),
                "{var}={value} should be rejected"
            );
        }
    }

    #[test]
    fn test_invalid_community_handle_rejected() {
        let result = config(&[
            (API_URL_VAR, "https://repository.example.edu/server/api/"),
            (RESEARCH_HANDLE_VAR, "research"),
        ]);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { var: RESEARCH_HANDLE_VAR, .. })
        ));
    }

    #[test]
    fn test_require_database_url_when_missing() {
        let config =
            config(&[(API_URL_VAR, "https://repository.example.edu/server/api/")]).unwrap();
        assert_eq!(
            config.require_database_url(),
            Err(ConfigError::Missing { var: DATABASE_URL_VAR })
        );
    }
}
