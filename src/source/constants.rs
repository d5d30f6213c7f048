//! Constants for the repository client (timeouts, size cap, endpoints).

use std::time::Duration;

/// Default HTTP connect timeout (5 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default HTTP read timeout (30 seconds).
pub const READ_TIMEOUT_SECS: u64 = 30;

/// Default maximum bitstream size (100 MiB).
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 100 * 1024 * 1024;

/// How long a bearer token is trusted before logging in again.
///
/// DSpace issues 30 minute tokens; stay under that.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(25 * 60);

/// Maximum Retry-After header value honoured (5 minutes).
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Bundle holding a record's primary, unprocessed files.
pub const ORIGINAL_BUNDLE: &str = "ORIGINAL";

/// Response header carrying the DSpace CSRF token.
pub const XSRF_RESPONSE_HEADER: &str = "DSPACE-XSRF-TOKEN";

/// Request header echoing the CSRF token back.
pub const XSRF_REQUEST_HEADER: &str = "X-XSRF-TOKEN";
