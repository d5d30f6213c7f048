//! User-Agent string for repository API traffic.

/// Purpose tag appended to the User-Agent so repository admins can identify the traffic.
const UA_PURPOSE: &str = "libsafe-archival-export";

/// Default User-Agent for repository requests (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("libsafe-export/{version} ({UA_PURPOSE})")
}
