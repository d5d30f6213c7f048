//! HTTP client for the repository REST API.
//!
//! [`RepositoryClient`] is the production [`ContentSource`]. Every request goes
//! out unauthenticated first; a 401/403 triggers one login (or reuse of the
//! cached [`AuthSession`]) and a single authenticated retry. Transient failures
//! are retried with backoff underneath both paths.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_MAX_CONTENT_LENGTH, DEFAULT_SESSION_TTL, ORIGINAL_BUNDLE,
    READ_TIMEOUT_SECS, XSRF_REQUEST_HEADER, XSRF_RESPONSE_HEADER,
};
use super::metadata::{
    BitstreamCandidate, BitstreamPage, BundlePage, ItemResponse, RecordMetadata, is_pdf_name,
};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error, retry_after_delay};
use super::session::{AuthSession, Credentials};
use super::{ContentSource, DownloadResult, SourceError};
use crate::config::ExportConfig;
use crate::record::{BitstreamRef, ObjectUuid, RecordId};
use crate::user_agent;

/// Repository REST client with lazy bearer-token authentication.
#[derive(Debug)]
pub struct RepositoryClient {
    client: Client,
    api_base: Url,
    credentials: Option<Credentials>,
    session: Option<AuthSession>,
    session_ttl: Duration,
    retry_policy: RetryPolicy,
    max_content_length: u64,
    logins: u32,
}

impl RepositoryClient {
    /// Creates a client for the API rooted at `api_base` with default limits.
    ///
    /// A trailing `/` is added to the base path when missing.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidResponse`] when `api_base` cannot carry
    /// path segments, or [`SourceError::Network`] when the HTTP client fails
    /// to build.
    pub fn new(api_base: Url) -> Result<Self, SourceError> {
        Self::new_with_timeouts(api_base, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit connect/read timeouts.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn new_with_timeouts(
        api_base: Url,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, SourceError> {
        let api_base = normalize_base(api_base)?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|e| SourceError::from_reqwest(api_base.as_str(), e))?;

        Ok(Self {
            client,
            api_base,
            credentials: None,
            session: None,
            session_ttl: DEFAULT_SESSION_TTL,
            retry_policy: RetryPolicy::default(),
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            logins: 0,
        })
    }

    /// Creates a client from the run configuration.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn from_config(config: &ExportConfig) -> Result<Self, SourceError> {
        let client = Self::new_with_timeouts(
            config.api_url.clone(),
            config.connect_timeout_secs,
            config.read_timeout_secs,
        )?
        .with_retry_policy(RetryPolicy::with_max_attempts(config.max_attempts))
        .with_max_content_length(config.max_file_size);

        Ok(match &config.credentials {
            Some(credentials) => client.with_credentials(credentials.clone()),
            None => client,
        })
    }

    /// Sets the credentials used by the login fallback.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Replaces the maximum accepted content length in bytes.
    #[must_use]
    pub fn with_max_content_length(mut self, max_bytes: u64) -> Self {
        self.max_content_length = max_bytes;
        self
    }

    /// Replaces how long a bearer token is trusted.
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Number of login exchanges performed so far.
    #[must_use]
    pub fn login_count(&self) -> u32 {
        self.logins
    }

    /// True when a non-expired session is cached.
    #[must_use]
    pub fn has_valid_session(&self) -> bool {
        self.session.as_ref().is_some_and(AuthSession::is_valid)
    }

    /// API base URL (always ends in `/`).
    #[must_use]
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Performs the login exchange and returns a fresh session.
    ///
    /// Picks up the CSRF token from `authn/status` (the matching cookie lands
    /// in the client's cookie store), then posts the credentials to
    /// `authn/login`. The bearer token comes back in the `Authorization`
    /// response header.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::AuthFailed`] when no credentials are configured,
    /// the exchange fails, or no token is returned.
    #[instrument(skip(self))]
    pub async fn authenticate(&mut self) -> Result<AuthSession, SourceError> {
        let Some(credentials) = self.credentials.clone() else {
            return Err(SourceError::auth_failed(
                "no repository credentials configured",
            ));
        };

        let xsrf_token = self.fetch_xsrf_token().await;

        let login_url = self.endpoint(&["authn", "login"])?;
        let mut request = self.client.post(login_url.clone()).form(&[
            ("user", credentials.user.as_str()),
            ("password", credentials.password.as_str()),
        ]);
        if let Some(token) = &xsrf_token {
            request = request.header(XSRF_REQUEST_HEADER, token);
        }

        self.logins += 1;
        let response = request
            .send()
            .await
            .map_err(|e| SourceError::auth_failed(format!("login request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "repository login rejected");
            return Err(SourceError::auth_failed(format!(
                "login returned HTTP {}",
                status.as_u16()
            )));
        }

        let token = response
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| SourceError::auth_failed("login response carried no bearer token"))?;

        let session = AuthSession::new(&token, self.session_ttl);
        if !session.has_token() {
            return Err(SourceError::auth_failed("login returned an empty bearer token"));
        }

        info!("authenticated with repository API");
        Ok(session)
    }

    async fn fetch_xsrf_token(&self) -> Option<String> {
        let url = self.endpoint(&["authn", "status"]).ok()?;
        match self.client.get(url).send().await {
            Ok(response) => response
                .headers()
                .get(XSRF_RESPONSE_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            Err(error) => {
                debug!(error = %error, "could not fetch CSRF token; logging in without it");
                None
            }
        }
    }

    async fn ensure_session(&mut self) -> Result<AuthSession, SourceError> {
        if let Some(session) = self.session.as_ref().filter(|s| s.is_valid()) {
            debug!("reusing cached repository session");
            return Ok(session.clone());
        }
        let session = self.authenticate().await?;
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Builds an API URL from validated, percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SourceError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                SourceError::invalid_response(self.api_base.as_str(), "base URL cannot have paths")
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET with unauthenticated-first, login-on-challenge semantics.
    async fn get<T, F, Fut>(&mut self, url: &Url, read: F) -> Result<T, SourceError>
    where
        F: Fn(Response) -> Fut + Sync,
        Fut: Future<Output = Result<T, SourceError>> + Send,
        T: Send,
    {
        match self.get_with_retry(url, None, &read).await {
            Err(error) if error.is_auth_challenge() => {
                debug!(
                    url = %url,
                    status = ?error.http_status_code(),
                    "access refused; retrying with bearer token"
                );
                let session = self.ensure_session().await?;
                match self.get_with_retry(url, Some(&session), &read).await {
                    Err(error) if error.is_auth_challenge() => {
                        let status = error.http_status_code().unwrap_or(403);
                        if status == 401 {
                            // Token rejected server-side; the next record logs in again.
                            self.session = None;
                        }
                        Err(SourceError::AuthRequired {
                            url: url.to_string(),
                            status,
                        })
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Runs one request/read cycle under the retry policy.
    async fn get_with_retry<T, F, Fut>(
        &self,
        url: &Url,
        auth: Option<&AuthSession>,
        read: &F,
    ) -> Result<T, SourceError>
    where
        F: Fn(Response) -> Fut + Sync,
        Fut: Future<Output = Result<T, SourceError>> + Send,
        T: Send,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let result = match self.send_get(url, auth).await {
                Ok(response) => read(response).await,
                Err(error) => Err(error),
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let failure_type = classify_error(&error);
            let server_delay = if failure_type == FailureType::RateLimited {
                retry_after_delay(&error)
            } else {
                None
            };

            match self.retry_policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry {
                    delay: backoff_delay,
                    attempt: next_attempt,
                } => {
                    let delay = server_delay.unwrap_or(backoff_delay);
                    info!(
                        url = %url,
                        attempt = next_attempt,
                        max_attempts = self.retry_policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        using_retry_after = server_delay.is_some(),
                        error = %error,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url = %url, %reason, "not retrying request");
                    return Err(finalize_error(url, error, failure_type, attempt));
                }
            }
        }
    }

    async fn send_get(
        &self,
        url: &Url,
        auth: Option<&AuthSession>,
    ) -> Result<Response, SourceError> {
        let mut request = self.client.get(url.clone());
        if let Some(session) = auth {
            request = request.header(AUTHORIZATION, session.authorization());
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Err(SourceError::http_status(
            url.as_str(),
            status.as_u16(),
            retry_after,
        ))
    }

    /// Lists PDF bitstreams of the item's ORIGINAL bundle(s), in listing order.
    #[instrument(skip(self), fields(item = %item))]
    pub async fn list_pdf_bitstreams(
        &mut self,
        item: &ObjectUuid,
    ) -> Result<Vec<BitstreamCandidate>, SourceError> {
        let item_id = item.to_string();
        let bundles_url = self.endpoint(&["core", "items", &item_id, "bundles"])?;
        let page = self.get(&bundles_url, read_json::<BundlePage>).await?;

        let mut candidates = Vec::new();
        for bundle in page
            .embedded
            .bundles
            .into_iter()
            .filter(|bundle| bundle.name == ORIGINAL_BUNDLE)
        {
            let bundle_id = match ObjectUuid::parse(&bundle.uuid) {
                Ok(id) => id.to_string(),
                Err(error) => {
                    warn!(error = %error, "skipping bundle with malformed id");
                    continue;
                }
            };
            let bitstreams_url = self.endpoint(&["core", "bundles", &bundle_id, "bitstreams"])?;
            let page = self
                .get(&bitstreams_url, read_json::<BitstreamPage>)
                .await?;

            for bitstream in page.embedded.bitstreams {
                let Some(name) = bitstream.name.filter(|name| is_pdf_name(name)) else {
                    continue;
                };
                match BitstreamRef::parse(&bitstream.uuid) {
                    Ok(reference) => candidates.push(BitstreamCandidate {
                        reference,
                        name,
                        size_bytes: bitstream.size_bytes,
                        bundle_name: bundle.name.clone(),
                    }),
                    Err(error) => warn!(error = %error, "skipping bitstream with malformed id"),
                }
            }
        }

        Ok(candidates)
    }
}

#[async_trait]
impl ContentSource for RepositoryClient {
    #[instrument(skip(self), fields(handle = %id))]
    async fn fetch_metadata(&mut self, id: &RecordId) -> Result<RecordMetadata, SourceError> {
        let mut url = self.endpoint(&["pid", "find"])?;
        url.query_pairs_mut().append_pair("id", &id.to_string());

        let item = self.get(&url, read_json::<ItemResponse>).await.map_err(|error| match error {
            SourceError::NotFound { .. } => SourceError::not_found(format!("record {id}")),
            other => other,
        })?;

        let item_id = ObjectUuid::parse(&item.uuid)
            .map_err(|e| SourceError::invalid_response(url.as_str(), e.to_string()))?;
        debug!(item = %item_id, "resolved handle");

        Ok(RecordMetadata {
            id: id.clone(),
            item: item_id,
            fields: item.into_fields(),
        })
    }

    #[instrument(skip(self), fields(bitstream = %bitstream))]
    async fn fetch_bitstream(
        &mut self,
        bitstream: &BitstreamRef,
    ) -> Result<DownloadResult, SourceError> {
        let bitstream_id = bitstream.to_string();
        let url = self.endpoint(&["core", "bitstreams", &bitstream_id, "content"])?;
        let limit = self.max_content_length;

        let bytes = self
            .get(&url, move |response| read_capped(response, limit))
            .await?;

        debug!(bytes = bytes.len(), "bitstream downloaded");
        Ok(DownloadResult {
            content_length: bytes.len() as u64,
            bytes,
            bitstream: *bitstream,
            bundle_name: ORIGINAL_BUNDLE.to_string(),
            file_name: None,
        })
    }

    #[instrument(skip(self, metadata), fields(handle = %metadata.id))]
    async fn fetch_primary_bitstream(
        &mut self,
        metadata: &RecordMetadata,
    ) -> Result<DownloadResult, SourceError> {
        let candidates = self.list_pdf_bitstreams(&metadata.item).await?;
        if candidates.is_empty() {
            return Err(SourceError::not_found(format!(
                "PDF in {ORIGINAL_BUNDLE} bundle of {}",
                metadata.id
            )));
        }
        if candidates.len() > 1 {
            warn!(
                candidates = candidates.len(),
                "record has several PDFs; exporting the first that downloads"
            );
        }

        let mut last_error = None;
        for candidate in candidates {
            if let Some(size) = candidate
                .size_bytes
                .filter(|size| *size > self.max_content_length)
            {
                warn!(bitstream = %candidate.reference, size, "bitstream above size cap");
                last_error = Some(SourceError::too_large(
                    candidate.reference.to_string(),
                    size,
                    self.max_content_length,
                ));
                continue;
            }

            match self.fetch_bitstream(&candidate.reference).await {
                Ok(download) if download.bytes.is_empty() => {
                    warn!(bitstream = %candidate.reference, "bitstream is empty");
                }
                Ok(mut download) => {
                    download.bundle_name = candidate.bundle_name;
                    download.file_name = Some(candidate.name);
                    return Ok(download);
                }
                Err(error) => {
                    warn!(
                        bitstream = %candidate.reference,
                        error = %error,
                        "bitstream download failed"
                    );
                    last_error = Some(error);
                }
            }
        }

        Err(match last_error {
            Some(
                error @ (SourceError::TooLarge { .. }
                | SourceError::Transient { .. }
                | SourceError::AuthRequired { .. }
                | SourceError::AuthFailed { .. }),
            ) => error,
            _ => SourceError::not_found(format!("downloadable PDF for {}", metadata.id)),
        })
    }
}

fn normalize_base(mut api_base: Url) -> Result<Url, SourceError> {
    if api_base.cannot_be_a_base() {
        return Err(SourceError::invalid_response(
            api_base.as_str(),
            "base URL cannot have paths",
        ));
    }
    if !api_base.path().ends_with('/') {
        let path = format!("{}/", api_base.path());
        api_base.set_path(&path);
    }
    api_base.set_query(None);
    api_base.set_fragment(None);
    Ok(api_base)
}

/// Maps the error that ended the retry loop to what callers see.
fn finalize_error(
    url: &Url,
    error: SourceError,
    failure_type: FailureType,
    attempts: u32,
) -> SourceError {
    match (failure_type, error.http_status_code()) {
        (_, Some(404 | 410)) => SourceError::not_found(url.as_str()),
        (FailureType::Transient | FailureType::RateLimited, _) => SourceError::Transient {
            url: url.to_string(),
            attempts,
            last: Box::new(error),
        },
        _ => error,
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, SourceError> {
    let url = response.url().to_string();
    response
        .json::<T>()
        .await
        .map_err(|e| SourceError::invalid_response(url, e.to_string()))
}

/// Fails with `TooLarge` when the server declares more than `limit` bytes.
pub(crate) fn check_declared_length(
    url: &str,
    declared: Option<u64>,
    limit: u64,
) -> Result<(), SourceError> {
    match declared {
        Some(length) if length > limit => Err(SourceError::too_large(url, length, limit)),
        _ => Ok(()),
    }
}

/// Reads a response body into memory, aborting as soon as it crosses `limit`.
async fn read_capped(response: Response, limit: u64) -> Result<Vec<u8>, SourceError> {
    let url = response.url().to_string();
    check_declared_length(&url, response.content_length(), limit)?;

    let capacity = response
        .content_length()
        .and_then(|length| usize::try_from(length).ok())
        .unwrap_or(0);
    let mut body = Vec::with_capacity(capacity);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| SourceError::from_reqwest(url.as_str(), e))?;
        let observed = (body.len() + chunk.len()) as u64;
        if observed > limit {
            return Err(SourceError::too_large(url, observed, limit));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}
