//! The fetch channel: one cancellable request/response exchange.
//!
//! A [`Fetch`] implementation performs a single exchange against the
//! remote source and maps every failure to a [`FetchError`]. It never
//! retries; the poll scheduler is the retry policy.
//!
//! [`FetchChannel`] adds external cancellation on top of any fetcher.
//! Cancelling drops the in-flight future, which aborts the underlying
//! HTTP request, and resolves to `None` rather than a failure.

use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::FetchError;

/// Result of exactly one fetch. Applied whole or not at all.
pub type FetchOutcome<T> = Result<T, FetchError>;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A source of authoritative snapshot values.
///
/// Implementations must be cheap to call repeatedly and must not retry
/// internally.
pub trait Fetch: Send + Sync + 'static {
    /// The decoded snapshot value.
    type Output: Send + 'static;

    /// Perform one exchange.
    fn fetch(&self) -> impl Future<Output = FetchOutcome<Self::Output>> + Send;
}

/// Combinators for [`Fetch`] implementations.
pub trait FetchExt: Fetch + Sized {
    /// Post-process every successful payload, possibly turning it into a
    /// failure.
    fn map_outcome<U, M>(self, map: M) -> Mapped<Self, M, U>
    where
        M: Fn(Self::Output) -> FetchOutcome<U> + Send + Sync + 'static,
        U: Send + 'static,
    {
        Mapped {
            inner: self,
            map,
            _output: PhantomData,
        }
    }
}

impl<F: Fetch> FetchExt for F {}

/// A fetcher whose successful payloads are passed through a mapping.
///
/// Built by [`FetchExt::map_outcome`].
pub struct Mapped<F, M, U> {
    inner: F,
    map: M,
    _output: PhantomData<fn() -> U>,
}

impl<F, M, U> Fetch for Mapped<F, M, U>
where
    F: Fetch,
    M: Fn(F::Output) -> FetchOutcome<U> + Send + Sync + 'static,
    U: Send + 'static,
{
    type Output = U;

    fn fetch(&self) -> impl Future<Output = FetchOutcome<U>> + Send {
        async move { self.inner.fetch().await.and_then(&self.map) }
    }
}

/// Wraps a fetcher with external cancellation.
#[derive(Debug)]
pub struct FetchChannel<F> {
    fetcher: F,
}

impl<F: Fetch> FetchChannel<F> {
    /// Wrap a fetcher.
    pub const fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Run one exchange unless `cancel` fires first.
    ///
    /// Returns `None` when cancelled. Cancellation is not a failure and
    /// the caller discards it.
    pub async fn fetch(&self, cancel: &CancellationToken) -> Option<FetchOutcome<F::Output>> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            outcome = self.fetcher.fetch() => Some(outcome),
        }
    }

    /// The wrapped fetcher.
    pub const fn inner(&self) -> &F {
        &self.fetcher
    }
}

// ---------------------------------------------------------------------------
// HTTP fetcher
// ---------------------------------------------------------------------------

/// Credential attached to every request.
///
/// Empty secrets are sent as-is. Whether a request is acceptable is for
/// the backend to decide; its rejection surfaces as
/// [`ErrorKind::Unauthorized`](crate::ErrorKind::Unauthorized).
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Credential {
    /// No credential header.
    #[default]
    None,
    /// `X-API-Key: <key>`.
    ApiKey(String),
    /// `Authorization: Bearer <token>`.
    Bearer(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

/// Fetches a JSON document with an HTTP GET and decodes it as `T`.
pub struct HttpFetcher<T> {
    client: reqwest::Client,
    url: String,
    credential: Credential,
    query: Vec<(String, String)>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> HttpFetcher<T> {
    /// Start building a fetcher for `{base_url}{path}`.
    pub fn builder(base_url: &str, path: &str) -> HttpFetcherBuilder<T> {
        HttpFetcherBuilder {
            url: format!("{}{path}", base_url.trim_end_matches('/')),
            credential: Credential::None,
            query: Vec::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            with_cookies: false,
            _payload: PhantomData,
        }
    }

    /// The request URL, without query parameters.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl<T> std::fmt::Debug for HttpFetcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("url", &self.url)
            .field("credential", &self.credential)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// Builder for [`HttpFetcher`].
pub struct HttpFetcherBuilder<T> {
    url: String,
    credential: Credential,
    query: Vec<(String, String)>,
    timeout: Duration,
    with_cookies: bool,
    _payload: PhantomData<fn() -> T>,
}

impl<T> HttpFetcherBuilder<T> {
    /// Attach a credential header to every request.
    #[must_use]
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Per-request timeout. A timed-out request is a network failure.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Keep and resend cookies set by the backend (credentialed mode).
    #[must_use]
    pub const fn with_credentials(mut self, enabled: bool) -> Self {
        self.with_cookies = enabled;
        self
    }

    /// Build the fetcher.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Unknown`] if the HTTP client cannot be
    /// constructed (e.g. the TLS backend fails to initialize).
    pub fn build(self) -> Result<HttpFetcher<T>, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .cookie_store(self.with_cookies)
            .build()
            .map_err(|e| FetchError::Unknown(format!("failed to build HTTP client: {e}")))?;

        Ok(HttpFetcher {
            client,
            url: self.url,
            credential: self.credential,
            query: self.query,
            _payload: PhantomData,
        })
    }
}

impl<T> Fetch for HttpFetcher<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Output = T;

    fn fetch(&self) -> impl Future<Output = FetchOutcome<T>> + Send {
        async move {
            let mut request = self
                .client
                .get(&self.url)
                .header(reqwest::header::ACCEPT, "application/json");
            if !self.query.is_empty() {
                request = request.query(&self.query);
            }
            request = match &self.credential {
                Credential::None => request,
                Credential::ApiKey(key) => request.header("X-API-Key", key),
                Credential::Bearer(token) => request.bearer_auth(token),
            };

            let response = request.send().await.map_err(classify_transport)?;

            let status = response.status();
            check_status(status)?;

            let body = response
                .bytes()
                .await
                .map_err(|e| FetchError::Network(format!("failed to read body: {e}")))?;
            debug!(url = %self.url, bytes = body.len(), "fetch completed");

            decode_body(&body)
        }
    }
}

/// Map a non-success status to its failure category.
fn check_status(status: StatusCode) -> Result<(), FetchError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(FetchError::Unauthorized {
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        return Err(FetchError::Unknown(format!("backend returned {status}")));
    }
    Ok(())
}

/// Map a transport-level `reqwest` error to its failure category.
fn classify_transport(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Network(format!("request timed out: {err}"))
    } else if err.is_connect() || err.is_request() || err.is_body() {
        FetchError::Network(format!("request failed: {err}"))
    } else if err.is_decode() {
        FetchError::Decode(err.to_string())
    } else {
        FetchError::Unknown(err.to_string())
    }
}

/// Decode a JSON body as `T`.
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> FetchOutcome<T> {
    serde_json::from_slice(body).map_err(FetchError::from)
}
