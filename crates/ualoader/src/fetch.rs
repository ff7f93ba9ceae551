pub mod http;

use std::{future::Future, sync::Arc, time::Duration};

use bytes::Bytes;
use url::Url;

use crate::error::FetchError;

/// A complete response body.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub body: Bytes,
    /// `Content-Type` reported by the transport, if any.
    pub content_type: Option<String>,
}

impl FetchedBody {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Retrieves a whole resource in a single attempt.
///
/// Implementations must not cache or retry, the coordinator decides when a
/// resource is fetched again.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<FetchedBody, FetchError>> + Send;
}

impl<F> Fetcher for Arc<F>
where
    F: Fetcher,
{
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<FetchedBody, FetchError>> + Send {
        self.as_ref().fetch(url)
    }
}

/// Fails a fetch with [`FetchError::Timeout`] once the deadline elapses.
pub struct TimeoutFetcher<F> {
    inner: F,
    timeout: Option<Duration>,
}

impl<F: Fetcher> TimeoutFetcher<F> {
    pub fn new(inner: F, timeout: Option<Duration>) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F: Fetcher> Fetcher for TimeoutFetcher<F> {
    async fn fetch(&self, url: &Url) -> Result<FetchedBody, FetchError> {
        let Some(timeout) = self.timeout else {
            return self.inner.fetch(url).await;
        };

        tokio::time::timeout(timeout, self.inner.fetch(url))
            .await
            .map_err(|_| FetchError::Timeout(timeout))?
    }
}
