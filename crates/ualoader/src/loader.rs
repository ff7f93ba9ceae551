use std::sync::Arc;

use reqwest::Client;
use tokio::runtime::Handle;

use crate::{
    cache::ResourceCache,
    config::LoaderConfig,
    coordinator::{Coordinator, Submission},
    error::LoaderResult,
    fetch::{
        http::{HttpClient, HttpFetcher},
        Fetcher, TimeoutFetcher,
    },
    identifier::ResourceIdentifier,
    range::ByteRange,
    request::{LoadingRequest, LoadingTicket},
    responder,
};

pub type HttpResourceLoader = ResourceLoader<TimeoutFetcher<HttpFetcher>>;

/// ┌──────────┐  LoadingRequest  ┌────────────────┐   miss    ┌─────────────┐
/// │          ├──────────────────►                ├───────────►             │
/// │  Player  │                  │ ResourceLoader │           │ Coordinator ├──► Fetcher
/// │          ◄──────────────────┤                ◄───────────┤             │    (one per
/// └──────────┘  LoadingTicket   └───────┬────────┘  replay   └──────┬──────┘  identifier)
///                                       │ hit                       │ put
///                                ┌──────▼────────┐           ┌──────▼──────┐
///                                │   responder   ◄───────────┤    Cache    │
///                                └───────────────┘           └─────────────┘
///
/// Entry point of the player's sub-requests.
///
/// Cache misses spawn their fetch onto the tokio runtime the loader was built
/// in, or the one set with [`ResourceLoader::runtime`]. Requests may then be
/// handled from any thread.
pub struct ResourceLoader<F> {
    coordinator: Coordinator<F>,
}

impl<F> ResourceLoader<F>
where
    F: Fetcher,
{
    pub fn new(fetcher: F) -> Self {
        Self::with_cache(Arc::new(ResourceCache::new()), fetcher)
    }

    pub fn with_cache(cache: Arc<ResourceCache>, fetcher: F) -> Self {
        Self {
            coordinator: Coordinator::new(cache, fetcher),
        }
    }

    pub fn fallback_content_type(mut self, content_type: impl AsRef<str>) -> Self {
        self.coordinator = self.coordinator.fallback_content_type(content_type);
        self
    }

    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.coordinator = self.coordinator.runtime(runtime);
        self
    }

    pub fn coordinator(&self) -> &Coordinator<F> {
        &self.coordinator
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        self.coordinator.cache()
    }

    /// Takes responsibility for `request` and always claims it.
    ///
    /// A cached resource is answered before this returns. Otherwise the
    /// request completes once the fetch it was queued behind resolves.
    pub fn handle(&self, request: LoadingRequest) -> bool {
        match self.coordinator.submit(request) {
            Submission::Ready(request, resource) => responder::complete(request, &resource),
            Submission::Deferred => {}
        }
        true
    }

    pub fn load(
        &self,
        url: &str,
        range: ByteRange,
        wants_content_info: bool,
    ) -> LoaderResult<LoadingTicket> {
        let identifier: ResourceIdentifier = url.parse()?;
        let (request, ticket) = LoadingRequest::new(identifier, range, wants_content_info);
        self.handle(request);
        Ok(ticket)
    }

    /// Ends the playback session. See [`Coordinator::reset`].
    pub fn reset(&self) {
        tracing::info!("Resetting loading session.");
        self.coordinator.reset();
    }
}

impl HttpResourceLoader {
    pub fn from_config(config: &LoaderConfig) -> LoaderResult<Self> {
        let client = HttpClient::new(Client::builder())?;
        let fetcher = HttpFetcher::new(client, config.header_map()?);
        let fetcher = TimeoutFetcher::new(fetcher, config.fetch_timeout());
        Ok(Self::new(fetcher).fallback_content_type(&config.default_content_type))
    }

    /// Seeds the configured cookies for `url`.
    pub fn add_cookies(&self, cookies: &[String], url: &str) -> LoaderResult<()> {
        if cookies.is_empty() {
            return Ok(());
        }
        let identifier: ResourceIdentifier = url.parse()?;
        self.coordinator
            .fetcher()
            .inner()
            .client()
            .add_cookies(cookies, identifier.url().clone())
    }
}
