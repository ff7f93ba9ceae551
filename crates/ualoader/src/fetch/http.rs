use std::{ops::Deref, sync::Arc};

use reqwest::{
    header::{HeaderMap, CONTENT_TYPE},
    Client, ClientBuilder, IntoUrl, StatusCode,
};
use reqwest_cookie_store::{CookieStore, CookieStoreMutex};
use url::Url;

use super::{FetchedBody, Fetcher};
use crate::error::{FetchError, LoaderResult};

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    cookies_store: Arc<CookieStoreMutex>,
}

impl HttpClient {
    pub fn new(builder: ClientBuilder) -> LoaderResult<Self> {
        let cookies_store = Arc::new(CookieStoreMutex::new(CookieStore::default()));
        let client = builder.cookie_provider(cookies_store.clone()).build()?;

        Ok(Self {
            client,
            cookies_store,
        })
    }

    pub fn add_cookies(&self, cookies: &[String], url: impl IntoUrl) -> LoaderResult<()> {
        let url = url.into_url()?;
        let mut lock = self.cookies_store.lock().unwrap_or_else(|e| e.into_inner());
        for cookie in cookies {
            if let Err(e) = lock.parse(cookie, &url) {
                tracing::warn!("Ignoring cookie for {url}: {e}");
            }
        }
        Ok(())
    }
}

impl Deref for HttpClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// Fetches resources with a fixed header set, `User-Agent` included.
pub struct HttpFetcher {
    client: HttpClient,
    headers: HeaderMap,
}

impl HttpFetcher {
    pub fn new(client: HttpClient, headers: HeaderMap) -> Self {
        Self { client, headers }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedBody, FetchError> {
        tracing::info!("fetch {url}");

        let response = self
            .client
            .get(url.clone())
            .headers(self.headers.clone())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            if let Ok(body) = response.text().await {
                let excerpt: String = body.chars().take(256).collect();
                tracing::warn!("Error body: {excerpt}");
            }
            return Err(FetchError::BadStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(FetchError::EmptyBody);
        }

        Ok(FetchedBody { body, content_type })
    }
}
