use std::{fmt, str::FromStr};

use url::Url;

use crate::error::{LoaderError, LoaderResult};

/// Cache key of a media resource.
///
/// Players are usually handed a URL with a custom scheme so that their
/// requests are routed to the loader instead of the network. The identifier
/// maps that scheme back to `http` or `https` and keeps everything else, so
/// equivalent URLs end up on the same cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentifier(Url);

impl ResourceIdentifier {
    pub fn new(url: &Url) -> LoaderResult<Self> {
        if url.host_str().map_or(true, str::is_empty) {
            return Err(LoaderError::InvalidUrl(
                url.to_string(),
                "missing host".to_string(),
            ));
        }

        let scheme = if url.scheme().contains("https") {
            "https"
        } else {
            "http"
        };

        let canonical = if url.scheme() == scheme {
            url.clone()
        } else {
            // `Url::set_scheme` refuses to switch between special and custom schemes.
            let rest = &url.as_str()[url.scheme().len()..];
            Url::parse(&format!("{scheme}{rest}"))
                .map_err(|e| LoaderError::InvalidUrl(url.to_string(), e.to_string()))?
        };

        Ok(Self(canonical))
    }

    /// The canonical URL, which is also what gets fetched.
    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl FromStr for ResourceIdentifier {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s).map_err(|e| LoaderError::InvalidUrl(s.to_string(), e.to_string()))?;
        Self::new(&url)
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
