use std::{collections::BTreeMap, path::Path, str::FromStr, time::Duration};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::{
    agent::UserAgent,
    error::{LoaderError, LoaderResult},
};

pub const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Detected from the host when absent.
    pub user_agent: Option<UserAgent>,
    /// Extra headers sent with every fetch.
    pub headers: BTreeMap<String, String>,
    /// Cookies seeded into the client for the loaded URL.
    pub cookies: Vec<String>,
    /// `0` disables the deadline.
    pub fetch_timeout_secs: u64,
    /// Used when neither the response nor the URL tells the content type.
    pub default_content_type: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            headers: BTreeMap::new(),
            cookies: Vec::new(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

impl LoaderConfig {
    pub fn load(path: impl AsRef<Path>) -> LoaderResult<Self> {
        let data = std::fs::read_to_string(path)?;
        data.parse()
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_secs > 0).then(|| Duration::from_secs(self.fetch_timeout_secs))
    }

    pub fn user_agent(&self) -> UserAgent {
        self.user_agent.clone().unwrap_or_default()
    }

    /// The full header set of a fetch, `User-Agent` included.
    ///
    /// `User-Agent` is always generated from [`LoaderConfig::user_agent`] and
    /// can not be set as an extra header.
    pub fn header_map(&self) -> LoaderResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (key, value) in &self.headers {
            let name = HeaderName::from_str(key.trim())
                .map_err(|e| LoaderError::InvalidHeader(key.clone(), e.to_string()))?;
            if name == reqwest::header::USER_AGENT {
                return Err(LoaderError::InvalidHeader(
                    key.clone(),
                    "set the user agent fields instead".to_string(),
                ));
            }
            let value = HeaderValue::from_str(value.trim())
                .map_err(|e| LoaderError::InvalidHeader(key.clone(), e.to_string()))?;
            headers.insert(name, value);
        }

        let user_agent = HeaderValue::from_str(&self.user_agent().header_value())
            .map_err(|e| LoaderError::InvalidHeader("User-Agent".to_string(), e.to_string()))?;
        headers.insert(reqwest::header::USER_AGENT, user_agent);

        Ok(headers)
    }
}

impl FromStr for LoaderConfig {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}
