use std::time::Duration;

use thiserror::Error;

/// Why a single fetch attempt did not produce a usable body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    BadStatus(u16),

    #[error("Response body is empty")]
    EmptyBody,

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("Range at offset {offset} (length {length:?}) is out of bounds for {total} bytes")]
    OutOfBounds {
        offset: u64,
        length: Option<u64>,
        total: u64,
    },
}

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("Invalid resource url {0}: {1}")]
    InvalidUrl(String, String),

    #[error("Invalid header {0}: {1}")]
    InvalidHeader(String, String),

    #[error("Invalid range {0:?}")]
    InvalidRange(String),

    #[error(transparent)]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] toml::de::Error),

    #[error("No tokio runtime to fetch on: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    #[error("Loading session was reset")]
    Reset,

    #[error("Loading request was dropped before it finished")]
    Abandoned,
}

pub type LoaderResult<T> = Result<T, LoaderError>;
