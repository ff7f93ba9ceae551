pub mod agent;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod identifier;
pub mod loader;
pub mod range;
pub mod request;
pub mod responder;

pub use agent::UserAgent;
pub use cache::{CachedResource, ResourceCache};
pub use config::LoaderConfig;
pub use error::{FetchError, LoaderError, LoaderResult, RangeError};
pub use fetch::{http::HttpClient, FetchedBody, Fetcher};
pub use identifier::ResourceIdentifier;
pub use loader::{HttpResourceLoader, ResourceLoader};
pub use range::ByteRange;
pub use request::{ContentInformation, LoadingRequest, LoadingResponse, LoadingTicket};
