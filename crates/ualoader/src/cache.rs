use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::{fetch::FetchedBody, identifier::ResourceIdentifier};

/// A fully fetched resource. Never modified once created.
#[derive(Debug)]
pub struct CachedResource {
    identifier: ResourceIdentifier,
    body: Bytes,
    content_type: String,
}

impl CachedResource {
    pub fn new(identifier: ResourceIdentifier, body: Bytes, content_type: String) -> Self {
        Self {
            identifier,
            body,
            content_type,
        }
    }

    /// Content type comes from the response header, then from the extension
    /// of the URL path, then from `fallback`.
    pub fn from_fetched(identifier: ResourceIdentifier, fetched: FetchedBody, fallback: &str) -> Self {
        let content_type = fetched
            .content_type
            .as_deref()
            .and_then(|value| value.split(';').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .or_else(|| {
                mime_guess::from_path(identifier.url().path())
                    .first_raw()
                    .map(str::to_string)
            })
            .unwrap_or_else(|| fallback.to_string());

        Self::new(identifier, fetched.body, content_type)
    }

    pub fn identifier(&self) -> &ResourceIdentifier {
        &self.identifier
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn total_length(&self) -> u64 {
        self.body.len() as u64
    }
}

/// In-memory store of fetched resources, alive for one playback session.
#[derive(Default)]
pub struct ResourceCache {
    entries: RwLock<HashMap<ResourceIdentifier, Arc<CachedResource>>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identifier: &ResourceIdentifier) -> Option<Arc<CachedResource>> {
        self.entries.read().get(identifier).cloned()
    }

    pub fn contains(&self, identifier: &ResourceIdentifier) -> bool {
        self.entries.read().contains_key(identifier)
    }

    /// Stores `resource` under its own identifier and returns the shared handle.
    pub fn put(&self, resource: CachedResource) -> Arc<CachedResource> {
        let resource = Arc::new(resource);
        let previous = self
            .entries
            .write()
            .insert(resource.identifier().clone(), resource.clone());
        if previous.is_some() {
            tracing::warn!("{} was cached twice, replacing.", resource.identifier());
        }
        resource
    }

    pub fn invalidate(&self, identifier: &ResourceIdentifier) -> Option<Arc<CachedResource>> {
        self.entries.write().remove(identifier)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
