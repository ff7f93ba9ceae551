use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tokio::{
    runtime::{Handle, TryCurrentError},
    task::JoinHandle,
};

use crate::{
    cache::{CachedResource, ResourceCache},
    config::DEFAULT_CONTENT_TYPE,
    error::{FetchError, LoaderError},
    fetch::{FetchedBody, Fetcher},
    identifier::ResourceIdentifier,
    request::LoadingRequest,
    responder,
};

/// Outcome of [`Coordinator::submit`].
#[derive(Debug)]
pub enum Submission {
    /// The resource is cached. The request is handed back to be answered
    /// right away.
    Ready(LoadingRequest, Arc<CachedResource>),
    /// The request was queued behind a fetch and is answered when it completes.
    Deferred,
}

/// The fetch in flight for one identifier and the requests waiting on it.
///
/// The entry exists exactly as long as its fetch is in flight.
struct PendingFetch {
    generation: u64,
    queued: Vec<LoadingRequest>,
    task: JoinHandle<()>,
}

type PendingMap = Mutex<HashMap<ResourceIdentifier, PendingFetch>>;

/// Coalesces concurrent requests for the same resource into one fetch.
///
/// ```text
///  request ──► cache hit? ──yes──► Ready
///                  │no
///                  ▼
///          pending[identifier] ──exists──► queue, Deferred
///                  │absent
///                  ▼
///          spawn fetch, queue, Deferred
///                  │
///     ┌────────────┴─────────────┐
///     ▼ Ok                       ▼ Err
///  cache.put,                 fail every
///  replay queue in order      queued request
/// ```
///
/// The cache lookup of `submit` and the cache population of a completed
/// fetch both happen under the pending lock, so no request can slip between
/// the two and start a second fetch.
///
/// Fetches run on the runtime captured when the coordinator is built, or the
/// one given through [`Coordinator::runtime`], so `submit` may be called from
/// any thread.
pub struct Coordinator<F> {
    cache: Arc<ResourceCache>,
    fetcher: Arc<F>,
    pending: Arc<PendingMap>,
    generation: AtomicU64,
    fallback_content_type: Arc<str>,
    runtime: Option<Handle>,
}

impl<F> Coordinator<F>
where
    F: Fetcher,
{
    pub fn new(cache: Arc<ResourceCache>, fetcher: F) -> Self {
        Self {
            cache,
            fetcher: Arc::new(fetcher),
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
            fallback_content_type: Arc::from(DEFAULT_CONTENT_TYPE),
            runtime: Handle::try_current().ok(),
        }
    }

    /// Spawns fetches onto `runtime`.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn fallback_content_type(mut self, content_type: impl AsRef<str>) -> Self {
        self.fallback_content_type = Arc::from(content_type.as_ref());
        self
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Whether a fetch for `identifier` is currently in flight.
    pub fn is_fetching(&self, identifier: &ResourceIdentifier) -> bool {
        self.pending.lock().contains_key(identifier)
    }

    /// Number of live requests waiting on the fetch for `identifier`.
    pub fn queued(&self, identifier: &ResourceIdentifier) -> usize {
        self.pending.lock().get(identifier).map_or(0, |state| {
            state.queued.iter().filter(|r| !r.is_canceled()).count()
        })
    }

    pub fn submit(&self, request: LoadingRequest) -> Submission {
        let mut pending = self.pending.lock();

        if let Some(resource) = self.cache.get(request.identifier()) {
            tracing::debug!("Request #{} hit the cache.", request.id());
            return Submission::Ready(request, resource);
        }

        match pending.entry(request.identifier().clone()) {
            Entry::Occupied(mut entry) => {
                let state = entry.get_mut();
                state.queued.retain(|r| !r.is_canceled());
                tracing::debug!(
                    "Request #{} queued behind the fetch of {} ({} waiting).",
                    request.id(),
                    request.identifier(),
                    state.queued.len()
                );
                state.queued.push(request);
            }
            Entry::Vacant(entry) => {
                let runtime = match self.spawner() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::error!("Can not fetch {}: {e}", entry.key());
                        request.finish(Err(e.into()));
                        return Submission::Deferred;
                    }
                };

                let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                // The task can not observe the entry before the lock is released.
                let task = self.spawn_fetch(&runtime, entry.key().clone(), generation);
                entry.insert(PendingFetch {
                    generation,
                    queued: vec![request],
                    task,
                });
            }
        }

        Submission::Deferred
    }

    /// Aborts every fetch in flight, fails the requests waiting on them and
    /// empties the cache.
    pub fn reset(&self) {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock();
            self.cache.clear();
            pending.drain().map(|(_, state)| state).collect()
        };

        for state in drained {
            state.task.abort();
            for request in state.queued {
                request.finish(Err(LoaderError::Reset));
            }
        }
    }

    fn spawner(&self) -> Result<Handle, TryCurrentError> {
        match &self.runtime {
            Some(runtime) => Ok(runtime.clone()),
            None => Handle::try_current(),
        }
    }

    fn spawn_fetch(
        &self,
        runtime: &Handle,
        identifier: ResourceIdentifier,
        generation: u64,
    ) -> JoinHandle<()> {
        let fetcher = self.fetcher.clone();
        let cache = self.cache.clone();
        let pending = self.pending.clone();
        let fallback_content_type = self.fallback_content_type.clone();

        runtime.spawn(async move {
            let result = fetcher.fetch(identifier.url()).await;
            complete(
                &cache,
                &pending,
                identifier,
                generation,
                result,
                &fallback_content_type,
            );
        })
    }
}

fn complete(
    cache: &ResourceCache,
    pending: &PendingMap,
    identifier: ResourceIdentifier,
    generation: u64,
    result: Result<FetchedBody, FetchError>,
    fallback_content_type: &str,
) {
    let (queued, outcome) = {
        let mut pending = pending.lock();
        let state = match pending.entry(identifier.clone()) {
            Entry::Occupied(entry) if entry.get().generation == generation => entry.remove(),
            _ => {
                tracing::debug!("Discarding stale fetch of {identifier}.");
                return;
            }
        };

        // Populated before the lock is released, see `Coordinator::submit`.
        let outcome = result.map(|fetched| {
            cache.put(CachedResource::from_fetched(
                identifier.clone(),
                fetched,
                fallback_content_type,
            ))
        });
        (state.queued, outcome)
    };

    match outcome {
        Ok(resource) => {
            tracing::debug!(
                "Fetched {identifier} ({} bytes), answering {} request(s).",
                resource.total_length(),
                queued.len()
            );
            for request in queued {
                responder::complete(request, &resource);
            }
        }
        Err(e) => {
            tracing::warn!(
                "Fetch of {identifier} failed, failing {} request(s): {e}",
                queued.len()
            );
            for request in queued {
                request.finish(Err(LoaderError::Fetch(e.clone())));
            }
        }
    }
}
