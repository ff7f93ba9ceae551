use std::{
    future::Future,
    pin::Pin,
    sync::atomic::{AtomicU64, Ordering},
    task::{Context, Poll},
};

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::{
    error::{LoaderError, LoaderResult},
    identifier::ResourceIdentifier,
    range::ByteRange,
};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentInformation {
    pub content_type: String,
    pub content_length: u64,
    pub byte_range_access_supported: bool,
}

#[derive(Debug, Clone)]
pub struct LoadingResponse {
    /// Present when the request asked for content information.
    pub content_information: Option<ContentInformation>,
    pub data: Bytes,
}

/// One sub-request of the player.
///
/// Consumed exactly once: either answered from the cache or queued behind a
/// fetch and answered when it completes.
#[derive(Debug)]
pub struct LoadingRequest {
    id: u64,
    identifier: ResourceIdentifier,
    range: ByteRange,
    wants_content_info: bool,
    completion: oneshot::Sender<LoaderResult<LoadingResponse>>,
}

impl LoadingRequest {
    pub fn new(
        identifier: ResourceIdentifier,
        range: ByteRange,
        wants_content_info: bool,
    ) -> (Self, LoadingTicket) {
        let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        let (completion, receiver) = oneshot::channel();
        let request = Self {
            id,
            identifier,
            range,
            wants_content_info,
            completion,
        };
        (request, LoadingTicket { id, receiver })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn identifier(&self) -> &ResourceIdentifier {
        &self.identifier
    }

    pub fn range(&self) -> &ByteRange {
        &self.range
    }

    pub fn wants_content_info(&self) -> bool {
        self.wants_content_info
    }

    /// Whether the originator withdrew the request.
    pub fn is_canceled(&self) -> bool {
        self.completion.is_closed()
    }

    /// Delivers the outcome. Returns `false` if nobody is waiting for it anymore.
    pub fn finish(self, result: LoaderResult<LoadingResponse>) -> bool {
        let delivered = self.completion.send(result).is_ok();
        if !delivered {
            tracing::debug!("Request #{} was canceled, dropping its result.", self.id);
        }
        delivered
    }
}

/// Caller side of a [`LoadingRequest`]. Resolves once the request finishes.
///
/// Dropping the ticket or calling [`LoadingTicket::cancel`] withdraws the
/// request without disturbing the fetch it may be waiting on.
#[derive(Debug)]
pub struct LoadingTicket {
    id: u64,
    receiver: oneshot::Receiver<LoaderResult<LoadingResponse>>,
}

impl LoadingTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(mut self) {
        self.receiver.close();
    }
}

impl Future for LoadingTicket {
    type Output = LoaderResult<LoadingResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(LoaderError::Abandoned)))
    }
}
