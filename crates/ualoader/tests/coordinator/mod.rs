use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
    time::Duration,
};

use futures::{
    task::{waker, ArcWake},
    FutureExt,
};

use ualoader::{
    fetch::TimeoutFetcher, ByteRange, FetchError, LoaderError, LoadingRequest, RangeError,
    ResourceIdentifier, ResourceLoader,
};

use crate::common::{body, settle, TestFetcher, URL};

fn identifier() -> ResourceIdentifier {
    URL.parse().unwrap()
}

#[tokio::test]
async fn test_first_request_fetches_and_caches() -> anyhow::Result<()> {
    let fetcher = Arc::new(TestFetcher::open());
    let loader = ResourceLoader::new(fetcher.clone());

    let response = loader.load(URL, ByteRange::new(0, Some(1000)), true)?.await?;

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(response.data, body());
    let info = response.content_information.unwrap();
    assert_eq!(info.content_length, 1000);
    assert_eq!(info.content_type, "audio/mpeg");
    assert!(!info.byte_range_access_supported);

    let cached = loader.cache().get(&identifier()).unwrap();
    assert_eq!(cached.total_length(), 1000);
    assert!(!loader.coordinator().is_fetching(&identifier()));

    Ok(())
}

#[tokio::test]
async fn test_back_to_back_requests_share_one_fetch() -> anyhow::Result<()> {
    let fetcher = Arc::new(TestFetcher::gated());
    let loader = ResourceLoader::new(fetcher.clone());

    let first = loader.load(URL, ByteRange::new(0, Some(500)), true)?;
    let second = loader.load(URL, ByteRange::new(500, Some(500)), false)?;
    settle().await;

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(loader.coordinator().queued(&identifier()), 2);

    fetcher.release(1);
    let first = first.await?;
    let second = second.await?;

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(first.data, body().slice(0..500));
    assert_eq!(second.data, body().slice(500..1000));

    // both slices point into the same cached buffer
    let cached = loader.cache().get(&identifier()).unwrap();
    let base = cached.body().as_ptr();
    assert_eq!(first.data.as_ptr(), base);
    assert_eq!(second.data.as_ptr(), base.wrapping_add(500));

    Ok(())
}

#[tokio::test]
async fn test_request_during_fetch_is_queued() -> anyhow::Result<()> {
    let fetcher = Arc::new(TestFetcher::gated());
    let loader = ResourceLoader::new(fetcher.clone());

    let first = loader.load(URL, ByteRange::to_end(0), true)?;
    settle().await;
    assert_eq!(fetcher.calls(), 1);

    // the fetch is now suspended inside the fetcher
    let second = loader.load(URL, ByteRange::new(990, Some(100)), false)?;
    let third = loader.load(URL, ByteRange::to_end(250), false)?;
    settle().await;
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(loader.coordinator().queued(&identifier()), 3);

    fetcher.release(1);
    assert_eq!(first.await?.data.len(), 1000);
    assert_eq!(second.await?.data, body().slice(990..1000));
    assert_eq!(third.await?.data.len(), 750);
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(fetcher.max_in_flight(), 1);

    Ok(())
}

#[tokio::test]
async fn test_cache_hits_never_refetch() -> anyhow::Result<()> {
    let fetcher = Arc::new(TestFetcher::open());
    let loader = ResourceLoader::new(fetcher.clone());

    loader.load(URL, ByteRange::new(0, Some(2)), true)?.await?;

    let (request, mut ticket) =
        LoadingRequest::new(identifier(), ByteRange::new(100, Some(10)), false);
    assert!(loader.handle(request));
    // answered before `handle` returned
    let response = (&mut ticket).now_or_never().expect("cache hit must complete synchronously")?;
    assert_eq!(response.data, body().slice(100..110));

    // an equivalent url is the same resource
    loader
        .load("http://MEDIA.example.com:80/episode.mp3", ByteRange::to_end(0), false)?
        .await?;

    assert_eq!(fetcher.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_fetch_fails_every_request_and_allows_retry() -> anyhow::Result<()> {
    let fetcher = Arc::new(TestFetcher::open().script(Err(FetchError::BadStatus(404))));
    let loader = ResourceLoader::new(fetcher.clone());

    let first = loader.load(URL, ByteRange::new(0, Some(500)), true)?;
    let second = loader.load(URL, ByteRange::new(500, Some(500)), false)?;

    for result in [first.await, second.await] {
        assert!(matches!(
            result,
            Err(LoaderError::Fetch(FetchError::BadStatus(404)))
        ));
    }
    assert_eq!(fetcher.calls(), 1);
    assert!(loader.cache().is_empty());
    assert!(!loader.coordinator().is_fetching(&identifier()));

    let retry = loader.load(URL, ByteRange::to_end(0), false)?.await?;
    assert_eq!(retry.data.len(), 1000);
    assert_eq!(fetcher.calls(), 2);

    Ok(())
}

#[tokio::test]
async fn test_canceled_request_does_not_disturb_siblings() -> anyhow::Result<()> {
    let fetcher = Arc::new(TestFetcher::gated());
    let loader = ResourceLoader::new(fetcher.clone());

    let stale = loader.load(URL, ByteRange::new(0, Some(100)), true)?;
    let fresh = loader.load(URL, ByteRange::new(800, Some(100)), false)?;
    settle().await;

    // seek: the player withdraws the stale sub-request
    stale.cancel();
    assert_eq!(loader.coordinator().queued(&identifier()), 1);

    fetcher.release(1);
    assert_eq!(fresh.await?.data, body().slice(800..900));
    assert_eq!(fetcher.calls(), 1);

    // canceling against a cached resource is a no-op as well
    let (request, ticket) = LoadingRequest::new(identifier(), ByteRange::to_end(0), false);
    ticket.cancel();
    assert!(loader.handle(request));

    Ok(())
}

#[tokio::test]
async fn test_out_of_bounds_is_surfaced() -> anyhow::Result<()> {
    let fetcher = Arc::new(TestFetcher::open());
    let loader = ResourceLoader::new(fetcher.clone());

    let result = loader.load(URL, ByteRange::new(1001, Some(10)), false)?.await;
    assert!(matches!(
        result,
        Err(LoaderError::Range(RangeError::OutOfBounds {
            offset: 1001,
            total: 1000,
            ..
        }))
    ));

    let empty = loader.load(URL, ByteRange::new(1000, Some(0)), false)?.await?;
    assert!(empty.data.is_empty());
    assert_eq!(fetcher.calls(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fails_queued_requests() -> anyhow::Result<()> {
    let fetcher = Arc::new(TestFetcher::gated());
    let loader = ResourceLoader::new(TimeoutFetcher::new(
        fetcher.clone(),
        Some(Duration::from_secs(5)),
    ));

    let first = loader.load(URL, ByteRange::to_end(0), true)?;
    let second = loader.load(URL, ByteRange::new(10, Some(10)), false)?;

    for result in [first.await, second.await] {
        assert!(matches!(
            result,
            Err(LoaderError::Fetch(FetchError::Timeout(timeout))) if timeout == Duration::from_secs(5)
        ));
    }
    assert!(loader.cache().is_empty());

    fetcher.release(1);
    let retry = loader.load(URL, ByteRange::to_end(0), false)?.await?;
    assert_eq!(retry.data.len(), 1000);
    assert_eq!(fetcher.calls(), 2);

    Ok(())
}

#[tokio::test]
async fn test_reset_fails_queued_and_refetches() -> anyhow::Result<()> {
    let fetcher = Arc::new(TestFetcher::gated());
    let loader = ResourceLoader::new(fetcher.clone());

    let before = loader.load(URL, ByteRange::to_end(0), true)?;
    settle().await;
    assert_eq!(fetcher.calls(), 1);

    loader.reset();
    assert!(matches!(before.await, Err(LoaderError::Reset)));
    assert!(!loader.coordinator().is_fetching(&identifier()));

    let after = loader.load(URL, ByteRange::new(0, Some(10)), false)?;
    settle().await;
    assert_eq!(fetcher.calls(), 2);

    fetcher.release(1);
    assert_eq!(after.await?.data, body().slice(0..10));
    assert_eq!(loader.cache().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_distinct_resources_fetch_concurrently() -> anyhow::Result<()> {
    let fetcher = Arc::new(TestFetcher::gated());
    let loader = ResourceLoader::new(fetcher.clone());

    let a = loader.load(URL, ByteRange::to_end(0), false)?;
    let b = loader.load("ualoader://media.example.com/other.mp3", ByteRange::to_end(0), false)?;
    settle().await;

    assert_eq!(fetcher.calls(), 2);
    assert_eq!(fetcher.max_in_flight(), 2);

    fetcher.release(2);
    a.await?;
    b.await?;
    assert_eq!(loader.cache().len(), 2);

    Ok(())
}

/// Records the id of a ticket when its reply arrives.
struct ReplyLog {
    id: u64,
    replies: Arc<Mutex<Vec<u64>>>,
}

impl ArcWake for ReplyLog {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.replies.lock().unwrap().push(arc_self.id);
    }
}

#[tokio::test]
async fn test_replies_follow_arrival_order() -> anyhow::Result<()> {
    let fetcher = Arc::new(TestFetcher::gated());
    let loader = ResourceLoader::new(fetcher.clone());
    let replies = Arc::new(Mutex::new(Vec::new()));

    let mut tickets = Vec::new();
    for range in [
        ByteRange::new(900, Some(100)),
        ByteRange::to_end(0),
        ByteRange::new(2000, Some(1)),
        ByteRange::new(10, Some(10)),
    ] {
        let mut ticket = loader.load(URL, range, false)?;
        let log = waker(Arc::new(ReplyLog {
            id: ticket.id(),
            replies: replies.clone(),
        }));
        assert!(Pin::new(&mut ticket)
            .poll(&mut Context::from_waker(&log))
            .is_pending());
        tickets.push(ticket);
    }
    let sent: Vec<_> = tickets.iter().map(|t| t.id()).collect();

    fetcher.release(1);
    settle().await;
    assert!(loader.cache().contains(&identifier()));

    // awaited back to front, answered front to back
    let mut results = Vec::new();
    while let Some(ticket) = tickets.pop() {
        results.push(ticket.await);
    }

    assert_eq!(*replies.lock().unwrap(), sent);
    assert!(matches!(results[1], Err(LoaderError::Range(_))));
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
    assert_eq!(fetcher.calls(), 1);

    Ok(())
}

#[tokio::test]
async fn test_requests_from_a_player_thread() -> anyhow::Result<()> {
    let fetcher = Arc::new(TestFetcher::open());
    let loader = Arc::new(ResourceLoader::new(fetcher.clone()));

    let (request, ticket) = LoadingRequest::new(identifier(), ByteRange::new(0, Some(10)), true);
    let player = {
        let loader = loader.clone();
        std::thread::spawn(move || loader.handle(request))
    };
    assert!(player.join().expect("player thread panicked"));

    assert_eq!(ticket.await?.data, body().slice(0..10));
    assert!(!loader.coordinator().is_fetching(&identifier()));

    let again = loader.load(URL, ByteRange::to_end(990), false)?.await?;
    assert_eq!(again.data, body().slice(990..1000));
    assert_eq!(fetcher.calls(), 1);

    Ok(())
}

#[test]
fn test_miss_without_runtime_fails_cleanly() -> anyhow::Result<()> {
    let fetcher = Arc::new(TestFetcher::open());
    let loader = ResourceLoader::new(fetcher.clone());

    let ticket = loader.load(URL, ByteRange::to_end(0), true)?;
    assert!(matches!(
        futures::executor::block_on(ticket),
        Err(LoaderError::Runtime(_))
    ));
    assert!(!loader.coordinator().is_fetching(&identifier()));
    assert_eq!(fetcher.calls(), 0);

    let runtime = tokio::runtime::Runtime::new()?;
    let loader = loader.runtime(runtime.handle().clone());
    let response = runtime.block_on(loader.load(URL, ByteRange::to_end(0), true)?)?;
    assert_eq!(response.data, body());
    assert_eq!(fetcher.calls(), 1);

    Ok(())
}
