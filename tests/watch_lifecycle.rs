use std::error::Error;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use url::Url;
use uriwatch::{ConditionalFetcher, Loader, Update};

type TestResult<T = ()> = Result<T, Box<dyn Error>>;

const RECV_WINDOW: Duration = Duration::from_secs(2);

fn file_uri(f: &NamedTempFile) -> String {
    Url::from_file_path(f.path()).unwrap().to_string()
}

async fn recv_within(stream: &uriwatch::UpdateStream) -> Option<Update> {
    tokio::time::timeout(RECV_WINDOW, stream.recv())
        .await
        .expect("timed out waiting for an update")
}

/// Fetcher that alternates between a fresh payload and a failure on each
/// call, for exercising the success/error interleaving on the stream.
struct FlappingFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl ConditionalFetcher for FlappingFetcher {
    async fn fetch_if(
        &self,
        _uri: &Url,
        _updated_since: DateTime<Utc>,
    ) -> uriwatch::errors::Result<Option<Bytes>> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        if n % 2 == 0 {
            Ok(Some(Bytes::from(format!("payload-{n}"))))
        } else {
            Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "flap").into())
        }
    }
}

#[tokio::test]
async fn watching_a_file_delivers_exactly_one_update_per_change() -> TestResult {
    let mut f = NamedTempFile::new()?;
    f.write_all(b"v1")?;
    f.flush()?;
    let uri = file_uri(&f);

    let loader = Loader::new();
    let stream = loader
        .watch(&uri, Duration::from_millis(10), CancellationToken::new())
        .await;

    // The immediate first check delivers the initial contents.
    match recv_within(&stream).await {
        Some(Update::Data(data)) => assert_eq!(&data[..], b"v1"),
        other => panic!("expected initial payload, got {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    std::fs::write(f.path(), b"v2")?;

    match recv_within(&stream).await {
        Some(Update::Data(data)) => assert_eq!(&data[..], b"v2"),
        other => panic!("expected changed payload, got {other:?}"),
    }

    // Unchanged ticks emit nothing at all.
    let extra = tokio::time::timeout(Duration::from_millis(100), stream.recv()).await;
    assert!(extra.is_err(), "unexpected update for an unchanged file");

    assert!(loader.unwatch(&uri));
    Ok(())
}

#[tokio::test]
async fn concurrent_watches_share_one_watcher_and_stream() -> TestResult {
    let mut f = NamedTempFile::new()?;
    f.write_all(b"v1")?;
    f.flush()?;
    let uri = file_uri(&f);

    let loader = Loader::new();
    let token = CancellationToken::new();
    let a = loader
        .watch(&uri, Duration::from_millis(10), token.clone())
        .await;
    let b = loader
        .watch(&uri, Duration::from_millis(10), token.clone())
        .await;

    assert!(a.same_stream(&b));

    let mut watched = 0;
    loader.range_watchers(|_| {
        watched += 1;
        true
    });
    assert_eq!(watched, 1);

    assert!(loader.unwatch(&uri));
    Ok(())
}

#[tokio::test]
async fn stream_interleaves_successes_and_failures_in_call_order() -> TestResult {
    let loader = Loader::builder()
        .with_fetcher(
            "flap",
            Arc::new(FlappingFetcher {
                calls: AtomicUsize::new(0),
            }),
        )
        .build()?;

    let stream = loader
        .watch(
            "flap://resource",
            Duration::from_millis(5),
            CancellationToken::new(),
        )
        .await;

    for n in 0..4 {
        let update = recv_within(&stream).await.expect("stream closed early");
        if n % 2 == 0 {
            match update {
                Update::Data(data) => {
                    assert_eq!(&data[..], format!("payload-{n}").as_bytes())
                }
                Update::Failed(err) => panic!("call {n}: expected data, got error {err}"),
            }
        } else {
            assert!(
                matches!(update, Update::Failed(_)),
                "call {n}: expected a failure"
            );
        }
    }

    assert!(loader.unwatch("flap://resource"));
    Ok(())
}

#[tokio::test]
async fn unsupported_schemes_fail_asynchronously_on_the_stream() -> TestResult {
    let loader = Loader::new();

    // watch() itself never fails; the error arrives as an update.
    let stream = loader
        .watch(
            "gopher://example.com/x",
            Duration::from_millis(5),
            CancellationToken::new(),
        )
        .await;

    match recv_within(&stream).await {
        Some(Update::Failed(uriwatch::Error::UnsupportedScheme { scheme })) => {
            assert_eq!(scheme, "gopher")
        }
        other => panic!("expected UnsupportedScheme update, got {other:?}"),
    }

    assert!(loader.unwatch("gopher://example.com/x"));
    Ok(())
}

#[tokio::test]
async fn cancelling_the_token_closes_the_stream_and_drops_the_entry() -> TestResult {
    let mut f = NamedTempFile::new()?;
    f.write_all(b"v1")?;
    f.flush()?;
    let uri = file_uri(&f);

    let loader = Loader::new();
    let token = CancellationToken::new();
    let stream = loader
        .watch(&uri, Duration::from_millis(10), token.clone())
        .await;

    token.cancel();

    // Drain until the stream closes; must happen within one interval plus
    // the fetch timeout (far less in practice).
    tokio::time::timeout(RECV_WINDOW, async {
        while stream.recv().await.is_some() {}
    })
    .await?;

    // Teardown removed the registry entry, so there is nothing to unwatch.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!loader.unwatch(&uri));

    let mut watched = 0;
    loader.range_watchers(|_| {
        watched += 1;
        true
    });
    assert_eq!(watched, 0);
    Ok(())
}

#[tokio::test]
async fn unwatch_closes_the_stream_and_a_new_watch_starts_fresh() -> TestResult {
    let mut f = NamedTempFile::new()?;
    f.write_all(b"v1")?;
    f.flush()?;
    let uri = file_uri(&f);

    let loader = Loader::new();
    let stream = loader
        .watch(&uri, Duration::from_millis(10), CancellationToken::new())
        .await;

    assert!(loader.unwatch(&uri));
    tokio::time::timeout(RECV_WINDOW, async {
        while stream.recv().await.is_some() {}
    })
    .await?;

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!loader.unwatch(&uri));

    // A watcher is never resurrected; this is a fresh one with a fresh
    // stream that re-delivers the current contents.
    let fresh = loader
        .watch(&uri, Duration::from_millis(10), CancellationToken::new())
        .await;
    assert!(!fresh.same_stream(&stream));
    match recv_within(&fresh).await {
        Some(Update::Data(data)) => assert_eq!(&data[..], b"v1"),
        other => panic!("expected initial payload, got {other:?}"),
    }

    assert!(loader.unwatch(&uri));
    Ok(())
}
