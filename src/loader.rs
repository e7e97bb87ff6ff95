// src/loader.rs

//! The public facade: load a URI once, or watch it for changes.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::errors::Result;
use crate::fetch::{ConditionalFetcher, Dispatcher};
use crate::watch::{UpdateStream, WatchRegistry};

/// Loads byte payloads by URI and watches URIs for changes.
///
/// `file://`, `http://` and `https://` are supported out of the box;
/// additional schemes (object storage and the like) are registered through
/// [`LoaderBuilder::with_fetcher`]. One `Loader` owns one watch registry,
/// so watches are deduplicated per URI within it; there is no process-wide
/// state.
pub struct Loader {
    dispatcher: Arc<Dispatcher>,
    registry: Arc<WatchRegistry>,
}

impl Loader {
    /// A loader with the default backends.
    pub fn new() -> Self {
        Self::from_dispatcher(Dispatcher::with_defaults(reqwest::Client::new()))
    }

    pub fn builder() -> LoaderBuilder {
        LoaderBuilder::default()
    }

    fn from_dispatcher(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            registry: WatchRegistry::new(),
        }
    }

    /// Fetch the full payload behind `uri`.
    pub async fn load(&self, uri: &str) -> Result<Bytes> {
        let payload = self.load_if(uri, DateTime::UNIX_EPOCH).await?;
        Ok(payload.unwrap_or_default())
    }

    /// Fetch the payload behind `uri` only if it changed after
    /// `updated_since`; `Ok(None)` means it has not.
    pub async fn load_if(&self, uri: &str, updated_since: DateTime<Utc>) -> Result<Option<Bytes>> {
        self.dispatcher.load_if(uri, updated_since).await
    }

    /// Watch `uri`, polling every `interval`, until `token` is cancelled or
    /// the URI is unwatched.
    ///
    /// Never fails synchronously: an unreachable resource or unsupported
    /// scheme surfaces as `Update::Failed` values on the stream, retried
    /// every interval. Concurrent calls for the same URI share one watcher
    /// and one stream; the `interval` and `token` of the first caller win.
    pub async fn watch(
        &self,
        uri: &str,
        interval: Duration,
        token: CancellationToken,
    ) -> UpdateStream {
        Arc::clone(&self.registry)
            .watch(Arc::clone(&self.dispatcher), uri, interval, token)
            .await
    }

    /// Stop watching `uri`. Returns whether a live watcher existed. The
    /// watcher's stream closes once its final tick has finished.
    pub fn unwatch(&self, uri: &str) -> bool {
        self.registry.unwatch(uri)
    }

    /// Visit the currently watched URIs until `visit` returns false.
    /// Best-effort snapshot under concurrent watch/unwatch.
    pub fn range_watchers<F>(&self, visit: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.registry.range(visit)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration-time construction of a [`Loader`].
#[derive(Default)]
pub struct LoaderBuilder {
    http_client: Option<reqwest::Client>,
    fetchers: Vec<(String, Arc<dyn ConditionalFetcher>)>,
}

impl LoaderBuilder {
    /// Use a pre-configured HTTP client for the `http`/`https` backends.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Register a fetcher for an additional URI scheme.
    pub fn with_fetcher(mut self, scheme: &str, fetcher: Arc<dyn ConditionalFetcher>) -> Self {
        self.fetchers.push((scheme.to_string(), fetcher));
        self
    }

    /// Fails if a registered scheme collides with a default or an earlier
    /// registration.
    pub fn build(self) -> Result<Loader> {
        let mut dispatcher =
            Dispatcher::with_defaults(self.http_client.unwrap_or_default());
        for (scheme, fetcher) in self.fetchers {
            dispatcher.register(&scheme, fetcher)?;
        }
        Ok(Loader::from_dispatcher(dispatcher))
    }
}
