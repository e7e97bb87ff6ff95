// src/fetch/mod.rs

//! Conditional fetching of byte payloads by URI.
//!
//! This module is responsible for:
//! - The `ConditionalFetcher` trait every backend implements.
//! - The `Dispatcher` that maps a URI scheme to the right backend.
//!
//! It does **not** know about watching or polling; the watch core calls
//! `Dispatcher::load_if` once per tick and interprets the result.

pub mod file;
pub mod http;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use url::Url;

use crate::errors::{Error, Result};
use crate::fetch::file::FileFetcher;
use crate::fetch::http::HttpFetcher;

/// A backend that retrieves the payload behind a URI, but only if it has
/// changed since a given time.
///
/// Contract:
/// - `Ok(None)` — the resource exists but has not changed since
///   `updated_since`.
/// - `Ok(Some(bytes))` — the resource changed; this is the new full payload.
/// - `Err(_)` — the attempt failed (not found, access denied, transient
///   fault). The watch core does not interpret error kinds.
#[async_trait]
pub trait ConditionalFetcher: Send + Sync {
    async fn fetch_if(&self, uri: &Url, updated_since: DateTime<Utc>) -> Result<Option<Bytes>>;
}

/// Maps a URI scheme to its registered `ConditionalFetcher`.
///
/// Built once at construction and optionally extended via `register` before
/// first use; resolution itself is pure and takes no locks.
pub struct Dispatcher {
    fetchers: HashMap<String, Arc<dyn ConditionalFetcher>>,
}

impl Dispatcher {
    /// Create a dispatcher with the default backends: `file`, `http` and
    /// `https` (the latter two sharing one HTTP client).
    pub fn with_defaults(client: reqwest::Client) -> Self {
        let web: Arc<dyn ConditionalFetcher> = Arc::new(HttpFetcher::new(client));

        let mut fetchers: HashMap<String, Arc<dyn ConditionalFetcher>> = HashMap::new();
        fetchers.insert("file".to_string(), Arc::new(FileFetcher::new()));
        fetchers.insert("http".to_string(), Arc::clone(&web));
        fetchers.insert("https".to_string(), web);

        Self { fetchers }
    }

    /// Register a fetcher for an additional scheme (e.g. an object-storage
    /// scheme). Schemes are compared case-insensitively.
    ///
    /// Fails with `SchemeAlreadyRegistered` instead of overwriting; this is
    /// a configuration-time operation, not a runtime one.
    pub fn register(&mut self, scheme: &str, fetcher: Arc<dyn ConditionalFetcher>) -> Result<()> {
        let scheme = scheme.to_ascii_lowercase();
        if self.fetchers.contains_key(&scheme) {
            return Err(Error::SchemeAlreadyRegistered { scheme });
        }
        self.fetchers.insert(scheme, fetcher);
        Ok(())
    }

    /// Resolve the fetcher responsible for a URI's scheme.
    pub fn resolve(&self, uri: &Url) -> Result<Arc<dyn ConditionalFetcher>> {
        let scheme = uri.scheme().to_ascii_lowercase();
        match self.fetchers.get(&scheme) {
            Some(fetcher) => Ok(Arc::clone(fetcher)),
            None => Err(Error::UnsupportedScheme { scheme }),
        }
    }

    /// Parse `uri`, resolve its backend and perform one conditional fetch.
    ///
    /// `Ok(None)` means "exists but unchanged since `updated_since`".
    pub async fn load_if(
        &self,
        uri: &str,
        updated_since: DateTime<Utc>,
    ) -> Result<Option<Bytes>> {
        let url = Url::parse(uri)?;
        let fetcher = self.resolve(&url)?;
        fetcher.fetch_if(&url, updated_since).await
    }
}
