// src/watch/registry.rs

//! Deduplication and ownership of live watchers.
//!
//! The registry holds the only strong reference map from URI to watcher.
//! An entry is removed solely by the watcher's own teardown callback, so a
//! URI stays listed until its stream is closed and disposal has finished.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::fetch::Dispatcher;
use crate::watch::UpdateStream;
use crate::watch::watcher::Watcher;

/// Concurrent URI → watcher mapping. At most one live watcher per URI.
pub(crate) struct WatchRegistry {
    watchers: Mutex<HashMap<String, Arc<Watcher>>>,
}

impl WatchRegistry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            watchers: Mutex::new(HashMap::new()),
        })
    }

    /// Look up or insert the watcher for `uri` and hand back its stream.
    ///
    /// Concurrent calls for the same URI share one watcher and one stream;
    /// `interval` and `token` only take effect for the caller that actually
    /// creates the watcher. `start` is idempotent, so every caller may
    /// attempt it without spawning duplicate loops.
    pub(crate) async fn watch(
        self: Arc<Self>,
        dispatcher: Arc<Dispatcher>,
        uri: &str,
        interval: Duration,
        token: CancellationToken,
    ) -> UpdateStream {
        let watcher = {
            let mut map = self.watchers.lock().unwrap();
            match map.get(uri) {
                Some(existing) => Arc::clone(existing),
                None => {
                    let registry = Arc::downgrade(&self);
                    let key = uri.to_string();
                    let watcher = Arc::new(Watcher::new(
                        dispatcher,
                        uri.to_string(),
                        interval,
                        token,
                        Box::new(move || {
                            if let Some(registry) = registry.upgrade() {
                                registry.remove(&key);
                            }
                        }),
                    ));
                    map.insert(uri.to_string(), Arc::clone(&watcher));
                    debug!(uri, ?interval, "watcher registered");
                    watcher
                }
            }
        };

        Arc::clone(&watcher).start().await;
        watcher.stream()
    }

    /// Request that the watcher for `uri` stop. Returns whether one was
    /// found; unwatching an unknown URI has no effect.
    pub(crate) fn unwatch(&self, uri: &str) -> bool {
        let watcher = {
            let map = self.watchers.lock().unwrap();
            map.get(uri).map(Arc::clone)
        };
        match watcher {
            Some(watcher) => {
                watcher.stop();
                true
            }
            None => false,
        }
    }

    /// Visit currently tracked URIs until `visit` returns false.
    ///
    /// Iterates a snapshot of the key set; inserts and removals that race
    /// with the iteration may or may not be observed.
    pub(crate) fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&str) -> bool,
    {
        let uris: Vec<String> = {
            let map = self.watchers.lock().unwrap();
            map.keys().cloned().collect()
        };
        for uri in uris {
            if !visit(&uri) {
                break;
            }
        }
    }

    fn remove(&self, uri: &str) {
        self.watchers.lock().unwrap().remove(uri);
        debug!(uri, "watcher deregistered");
    }
}
