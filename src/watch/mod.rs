// src/watch/mod.rs

//! The watch core: per-URI polling state machines and update delivery.
//!
//! This module is responsible for:
//! - The `Update` value emitted for every observed change or failed poll.
//! - The `UpdateStream` handle callers drain.
//! - The per-URI `Watcher` state machine (`watcher.rs`).
//! - The `WatchRegistry` that deduplicates watches per URI (`registry.rs`).
//!
//! It does **not** know how bytes are fetched; backends live behind the
//! `ConditionalFetcher` trait in `crate::fetch`.

pub mod registry;
pub mod watcher;

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, mpsc};

use crate::errors::Error;

pub(crate) use registry::WatchRegistry;

/// One emitted result of a polling tick.
///
/// An unchanged tick emits nothing at all, so every value a consumer sees
/// is meaningful: either a new payload or a failed attempt.
#[derive(Debug)]
pub enum Update {
    /// The watched resource changed; this is the new full payload.
    Data(Bytes),
    /// The poll attempt failed. The watch stays alive and retries on the
    /// next tick, so persistent faults repeat here every interval.
    Failed(Error),
}

/// Handle onto a watcher's update stream.
///
/// Cloning is cheap and every clone refers to the same underlying stream:
/// concurrent `watch()` calls for one URI all observe the same sequence.
/// Any number of readers may call `recv`, but each update is delivered to
/// exactly one of them, so meaningful in-order consumption expects a single
/// logical consumer.
#[derive(Clone)]
pub struct UpdateStream {
    inner: Arc<Mutex<mpsc::Receiver<Update>>>,
}

impl UpdateStream {
    pub(crate) fn new(rx: mpsc::Receiver<Update>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rx)),
        }
    }

    /// Wait for the next update. Returns `None` once the watcher has been
    /// disposed and all pending updates have been drained.
    pub async fn recv(&self) -> Option<Update> {
        self.inner.lock().await.recv().await
    }

    /// Whether two handles refer to the same underlying stream.
    pub fn same_stream(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for UpdateStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateStream").finish()
    }
}
