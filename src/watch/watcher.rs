// src/watch/watcher.rs

//! The per-URI polling state machine.
//!
//! Lifecycle is a single forward path, `Created → Running → Canceled →
//! Disposed`, held in one atomic word. Every transition is a
//! compare-and-swap and only the caller that wins the CAS performs the
//! transition's side effects; this is what makes `start` idempotent and
//! guarantees the stream is closed and the teardown callback fired exactly
//! once even when `stop` races with cancellation.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::fetch::Dispatcher;
use crate::watch::{Update, UpdateStream};

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const CANCELED: u8 = 2;
const DISPOSED: u8 = 3;

/// Ceiling on how long a single poll attempt may take, regardless of the
/// configured interval.
const CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Callback fired exactly once when the watcher is disposed, used by the
/// registry to drop its entry.
pub(crate) type TeardownFn = Box<dyn FnOnce() + Send>;

/// Watches a single URI, polling it at a fixed interval and publishing
/// results on a bounded stream.
///
/// The capacity-1 update channel is deliberate backpressure: a slow
/// consumer stalls the polling loop rather than losing or buffering
/// unboundedly many updates.
pub(crate) struct Watcher {
    uri: String,
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    token: CancellationToken,
    state: AtomicU8,
    /// Time of the last successful publish, as unix microseconds. Only ever
    /// advanced, never rewound, so emitted updates are monotonically
    /// ordered. Zero means "never updated".
    updated_at_micros: AtomicI64,
    tx: Mutex<Option<mpsc::Sender<Update>>>,
    stream: UpdateStream,
    on_dispose: Mutex<Option<TeardownFn>>,
    #[cfg(test)]
    loop_entries: std::sync::atomic::AtomicUsize,
}

impl Watcher {
    pub(crate) fn new(
        dispatcher: Arc<Dispatcher>,
        uri: String,
        interval: Duration,
        token: CancellationToken,
        on_dispose: TeardownFn,
    ) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            uri,
            dispatcher,
            interval,
            token,
            state: AtomicU8::new(CREATED),
            updated_at_micros: AtomicI64::new(0),
            tx: Mutex::new(Some(tx)),
            stream: UpdateStream::new(rx),
            on_dispose: Mutex::new(Some(on_dispose)),
            #[cfg(test)]
            loop_entries: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Handle onto this watcher's update stream.
    pub(crate) fn stream(&self) -> UpdateStream {
        self.stream.clone()
    }

    /// Begin polling: one immediate check, then the background loop.
    ///
    /// Idempotent; only the caller that wins the `Created → Running`
    /// transition spawns the loop, every later call is a no-op.
    pub(crate) async fn start(self: Arc<Self>) {
        if !self.change_state(CREATED, RUNNING) {
            return;
        }

        Arc::clone(&self).check().await;

        tokio::spawn(self.check_loop());
    }

    /// Request teardown. The in-flight check, if any, is allowed to finish;
    /// disposal happens on the next loop iteration.
    pub(crate) fn stop(&self) {
        if self.change_state(RUNNING, CANCELED) {
            debug!(uri = %self.uri, "watcher canceled");
            return;
        }
        // Canceled before it ever started: there is no loop to observe the
        // transition, so dispose here.
        if self.change_state(CREATED, CANCELED) {
            self.dispose();
        }
    }

    /// One poll attempt.
    async fn check(self: Arc<Self>) {
        if self.token.is_cancelled() {
            self.stop();
        }

        match self.state.load(Ordering::Acquire) {
            CANCELED => {
                self.dispose();
                return;
            }
            RUNNING => {}
            // Created or Disposed: a stray tick after teardown (or before
            // start), nothing to do.
            _ => return,
        }

        // Run the tick in its own task so a panicking fetcher cannot take
        // down the polling loop; the fault is logged and absorbed.
        let watcher = Arc::clone(&self);
        if let Err(join_err) = tokio::spawn(watcher.tick()).await
            && join_err.is_panic()
        {
            error!(uri = %self.uri, error = %join_err, "poll tick panicked, suppressed");
        }
    }

    /// The fetch-and-publish half of a check. Runs on its own task.
    async fn tick(self: Arc<Self>) {
        let Some(tx) = self.sender() else {
            return;
        };

        let now = Utc::now();
        let since = self.updated_since();

        // The sub-deadline is the caller's cancellation clipped to a fixed
        // ceiling: a fired token cuts a hung fetch short instead of letting
        // it run out the full timeout. Disposal follows at the next loop
        // iteration.
        let update = tokio::select! {
            _ = self.token.cancelled() => {
                debug!(uri = %self.uri, "fetch abandoned, watch cancelled");
                return;
            }
            fetched = tokio::time::timeout(
                CHECK_TIMEOUT,
                self.dispatcher.load_if(&self.uri, since),
            ) => match fetched {
                // Nothing changed since the last fetch: skip silently.
                Ok(Ok(None)) => return,
                Ok(Ok(Some(data))) => Update::Data(data),
                Ok(Err(err)) => Update::Failed(err),
                Err(_) => Update::Failed(crate::errors::Error::Timeout(CHECK_TIMEOUT)),
            }
        };

        self.updated_at_micros
            .fetch_max(now.timestamp_micros(), Ordering::AcqRel);

        // Blocks while the capacity-1 channel is full; a watcher never
        // discards an update. The watcher's own stream handle keeps the
        // receiver alive, so the send cannot fail.
        let _ = tx.send(update).await;
    }

    /// Poll until canceled. Tests the cancellation signal before every
    /// tick so a fired token always leads to disposal.
    async fn check_loop(self: Arc<Self>) {
        #[cfg(test)]
        self.loop_entries
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        debug!(uri = %self.uri, interval = ?self.interval, "poll loop started");

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    self.stop();
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            Arc::clone(&self).check().await;

            if self.state.load(Ordering::Acquire) != RUNNING {
                break;
            }
        }

        // No-op unless the state is still Canceled; covers every exit path,
        // including a stop() that landed while a check was in flight.
        self.dispose();

        debug!(uri = %self.uri, "poll loop ended");
    }

    /// Terminal cleanup: close the stream and fire the teardown callback.
    /// Guarded so it only ever runs once, and only from `Canceled`.
    fn dispose(&self) {
        if !self.change_state(CANCELED, DISPOSED) {
            return;
        }

        // Dropping the sender closes the stream; an in-flight tick holds
        // its own clone and may still deliver one final update.
        self.tx.lock().unwrap().take();

        if let Some(teardown) = self.on_dispose.lock().unwrap().take() {
            teardown();
        }

        debug!(uri = %self.uri, "watcher disposed");
    }

    fn change_state(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn sender(&self) -> Option<mpsc::Sender<Update>> {
        self.tx.lock().unwrap().clone()
    }

    fn updated_since(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.updated_at_micros.load(Ordering::Acquire))
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}
