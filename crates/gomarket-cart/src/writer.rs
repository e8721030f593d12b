//! # Persistence Writer
//!
//! Background task that owns every write of the cart record.
//!
//! ## Write Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Persistence Writer Flow                              │
//! │                                                                         │
//! │  mutation (under state lock)                                           │
//! │       │  pending_tx.send_replace(Some(PendingWrite { rev, json }))      │
//! │       ▼                                                                 │
//! │  ┌──────────────────────────────┐                                       │
//! │  │ watch channel (latest value) │  rev 4 overwrites rev 3 if the        │
//! │  └──────────────┬───────────────┘  writer hasn't picked 3 up yet        │
//! │                 ▼                                                       │
//! │  PersistenceWriter::run (one task per store, one key)                  │
//! │       │                                                                 │
//! │       ├── store.set(key, json) ── Ok ──► status.persisted = rev        │
//! │       │                                                                 │
//! │       └── Err ──► warn!, sleep(backoff) ─┬─► retry same rev            │
//! │                                          ├─► newer rev arrived:        │
//! │                                          │   switch to it, reset        │
//! │                                          └─► retries exhausted:        │
//! │                                              error!, status.last_error  │
//! │                                                                         │
//! │  SHUTDOWN: finish the newest unsettled revision, then exit.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Because only this task writes the key, writes never race each other and
//! the last write always carries the newest revision handed to it.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use gomarket_store::SharedStore;

use crate::config::PersistenceSettings;
use crate::events::CartEventListener;

// =============================================================================
// Retry Policy
// =============================================================================

/// How failed writes are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failure. 0 = no limit.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&PersistenceSettings::default())
    }
}

impl From<&PersistenceSettings> for RetryPolicy {
    fn from(settings: &PersistenceSettings) -> Self {
        RetryPolicy {
            max_retries: settings.max_retries,
            initial_backoff: settings.initial_backoff(),
            max_backoff: settings.max_backoff(),
        }
    }
}

impl RetryPolicy {
    /// Creates the exponential backoff configuration.
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_backoff,
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Whether another attempt follows `failures` consecutive failures.
    ///
    /// While stopping, an unlimited policy gets no further retries so
    /// shutdown cannot hang on a dead backend.
    fn allows_retry(&self, failures: u32, stopping: bool) -> bool {
        match self.max_retries {
            0 => !stopping,
            max => failures <= max,
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// Where persistence stands.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistStatus {
    /// Newest revision known to be in storage (0 = nothing written yet).
    pub persisted_revision: u64,

    /// Newest revision the writer is done with, persisted or given up on.
    pub settled_revision: u64,

    pub last_persisted_at: Option<DateTime<Utc>>,

    /// Error of the last revision the writer gave up on. Cleared by the next
    /// successful write.
    pub last_error: Option<String>,
}

impl PersistStatus {
    /// True when the writer has nothing in flight up to `revision`.
    pub fn is_settled(&self, revision: u64) -> bool {
        self.settled_revision >= revision
    }
}

// =============================================================================
// Pending Write
// =============================================================================

/// A serialized cart revision waiting to be written.
#[derive(Debug, Clone)]
pub(crate) struct PendingWrite {
    pub revision: u64,
    pub payload: Arc<str>,
}

// =============================================================================
// Writer
// =============================================================================

pub(crate) struct PersistenceWriter {
    store: SharedStore,
    key: String,
    policy: RetryPolicy,
    pending_rx: watch::Receiver<Option<PendingWrite>>,
    status_tx: watch::Sender<PersistStatus>,
    listener: Arc<dyn CartEventListener>,
    shutdown_rx: mpsc::Receiver<()>,

    /// False once every pending sender is gone.
    pending_open: bool,

    /// Set by shutdown; the writer drains and exits.
    stopping: bool,
}

/// Handle for stopping the writer task.
pub(crate) struct WriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl WriterHandle {
    /// Asks the writer to finish up and waits for it to exit.
    pub(crate) async fn shutdown(self) {
        // A full or closed channel means the writer is already stopping.
        let _ = self.shutdown_tx.try_send(());
        if let Err(e) = self.task.await {
            error!(?e, "Persistence writer task failed");
        }
    }
}

impl PersistenceWriter {
    /// Spawns the writer on the current tokio runtime.
    pub(crate) fn spawn(
        store: SharedStore,
        key: String,
        policy: RetryPolicy,
        pending_rx: watch::Receiver<Option<PendingWrite>>,
        status_tx: watch::Sender<PersistStatus>,
        listener: Arc<dyn CartEventListener>,
    ) -> WriterHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let writer = PersistenceWriter {
            store,
            key,
            policy,
            pending_rx,
            status_tx,
            listener,
            shutdown_rx,
            pending_open: true,
            stopping: false,
        };

        let task = tokio::spawn(writer.run());
        WriterHandle { shutdown_tx, task }
    }

    async fn run(mut self) {
        info!(
            key = %self.key,
            backend = self.store.backend_name(),
            "Persistence writer starting"
        );

        while !self.stopping {
            tokio::select! {
                biased;

                changed = self.pending_rx.changed(), if self.pending_open => {
                    if changed.is_err() {
                        debug!("Cart store dropped, draining writer");
                        self.pending_open = false;
                        self.stopping = true;
                        continue;
                    }
                    let next = self.pending_rx.borrow_and_update().clone();
                    if let Some(write) = next {
                        self.persist(write).await;
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Persistence writer shutting down");
                    self.stopping = true;
                }
            }
        }

        if let Some(write) = self.unsettled() {
            self.persist(write).await;
        }

        info!(key = %self.key, "Persistence writer stopped");
    }

    /// Newest queued revision the writer hasn't finished with.
    fn unsettled(&self) -> Option<PendingWrite> {
        let settled = self.status_tx.borrow().settled_revision;
        self.pending_rx
            .borrow()
            .clone()
            .filter(|write| write.revision > settled)
    }

    /// Writes `write`, retrying with backoff. A newer revision replaces the
    /// one being retried.
    async fn persist(&mut self, mut write: PendingWrite) {
        let mut backoff = self.policy.create_backoff();
        let mut failures: u32 = 0;

        loop {
            match self.store.set(&self.key, &write.payload).await {
                Ok(()) => {
                    self.record_success(write.revision);
                    return;
                }
                Err(e) => {
                    failures += 1;
                    let message = e.to_string();
                    let will_retry = self.policy.allows_retry(failures, self.stopping);

                    warn!(
                        revision = write.revision,
                        attempt = failures,
                        will_retry,
                        error = %message,
                        "Cart write failed"
                    );
                    self.listener
                        .on_persist_error(write.revision, &message, will_retry);

                    if !will_retry {
                        error!(
                            revision = write.revision,
                            attempts = failures,
                            error = %message,
                            "Giving up on cart write"
                        );
                        self.record_failure(write.revision, message);
                        return;
                    }
                }
            }

            let delay = backoff.next_backoff().unwrap_or(self.policy.max_backoff);
            debug!(revision = write.revision, ?delay, "Retrying cart write after backoff");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}

                changed = self.pending_rx.changed(), if self.pending_open => {
                    match changed {
                        Ok(()) => {
                            let newer = self.pending_rx.borrow_and_update().clone();
                            if let Some(newer) = newer.filter(|n| n.revision > write.revision) {
                                debug!(
                                    stale = write.revision,
                                    revision = newer.revision,
                                    "Newer revision supersedes failing write"
                                );
                                write = newer;
                                failures = 0;
                                backoff.reset();
                            }
                        }
                        Err(_) => {
                            self.pending_open = false;
                            self.stopping = true;
                        }
                    }
                }

                _ = self.shutdown_rx.recv(), if !self.stopping => {
                    self.stopping = true;
                }
            }
        }
    }

    fn record_success(&self, revision: u64) {
        debug!(revision, "Cart persisted");
        self.status_tx.send_modify(|status| {
            status.persisted_revision = revision;
            status.settled_revision = revision;
            status.last_persisted_at = Some(Utc::now());
            status.last_error = None;
        });
        self.listener.on_persisted(revision);
    }

    fn record_failure(&self, revision: u64, message: String) {
        self.status_tx.send_modify(|status| {
            status.settled_revision = revision;
            status.last_error = Some(message);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_settings() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(100));
        assert_eq!(policy.max_backoff, Duration::from_secs(5));
    }

    #[test]
    fn test_allows_retry() {
        let bounded = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };
        assert!(bounded.allows_retry(1, false));
        assert!(bounded.allows_retry(2, false));
        assert!(!bounded.allows_retry(3, false));
        assert!(bounded.allows_retry(2, true));

        let unlimited = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        assert!(unlimited.allows_retry(1_000, false));
        assert!(!unlimited.allows_retry(1, true));
    }

    #[test]
    fn test_backoff_grows_to_cap() {
        let policy = RetryPolicy {
            max_retries: 0,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
        };
        let mut backoff = policy.create_backoff();

        // First delay comes from the initial interval, with 50% jitter.
        let first = backoff.next_backoff().unwrap();
        assert!(first >= Duration::from_millis(5), "{:?}", first);
        assert!(first <= Duration::from_micros(15_001), "{:?}", first);

        // Jitter may push a delay up to 50% past the cap.
        for _ in 0..10 {
            let delay = backoff.next_backoff().unwrap();
            assert!(delay <= Duration::from_micros(60_001), "{:?}", delay);
        }
    }

    #[test]
    fn test_backoff_restarts_from_initial_after_reset() {
        let policy = RetryPolicy {
            max_retries: 0,
            initial_backoff: Duration::from_millis(2),
            max_backoff: Duration::from_millis(8),
        };
        let mut backoff = policy.create_backoff();
        for _ in 0..5 {
            backoff.next_backoff();
        }

        backoff.reset();
        let delay = backoff.next_backoff().unwrap();
        assert!(delay <= Duration::from_micros(3_001), "{:?}", delay);
    }

    #[test]
    fn test_status_settled() {
        let status = PersistStatus {
            settled_revision: 4,
            ..PersistStatus::default()
        };
        assert!(status.is_settled(0));
        assert!(status.is_settled(4));
        assert!(!status.is_settled(5));
    }
}
