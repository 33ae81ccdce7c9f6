//! Single-writer persistence queue.
//!
//! Every mutation enqueues a full snapshot of the collection while it still
//! holds the collection lock, so snapshots enter the queue in mutation order.
//! One task drains the queue and performs writes one at a time; a stale
//! snapshot can therefore never land after a newer one. Snapshots that pile
//! up while a write is in flight are coalesced: only the newest is written
//! and all of their waiters receive that write's result.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::storage::{KvStore, StorageError};

type Ack = oneshot::Sender<Result<(), StorageError>>;

enum Command {
    Write { bytes: Vec<u8>, ack: Ack },
    Barrier(oneshot::Sender<()>),
}

/// Counters shared between the writer task and readers of diagnostics.
#[derive(Default)]
struct WriterStats {
    queued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    coalesced: AtomicU64,
    last_error: Mutex<Option<StorageError>>,
}

/// Point-in-time view of the writer's progress.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriterSnapshot {
    /// Snapshots submitted but not yet acknowledged.
    pub pending: u64,
    pub completed: u64,
    pub failed: u64,
    /// Snapshots skipped because a newer one superseded them.
    pub coalesced: u64,
    /// Error of the most recent write, cleared by the next successful one.
    pub last_error: Option<StorageError>,
}

/// Handle to the background writer. Dropping every handle stops the task
/// once the queue is drained.
#[derive(Clone)]
pub struct PersistWriter {
    tx: mpsc::UnboundedSender<Command>,
    stats: Arc<WriterStats>,
}

/// Completion of one submitted snapshot.
pub struct PendingWrite(oneshot::Receiver<Result<(), StorageError>>);

impl PendingWrite {
    /// Already-resolved completion, for snapshots that never reached the queue.
    pub(crate) fn resolved(result: Result<(), StorageError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self(rx)
    }

    /// Wait until this snapshot, or a newer one that replaced it, has been written.
    pub async fn wait(self) -> Result<(), StorageError> {
        self.0.await.unwrap_or(Err(StorageError::WriterClosed))
    }
}

impl PersistWriter {
    /// Spawn the writer task on the current tokio runtime.
    pub fn spawn(kv: Arc<dyn KvStore>, key: String) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(WriterStats::default());
        tokio::spawn(run(kv, key, rx, Arc::clone(&stats)));
        Self { tx, stats }
    }

    /// Queue `bytes` as the next blob to persist.
    pub fn submit(&self, bytes: Vec<u8>) -> PendingWrite {
        let (ack, rx) = oneshot::channel();
        self.stats.queued.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(Command::Write { bytes, ack }).is_err() {
            // the returned command carries `ack`; dropping it resolves `rx` to WriterClosed
            self.stats.queued.fetch_sub(1, Ordering::SeqCst);
            warn!("persistence writer is gone; snapshot dropped");
        }
        PendingWrite(rx)
    }

    /// Resolve once every snapshot submitted before this call has been handled.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Barrier(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    pub fn snapshot(&self) -> WriterSnapshot {
        let s = &self.stats;
        let completed = s.completed.load(Ordering::SeqCst);
        let failed = s.failed.load(Ordering::SeqCst);
        let coalesced = s.coalesced.load(Ordering::SeqCst);
        let queued = s.queued.load(Ordering::SeqCst);
        WriterSnapshot {
            pending: queued.saturating_sub(completed + failed + coalesced),
            completed,
            failed,
            coalesced,
            last_error: s.last_error.lock().clone(),
        }
    }
}

async fn run(kv: Arc<dyn KvStore>, key: String, mut rx: mpsc::UnboundedReceiver<Command>, stats: Arc<WriterStats>) {
    while let Some(first) = rx.recv().await {
        let mut latest: Option<Vec<u8>> = None;
        let mut waiters: Vec<Ack> = Vec::new();
        let mut barriers: Vec<oneshot::Sender<()>> = Vec::new();

        let mut absorb = |cmd: Command| match cmd {
            Command::Write { bytes, ack } => {
                latest = Some(bytes);
                waiters.push(ack);
            }
            Command::Barrier(done) => barriers.push(done),
        };
        absorb(first);
        while let Ok(cmd) = rx.try_recv() {
            absorb(cmd);
        }

        if let Some(bytes) = latest {
            let skipped = waiters.len() as u64 - 1;
            let result = kv.write(&key, &bytes).await;
            match &result {
                Ok(()) => {
                    stats.completed.fetch_add(1, Ordering::SeqCst);
                    *stats.last_error.lock() = None;
                    debug!(%key, bytes = bytes.len(), coalesced = skipped, "pet collection persisted");
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::SeqCst);
                    *stats.last_error.lock() = Some(e.clone());
                    warn!(%key, error = %e, "persisting pet collection failed");
                }
            }
            stats.coalesced.fetch_add(skipped, Ordering::SeqCst);
            for ack in waiters {
                let _ = ack.send(result.clone());
            }
        }
        for done in barriers {
            let _ = done.send(());
        }
    }
    debug!(%key, "persistence writer stopped");
}
