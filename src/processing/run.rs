//! Run-scoped context shared by every source of one ingestion run.

use super::dedup::DedupTracker;
use crate::metrics::RunCounters;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

/// Owner side of a run's cancellation flag.
#[derive(Debug)]
pub struct Cancellation {
    sender: watch::Sender<bool>,
}

impl Cancellation {
    /// Create a flag that starts out not cancelled.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Request cancellation; every signal observes it.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Obtain a signal observing this flag.
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a run's cancellation flag.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    receiver: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// Signal that never fires.
    pub fn never() -> Self {
        let (_, receiver) = watch::channel(false);
        Self { receiver }
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once cancellation is requested; pends forever if the owner goes away first.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Result of a network call bounded by a deadline and the run's cancellation.
#[derive(Debug)]
pub(crate) enum Guarded<T> {
    Completed(T),
    TimedOut,
    Cancelled,
}

/// Await `call` unless the deadline passes or the run is cancelled first.
pub(crate) async fn guarded<F>(
    cancel: &CancellationSignal,
    deadline: Duration,
    call: F,
) -> Guarded<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Guarded::Cancelled,
        result = tokio::time::timeout(deadline, call) => match result {
            Ok(value) => Guarded::Completed(value),
            Err(_) => Guarded::TimedOut,
        },
    }
}

/// Sleep for `delay` unless the run is cancelled first. Returns `false` on cancellation.
pub(crate) async fn interruptible_sleep(cancel: &CancellationSignal, delay: Duration) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

/// Explicit context for one ingestion run: dedup set, counters, and cancellation.
///
/// Created empty at run start and dropped at run end; nothing in it is persisted.
#[derive(Debug)]
pub struct IngestionRun {
    id: Uuid,
    dedup: DedupTracker,
    counters: RunCounters,
    cancel: CancellationSignal,
}

impl IngestionRun {
    /// Start a run observing `cancel`.
    pub fn new(cancel: CancellationSignal) -> Self {
        Self {
            id: Uuid::new_v4(),
            dedup: DedupTracker::new(),
            counters: RunCounters::new(),
            cancel,
        }
    }

    /// Unique identifier of this run.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Cross-source dedup set.
    pub fn dedup(&self) -> &DedupTracker {
        &self.dedup
    }

    /// Run-wide counters.
    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    /// Cancellation signal for calls made on behalf of this run.
    pub fn cancellation(&self) -> &CancellationSignal {
        &self.cancel
    }

    /// Whether the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
