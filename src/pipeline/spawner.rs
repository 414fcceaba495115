use std::panic::AssertUnwindSafe;
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::FutureExt;

/// A unit of background work. Jobs report their own errors; the spawner only
/// sees completion.
pub type Job = BoxFuture<'static, ()>;

/// Where fire-and-forget jobs go. Nobody awaits a spawned job.
pub trait TaskSpawner: Send + Sync {
    fn spawn(&self, name: &'static str, job: Job);
}

/// One Tokio task per job. A panicking job is logged and does not take
/// anything else down.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSpawner;

impl TaskSpawner for TokioSpawner {
    fn spawn(&self, name: &'static str, job: Job) {
        let handle = tokio::spawn(job);
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!(job = name, "Background job panicked");
                }
            }
        });
    }
}

/// Holds jobs until `run_pending` is awaited, so tests can decide exactly
/// when background work happens.
#[derive(Default)]
pub struct QueuedSpawner {
    queue: Mutex<Vec<(&'static str, Job)>>,
}

impl QueuedSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Vec<&'static str> {
        self.lock().iter().map(|(name, _)| *name).collect()
    }

    /// Run queued jobs in submission order, including jobs they spawn, until
    /// the queue is empty. Returns how many ran.
    pub async fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let batch: Vec<_> = std::mem::take(&mut *self.lock());
            if batch.is_empty() {
                return ran;
            }
            for (name, job) in batch {
                if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                    tracing::error!(job = name, "Background job panicked");
                }
                ran += 1;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(&'static str, Job)>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TaskSpawner for QueuedSpawner {
    fn spawn(&self, name: &'static str, job: Job) {
        self.lock().push((name, job));
    }
}
