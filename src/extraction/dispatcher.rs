use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::error::ChunkFailure;
use crate::extraction::chunk::{ChunkExtractor, ChunkOutcome};
use crate::extraction::planner::ChunkSpan;
use crate::job::ProgressCallback;

/// Fans chunks out to a bounded pool of extraction tasks.
pub struct Dispatcher {
    extractor: Arc<ChunkExtractor>,
    max_workers: usize,
}

impl Dispatcher {
    pub fn new(extractor: ChunkExtractor, max_workers: usize) -> Self {
        Self {
            extractor: Arc::new(extractor),
            max_workers: max_workers.max(1),
        }
    }

    /// Spawn one task per chunk, submitted in index order. At most
    /// `max_workers` run the decode tool at once.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, chunks: Vec<ChunkSpan>, progress: Option<ProgressCallback>) -> DispatchHandle {
        let total = chunks.len();
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let (tx, rx) = mpsc::channel(total.max(1));
        let mut tasks = JoinSet::new();

        debug!(
            "Dispatching {} chunks across {} workers",
            total, self.max_workers
        );

        for chunk in chunks {
            let extractor = Arc::clone(&self.extractor);
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();

            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => run_isolated(&extractor, &chunk).await,
                    Err(_) => ChunkOutcome::Empty {
                        index: chunk.index,
                        failure: ChunkFailure::Panicked("worker pool closed".to_string()),
                    },
                };

                if tx.send(outcome).await.is_err() {
                    debug!("Chunk {} finished after its consumer went away", chunk.index);
                }
            });
        }

        // Channel closes once every task has sent its outcome
        drop(tx);

        DispatchHandle {
            rx,
            _tasks: tasks,
            total,
            completed: AtomicUsize::new(0),
            progress,
        }
    }
}

/// Run the extractor, turning a panic into an empty outcome for that chunk
async fn run_isolated(extractor: &ChunkExtractor, chunk: &ChunkSpan) -> ChunkOutcome {
    match AssertUnwindSafe(extractor.extract(chunk)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("Chunk {} failed: {}", chunk.index, message);
            ChunkOutcome::Empty {
                index: chunk.index,
                failure: ChunkFailure::Panicked(message),
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Outstanding chunk tasks, yielded in completion order.
///
/// Dropping the handle aborts any tasks still running; their decode
/// processes are killed and their scratch directories removed.
pub struct DispatchHandle {
    rx: mpsc::Receiver<ChunkOutcome>,
    _tasks: JoinSet<()>,
    total: usize,
    completed: AtomicUsize,
    progress: Option<ProgressCallback>,
}

impl DispatchHandle {
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Wait for the next chunk to finish, then report progress
    pub async fn next(&mut self) -> Option<ChunkOutcome> {
        let outcome = self.rx.recv().await?;
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;

        debug!(
            "Chunk {} resolved ({}/{}): {} frames",
            outcome.index(),
            completed,
            self.total,
            outcome.frame_count()
        );

        if let Some(ref progress) = self.progress {
            progress(completed, self.total);
        }
        Some(outcome)
    }

    /// Wait for every chunk
    pub async fn collect(mut self) -> Vec<ChunkOutcome> {
        let mut outcomes = Vec::with_capacity(self.total);
        while let Some(outcome) = self.next().await {
            outcomes.push(outcome);
        }
        outcomes
    }
}
