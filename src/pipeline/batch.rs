use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, warn};

use super::IngestionPipeline;
use super::types::BatchOutcome;
use crate::s3::error::{IngestError, Result};
use crate::s3::store::Store;

const QUEUE_CAPACITY: usize = 100;

/// Per-item completion hook: input index and whether the item succeeded
pub type ProgressCallback = Arc<dyn Fn(usize, bool) + Send + Sync>;

impl<S: Store> IngestionPipeline<S> {
    /// Fan `items` out to at most `max_concurrent` workers and fan the
    /// outcomes back in by input index.
    ///
    /// Returns only after every worker has exited. A slot whose worker died
    /// holds `WorkerFailed`; a slot not finished by the batch deadline holds
    /// `Timeout`.
    pub(crate) async fn run_batch<I, T, F, Fut>(&self, items: Vec<I>, work: F) -> BatchOutcome<T>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(Self, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let total = items.len();
        if total == 0 {
            return BatchOutcome::from_slots(Vec::new());
        }

        let worker_count = self.options.max_concurrent.clamp(1, total);
        let deadline = self.options.timeout.map(|timeout| Instant::now() + timeout);

        info!(
            "Processing batch of {} items with {} workers",
            total, worker_count
        );

        // Create work channel and results channel
        let (work_tx, work_rx) = mpsc::channel::<(usize, I)>(QUEUE_CAPACITY);
        let (result_tx, mut result_rx) = mpsc::channel::<(usize, Result<T>)>(QUEUE_CAPACITY);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let work = Arc::new(work);

        // Spawn worker tasks
        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let work = Arc::clone(&work);
            let pipeline = self.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    let next = {
                        let mut rx_guard = work_rx.lock().await;
                        rx_guard.recv().await
                    };
                    let Some((index, item)) = next else {
                        break; // Channel closed
                    };

                    let outcome = match deadline {
                        Some(deadline) if Instant::now() >= deadline => Err(IngestError::Timeout),
                        Some(deadline) => timeout_at(deadline, work(pipeline.clone(), item))
                            .await
                            .unwrap_or(Err(IngestError::Timeout)),
                        None => work(pipeline.clone(), item).await,
                    };

                    if let Err(e) = &outcome {
                        warn!("Batch item {} failed: {}", index, e);
                    }

                    if result_tx.send((index, outcome)).await.is_err() {
                        break;
                    }
                }
                debug!("Worker {} exiting", worker_id);
            }));
        }
        drop(result_tx); // Drop original sender

        // Spawn result collector task
        let progress = self.progress.clone();
        let collector = tokio::spawn(async move {
            let mut slots: Vec<Option<Result<T>>> = (0..total).map(|_| None).collect();
            while let Some((index, outcome)) = result_rx.recv().await {
                if let Some(progress) = &progress {
                    progress(index, outcome.is_ok());
                }
                slots[index] = Some(outcome);
            }
            slots
        });

        // Producer: every item is queued before any worker result is awaited
        for entry in items.into_iter().enumerate() {
            if work_tx.send(entry).await.is_err() {
                error!("All batch workers exited before the queue was drained");
                break;
            }
        }
        drop(work_tx); // Close channel to signal workers to exit

        for result in futures::future::join_all(workers).await {
            if let Err(e) = result {
                error!("Batch worker panicked: {}", e);
            }
        }

        let slots = match collector.await {
            Ok(slots) => slots,
            Err(e) => {
                error!("Batch result collector failed: {}", e);
                (0..total).map(|_| None).collect()
            }
        };

        let outcome = BatchOutcome::from_slots(
            slots
                .into_iter()
                .map(|slot| {
                    slot.unwrap_or_else(|| {
                        Err(IngestError::WorkerFailed(
                            "worker exited without reporting".to_string(),
                        ))
                    })
                })
                .collect(),
        );

        info!(
            "Batch finished: {} succeeded, {} failed",
            outcome.succeeded(),
            outcome.failed()
        );

        outcome
    }
}
