use std::{path::PathBuf, sync::Arc};

use rama::{
    error::{BoxError, ErrorContext as _},
    graceful::ShutdownGuard,
    telemetry::tracing::{self, Instrument as _},
};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinSet,
};

use super::{Completion, Worker, WorkerSummary};
use crate::{
    metrics::Metrics,
    sink::{MakeSink, RecordSink},
    throttle::RateLimit,
};

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub workers: usize,
    pub rate: RateLimit,
}

type SharedReceiver = Arc<Mutex<mpsc::Receiver<PathBuf>>>;

/// A fixed set of workers, each with its own sink,
/// competing for file paths on a shared bounded queue.
#[derive(Debug)]
pub struct WorkerPool {
    tasks: JoinSet<WorkerSummary>,
}

/// Producer side of the pool's work queue.
///
/// Dropping it closes the queue: workers finish what is queued and exit.
#[derive(Debug)]
pub struct WorkQueue {
    tx: mpsc::Sender<PathBuf>,
}

impl WorkQueue {
    /// Enqueue a unit of work, waiting while the queue is full.
    ///
    /// Returns `false` if the unit was not accepted,
    /// either because shutdown was requested or because no worker is left.
    pub async fn push(&self, guard: &ShutdownGuard, path: PathBuf) -> bool {
        tokio::select! {
            biased;

            _ = guard.cancelled() => {
                tracing::debug!(path = ?path, "refuse work unit: guard shutdown");
                false
            }
            result = self.tx.send(path) => {
                if let Err(err) = result {
                    tracing::debug!(path = ?err.0, "refuse work unit: no workers left");
                    return false;
                }
                true
            }
        }
    }
}

impl WorkerPool {
    /// Create a sink for every worker and start them.
    ///
    /// Failing to create any of the sinks is fatal, sinks already
    /// created at that point are closed before returning the error.
    pub async fn try_new<M: MakeSink>(
        guard: ShutdownGuard,
        make_sink: &M,
        cfg: PoolConfig,
        metrics: Arc<Metrics>,
    ) -> Result<(Self, WorkQueue), BoxError> {
        let workers = cfg.workers.max(1);

        let mut sinks = Vec::with_capacity(workers);
        for id in 0..workers {
            match make_sink.make_sink().await {
                Ok(sink) => sinks.push(sink),
                Err(err) => {
                    for sink in sinks {
                        if let Err(err) = sink.close().await {
                            tracing::error!("failed to close sink of aborted pool: {err}");
                        }
                    }
                    return Err(err)
                        .context("create sink for pool worker")
                        .context_debug_field("worker", id);
                }
            }
        }

        let (tx, rx) = mpsc::channel(workers);
        let rx: SharedReceiver = Arc::new(Mutex::new(rx));

        let mut tasks = JoinSet::new();
        for (id, sink) in sinks.into_iter().enumerate() {
            let worker = Worker::new(id, sink, cfg.rate, metrics.clone());
            tasks.spawn(
                run_pool_worker(guard.clone(), worker, rx.clone())
                    .instrument(tracing::debug_span!("pool worker", worker = id)),
            );
        }
        tracing::debug!(workers, "worker pool started");

        Ok((Self { tasks }, WorkQueue { tx }))
    }

    pub fn workers(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for all workers to exit and their sinks to be closed.
    ///
    /// Workers exit once the [`WorkQueue`] is dropped and drained,
    /// or once shutdown is requested.
    pub async fn join(mut self) -> Vec<WorkerSummary> {
        let mut summaries = Vec::with_capacity(self.tasks.len());
        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(summary) => summaries.push(summary),
                Err(err) => tracing::error!("pool worker task failed: {err}"),
            }
        }
        summaries.sort_by_key(|summary| summary.id);
        summaries
    }
}

async fn run_pool_worker<S: RecordSink>(
    guard: ShutdownGuard,
    mut worker: Worker<S>,
    queue: SharedReceiver,
) -> WorkerSummary {
    let id = worker.id();

    loop {
        let path = tokio::select! {
            biased;

            _ = guard.cancelled() => {
                tracing::debug!(worker = id, "stop pulling work: guard shutdown");
                break;
            }
            maybe_path = pull(&queue) => {
                let Some(path) = maybe_path else {
                    tracing::debug!(worker = id, "work queue closed and drained");
                    break;
                };
                path
            }
        };

        match worker.replay_file(&guard, &path).await {
            Ok(Completion::Exhausted) => {
                tracing::debug!(worker = id, path = ?path, "work unit done");
            }
            Ok(Completion::Cancelled) => break,
            Err(err) => {
                tracing::error!(worker = id, path = ?err.path(), "skip work unit: {err}");
            }
        }
    }

    worker.close().await
}

async fn pull(queue: &SharedReceiver) -> Option<PathBuf> {
    queue.lock().await.recv().await
}
