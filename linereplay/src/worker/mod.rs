use std::{path::Path, sync::Arc};

use rama::{graceful::ShutdownGuard, telemetry::tracing};

use crate::{
    metrics::Metrics,
    sink::RecordSink,
    source::{RecordStream, ScenarioCursor, SourceError},
    throttle::{RateLimit, Throttle},
};

mod pool;

pub use self::pool::{PoolConfig, WorkQueue, WorkerPool};

/// How a unit of work came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// All records of the unit were emitted (or the limit was reached).
    Exhausted,
    /// Shutdown was requested before the unit was exhausted.
    Cancelled,
}

/// What a single worker did during its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub id: usize,
    pub units_done: u64,
    pub units_failed: u64,
    /// emission attempts, successful or not
    pub records: u64,
}

/// Pulls records from a source and writes them, paced, into its own sink.
///
/// The sink is exclusively owned by the worker
/// and released exactly once by [`Worker::close`].
#[derive(Debug)]
pub struct Worker<S> {
    sink: S,
    throttle: Throttle,
    metrics: Arc<Metrics>,
    summary: WorkerSummary,
}

impl<S: RecordSink> Worker<S> {
    pub fn new(id: usize, sink: S, rate: RateLimit, metrics: Arc<Metrics>) -> Self {
        Self {
            sink,
            throttle: Throttle::new(rate),
            metrics,
            summary: WorkerSummary {
                id,
                ..Default::default()
            },
        }
    }

    pub fn id(&self) -> usize {
        self.summary.id
    }

    /// Write a single record, counting it as either sent or dropped.
    ///
    /// Returns `true` if the sink accepted the record.
    pub async fn emit(&mut self, record: &[u8]) -> bool {
        self.summary.records += 1;
        match self.sink.write_record(record).await {
            Ok(()) => {
                self.metrics.record_sent();
                true
            }
            Err(err) => {
                self.metrics.record_dropped();
                tracing::debug!(worker = self.summary.id, "drop record: {err}");
                false
            }
        }
    }

    /// Wait for the throttle, returns `false` if shutdown was requested first.
    async fn pace(&mut self, guard: &ShutdownGuard) -> bool {
        tokio::select! {
            biased;

            _ = guard.cancelled() => false,
            _ = self.throttle.tick() => true,
        }
    }

    /// Emit records from an endless scenario cursor,
    /// until `limit` attempts were made (if any) or shutdown is requested.
    pub async fn run_scenario(
        &mut self,
        guard: &ShutdownGuard,
        cursor: &mut ScenarioCursor,
        limit: Option<u64>,
    ) -> Completion {
        loop {
            if limit.is_some_and(|limit| self.summary.records >= limit) {
                tracing::debug!(
                    worker = self.summary.id,
                    records = self.summary.records,
                    "scenario limit reached",
                );
                return Completion::Exhausted;
            }

            if !self.pace(guard).await {
                tracing::debug!(
                    worker = self.summary.id,
                    cycle = cursor.cycle(),
                    position = cursor.position(),
                    "stop scenario: guard shutdown",
                );
                return Completion::Cancelled;
            }

            let Some(record) = cursor.next() else {
                return Completion::Exhausted;
            };
            self.emit(&record).await;
        }
    }

    /// Emit every record of the file at the given path.
    ///
    /// Shutdown is only observed in between records, a record is never cut in half.
    /// A source that fails to open or read counts as a failed unit,
    /// records emitted before a read failure stay counted.
    pub async fn replay_file(
        &mut self,
        guard: &ShutdownGuard,
        path: &Path,
    ) -> Result<Completion, SourceError> {
        let result = self.replay_file_inner(guard, path).await;
        match result {
            Ok(Completion::Exhausted) => self.summary.units_done += 1,
            Ok(Completion::Cancelled) => (),
            Err(_) => self.summary.units_failed += 1,
        }
        result
    }

    async fn replay_file_inner(
        &mut self,
        guard: &ShutdownGuard,
        path: &Path,
    ) -> Result<Completion, SourceError> {
        let mut stream = RecordStream::open(path).await?;
        tracing::debug!(worker = self.summary.id, path = ?stream.path(), "replay file");

        loop {
            let record = tokio::select! {
                biased;

                _ = guard.cancelled() => {
                    tracing::debug!(worker = self.summary.id, path = ?path, "stop replay: guard shutdown");
                    return Ok(Completion::Cancelled);
                }
                maybe_record = stream.next_record() => {
                    let Some(result) = maybe_record else {
                        return Ok(Completion::Exhausted);
                    };
                    result?
                }
            };

            if !self.pace(guard).await {
                tracing::debug!(worker = self.summary.id, path = ?path, "stop replay: guard shutdown");
                return Ok(Completion::Cancelled);
            }
            self.emit(&record).await;
        }
    }

    /// Release the sink, consuming the worker.
    pub async fn close(self) -> WorkerSummary {
        let Self { sink, summary, .. } = self;
        match sink.close().await {
            Ok(()) => tracing::debug!(worker = summary.id, "sink closed"),
            Err(err) => tracing::error!(worker = summary.id, "failed to close sink: {err}"),
        }
        summary
    }
}
