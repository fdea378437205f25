//! In-memory sinks for tests, recording calls instead of doing any I/O.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use rama::{bytes::Bytes, error::BoxError};

use super::{MakeSink, RecordSink};

#[derive(Debug, Default)]
pub struct SinkLog {
    /// every write attempt, including the failed ones
    pub writes: Vec<Bytes>,
    pub failed_writes: usize,
    pub closes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingMakeSink {
    inner: Arc<MakeSinkInner>,
}

#[derive(Debug, Default)]
struct MakeSinkInner {
    created: AtomicUsize,
    fail_create_after: Option<usize>,
    fail_every: Option<usize>,
    write_delay: Option<Duration>,
    logs: Mutex<Vec<Arc<Mutex<SinkLog>>>>,
}

impl RecordingMakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every n-th write attempt (per sink) fail.
    pub fn with_fail_every(self, n: usize) -> Self {
        self.with_inner(|inner| inner.fail_every = Some(n.max(1)))
    }

    /// Let sink creation fail once `n` sinks were created.
    pub fn with_fail_create_after(self, n: usize) -> Self {
        self.with_inner(|inner| inner.fail_create_after = Some(n))
    }

    /// Sleep for the given duration during each write.
    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.with_inner(|inner| inner.write_delay = Some(delay))
    }

    fn with_inner(self, f: impl FnOnce(&mut MakeSinkInner)) -> Self {
        let mut inner = Arc::try_unwrap(self.inner).expect("configure before sharing");
        f(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Logs of all sinks created so far, in creation order.
    pub fn logs(&self) -> Vec<Arc<Mutex<SinkLog>>> {
        self.inner.logs.lock().clone()
    }

    pub fn created(&self) -> usize {
        self.inner.created.load(Ordering::SeqCst)
    }

    pub fn total_write_attempts(&self) -> usize {
        self.logs().iter().map(|log| log.lock().writes.len()).sum()
    }

    pub fn total_failed_writes(&self) -> usize {
        self.logs().iter().map(|log| log.lock().failed_writes).sum()
    }

    /// All write attempts of all sinks, each sink's writes in order.
    pub fn all_writes(&self) -> Vec<Vec<Bytes>> {
        self.logs()
            .iter()
            .map(|log| log.lock().writes.clone())
            .collect()
    }
}

impl MakeSink for RecordingMakeSink {
    type Sink = RecordingSink;

    async fn make_sink(&self) -> Result<Self::Sink, BoxError> {
        let created = self.inner.created.fetch_add(1, Ordering::SeqCst);
        if self
            .inner
            .fail_create_after
            .is_some_and(|limit| created >= limit)
        {
            return Err(BoxError::from("recording sink creation refused"));
        }

        let log = Arc::new(Mutex::new(SinkLog::default()));
        self.inner.logs.lock().push(log.clone());
        Ok(RecordingSink {
            log,
            fail_every: self.inner.fail_every,
            write_delay: self.inner.write_delay,
        })
    }
}

#[derive(Debug)]
pub struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
    fail_every: Option<usize>,
    write_delay: Option<Duration>,
}

impl RecordingSink {
    pub fn standalone() -> (Self, Arc<Mutex<SinkLog>>) {
        let log = Arc::new(Mutex::new(SinkLog::default()));
        (
            Self {
                log: log.clone(),
                fail_every: None,
                write_delay: None,
            },
            log,
        )
    }
}

impl RecordSink for RecordingSink {
    async fn write_record(&mut self, record: &[u8]) -> Result<(), BoxError> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        let mut log = self.log.lock();
        log.writes.push(Bytes::copy_from_slice(record));
        let attempt = log.writes.len();
        if self.fail_every.is_some_and(|n| attempt % n == 0) {
            log.failed_writes += 1;
            return Err(BoxError::from("recording sink write failure"));
        }
        Ok(())
    }

    async fn close(self) -> Result<(), BoxError> {
        self.log.lock().closes += 1;
        Ok(())
    }
}
