use rama::error::BoxError;

mod gzip_file;
mod udp;

#[cfg(test)]
pub mod testing;

pub use self::{gzip_file::GzFileSink, udp::UdpSink};

use crate::config::Destination;

/// Where emitted records go.
///
/// A sink is owned by a single worker and is never shared:
/// implementations need no internal synchronization.
/// Each record is written with a trailing newline appended by the sink.
pub trait RecordSink: Send + 'static {
    /// Write a single record, errors are reported but never retried.
    fn write_record(
        &mut self,
        record: &[u8],
    ) -> impl Future<Output = Result<(), BoxError>> + Send;

    /// Flush (if buffered) and release the underlying resource.
    ///
    /// Consumes the sink so it can only ever be closed once.
    fn close(self) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// Factory of sinks, one per worker, all for the same destination.
pub trait MakeSink: Send + Sync + 'static {
    type Sink: RecordSink;

    fn make_sink(&self) -> impl Future<Output = Result<Self::Sink, BoxError>> + Send;
}

/// Sink for any supported [`Destination`].
#[derive(Debug)]
pub enum AnySink {
    Udp(UdpSink),
    GzFile(GzFileSink),
}

impl RecordSink for AnySink {
    async fn write_record(&mut self, record: &[u8]) -> Result<(), BoxError> {
        match self {
            AnySink::Udp(sink) => sink.write_record(record).await,
            AnySink::GzFile(sink) => sink.write_record(record).await,
        }
    }

    async fn close(self) -> Result<(), BoxError> {
        match self {
            AnySink::Udp(sink) => sink.close().await,
            AnySink::GzFile(sink) => sink.close().await,
        }
    }
}

impl MakeSink for Destination {
    type Sink = AnySink;

    async fn make_sink(&self) -> Result<Self::Sink, BoxError> {
        match self {
            Destination::Udp(addr) => UdpSink::connect(addr).await.map(AnySink::Udp),
            Destination::GzFile(path) => GzFileSink::open(path).await.map(AnySink::GzFile),
        }
    }
}
