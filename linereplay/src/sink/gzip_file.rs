use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write as _},
    path::{Path, PathBuf},
};

use flate2::{Compression, write::GzEncoder};
use rama::{
    bytes::Bytes,
    error::{BoxError, ErrorContext as _},
    telemetry::tracing,
};
use tokio::{sync::mpsc, task::JoinHandle};

use super::RecordSink;
use crate::source::is_gzip_path;

const WRITE_BUFFER_CAPACITY: usize = 64 * 1024;
const RECORD_BUFFER: usize = 1024;

/// Appends records as a gzip stream to a file.
///
/// Every sink adds its own gzip member to the file,
/// which is how several sinks (or runs) can append to the same archive.
///
/// Compression and file I/O happen on a dedicated blocking task,
/// fed through a bounded channel of at most [`RECORD_BUFFER`] records.
/// Once that task fails all further writes fail as well.
#[derive(Debug)]
pub struct GzFileSink {
    path: PathBuf,
    tx: mpsc::Sender<Bytes>,
    writer: JoinHandle<Result<(), BoxError>>,
}

impl GzFileSink {
    /// Open (or create) the file at the given path in append mode.
    pub async fn open(path: &Path) -> Result<Self, BoxError> {
        if !is_gzip_path(path) {
            tracing::warn!(
                path = ?path,
                "file destination has no .gz extension; content will be gzip compressed regardless",
            );
        }

        let file = tokio::task::spawn_blocking({
            let path = path.to_owned();
            move || open_append(&path)
        })
        .await
        .context("await blocking open task")?
        .context("open gzip destination file for append")
        .context_debug_field("path", path.to_owned())?;

        let (tx, rx) = mpsc::channel(RECORD_BUFFER);
        let writer = tokio::task::spawn_blocking({
            let path = path.to_owned();
            move || write_records(file, &path, rx)
        });
        tracing::debug!(path = ?path, "gzip file sink opened");

        Ok(Self {
            path: path.to_owned(),
            tx,
            writer,
        })
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.append(true).create(true);

    #[cfg(target_family = "unix")]
    {
        use std::os::unix::fs::OpenOptionsExt as _;
        options.mode(0o660);
    }

    options.open(path)
}

fn write_records(
    file: File,
    path: &Path,
    mut rx: mpsc::Receiver<Bytes>,
) -> Result<(), BoxError> {
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_CAPACITY, encoder);

    while let Some(record) = rx.blocking_recv() {
        if let Err(err) = writer
            .write_all(&record)
            .and_then(|_| writer.write_all(b"\n"))
        {
            tracing::error!(path = ?path, "gzip file writer failed: {err}");
            return Err(err)
                .context("write record into gzip file")
                .context_debug_field("path", path.to_owned());
        }
    }

    // order matters: buffer -> encoder (trailer) -> file
    let encoder = writer
        .into_inner()
        .map_err(|err| err.into_error())
        .context("flush buffered records into gzip encoder")
        .with_context_debug_field("path", || path.to_owned())?;
    let file = encoder
        .finish()
        .context("finalize gzip stream")
        .with_context_debug_field("path", || path.to_owned())?;
    file.sync_all()
        .context("sync gzip destination file")
        .with_context_debug_field("path", || path.to_owned())?;

    Ok(())
}

impl RecordSink for GzFileSink {
    async fn write_record(&mut self, record: &[u8]) -> Result<(), BoxError> {
        self.tx
            .send(Bytes::copy_from_slice(record))
            .await
            .context("hand record to gzip file writer")
    }

    async fn close(self) -> Result<(), BoxError> {
        let Self { path, tx, writer } = self;
        // closing the channel lets the writer drain and finish the gzip member
        drop(tx);
        writer
            .await
            .context("await blocking gzip writer task")?
            .context("close gzip file sink")?;

        tracing::debug!(path = ?path, "gzip file sink closed");
        Ok(())
    }
}
