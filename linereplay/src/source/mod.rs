use std::{
    fmt,
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use flate2::read::MultiGzDecoder;
use rama::{bytes::Bytes, telemetry::tracing};
use tokio::sync::mpsc;

mod scenario;

pub use self::scenario::{Scenario, ScenarioCursor};

/// One line of input, without its line terminator.
pub type Record = Bytes;

/// Amount of records the blocking reader may run ahead of its consumer.
const RECORD_BUFFER: usize = 1024;

const GZIP_EXTENSION: &str = "gz";

/// Returns true if the path is to be treated as gzip compressed.
pub fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(GZIP_EXTENSION))
}

#[derive(Debug)]
pub enum SourceError {
    /// The source file could not be opened.
    Open { path: PathBuf, source: io::Error },
    /// The compressed stream of the source file is malformed.
    Decompress { path: PathBuf, source: io::Error },
    /// Reading a (plain) source file failed halfway.
    Read { path: PathBuf, source: io::Error },
}

impl SourceError {
    pub fn path(&self) -> &Path {
        match self {
            SourceError::Open { path, .. }
            | SourceError::Decompress { path, .. }
            | SourceError::Read { path, .. } => path,
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Open { path, source } => {
                write!(f, "open '{}': {source}", path.display())
            }
            SourceError::Decompress { path, source } => {
                write!(f, "decompress '{}': {source}", path.display())
            }
            SourceError::Read { path, source } => {
                write!(f, "read '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Open { source, .. }
            | SourceError::Decompress { source, .. }
            | SourceError::Read { source, .. } => Some(source),
        }
    }
}

/// Lazy, finite sequence of the records found in a single file.
///
/// Lines are split on a blocking task which hands them over
/// through a bounded channel. The reader therefore never runs more than
/// [`RECORD_BUFFER`] records ahead of the consumer, and it stops as soon as
/// the stream is dropped.
///
/// A stream yields at most one error, after which it is exhausted.
#[derive(Debug)]
pub struct RecordStream {
    path: PathBuf,
    rx: mpsc::Receiver<Result<Record, SourceError>>,
}

impl RecordStream {
    /// Open the file at the given path, gunzipping it on the fly
    /// in case it has a `.gz` extension.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let path = path.into();

        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file.into_std().await,
            Err(source) => return Err(SourceError::Open { path, source }),
        };

        let (tx, rx) = mpsc::channel(RECORD_BUFFER);
        let gzip = is_gzip_path(&path);

        tokio::task::spawn_blocking({
            let path = path.clone();
            move || {
                if gzip {
                    let reader = BufReader::new(MultiGzDecoder::new(file));
                    read_records(reader, &path, tx, |path, source| SourceError::Decompress {
                        path,
                        source,
                    })
                } else {
                    let reader = BufReader::new(file);
                    read_records(reader, &path, tx, |path, source| SourceError::Read {
                        path,
                        source,
                    })
                }
            }
        });

        tracing::trace!(path = ?path, gzip, "record stream opened");
        Ok(Self { path, rx })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next record in file order, `None` once the file is exhausted.
    pub async fn next_record(&mut self) -> Option<Result<Record, SourceError>> {
        self.rx.recv().await
    }
}

fn read_records<R, E>(
    mut reader: R,
    path: &Path,
    tx: mpsc::Sender<Result<Record, SourceError>>,
    map_err: E,
) where
    R: BufRead,
    E: FnOnce(PathBuf, io::Error) -> SourceError,
{
    let mut line = Vec::with_capacity(512);
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => return,
            Ok(_) => {
                let record = Bytes::copy_from_slice(trim_line_terminator(&line));
                if tx.blocking_send(Ok(record)).is_err() {
                    tracing::trace!(path = ?path, "record stream dropped by consumer: stop reading");
                    return;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                let _ = tx.blocking_send(Err(map_err(path.to_owned(), err)));
                return;
            }
        }
    }
}

fn trim_line_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
