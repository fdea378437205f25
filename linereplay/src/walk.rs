use std::path::{Path, PathBuf};

use rama::{
    error::{BoxError, ErrorContext as _},
    graceful::ShutdownGuard,
    telemetry::tracing,
};

use crate::worker::WorkQueue;

/// Enqueue every file found at `root` as a unit of work.
///
/// A file root is a single unit. A directory root enqueues its files in
/// name order, descending into subdirectories only if `recursive` is set.
/// The queue is closed once this function returns.
///
/// Returns the amount of units enqueued.
pub async fn enqueue_path(
    guard: &ShutdownGuard,
    root: &Path,
    recursive: bool,
    queue: WorkQueue,
) -> Result<usize, BoxError> {
    let metadata = tokio::fs::metadata(root)
        .await
        .context("read replay root metadata")
        .context_debug_field("path", root.to_owned())?;

    if !metadata.is_dir() {
        let accepted = queue.push(guard, root.to_owned()).await;
        return Ok(usize::from(accepted));
    }

    let mut enqueued = 0;
    let mut pending_dirs = vec![root.to_owned()];

    while let Some(dir) = pending_dirs.pop() {
        let (files, mut dirs) = list_dir(&dir).await?;

        for path in files {
            if !queue.push(guard, path).await {
                tracing::debug!(enqueued, "stop enqueueing work: no longer accepted");
                return Ok(enqueued);
            }
            enqueued += 1;
        }

        if recursive {
            // reversed so that the stack pops them in name order
            dirs.reverse();
            pending_dirs.extend(dirs);
        } else if !dirs.is_empty() {
            tracing::debug!(
                path = ?dir,
                skipped = dirs.len(),
                "skip subdirectories: not recursive",
            );
        }
    }

    tracing::debug!(enqueued, path = ?root, "all work enqueued");
    Ok(enqueued)
}

/// Sorted files and sorted subdirectories of the given directory.
async fn list_dir(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), BoxError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .context("read replay directory")
        .context_debug_field("path", dir.to_owned())?;

    let mut files = Vec::new();
    let mut dirs = Vec::new();

    while let Some(entry) = entries
        .next_entry()
        .await
        .context("read replay directory entry")
        .context_debug_field("path", dir.to_owned())?
    {
        let path = entry.path();
        // follows symlinks, unlike the entry's own file type
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => dirs.push(path),
            Ok(metadata) if metadata.is_file() => files.push(path),
            Ok(_) => tracing::debug!(path = ?path, "skip special file"),
            Err(err) => tracing::warn!(path = ?path, "skip unreadable directory entry: {err}"),
        }
    }

    files.sort();
    dirs.sort();
    Ok((files, dirs))
}
