use std::path::PathBuf;

use clap::Args;
use rama::{
    error::{BoxError, ErrorContext as _},
    graceful::ShutdownGuard,
    telemetry::tracing,
};

use crate::{
    config::{Destination, DestinationArgs, RateArgs},
    metrics::Metrics,
    reporter::{Progress, ReportConfig},
    throttle::RateLimit,
    walk,
    worker::{PoolConfig, WorkerPool},
};

#[derive(Debug, Clone, Args)]
/// replay every file found at a path, using a pool of workers
pub struct ReplayCommand {
    /// file or directory of files, one record per line (gzip compressed if ending with .gz)
    #[arg(value_name = "PATH", required = true)]
    path: PathBuf,

    #[clap(flatten)]
    destination: DestinationArgs,

    #[clap(flatten)]
    rate: RateArgs,

    /// amount of workers, each with its own sink and throttle
    #[arg(long, value_name = "N", default_value_t = 1)]
    workers: usize,

    /// also replay the files found in subdirectories
    #[arg(long, short = 'r', default_value_t = false)]
    recursive: bool,
}

pub async fn exec(
    report_cfg: ReportConfig,
    guard: ShutdownGuard,
    args: ReplayCommand,
) -> Result<(), BoxError> {
    let destination =
        Destination::try_from(args.destination).context("replay destination config")?;
    let cfg = PoolConfig {
        workers: args.workers.max(1),
        rate: RateLimit::from(args.rate),
    };

    let metrics = Metrics::new();
    let (pool, queue) = WorkerPool::try_new(guard.clone(), &destination, cfg, metrics.clone())
        .await
        .context("create worker pool")?;

    tracing::info!(
        ?destination,
        rate = ?cfg.rate,
        workers = pool.workers(),
        path = ?args.path,
        recursive = args.recursive,
        "replay ready",
    );

    let progress = Progress::start(
        report_cfg.stdout_reporter(),
        metrics.clone(),
        report_cfg.progress,
    );

    let walk_result = walk::enqueue_path(&guard, &args.path, args.recursive, queue).await;
    if let Err(err) = &walk_result {
        tracing::error!("stop enqueueing work: {err}");
    }

    let summaries = pool.join().await;
    let report = metrics.report();
    for summary in &summaries {
        tracing::debug!(?summary, "pool worker closed");
    }
    tracing::info!(
        units_done = summaries.iter().map(|s| s.units_done).sum::<u64>(),
        units_failed = summaries.iter().map(|s| s.units_failed).sum::<u64>(),
        "replay finished",
    );

    progress.finish(&report).await;

    let enqueued = walk_result.context("enqueue replay path")?;
    tracing::debug!(enqueued, "replay done");
    Ok(())
}
