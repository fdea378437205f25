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
    sink::MakeSink as _,
    source::Scenario,
    throttle::RateLimit,
    worker::{Completion, Worker},
};

#[derive(Debug, Clone, Args)]
/// replay a scenario file in a loop, using a single sink
pub struct ScenarioCommand {
    /// scenario file, one record per line (gzip compressed if it ends with .gz)
    #[arg(value_name = "FILE", required = true)]
    path: PathBuf,

    #[clap(flatten)]
    destination: DestinationArgs,

    #[clap(flatten)]
    rate: RateArgs,

    /// stop after this many records (runs until shutdown if not defined)
    #[arg(long, visible_alias = "limit", value_name = "N")]
    count: Option<u64>,
}

pub async fn exec(
    report_cfg: ReportConfig,
    guard: ShutdownGuard,
    args: ScenarioCommand,
) -> Result<(), BoxError> {
    let destination =
        Destination::try_from(args.destination).context("scenario destination config")?;
    let rate = RateLimit::from(args.rate);

    let scenario = Scenario::load(&args.path)
        .await
        .context("load scenario")
        .with_context_debug_field("path", || args.path.clone())?;

    let sink = destination
        .make_sink()
        .await
        .context("create scenario sink")?;

    tracing::info!(
        ?destination,
        ?rate,
        records = scenario.len(),
        count = ?args.count,
        "scenario replay ready",
    );

    let metrics = Metrics::new();
    let progress = Progress::start(
        report_cfg.stdout_reporter(),
        metrics.clone(),
        report_cfg.progress,
    );

    let mut worker = Worker::new(0, sink, rate, metrics.clone());
    let mut cursor = scenario.cursor();
    let completion = worker.run_scenario(&guard, &mut cursor, args.count).await;
    match completion {
        Completion::Exhausted => tracing::info!("scenario replay finished"),
        Completion::Cancelled => tracing::info!("scenario replay interrupted: guard shutdown"),
    }

    let summary = worker.close().await;
    let report = metrics.report();
    tracing::debug!(?summary, cycles = cursor.cycle(), "scenario worker closed");

    progress.finish(&report).await;
    Ok(())
}
