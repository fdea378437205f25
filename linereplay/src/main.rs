#![cfg_attr(
    not(test),
    warn(clippy::print_stdout, clippy::dbg_macro),
    deny(clippy::unwrap_used, clippy::expect_used)
)]

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use rama::{
    error::{BoxError, ErrorContext as _},
    graceful,
    telemetry::tracing::{self, Instrument as _},
};

pub mod cmd;
pub mod config;
pub mod metrics;
pub mod reporter;
pub mod sink;
pub mod source;
pub mod throttle;
pub mod utils;
pub mod walk;
pub mod worker;

#[cfg(test)]
pub mod test;

#[cfg(target_family = "unix")]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// CLI arguments for configuring linereplay behavior.
#[derive(Debug, Clone, Parser)]
#[command(name = "linereplay")]
#[command(bin_name = "linereplay")]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    cmds: CliCommands,

    /// debug logging as default instead of Info; use RUST_LOG env for more options
    #[arg(long, short = 'v', default_value_t = false, global = true)]
    pub verbose: bool,

    /// enable pretty logging (format for humans)
    #[arg(long, default_value_t = false, global = true)]
    pub pretty: bool,

    /// write the tracing output to the provided (log) file instead of stderr
    #[arg(long, short = 'o', global = true)]
    pub output: Option<PathBuf>,

    /// report json lines instead of a human-friendly format
    #[arg(long, default_value_t = false, global = true)]
    pub json: bool,

    #[arg(long, value_name = "SECONDS", default_value_t = 0., global = true)]
    /// the interval at which progress is reported (<= 0.0 = no progress)
    pub progress: f64,

    #[arg(long, value_name = "SECONDS", default_value_t = 0., global = true)]
    /// the graceful shutdown timeout (<= 0.0 = no timeout)
    pub graceful: f64,
}

#[derive(Debug, Clone, Subcommand)]
enum CliCommands {
    Scenario(self::cmd::scenario::ScenarioCommand),
    Replay(self::cmd::replay::ReplayCommand),
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    utils::telemetry::init_tracing(utils::telemetry::TelemetryConfig {
        verbose: args.verbose,
        pretty: args.pretty,
        output: args.output.as_deref(),
    })
    .context("init tracing")?;

    let base_shutdown_signal = graceful::default_signal();
    if let Err(err) = run_with_args(base_shutdown_signal, args).await {
        eprintln!("🚩 exit with error: {err}");
        std::process::exit(1);
    }

    Ok(())
}

/// Runs the linereplay cmd with the given args and blocks until
/// it finished, failed or the (graceful) shutdown has been completed.
///
/// This entry point is used by both the (binary) `main` function as well as
/// for the e2e test suite found in the test module.
async fn run_with_args<F>(base_shutdown_signal: F, args: Args) -> Result<(), BoxError>
where
    F: Future<Output: Send + 'static> + Send + 'static,
{
    let graceful_timeout = (args.graceful > 0.).then(|| Duration::from_secs_f64(args.graceful));
    let report_cfg = reporter::ReportConfig {
        json: args.json,
        progress: (args.progress > 0.).then(|| Duration::from_secs_f64(args.progress)),
    };

    let (error_tx, error_rx) = tokio::sync::oneshot::channel::<String>();
    let graceful = graceful::Shutdown::new(new_shutdown_signal(error_rx, base_shutdown_signal));

    let cmd_handle = graceful.spawn_task_fn(move |guard| {
        async move {
            let result = match args.cmds {
                CliCommands::Scenario(scenario_args) => {
                    self::cmd::scenario::exec(report_cfg, guard, scenario_args).await
                }
                CliCommands::Replay(replay_args) => {
                    self::cmd::replay::exec(report_cfg, guard, replay_args).await
                }
            };
            if let Err(err) = &result {
                let _ = error_tx.send(err.to_string());
            }
            result
        }
        .instrument(tracing::debug_span!("linereplay cmd"))
    });

    let delay = match graceful_timeout {
        Some(duration) => graceful.shutdown_with_limit(duration).await?,
        None => graceful.shutdown().await,
    };
    tracing::debug!("gracefully shutdown with a delay of: {delay:?}");

    cmd_handle.await.context("join linereplay cmd task")?
}

fn new_shutdown_signal(
    error_rx: tokio::sync::oneshot::Receiver<String>,
    base_shutdown_signal: impl Future<Output: Send + 'static> + Send + 'static,
) -> impl Future + Send + 'static {
    async move {
        tokio::select! {
            _ = base_shutdown_signal => {
                tracing::debug!("default signal triggered: init graceful shutdown");
            }
            result = error_rx => {
                match result {
                    Ok(err) => {
                        tracing::error!("fatal err received: {err}; abort");
                    },
                    Err(_) => {
                        tracing::debug!("command is finished without error, return control");
                    },
                }
            }
        }
    }
}
