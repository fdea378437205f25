use std::{io::Write, sync::Arc, time::Duration};

use rama::telemetry::tracing;
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};

use crate::metrics::{Metrics, Report};

mod human;
mod json;

pub use self::{human::HumanReporter, json::JsonlReporter};

pub trait Reporter: Send + 'static {
    fn on_tick(&mut self, progress: &Report);
    fn finish(&mut self, report: &Report);
}

/// Output writer of a reporter.
pub type ReportWriter = Box<dyn Write + Send>;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportConfig {
    /// report json lines instead of a human-friendly format
    pub json: bool,
    /// interval at which progress is reported, if at all
    pub progress: Option<Duration>,
}

impl ReportConfig {
    pub fn new_reporter(&self, writer: ReportWriter) -> Box<dyn Reporter> {
        if self.json {
            Box::new(JsonlReporter::new(writer))
        } else {
            Box::new(HumanReporter::new(writer))
        }
    }

    pub fn stdout_reporter(&self) -> Box<dyn Reporter> {
        self.new_reporter(Box::new(std::io::stdout()))
    }
}

/// Rate of successful emissions since the previous progress tick.
#[derive(Debug, Default)]
struct IntervalRate {
    last: Option<Report>,
}

impl IntervalRate {
    fn next(&mut self, now: &Report) -> f64 {
        let (elapsed, total) = match self.last.replace(*now) {
            Some(last) => (
                now.elapsed.saturating_sub(last.elapsed),
                now.total_lines.saturating_sub(last.total_lines),
            ),
            None => (now.elapsed, now.total_lines),
        };
        let secs = elapsed.as_secs_f64();
        if secs == 0. { 0. } else { total as f64 / secs }
    }
}

fn write_line(writer: &mut ReportWriter, line: std::fmt::Arguments<'_>) {
    if let Err(err) = writer
        .write_fmt(format_args!("{line}\n"))
        .and_then(|_| writer.flush())
    {
        tracing::warn!("failed to write report line: {err}");
    }
}

/// Reporter which, optionally, also reports progress in the background.
pub struct Progress {
    state: ProgressState,
}

enum ProgressState {
    Idle(Box<dyn Reporter>),
    Ticking {
        stop_tx: oneshot::Sender<()>,
        handle: JoinHandle<Box<dyn Reporter>>,
    },
}

impl Progress {
    /// Start reporting progress every `interval`, or not at all if `None`.
    pub fn start(
        reporter: Box<dyn Reporter>,
        metrics: Arc<Metrics>,
        interval: Option<Duration>,
    ) -> Self {
        let state = match interval.filter(|interval| !interval.is_zero()) {
            None => ProgressState::Idle(reporter),
            Some(interval) => {
                let (stop_tx, stop_rx) = oneshot::channel();
                let handle = tokio::spawn(progress_loop(reporter, metrics, interval, stop_rx));
                ProgressState::Ticking { stop_tx, handle }
            }
        };
        Self { state }
    }

    /// Stop reporting progress and report the final summary.
    pub async fn finish(self, report: &Report) {
        let mut reporter = match self.state {
            ProgressState::Idle(reporter) => reporter,
            ProgressState::Ticking { stop_tx, handle } => {
                let _ = stop_tx.send(());
                match handle.await {
                    Ok(reporter) => reporter,
                    Err(err) => {
                        tracing::error!("progress reporter task failed: {err}");
                        return;
                    }
                }
            }
        };
        reporter.finish(report);
    }
}

async fn progress_loop(
    mut reporter: Box<dyn Reporter>,
    metrics: Arc<Metrics>,
    interval: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) -> Box<dyn Reporter> {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = &mut stop_rx => {
                tracing::trace!("stop progress reporting");
                return reporter;
            }
            _ = ticker.tick() => {
                reporter.on_tick(&metrics.snapshot());
            }
        }
    }
}
