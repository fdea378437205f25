use rama::telemetry::tracing;
use serde::Serialize;

use super::{IntervalRate, ReportWriter, Reporter, write_line};
use crate::metrics::Report;

pub struct JsonlReporter {
    writer: ReportWriter,
    rate: IntervalRate,
}

impl JsonlReporter {
    pub fn new(writer: ReportWriter) -> Self {
        Self {
            writer,
            rate: IntervalRate::default(),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Line<'a> {
    Progress {
        #[serde(flatten)]
        report: &'a Report,
        rate: f64,
    },
    Final {
        #[serde(flatten)]
        report: &'a Report,
        attempts: u64,
        msg_per_sec: f64,
    },
}

impl JsonlReporter {
    fn write(&mut self, line: &Line<'_>) {
        match serde_json::to_string(line) {
            Ok(line) => write_line(&mut self.writer, format_args!("{line}")),
            Err(err) => tracing::warn!("failed to serialize report line: {err}"),
        }
    }
}

impl Reporter for JsonlReporter {
    fn on_tick(&mut self, progress: &Report) {
        let rate = self.rate.next(progress);
        self.write(&Line::Progress {
            report: progress,
            rate,
        });
    }

    fn finish(&mut self, report: &Report) {
        self.write(&Line::Final {
            report,
            attempts: report.attempts(),
            msg_per_sec: report.throughput(),
        });
    }
}
