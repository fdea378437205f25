use super::{IntervalRate, ReportWriter, Reporter, write_line};
use crate::metrics::Report;

pub struct HumanReporter {
    writer: ReportWriter,
    rate: IntervalRate,
}

impl HumanReporter {
    pub fn new(writer: ReportWriter) -> Self {
        Self {
            writer,
            rate: IntervalRate::default(),
        }
    }
}

impl Reporter for HumanReporter {
    fn on_tick(&mut self, progress: &Report) {
        let rate = self.rate.next(progress);
        write_line(
            &mut self.writer,
            format_args!(
                "t={:.1}s total={} dropped={} rate={:.1}/s",
                progress.elapsed.as_secs_f64(),
                progress.total_lines,
                progress.dropped_lines,
                rate,
            ),
        );
    }

    fn finish(&mut self, report: &Report) {
        write_line(
            &mut self.writer,
            format_args!(
                "time={:?} total={} dropped={} msg/s={:.2}",
                report.elapsed,
                report.total_lines,
                report.dropped_lines,
                report.throughput(),
            ),
        );
    }
}
