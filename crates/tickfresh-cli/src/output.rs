use std::io::{self, Write};

use tickfresh_core::LogMessage;

use crate::cli::OutputFormat;
use crate::commands::SeriesReport;
use crate::error::CliError;

const TABLE_TAIL: usize = 10;

pub struct Printer {
    format: OutputFormat,
    pretty: bool,
}

impl Printer {
    pub fn new(format: OutputFormat, pretty: bool) -> Self {
        Self { format, pretty }
    }

    pub fn print(&self, report: &SeriesReport<'_>) -> Result<(), CliError> {
        self.write_report(&mut io::stdout().lock(), report)
    }

    fn write_report<W: Write>(
        &self,
        out: &mut W,
        report: &SeriesReport<'_>,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Json => {
                let payload = if self.pretty {
                    serde_json::to_string_pretty(report)?
                } else {
                    serde_json::to_string(report)?
                };
                writeln!(out, "{payload}")?;
            }
            OutputFormat::Table => write!(out, "{}", render_table(report))?,
        }
        out.flush()?;
        Ok(())
    }
}

fn render_table(report: &SeriesReport<'_>) -> String {
    let mut out = String::new();
    out.push_str(&format!("symbol      : {}\n", report.symbol));
    out.push_str(&format!("interval    : {}\n", report.interval));
    if let Some(outcome) = report.outcome {
        out.push_str(&format!("outcome     : {outcome:?}\n"));
    }
    out.push_str(&format!("demo data   : {}\n", report.is_synthetic));
    out.push_str(&format!("retry_count : {}\n", report.retry_count));
    if let Some(failure) = report.failure {
        out.push_str(&format!("failure     : {failure}\n"));
    }
    if let Some(state) = report.state {
        out.push_str(&format!("refresh     : {state:?}\n"));
    }
    match report.change_pct {
        Some(change) => out.push_str(&format!("status      : {} ({change:+.2}%)\n", report.status)),
        None => out.push_str(&format!("status      : {}\n", report.status)),
    }
    out.push_str(&format!("bars        : {}\n", report.bars.len()));

    let skip = report.bars.len().saturating_sub(TABLE_TAIL);
    if skip < report.bars.len() {
        out.push_str(&format!(
            "  {:<25} {:>10} {:>10} {:>10} {:>10} {:>12}\n",
            "timestamp", "open", "high", "low", "close", "volume"
        ));
    }
    for bar in &report.bars[skip..] {
        out.push_str(&format!(
            "  {:<25} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>12}\n",
            bar.ts.format_rfc3339(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        ));
    }
    out
}

pub fn render_log(messages: &[LogMessage]) {
    for message in messages {
        eprintln!(
            "[{}] {:<7} {}",
            message.timestamp.format_rfc3339(),
            message.level.as_str(),
            message.text
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickfresh_core::{Bar, BarSeries, Horizon, Interval, Symbol, UtcDateTime};

    #[test]
    fn table_shows_tail_of_series() {
        let symbol = Symbol::parse("IBM").expect("symbol");
        let start = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("timestamp");
        let bars = (0..12)
            .map(|day| {
                let ts = UtcDateTime::from_offset_datetime(
                    start.into_inner() + time_days(day),
                )
                .expect("utc");
                Bar::new(ts, 150.0, 151.0, 149.0, 150.5, 1_000).expect("bar")
            })
            .collect();
        let series = BarSeries::new(symbol, Interval::Daily, bars);

        let table = render_table(&SeriesReport::synthetic(&series, Horizon::Span));

        assert!(table.contains("symbol      : IBM"));
        assert!(table.contains("bars        : 12"));
        assert!(!table.contains("2024-01-02T00:00:00Z"));
        assert!(table.contains("2024-01-12T00:00:00Z"));
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn closed_stdout_surfaces_as_io_error() {
        let symbol = Symbol::parse("IBM").expect("symbol");
        let series = BarSeries::new(symbol, Interval::Daily, Vec::new());
        let printer = Printer::new(OutputFormat::Json, false);

        let error = printer
            .write_report(&mut ClosedPipe, &SeriesReport::synthetic(&series, Horizon::Span))
            .expect_err("write fails");

        assert!(matches!(error, CliError::Io(_)));
        assert_eq!(error.exit_code(), 10);
    }

    #[test]
    fn json_report_is_one_line_per_update() {
        let symbol = Symbol::parse("IBM").expect("symbol");
        let series = BarSeries::new(symbol, Interval::Daily, Vec::new());
        let printer = Printer::new(OutputFormat::Json, false);
        let mut out = Vec::new();

        printer
            .write_report(&mut out, &SeriesReport::synthetic(&series, Horizon::Span))
            .expect("write succeeds");

        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("\"symbol\":\"IBM\""));
    }

    fn time_days(days: i64) -> std::time::Duration {
        std::time::Duration::from_secs((days as u64) * 86_400)
    }
}
