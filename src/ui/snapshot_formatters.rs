use colored::*;

use crate::core::telemetry::{
    LogLevel, LogLine, MonitorSnapshot, ProcessRow, SeriesSnapshot, WorkerFailure, WorkerReport,
    WorkerState,
};

/// Value shown for a series that has no points yet.
const NO_DATA: &str = "--";

/// Print one refresh of the monitor in plain-terminal form.
pub fn format_snapshot(snapshot: &MonitorSnapshot, recent_log: &[LogLine]) {
    println!(
        "\n{} {}",
        "GPU MONITOR".bold().bright_cyan(),
        snapshot.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
    );
    println!("{}", "=".repeat(80));

    for line in snapshot.panel.text.lines() {
        println!("  {}", line);
    }

    print_section_header("Metrics");
    for series in &snapshot.series {
        println!("  {}", series_line(series));
    }

    print_section_header("Workers");
    for report in &snapshot.workers {
        print_worker(report);
    }

    print_section_header("Processes");
    println!("  {}", process_line(["PID", "Process", "Memory"]).bold());
    for row in &snapshot.processes {
        print_process(row);
    }

    if !recent_log.is_empty() {
        print_section_header("Log");
        for line in recent_log {
            println!("  {}", log_line(line));
        }
    }
}

pub fn format_worker_failure(failure: &WorkerFailure) {
    println!(
        "{} {}",
        format!("{} stopped:", failure.worker).red().bold(),
        failure.error
    );
}

fn print_section_header(title: &str) {
    println!("\n{}", title.bold().green());
    println!("{}", "-".repeat(title.len()));
}

fn print_worker(report: &WorkerReport) {
    let state = match report.status.state {
        WorkerState::Starting => "starting".dimmed(),
        WorkerState::Running => "running".green(),
        WorkerState::Backoff => "backoff".yellow(),
        WorkerState::Failed => "failed".red().bold(),
    };

    match &report.status.last_error {
        Some(err) if report.status.state != WorkerState::Running => println!(
            "  {:<12} {} ({} failures, last: {})",
            report.name, state, report.status.consecutive_failures, err
        ),
        _ => println!("  {:<12} {}", report.name, state),
    }
}

fn print_process(row: &ProcessRow) {
    match row {
        ProcessRow::Placeholder => println!("  {}", process_line(row.cells()).dimmed()),
        ProcessRow::Process { .. } => println!("  {}", process_line(row.cells())),
    }
}

/// `GPU Power         231.4 W  (max 660.0)`
pub fn series_line(series: &SeriesSnapshot) -> String {
    let value = series
        .formatted_latest()
        .unwrap_or_else(|| NO_DATA.to_string());

    match series.upper_bound {
        Some(upper) => format!("{:<16} {:>22}  (max {:.1})", series.name, value, upper),
        None => format!("{:<16} {:>22}", series.name, value),
    }
}

pub fn process_line(cells: [&str; 3]) -> String {
    format!("{:<8} {:<40} {:>10}", cells[0], cells[1], cells[2])
}

pub fn log_line(line: &LogLine) -> String {
    let source = format!("[{}]", line.source);
    match line.level {
        LogLevel::Raw => format!("{} {}", source.dimmed(), line.message.dimmed()),
        LogLevel::Info => format!("{} {}", source.cyan(), line.message),
        LogLevel::Warn => format!("{} {}", source.yellow(), line.message.yellow()),
        LogLevel::Error => format!("{} {}", source.red(), line.message.red()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::telemetry::{MetricSeries, ValueFormat};

    #[test]
    fn test_series_line_without_data() {
        let snapshot = MetricSeries::new("GPU Power").snapshot();
        let line = series_line(&snapshot);
        assert!(line.starts_with("GPU Power"));
        assert!(line.ends_with(NO_DATA));
    }

    #[test]
    fn test_series_line_uses_format_and_bound() {
        let mut series = MetricSeries::new("CPU Usage")
            .with_upper_bound(100.0)
            .with_format(ValueFormat::Percent);
        series.append(42.0);

        let line = series_line(&series.snapshot());
        assert!(line.contains(" 42.0%"));
        assert!(line.ends_with("(max 100.0)"));
    }

    #[test]
    fn test_process_line_columns() {
        let row = ProcessRow::process("1234", "python", "512 MB");
        let line = process_line(row.cells());
        assert!(line.starts_with("1234     python"));
        assert!(line.ends_with("    512 MB"));
    }
}
