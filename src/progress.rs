//! Progress reporting for the scanner
//!
//! A live spinner line while the scan runs, plus the header and summary
//! blocks printed around it.

use crate::walker::ScanProgress;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Spinner line driven from the scanner's counters.
///
/// The reporter itself never polls; the caller feeds it snapshots via
/// [`update`](Self::update) until [`finish`](Self::finish) flips the stop
/// flag.
pub struct ProgressReporter {
    bar: ProgressBar,
    stop: AtomicBool,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .expect("Invalid progress template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

        let bar = ProgressBar::new_spinner().with_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            stop: AtomicBool::new(false),
        }
    }

    /// Render one snapshot onto the spinner line.
    pub fn update(&self, progress: &ScanProgress) {
        self.bar.set_message(format!(
            "Files: {} | Symbols: {} | Source: {} | Rate: {:.0}/s | Errors: {} | Workers: {}",
            format_number(progress.files),
            format_number(progress.symbols),
            format_size(progress.bytes, BINARY),
            progress.files_per_second(),
            format_number(progress.errors),
            progress.total_workers,
        ));
    }

    /// Whether the reporter has been told to stop.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Stop the feed and tear down the spinner line, leaving `message`
    /// behind if one is given.
    pub fn finish(&self, message: Option<&str>) {
        self.stop.store(true, Ordering::SeqCst);
        match message {
            Some(message) => self.bar.finish_with_message(message.to_string()),
            None => self.bar.finish_and_clear(),
        }
    }
}

/// Group a count into thousands: 1234567 -> "1,234,567"
fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

/// Print a summary of the scan results
pub fn print_summary(files: u64, symbols: u64, bytes: u64, errors: u64, duration: Duration) {
    let secs = duration.as_secs_f64();
    let rate = if secs > 0.0 { files as f64 / secs } else { 0.0 };

    println!();
    println!("{}", style("Scan Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Files:").bold(), format_number(files));
    println!("  {} {}", style("Symbols:").bold(), format_number(symbols));
    println!(
        "  {} {}",
        style("Source Read:").bold(),
        format_size(bytes, BINARY)
    );
    println!(
        "  {} {:.1}s ({:.0} files/sec)",
        style("Duration:").bold(),
        secs,
        rate
    );
    if errors > 0 {
        println!(
            "  {} {}",
            style("Skipped:").yellow().bold(),
            format_number(errors)
        );
    }
    println!();
}

/// Print a header at the start of the scan
pub fn print_header(python: &str, workers: usize) {
    println!();
    println!(
        "{} {}",
        style("pyscout").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Interpreter:").bold(), python);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(12), "12");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(65_536), "65,536");
        assert_eq!(format_number(1_234_567), "1,234,567");
        assert_eq!(format_number(1_234_567_890), "1,234,567,890");
    }

    #[test]
    fn test_finish_sets_stop_flag() {
        let reporter = ProgressReporter::new();
        assert!(!reporter.is_stopped());
        reporter.finish(None);
        assert!(reporter.is_stopped());
    }
}
