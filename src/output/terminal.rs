//! Plain-text report formatting.
//!
//! Layout is fixed because downstream tooling parses it: latencies are in
//! microseconds with three significant figures and every table is framed by
//! dashed rules 120 columns wide.

use std::time::Duration;

use crate::aggregate::SeriesSummary;
use crate::config::Throughput;

const RULE_WIDTH: usize = 120;
const LEADING_DASHES: usize = 32;

/// Labels for the fixed percentile positions ahead of `worst`.
pub const PERCENTILE_LABELS: [&str; 7] = ["50", "90", "99", "99.7", "99.9", "99.97", "99.99"];

/// One histogram's contribution to a per-run report.
#[derive(Debug, Clone)]
pub struct SeriesLine {
    /// Display name ("End to End", a probe name, "OS Jitter").
    pub name: String,
    /// Samples recorded during the run.
    pub count: u64,
    /// Percentile values in nanoseconds, worst last.
    pub percentiles: Vec<f64>,
}

/// Everything printed after one measured run.
#[derive(Debug, Clone)]
pub struct RunReport<'a> {
    /// 1-based run number.
    pub run: usize,
    /// Wall time from the first paced start to the last sample.
    pub elapsed: Duration,
    /// Whether coordinated omission was corrected.
    pub corrected: bool,
    /// Configured target throughput.
    pub throughput: Throughput,
    /// End-to-end first, then probes, then jitter.
    pub series: &'a [SeriesLine],
}

/// Render nanoseconds as microseconds with three significant figures.
pub fn format_micros(ns: f64) -> String {
    let us = ns / 1_000.0;
    if us <= 0.0 {
        "0".to_string()
    } else if us < 1.0 {
        format!("{:.3}", us)
    } else if us < 10.0 {
        format!("{:.2}", us)
    } else if us < 100.0 {
        format!("{:.1}", us)
    } else {
        format!("{:.0}", us)
    }
}

/// Insert thousands separators: `9000` -> `9,000`.
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `50/90 99/99.9 99.99 - worst was a / b  c / d  e - f`
pub fn format_percentile_line(values: &[f64]) -> String {
    let Some((worst, body)) = values.split_last() else {
        return "no samples".to_string();
    };
    if body.is_empty() {
        return format!("worst was {}", format_micros(*worst));
    }

    let labels: Vec<&str> = (0..body.len())
        .map(|i| PERCENTILE_LABELS.get(i).copied().unwrap_or("?"))
        .collect();
    let label_text = labels
        .chunks(2)
        .map(|pair| pair.join("/"))
        .collect::<Vec<_>>()
        .join(" ");
    let value_text = body
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|v| format_micros(*v))
                .collect::<Vec<_>>()
                .join(" / ")
        })
        .collect::<Vec<_>>()
        .join("  ");

    format!(
        "{} - worst was {} - {}",
        label_text,
        value_text,
        format_micros(*worst)
    )
}

fn rule(title: &str) -> String {
    let mut line = "-".repeat(LEADING_DASHES);
    line.push(' ');
    line.push_str(title);
    line.push(' ');
    while line.len() < RULE_WIDTH {
        line.push('-');
    }
    line
}

/// Report printed after each run.
pub fn format_run_report(report: &RunReport<'_>) -> String {
    let mut output = String::new();

    output.push_str(&rule(&format!("BENCHMARK RESULTS (RUN {}) us", report.run)));
    output.push('\n');
    output.push_str(&format!(
        "Run time: {:.3}s\n",
        report.elapsed.as_secs_f64()
    ));
    output.push_str(&format!(
        "Correcting for co-ordinated:{}\n",
        report.corrected
    ));
    output.push_str(&format!(
        "Target throughput:{}/s = 1 message every {}us\n",
        report.throughput.per_second_rate().round() as u64,
        format_micros(report.throughput.interval_ns() as f64)
    ));

    for line in report.series {
        let heading = format!("{} ({})", line.name, group_thousands(line.count));
        output.push_str(&format!(
            "{:<48} {}\n",
            heading,
            format_percentile_line(&line.percentiles)
        ));
    }

    output.push_str(&"-".repeat(RULE_WIDTH));
    output.push('\n');
    output
}

/// Cross-run summary table for one series.
pub fn format_summary(summary: &SeriesSummary) -> String {
    let mut output = String::new();

    output.push_str(&rule(&format!("SUMMARY ({}) us", summary.name)));
    output.push('\n');

    output.push_str(&format!("{:<13}", "Percentile"));
    for run in &summary.run_numbers {
        output.push_str(&format!("{:<13}", format!("run{}", run)));
    }
    output.push_str("% Variation");
    if summary.skipped_first_run {
        output.push_str(" (excl. run1)");
    }
    output.push('\n');

    for row in &summary.rows {
        output.push_str(&format!("{:<8}", format!("{}:", row.label)));
        for value in &row.per_run_ns {
            output.push_str(&format!("{:>13}", format_micros(*value)));
        }
        output.push_str(&format!("{:>13.2}\n", row.variation_pct));
    }

    output.push_str(&"-".repeat(RULE_WIDTH));
    output.push('\n');
    output
}
