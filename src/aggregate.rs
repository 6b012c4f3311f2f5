//! Cross-run aggregation.
//!
//! Turns the percentile arrays captured after each run into
//! [`BenchmarkResult`] and into the per-percentile consistency tables
//! printed at the end of a benchmark.

use std::collections::BTreeMap;

use crate::output::terminal::PERCENTILE_LABELS;
use crate::result::{BenchmarkResult, ProbeResult, RunResult};

/// Percentiles of one histogram captured at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    /// 1-based run number.
    pub run: usize,
    /// Samples recorded during the run.
    pub count: u64,
    /// Percentile values in nanoseconds, worst last.
    pub percentiles: Vec<f64>,
}

/// Per-run snapshots of one named series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    /// Display name.
    pub name: String,
    /// One snapshot per run in which the series existed.
    pub runs: Vec<RunSnapshot>,
}

impl Series {
    /// Empty series.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runs: Vec::new(),
        }
    }

    fn to_probe_result(&self) -> ProbeResult {
        ProbeResult::new(
            self.runs
                .iter()
                .map(|run| RunResult::from_percentiles(run.run, run.count, &run.percentiles))
                .collect(),
        )
    }
}

/// One line of a summary table.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    /// `50.0`, `99.9`, ..., `worst`.
    pub label: &'static str,
    /// Value at this percentile for every run, in nanoseconds.
    pub per_run_ns: Vec<f64>,
    /// Spread across the consistency window, in percent.
    pub variation_pct: f64,
}

/// Cross-run summary of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSummary {
    /// Series name.
    pub name: String,
    /// Run number of each table column, ascending.
    pub run_numbers: Vec<usize>,
    /// Whether run 1 was left out of the variation window.
    pub skipped_first_run: bool,
    /// Rows from 50th percentile to worst.
    pub rows: Vec<SummaryRow>,
}

/// `100 * (max - min) / (max + min / 2)` over `values`.
///
/// Zero for an empty window or when every value is zero.
pub fn consistency(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let min = values.iter().copied().fold(f64::MAX, f64::min);
    let denominator = max + min / 2.0;
    if denominator == 0.0 {
        return 0.0;
    }
    100.0 * (max - min) / denominator
}

const SUMMARY_LABELS: [&str; 7] = ["50.0", "90.0", "99.0", "99.7", "99.9", "99.97", "99.99"];

/// Build the summary table for `series`.
///
/// Rows cover the percentile positions every run reported, then `worst`.
/// With `skip_first_run`, run 1 still appears in the table but is left out
/// of the max/min window, unless it is the only run. A series that starts
/// after run 1 has no run 1 to leave out.
pub fn summarize(series: &Series, skip_first_run: bool) -> SeriesSummary {
    let runs = &series.runs;
    let skip = skip_first_run && runs.len() > 1 && runs[0].run == 1;

    let positions = runs
        .iter()
        .map(|run| run.percentiles.len().saturating_sub(1))
        .min()
        .unwrap_or(0)
        .min(PERCENTILE_LABELS.len());

    let mut rows = Vec::with_capacity(positions + 1);
    for (i, label) in SUMMARY_LABELS.iter().enumerate().take(positions) {
        let per_run_ns: Vec<f64> = runs.iter().map(|run| run.percentiles[i]).collect();
        rows.push(row(*label, per_run_ns, skip));
    }
    if !runs.is_empty() {
        let worst: Vec<f64> = runs
            .iter()
            .map(|run| run.percentiles.last().copied().unwrap_or(0.0))
            .collect();
        rows.push(row("worst", worst, skip));
    }

    SeriesSummary {
        name: series.name.clone(),
        run_numbers: runs.iter().map(|run| run.run).collect(),
        skipped_first_run: skip,
        rows,
    }
}

fn row(label: &'static str, per_run_ns: Vec<f64>, skip: bool) -> SummaryRow {
    let window = if skip { &per_run_ns[1..] } else { &per_run_ns[..] };
    let variation_pct = consistency(window);
    SummaryRow {
        label,
        per_run_ns,
        variation_pct,
    }
}

/// Assemble the immutable result from per-run snapshots.
pub fn aggregate(end_to_end: &Series, probes: &[Series], os_jitter: Option<&Series>) -> BenchmarkResult {
    let probes: BTreeMap<String, ProbeResult> = probes
        .iter()
        .map(|series| (series.name.clone(), series.to_probe_result()))
        .collect();

    BenchmarkResult::new(
        end_to_end.to_probe_result(),
        probes,
        os_jitter.map(Series::to_probe_result),
    )
}
