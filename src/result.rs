//! Benchmark result types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Named percentile buckets of a [`RunResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Percentile {
    /// Median.
    P50,
    /// 90th.
    P90,
    /// 99th.
    P99,
    /// 99.7th.
    P99_7,
    /// 99.9th.
    P99_9,
    /// 99.97th.
    P99_97,
    /// 99.99th.
    P99_99,
    /// Largest recorded value.
    Worst,
}

/// Percentiles of one histogram for one measured run, in nanoseconds.
///
/// The three coarse percentiles and `worst` are always present; the finer
/// buckets only when the histogram reported them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// 1-based run number.
    pub run: usize,
    /// Samples recorded during the run.
    pub count: u64,
    /// 50th percentile.
    pub p50_ns: f64,
    /// 90th percentile.
    pub p90_ns: f64,
    /// 99th percentile.
    pub p99_ns: f64,
    /// 99.7th percentile.
    pub p99_7_ns: Option<f64>,
    /// 99.9th percentile.
    pub p99_9_ns: Option<f64>,
    /// 99.97th percentile.
    pub p99_97_ns: Option<f64>,
    /// 99.99th percentile.
    pub p99_99_ns: Option<f64>,
    /// Worst value.
    pub worst_ns: f64,
}

impl RunResult {
    /// Map a histogram percentile array onto named buckets.
    ///
    /// Position `i` is a real percentile only when it is not the last
    /// element; the last element is always `worst`. Missing coarse
    /// percentiles fall back to `worst`.
    pub fn from_percentiles(run: usize, count: u64, values: &[f64]) -> Self {
        let worst = values.last().copied().unwrap_or(0.0);
        let body = &values[..values.len().saturating_sub(1)];
        let at = |i: usize| body.get(i).copied();

        Self {
            run,
            count,
            p50_ns: at(0).unwrap_or(worst),
            p90_ns: at(1).unwrap_or(worst),
            p99_ns: at(2).unwrap_or(worst),
            p99_7_ns: at(3),
            p99_9_ns: at(4),
            p99_97_ns: at(5),
            p99_99_ns: at(6),
            worst_ns: worst,
        }
    }

    /// Value of a named bucket, if present.
    pub fn get(&self, percentile: Percentile) -> Option<f64> {
        match percentile {
            Percentile::P50 => Some(self.p50_ns),
            Percentile::P90 => Some(self.p90_ns),
            Percentile::P99 => Some(self.p99_ns),
            Percentile::P99_7 => self.p99_7_ns,
            Percentile::P99_9 => self.p99_9_ns,
            Percentile::P99_97 => self.p99_97_ns,
            Percentile::P99_99 => self.p99_99_ns,
            Percentile::Worst => Some(self.worst_ns),
        }
    }
}

/// Per-run results of one series, ordered by run.
///
/// A probe first registered after run 1 starts at the run it was registered
/// in; [`RunResult::run`] names the run each entry belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    runs: Vec<RunResult>,
}

impl ProbeResult {
    /// Wrap per-run results.
    pub fn new(runs: Vec<RunResult>) -> Self {
        Self { runs }
    }

    /// All runs, first to last.
    pub fn each_run_summary(&self) -> &[RunResult] {
        &self.runs
    }

    /// The final run, if any run completed.
    pub fn summary_of_last_run(&self) -> Option<&RunResult> {
        self.runs.last()
    }
}

/// Immutable outcome of a whole benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    end_to_end: ProbeResult,
    probes: BTreeMap<String, ProbeResult>,
    os_jitter: Option<ProbeResult>,
}

impl BenchmarkResult {
    pub(crate) fn new(
        end_to_end: ProbeResult,
        probes: BTreeMap<String, ProbeResult>,
        os_jitter: Option<ProbeResult>,
    ) -> Self {
        Self {
            end_to_end,
            probes,
            os_jitter,
        }
    }

    /// End-to-end latency per run.
    pub fn end_to_end(&self) -> &ProbeResult {
        &self.end_to_end
    }

    /// A probe's results by name.
    pub fn probe(&self, name: &str) -> Option<&ProbeResult> {
        self.probes.get(name)
    }

    /// Names of all probes, sorted.
    pub fn probe_names(&self) -> impl Iterator<Item = &str> {
        self.probes.keys().map(String::as_str)
    }

    /// Jitter monitor results, when jitter recording was enabled.
    pub fn os_jitter(&self) -> Option<&ProbeResult> {
        self.os_jitter.as_ref()
    }
}
