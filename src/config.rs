//! Configuration for paced latency benchmarks.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Target rate at which iterations are started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Throughput {
    /// Iterations per `per`.
    pub rate: u64,
    /// Period over which `rate` iterations are started.
    pub per: Duration,
}

impl Throughput {
    /// `rate` iterations per `per`.
    pub fn new(rate: u64, per: Duration) -> Self {
        Self { rate, per }
    }

    /// `rate` iterations per second.
    pub fn per_second(rate: u64) -> Self {
        Self::new(rate, Duration::from_secs(1))
    }

    /// Nanoseconds between consecutive iteration starts.
    ///
    /// Integer division of the period by the rate; zero when `rate` is zero.
    pub fn interval_ns(&self) -> u64 {
        if self.rate == 0 {
            return 0;
        }
        (self.per.as_nanos() / u128::from(self.rate)) as u64
    }

    /// Rate normalised to iterations per second, for reporting.
    pub fn per_second_rate(&self) -> f64 {
        let secs = self.per.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.rate as f64 / secs
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.rate == 0 {
            return Err(ConfigError::ZeroThroughput);
        }
        if self.interval_ns() == 0 {
            return Err(ConfigError::ThroughputTooHigh {
                rate: self.rate,
                period_ns: self.per.as_nanos(),
            });
        }
        Ok(())
    }
}

impl Default for Throughput {
    fn default() -> Self {
        Self::per_second(10_000)
    }
}

/// Whether the first run is left out of the cross-run consistency window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipFirstRun {
    /// Skip the first run only when more than three runs are configured.
    #[default]
    Unset,
    /// Always skip the first run.
    Skip,
    /// Always include the first run.
    NoSkip,
}

impl SkipFirstRun {
    /// Resolve the policy for a benchmark with `runs` runs.
    pub fn resolve(self, runs: usize) -> bool {
        match self {
            SkipFirstRun::Unset => runs > 3,
            SkipFirstRun::Skip => true,
            SkipFirstRun::NoSkip => false,
        }
    }
}

/// Configuration options for a [`Benchmark`](crate::Benchmark).
///
/// Immutable once the benchmark is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Target iteration start rate (default: 10,000/s).
    pub throughput: Throughput,

    /// Samples to receive before measurement starts (default: 10,000).
    pub warmup_iterations: u64,

    /// Iterations per measured run (default: 100,000).
    pub iterations: u64,

    /// Number of measured runs (default: 3).
    pub runs: usize,

    /// Schedule against fixed deadlines so queueing delay is measured (default: true).
    pub account_for_coordinated_omission: bool,

    /// Run the background jitter monitor (default: true).
    pub record_os_jitter: bool,

    /// Gaps above this are recorded as jitter, in nanoseconds (default: 1,000).
    pub record_jitter_greater_than_ns: u64,

    /// Pause between warmup completion and the first run (default: 0).
    pub pause_after_warmup: Duration,

    /// First-run exclusion policy for the consistency metric.
    pub skip_first_run: SkipFirstRun,

    /// Pin the jitter monitor thread to its own CPU (default: false).
    pub jitter_affinity: bool,

    /// Hold a CPU affinity lock on the benchmark thread for all runs (default: false).
    pub acquire_lock: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            throughput: Throughput::default(),
            warmup_iterations: 10_000,
            iterations: 100_000,
            runs: 3,
            account_for_coordinated_omission: true,
            record_os_jitter: true,
            record_jitter_greater_than_ns: 1_000,
            pause_after_warmup: Duration::ZERO,
            skip_first_run: SkipFirstRun::Unset,
            jitter_affinity: false,
            acquire_lock: false,
        }
    }
}

impl BenchmarkConfig {
    /// Check the invariants `iterations > 0`, `runs >= 1` and `throughput > 0`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.runs == 0 {
            return Err(ConfigError::ZeroRuns);
        }
        self.throughput.validate()
    }

    /// Whether the first run is excluded from the consistency window.
    pub fn skips_first_run(&self) -> bool {
        self.skip_first_run.resolve(self.runs)
    }
}
