//! Builder API for benchmarks.
//!
//! Every option is independently settable; [`BenchmarkBuilder::build`]
//! validates the whole configuration at once.
//!
//! # Example
//!
//! ```ignore
//! use latbench::{BenchmarkBuilder, Throughput};
//!
//! let result = BenchmarkBuilder::new()
//!     .throughput(Throughput::per_second(50_000))
//!     .warmup_iterations(20_000)
//!     .iterations(200_000)
//!     .runs(5)
//!     .task(MyTask::default())
//!     .build()?
//!     .start()?;
//! ```
//!
//! # Environment overrides
//!
//! [`BenchmarkBuilder::from_env`] merges the following variables over the
//! values set so far:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `LATBENCH_ITERATIONS` | iterations per run |
//! | `LATBENCH_WARMUP` | warmup iterations |
//! | `LATBENCH_RUNS` | number of runs |
//! | `LATBENCH_THROUGHPUT` | iterations per second |
//! | `LATBENCH_CO` | coordinated-omission correction (`true`/`false`) |
//! | `LATBENCH_JITTER` | record OS jitter (`true`/`false`) |
//! | `LATBENCH_JITTER_THRESHOLD_NS` | jitter threshold |
//! | `LATBENCH_PAUSE_AFTER_WARMUP_MS` | pause after warmup |
//! | `LATBENCH_SKIP_FIRST_RUN` | `skip`, `no-skip` or `unset` |

use std::env;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{BenchmarkConfig, SkipFirstRun, Throughput};
use crate::error::ConfigError;
use crate::histogram::{default_factory, Histogram, HistogramFactory};
use crate::result::BenchmarkResult;
use crate::runner::{Benchmark, ResultConsumer};
use crate::task::Task;

/// Builder for [`Benchmark`].
pub struct BenchmarkBuilder {
    config: BenchmarkConfig,
    task: Option<Box<dyn Task>>,
    sink: Option<Box<dyn Write + Send>>,
    factory: Option<HistogramFactory>,
    consumer: Option<ResultConsumer>,
    env_error: Option<ConfigError>,
}

impl Default for BenchmarkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchmarkBuilder {
    /// Start from [`BenchmarkConfig::default`].
    pub fn new() -> Self {
        Self::with_config(BenchmarkConfig::default())
    }

    /// Start from an existing configuration.
    pub fn with_config(config: BenchmarkConfig) -> Self {
        Self {
            config,
            task: None,
            sink: None,
            factory: None,
            consumer: None,
            env_error: None,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Merge overrides from `LATBENCH_*` environment variables.
    ///
    /// The first unparseable value is reported by [`build`](Self::build).
    pub fn from_env(mut self) -> Self {
        if let Some(n) = self.parse_env::<u64>("LATBENCH_ITERATIONS") {
            self = self.iterations(n);
        }
        if let Some(n) = self.parse_env::<u64>("LATBENCH_WARMUP") {
            self = self.warmup_iterations(n);
        }
        if let Some(n) = self.parse_env::<usize>("LATBENCH_RUNS") {
            self = self.runs(n);
        }
        if let Some(rate) = self.parse_env::<u64>("LATBENCH_THROUGHPUT") {
            self = self.throughput(Throughput::per_second(rate));
        }
        if let Some(flag) = self.parse_env_with("LATBENCH_CO", parse_bool) {
            self = self.account_for_coordinated_omission(flag);
        }
        if let Some(flag) = self.parse_env_with("LATBENCH_JITTER", parse_bool) {
            self = self.record_os_jitter(flag);
        }
        if let Some(ns) = self.parse_env::<u64>("LATBENCH_JITTER_THRESHOLD_NS") {
            self = self.record_jitter_greater_than_ns(ns);
        }
        if let Some(ms) = self.parse_env::<u64>("LATBENCH_PAUSE_AFTER_WARMUP_MS") {
            self = self.pause_after_warmup(Duration::from_millis(ms));
        }
        if let Some(policy) = self.parse_env_with("LATBENCH_SKIP_FIRST_RUN", parse_skip_first_run) {
            self = self.skip_first_run(policy);
        }
        self
    }

    fn parse_env<T: FromStr>(&mut self, key: &str) -> Option<T> {
        self.parse_env_with(key, |raw| raw.trim().parse().ok())
    }

    fn parse_env_with<T>(&mut self, key: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let raw = env::var(key).ok()?;
        let parsed = parse(&raw);
        if parsed.is_none() && self.env_error.is_none() {
            self.env_error = Some(ConfigError::InvalidEnv {
                key: key.to_string(),
                value: raw,
            });
        }
        parsed
    }

    /// Target iteration start rate.
    pub fn throughput(mut self, throughput: Throughput) -> Self {
        self.config.throughput = throughput;
        self
    }

    /// Samples to receive before measurement starts.
    pub fn warmup_iterations(mut self, n: u64) -> Self {
        self.config.warmup_iterations = n;
        self
    }

    /// Iterations per measured run.
    pub fn iterations(mut self, n: u64) -> Self {
        self.config.iterations = n;
        self
    }

    /// Number of measured runs.
    pub fn runs(mut self, n: usize) -> Self {
        self.config.runs = n;
        self
    }

    /// Schedule against fixed deadlines (default) or relative waits.
    pub fn account_for_coordinated_omission(mut self, enabled: bool) -> Self {
        self.config.account_for_coordinated_omission = enabled;
        self
    }

    /// Run the background jitter monitor.
    pub fn record_os_jitter(mut self, enabled: bool) -> Self {
        self.config.record_os_jitter = enabled;
        self
    }

    /// Jitter gaps above this many nanoseconds are recorded.
    pub fn record_jitter_greater_than_ns(mut self, ns: u64) -> Self {
        self.config.record_jitter_greater_than_ns = ns;
        self
    }

    /// Pause between warmup completion and the first run.
    pub fn pause_after_warmup(mut self, pause: Duration) -> Self {
        self.config.pause_after_warmup = pause;
        self
    }

    /// First-run exclusion policy for the consistency metric.
    pub fn skip_first_run(mut self, policy: SkipFirstRun) -> Self {
        self.config.skip_first_run = policy;
        self
    }

    /// Pin the jitter monitor to its own CPU.
    pub fn jitter_affinity(mut self, enabled: bool) -> Self {
        self.config.jitter_affinity = enabled;
        self
    }

    /// Hold a CPU affinity lock on the benchmark thread during all runs.
    pub fn acquire_lock(mut self, enabled: bool) -> Self {
        self.config.acquire_lock = enabled;
        self
    }

    /// The unit of work to benchmark.
    pub fn task(mut self, task: impl Task + 'static) -> Self {
        self.task = Some(Box::new(task));
        self
    }

    /// Where per-run and summary reports are written (default: stdout).
    pub fn report_to(mut self, sink: impl Write + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Histogram implementation for end-to-end, probe and jitter samples.
    pub fn histogram_factory<F, H>(mut self, factory: F) -> Self
    where
        F: Fn() -> H + Send + Sync + 'static,
        H: Histogram + 'static,
    {
        let factory: HistogramFactory = Arc::new(move || Arc::new(factory()) as Arc<dyn Histogram>);
        self.factory = Some(factory);
        self
    }

    /// Receive the result before the task's completion callback.
    pub fn result_consumer(mut self, consumer: impl FnOnce(&BenchmarkResult) + Send + 'static) -> Self {
        self.consumer = Some(Box::new(consumer));
        self
    }

    /// Validate and produce a runnable benchmark.
    pub fn build(self) -> Result<Benchmark, ConfigError> {
        if let Some(err) = self.env_error {
            return Err(err);
        }
        self.config.validate()?;
        let task = self.task.ok_or(ConfigError::MissingTask)?;

        Ok(Benchmark {
            config: self.config,
            task,
            sink: self.sink.unwrap_or_else(|| Box::new(io::stdout())),
            factory: self.factory.unwrap_or_else(default_factory),
            consumer: self.consumer,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_skip_first_run(raw: &str) -> Option<SkipFirstRun> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "skip" | "true" => Some(SkipFirstRun::Skip),
        "no-skip" | "noskip" | "false" => Some(SkipFirstRun::NoSkip),
        "unset" | "" => Some(SkipFirstRun::Unset),
        _ => None,
    }
}
