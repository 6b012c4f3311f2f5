//! # latbench
//!
//! Measure the latency distribution of a repeatable unit of work at a fixed
//! target throughput.
//!
//! A [`Task`] is started at a paced rate and reports the latency of each
//! iteration through a [`Harness`], possibly from another thread. Latencies
//! land in histograms; after every run a percentile report is printed, and
//! once all runs are done a summary shows each percentile across runs with a
//! consistency score.
//!
//! ## Coordinated omission
//!
//! By default iterations are scheduled against fixed deadlines
//! (`previous deadline + interval`), and the start time handed to the task is
//! the deadline rather than the moment the runner actually got round to it.
//! A stall therefore shows up in every iteration queued behind it instead of
//! silently disappearing from the distribution. Disable this with
//! [`BenchmarkBuilder::account_for_coordinated_omission`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use latbench::{nano_time, BenchmarkBuilder, Harness, Task, TaskError, Throughput};
//!
//! struct Echo {
//!     harness: Option<Harness>,
//! }
//!
//! impl Task for Echo {
//!     fn init(&mut self, harness: &Harness) -> Result<(), TaskError> {
//!         self.harness = Some(harness.clone());
//!         Ok(())
//!     }
//!
//!     fn run(&mut self, start_time_ns: u64) -> Result<(), TaskError> {
//!         do_work();
//!         if let Some(h) = &self.harness {
//!             h.sample(nano_time() - start_time_ns);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let result = BenchmarkBuilder::new()
//!     .throughput(Throughput::per_second(100_000))
//!     .iterations(1_000_000)
//!     .task(Echo { harness: None })
//!     .build()?
//!     .start()?;
//!
//! println!("{}", latbench::output::to_json_pretty(&result)?);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod builder;
mod config;
mod error;
mod result;
mod runner;
mod task;

// Functional modules
pub mod affinity;
pub mod aggregate;
pub mod clock;
pub mod histogram;
pub mod jitter;
pub mod output;
pub mod pacing;
pub mod probe;

// Re-exports for public API
pub use builder::BenchmarkBuilder;
pub use clock::{black_box, nano_time};
pub use config::{BenchmarkConfig, SkipFirstRun, Throughput};
pub use error::{AffinityError, BenchmarkError, ConfigError, TaskPhase};
pub use histogram::{Histogram, HistogramFactory, LatencyHistogram};
pub use probe::{NanoSampler, Probe};
pub use result::{BenchmarkResult, Percentile, ProbeResult, RunResult};
pub use runner::{Benchmark, EndToEndSampler, Harness, ResultConsumer};
pub use task::{Task, TaskError};
