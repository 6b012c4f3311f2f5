//! The benchmark runner and the harness handle given to tasks.
//!
//! A benchmark moves through
//! `init -> warmup -> (run -> drain -> report) x runs -> summary -> complete`
//! on the thread that calls [`Benchmark::start`].
//!
//! Issuing an iteration and recording its latency are decoupled: the runner
//! only calls [`Task::run`], while latencies arrive through
//! [`Harness::sample`] from whichever thread finishes the work. Warmup
//! completion and end-of-run are therefore detected from the samples
//! received, never from the runner's own loop counters.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::affinity::AffinityLock;
use crate::aggregate::{aggregate, summarize, RunSnapshot, Series};
use crate::clock::nano_time;
use crate::config::BenchmarkConfig;
use crate::error::{BenchmarkError, TaskPhase};
use crate::histogram::{Histogram, HistogramFactory};
use crate::jitter::JitterMonitor;
use crate::output::terminal::{format_run_report, format_summary, RunReport, SeriesLine};
use crate::pacing::PacingScheduler;
use crate::probe::{NanoSampler, Probe, ProbeRegistry};
use crate::result::BenchmarkResult;
use crate::task::Task;

const END_TO_END: &str = "End to End";
const END_TO_END_SUMMARY: &str = "end to end";
const OS_JITTER: &str = "OS Jitter";

/// Sleep between polls while waiting for warmup samples.
const WARMUP_POLL_INTERVAL: Duration = Duration::from_micros(500);
/// How often warmup progress is logged while waiting.
const WARMUP_LOG_INTERVAL: Duration = Duration::from_secs(2);

/// Called with the final result before [`Task::complete`].
pub type ResultConsumer = Box<dyn FnOnce(&BenchmarkResult) + Send>;

struct Shared {
    warmup_iterations: u64,
    received: AtomicU64,
    warmed_up: AtomicBool,
    /// Held by every warmup sample from counting through recording, so the
    /// boundary reset cannot interleave with a warmup sample in flight.
    warmup_gate: Mutex<()>,
    end_to_end: Arc<dyn Histogram>,
    probes: ProbeRegistry,
}

/// Handle through which a task reports latencies and registers probes.
///
/// Cheap to clone and safe to move to other threads.
#[derive(Clone)]
pub struct Harness {
    shared: Arc<Shared>,
}

impl Harness {
    fn new(warmup_iterations: u64, factory: &HistogramFactory) -> Self {
        Self {
            shared: Arc::new(Shared {
                warmup_iterations,
                received: AtomicU64::new(0),
                warmed_up: AtomicBool::new(warmup_iterations == 0),
                warmup_gate: Mutex::new(()),
                end_to_end: factory(),
                probes: ProbeRegistry::new(Arc::clone(factory)),
            }),
        }
    }

    /// Record one end-to-end latency in nanoseconds.
    ///
    /// Samples before the warmup count is reached are recorded so progress
    /// is visible. The sample that reaches it resets the end-to-end and
    /// probe histograms, marks warmup complete and is itself discarded.
    ///
    /// Every warmup sample is counted and recorded before the boundary reset
    /// runs, whichever threads they arrive on.
    pub fn sample(&self, nanos: u64) {
        let shared = &self.shared;
        if !shared.warmed_up.load(Ordering::Acquire) {
            let _gate = shared.warmup_gate.lock();
            if !shared.warmed_up.load(Ordering::Acquire) {
                let received = shared.received.fetch_add(1, Ordering::AcqRel) + 1;
                if received == shared.warmup_iterations {
                    shared.end_to_end.reset();
                    shared.probes.reset_all();
                    shared.warmed_up.store(true, Ordering::Release);
                } else {
                    shared.end_to_end.sample(nanos);
                }
                return;
            }
        }
        shared.received.fetch_add(1, Ordering::AcqRel);
        shared.end_to_end.sample(nanos);
    }

    /// Return the probe named `name`, registering it on first use.
    pub fn add_probe(&self, name: &str) -> Probe {
        self.shared.probes.get_or_register(name)
    }

    /// A sampler that forwards to [`sample`](Self::sample).
    pub fn end_to_end(&self) -> EndToEndSampler {
        EndToEndSampler {
            harness: self.clone(),
        }
    }

    /// Samples received since the benchmark started, warmup included.
    pub fn samples_received(&self) -> u64 {
        self.shared.received.load(Ordering::Acquire)
    }

    /// End-to-end samples recorded in the current phase.
    pub fn end_to_end_count(&self) -> u64 {
        self.shared.end_to_end.total_count()
    }

    /// Whether the warmup boundary sample has arrived.
    pub fn is_warmed_up(&self) -> bool {
        self.shared.warmed_up.load(Ordering::Acquire)
    }
}

/// [`NanoSampler`] view of the harness's end-to-end entry point.
#[derive(Clone)]
pub struct EndToEndSampler {
    harness: Harness,
}

impl NanoSampler for EndToEndSampler {
    #[inline]
    fn sample_nanos(&self, nanos: u64) {
        self.harness.sample(nanos);
    }
}

/// A configured, single-use benchmark.
///
/// Build one with [`BenchmarkBuilder`](crate::BenchmarkBuilder).
pub struct Benchmark {
    pub(crate) config: BenchmarkConfig,
    pub(crate) task: Box<dyn Task>,
    pub(crate) sink: Box<dyn Write + Send>,
    pub(crate) factory: HistogramFactory,
    pub(crate) consumer: Option<ResultConsumer>,
}

impl Benchmark {
    /// The validated configuration.
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Run the whole benchmark on the calling thread.
    ///
    /// Any task error aborts immediately; `Task::complete` is then not
    /// called. A hung task hangs this call.
    pub fn start(self) -> Result<BenchmarkResult, BenchmarkError> {
        let Benchmark {
            config,
            mut task,
            sink,
            factory,
            consumer,
        } = self;

        let harness = Harness::new(config.warmup_iterations, &factory);
        info!(
            iterations = config.iterations,
            warmup = config.warmup_iterations,
            runs = config.runs,
            interval_ns = config.throughput.interval_ns(),
            corrected = config.account_for_coordinated_omission,
            "initialising benchmark task"
        );
        task.init(&harness).map_err(BenchmarkError::task(TaskPhase::Init))?;

        let jitter = if config.record_os_jitter {
            Some(JitterMonitor::start(
                factory(),
                config.record_jitter_greater_than_ns,
                config.jitter_affinity,
            )?)
        } else {
            None
        };

        let mut execution = Execution {
            scheduler: PacingScheduler::new(
                config.throughput,
                config.account_for_coordinated_omission,
            ),
            config,
            task,
            harness,
            jitter,
            sink,
            end_to_end: Series::new(END_TO_END_SUMMARY),
            probes: Vec::new(),
            os_jitter: Series::new(OS_JITTER),
        };

        let lock = if execution.config.acquire_lock {
            Some(AffinityLock::acquire()?)
        } else {
            None
        };
        let outcome = execution.warm_up().and_then(|()| execution.measure());
        let released = lock.map_or(Ok(()), AffinityLock::release);
        outcome?;
        released?;

        if let Some(jitter) = execution.jitter.take() {
            jitter.stop();
        }
        execution.print_summaries()?;

        let result = aggregate(
            &execution.end_to_end,
            &execution.probes,
            execution
                .config
                .record_os_jitter
                .then_some(&execution.os_jitter),
        );
        if let Some(consumer) = consumer {
            consumer(&result);
        }

        execution
            .task
            .complete()
            .map_err(BenchmarkError::task(TaskPhase::Complete))?;
        info!("benchmark complete");
        Ok(result)
    }
}

struct Execution {
    config: BenchmarkConfig,
    task: Box<dyn Task>,
    harness: Harness,
    jitter: Option<JitterMonitor>,
    sink: Box<dyn Write + Send>,
    scheduler: PacingScheduler,
    end_to_end: Series,
    probes: Vec<Series>,
    os_jitter: Series,
}

impl Execution {
    fn warm_up(&mut self) -> Result<(), BenchmarkError> {
        let warmup = self.config.warmup_iterations;
        info!(warmup, "warming up");

        for _ in 0..warmup {
            self.task
                .run(nano_time())
                .map_err(BenchmarkError::task(TaskPhase::Run))?;
        }

        let mut last_log = Instant::now();
        while !self.harness.is_warmed_up() {
            thread::sleep(WARMUP_POLL_INTERVAL);
            if last_log.elapsed() >= WARMUP_LOG_INTERVAL {
                info!(
                    received = self.harness.samples_received(),
                    expected = warmup,
                    "waiting for warmup samples"
                );
                last_log = Instant::now();
            }
        }
        info!(probes = self.harness.shared.probes.len(), "warmup complete");

        if !self.config.pause_after_warmup.is_zero() {
            debug!(pause = ?self.config.pause_after_warmup, "pausing after warmup");
            thread::sleep(self.config.pause_after_warmup);
        }
        if let Some(jitter) = &self.jitter {
            jitter.reset();
        }
        self.task.warmed_up();
        Ok(())
    }

    fn measure(&mut self) -> Result<(), BenchmarkError> {
        for run in 0..self.config.runs {
            debug!(run = run + 1, "starting run");
            let started = Instant::now();
            self.scheduler.begin_run();

            for i in 0..self.config.iterations {
                let start_ns = if run == 0 && i == 0 {
                    self.scheduler.start_now()
                } else {
                    self.scheduler.next_start()
                };
                self.task
                    .run(start_ns)
                    .map_err(BenchmarkError::task(TaskPhase::Run))?;
            }

            while self.harness.end_to_end_count() < self.config.iterations {
                thread::yield_now();
            }

            self.report(run, started.elapsed())?;
            self.task.run_complete();
        }
        Ok(())
    }

    fn report(&mut self, run: usize, elapsed: Duration) -> Result<(), BenchmarkError> {
        let number = run + 1;
        let mut lines = Vec::new();

        let end_to_end = &self.harness.shared.end_to_end;
        let snapshot = capture(end_to_end.as_ref(), number);
        lines.push(line(END_TO_END, &snapshot));
        self.end_to_end.runs.push(snapshot);

        for probe in self.harness.shared.probes.snapshot() {
            let snapshot = capture(probe.histogram().as_ref(), number);
            lines.push(line(probe.name(), &snapshot));
            let position = self.probes.iter().position(|s| s.name == probe.name());
            let series = match position {
                Some(i) => &mut self.probes[i],
                None => {
                    self.probes.push(Series::new(probe.name()));
                    let last = self.probes.len() - 1;
                    &mut self.probes[last]
                }
            };
            series.runs.push(snapshot);
        }

        if let Some(jitter) = &self.jitter {
            if !jitter.is_running() {
                warn!(run = number, "jitter monitor stopped early");
            }
            let snapshot = capture(jitter.histogram().as_ref(), number);
            lines.push(line(OS_JITTER, &snapshot));
            self.os_jitter.runs.push(snapshot);
        }

        let report = RunReport {
            run: number,
            elapsed,
            corrected: self.config.account_for_coordinated_omission,
            throughput: self.config.throughput,
            series: &lines,
        };
        self.sink.write_all(format_run_report(&report).as_bytes())?;
        self.sink.flush()?;

        end_to_end.reset();
        self.harness.shared.probes.reset_all();
        if let Some(jitter) = &self.jitter {
            jitter.reset();
        }
        Ok(())
    }

    fn print_summaries(&mut self) -> Result<(), BenchmarkError> {
        let skip = self.config.skips_first_run();
        let mut text = format_summary(&summarize(&self.end_to_end, skip));
        for series in &self.probes {
            text.push_str(&format_summary(&summarize(series, skip)));
        }
        if self.config.record_os_jitter {
            text.push_str(&format_summary(&summarize(&self.os_jitter, skip)));
        }
        self.sink.write_all(text.as_bytes())?;
        self.sink.flush()?;
        Ok(())
    }
}

fn capture(histogram: &dyn Histogram, run: usize) -> RunSnapshot {
    RunSnapshot {
        run,
        count: histogram.total_count(),
        percentiles: histogram.percentiles(),
    }
}

fn line(name: &str, snapshot: &RunSnapshot) -> SeriesLine {
    SeriesLine {
        name: name.to_string(),
        count: snapshot.count,
        percentiles: snapshot.percentiles.clone(),
    }
}
