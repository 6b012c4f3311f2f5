//! The unit of work under test.

use crate::runner::Harness;

/// Error a task returns to abort the benchmark.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// A benchmarked unit of work.
///
/// The runner calls [`init`](Task::init) once, [`run`](Task::run) once per
/// warmup and measured iteration, and [`complete`](Task::complete) once after
/// every summary has been printed. Any error ends the benchmark.
///
/// `run` receives the *logical* start time of the iteration from
/// [`nano_time`](crate::clock::nano_time). With coordinated-omission
/// correction this may lie in the past, and the latency a task reports
/// should be measured from it:
///
/// ```ignore
/// fn run(&mut self, start_time_ns: u64) -> Result<(), TaskError> {
///     do_work();
///     self.harness.sample(nano_time() - start_time_ns);
///     Ok(())
/// }
/// ```
///
/// A task may also hand the start time to another thread and call
/// [`Harness::sample`] from there once the work completes.
pub trait Task: Send {
    /// Called once before warmup. Keep the harness to sample and add probes.
    fn init(&mut self, harness: &Harness) -> Result<(), TaskError>;

    /// Start one iteration.
    fn run(&mut self, start_time_ns: u64) -> Result<(), TaskError>;

    /// Called once warmup completion has been observed.
    fn warmed_up(&mut self) {}

    /// Called after each run's report has been printed.
    fn run_complete(&mut self) {}

    /// Called once after all runs and summaries.
    fn complete(&mut self) -> Result<(), TaskError> {
        Ok(())
    }
}
