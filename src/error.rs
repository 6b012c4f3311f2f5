//! Error types for benchmark configuration and execution.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::task::TaskError;

/// Configuration rejected by [`BenchmarkBuilder::build`](crate::BenchmarkBuilder::build).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No task was bound to the benchmark.
    #[error("no task bound to the benchmark; call `.task(...)` before `.build()`")]
    MissingTask,

    /// Iterations per run must be positive.
    #[error("iterations per run must be greater than zero")]
    ZeroIterations,

    /// At least one run is required.
    #[error("runs must be at least 1")]
    ZeroRuns,

    /// Throughput must be positive.
    #[error("throughput must be greater than zero")]
    ZeroThroughput,

    /// The configured rate leaves no whole nanosecond between iterations.
    #[error("throughput of {rate} per {period_ns}ns leaves less than 1ns between iterations")]
    ThroughputTooHigh {
        /// Configured rate.
        rate: u64,
        /// Configured period in nanoseconds.
        period_ns: u128,
    },

    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for environment variable {key}")]
    InvalidEnv {
        /// Variable name.
        key: String,
        /// Raw value that failed to parse.
        value: String,
    },
}

/// Errors from CPU affinity pinning.
#[derive(Error, Debug)]
pub enum AffinityError {
    /// Thread pinning is not available on this platform.
    #[error("CPU affinity is not supported on this platform")]
    Unsupported,

    /// The requested CPU is outside the range the OS can address.
    #[error("CPU {0} is out of range")]
    InvalidCpu(usize),

    /// An affinity syscall failed.
    #[error("{op} failed: {source}")]
    Syscall {
        /// The failing call.
        op: &'static str,
        /// OS error.
        #[source]
        source: io::Error,
    },
}

/// Lifecycle phase in which a task failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    /// `Task::init`.
    Init,
    /// `Task::run`, warmup or measured.
    Run,
    /// `Task::complete`.
    Complete,
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPhase::Init => f.write_str("init"),
            TaskPhase::Run => f.write_str("run"),
            TaskPhase::Complete => f.write_str("complete"),
        }
    }
}

/// Fatal errors that abort a benchmark.
#[derive(Error, Debug)]
pub enum BenchmarkError {
    /// The task under test failed; all later measurements are invalid.
    #[error("task failed during {phase}: {source}")]
    Task {
        /// Phase that failed.
        phase: TaskPhase,
        /// Error returned by the task.
        #[source]
        source: TaskError,
    },

    /// Acquiring or releasing the benchmark thread's CPU lock failed.
    #[error("affinity: {0}")]
    Affinity(#[from] AffinityError),

    /// Writing a report or spawning the jitter thread failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BenchmarkError {
    pub(crate) fn task(phase: TaskPhase) -> impl FnOnce(TaskError) -> Self {
        move |source| BenchmarkError::Task { phase, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_error_names_phase() {
        let err = BenchmarkError::task(TaskPhase::Run)("boom".into());
        let msg = err.to_string();
        assert!(msg.contains("run"), "{msg}");
        assert!(msg.contains("boom"), "{msg}");
    }

    #[test]
    fn throughput_error_message() {
        let err = ConfigError::ThroughputTooHigh {
            rate: 2_000_000_000,
            period_ns: 1_000_000_000,
        };
        assert!(err.to_string().contains("less than 1ns"));
    }
}
