//! Tests for the BenchmarkBuilder API and configuration validation.

use std::env;
use std::time::Duration;

use latbench::{
    BenchmarkBuilder, BenchmarkConfig, ConfigError, Harness, SkipFirstRun, Task, TaskError,
    Throughput,
};

struct Noop;

impl Task for Noop {
    fn init(&mut self, _harness: &Harness) -> Result<(), TaskError> {
        Ok(())
    }

    fn run(&mut self, _start_time_ns: u64) -> Result<(), TaskError> {
        Ok(())
    }
}

// ===========================================================================
// Defaults
// ===========================================================================

#[test]
fn defaults() {
    let config = BenchmarkConfig::default();
    assert_eq!(config.throughput.interval_ns(), 100_000);
    assert_eq!(config.warmup_iterations, 10_000);
    assert_eq!(config.iterations, 100_000);
    assert_eq!(config.runs, 3);
    assert!(config.account_for_coordinated_omission);
    assert!(config.record_os_jitter);
    assert_eq!(config.record_jitter_greater_than_ns, 1_000);
    assert_eq!(config.pause_after_warmup, Duration::ZERO);
    assert_eq!(config.skip_first_run, SkipFirstRun::Unset);
    assert!(!config.jitter_affinity);
    assert!(!config.acquire_lock);
}

#[test]
fn with_config_preserves_values() {
    let config = BenchmarkConfig {
        iterations: 42,
        runs: 7,
        ..BenchmarkConfig::default()
    };
    let benchmark = BenchmarkBuilder::with_config(config).task(Noop).build().unwrap();
    assert_eq!(benchmark.config().iterations, 42);
    assert_eq!(benchmark.config().runs, 7);
    assert!(benchmark.config().skips_first_run());
}

// ===========================================================================
// Validation
// ===========================================================================

#[test]
fn rejects_zero_iterations() {
    let err = BenchmarkBuilder::new().iterations(0).task(Noop).build().err();
    assert_eq!(err, Some(ConfigError::ZeroIterations));
}

#[test]
fn rejects_zero_runs() {
    let err = BenchmarkBuilder::new().runs(0).task(Noop).build().err();
    assert_eq!(err, Some(ConfigError::ZeroRuns));
}

#[test]
fn rejects_zero_throughput() {
    let err = BenchmarkBuilder::new()
        .throughput(Throughput::per_second(0))
        .task(Noop)
        .build()
        .err();
    assert_eq!(err, Some(ConfigError::ZeroThroughput));
}

#[test]
fn rejects_sub_nanosecond_interval() {
    let err = BenchmarkBuilder::new()
        .throughput(Throughput::per_second(2_000_000_000))
        .task(Noop)
        .build()
        .err();
    assert!(matches!(err, Some(ConfigError::ThroughputTooHigh { .. })));
}

#[test]
fn rejects_missing_task() {
    let err = BenchmarkBuilder::new().build().err();
    assert_eq!(err, Some(ConfigError::MissingTask));
}

#[test]
fn accepts_zero_warmup() {
    let benchmark = BenchmarkBuilder::new().warmup_iterations(0).task(Noop).build();
    assert!(benchmark.is_ok());
}

#[test]
fn config_serializes() {
    let config = BenchmarkConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    let parsed: BenchmarkConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.iterations, config.iterations);
    assert_eq!(parsed.throughput, config.throughput);
    assert_eq!(parsed.skip_first_run, config.skip_first_run);
}

// ===========================================================================
// Environment overrides
// ===========================================================================

/// All environment cases live in one test because the process environment
/// is shared by every test thread.
#[test]
fn environment_overrides() {
    env::set_var("LATBENCH_ITERATIONS", "2500");
    env::set_var("LATBENCH_RUNS", "5");
    env::set_var("LATBENCH_THROUGHPUT", "20000");
    env::set_var("LATBENCH_CO", "false");
    env::set_var("LATBENCH_SKIP_FIRST_RUN", "no-skip");
    env::set_var("LATBENCH_PAUSE_AFTER_WARMUP_MS", "15");

    let builder = BenchmarkBuilder::new().iterations(10).from_env();
    let config = builder.config().clone();
    assert_eq!(config.iterations, 2_500);
    assert_eq!(config.runs, 5);
    assert_eq!(config.throughput.interval_ns(), 50_000);
    assert!(!config.account_for_coordinated_omission);
    assert_eq!(config.skip_first_run, SkipFirstRun::NoSkip);
    assert_eq!(config.pause_after_warmup, Duration::from_millis(15));
    assert!(builder.task(Noop).build().is_ok());

    env::set_var("LATBENCH_RUNS", "many");
    let err = BenchmarkBuilder::new().from_env().task(Noop).build().err();
    assert_eq!(
        err,
        Some(ConfigError::InvalidEnv {
            key: "LATBENCH_RUNS".to_string(),
            value: "many".to_string(),
        })
    );

    // Later setters do not hide an unparseable variable.
    let err = BenchmarkBuilder::new().from_env().runs(2).task(Noop).build().err();
    assert!(matches!(err, Some(ConfigError::InvalidEnv { .. })));

    for key in [
        "LATBENCH_ITERATIONS",
        "LATBENCH_RUNS",
        "LATBENCH_THROUGHPUT",
        "LATBENCH_CO",
        "LATBENCH_SKIP_FIRST_RUN",
        "LATBENCH_PAUSE_AFTER_WARMUP_MS",
    ] {
        env::remove_var(key);
    }
    let config = BenchmarkBuilder::new().from_env().config().clone();
    assert_eq!(config.iterations, 100_000);
}
