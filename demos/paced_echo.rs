//! Paced echo through a worker thread.
//!
//! Each iteration sends its start time to an echo worker over a channel.
//! The worker stamps a `dispatch` probe when the message arrives, does a
//! little work, stamps `work`, and reports end-to-end latency. Because the
//! benchmark thread never waits for the reply, queueing behind a slow
//! message is visible in the results.
//!
//! Override the run shape with `LATBENCH_*` variables, e.g.
//!
//! ```text
//! LATBENCH_THROUGHPUT=200000 LATBENCH_RUNS=5 RUST_LOG=debug cargo run --example paced_echo
//! ```

use std::error::Error;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use latbench::{
    black_box, nano_time, BenchmarkBuilder, Harness, NanoSampler, Percentile, ProbeResult, Task,
    TaskError, Throughput,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct EchoTask {
    sender: Option<Sender<u64>>,
    worker: Option<JoinHandle<()>>,
}

impl Task for EchoTask {
    fn init(&mut self, harness: &Harness) -> Result<(), TaskError> {
        let (tx, rx) = mpsc::channel::<u64>();
        let dispatch = harness.add_probe("dispatch");
        let work = harness.add_probe("work");
        let end_to_end = harness.end_to_end();

        let worker = thread::Builder::new()
            .name("echo-worker".into())
            .spawn(move || {
                for start in rx {
                    let received = nano_time();
                    dispatch.sample_nanos(received.saturating_sub(start));

                    let mut acc = start;
                    for i in 0..64u64 {
                        acc = black_box(acc.rotate_left(7) ^ i);
                    }

                    let done = nano_time();
                    work.sample_nanos(done - received);
                    end_to_end.sample_nanos(done.saturating_sub(start));
                }
            })?;

        self.sender = Some(tx);
        self.worker = Some(worker);
        Ok(())
    }

    fn run(&mut self, start_time_ns: u64) -> Result<(), TaskError> {
        self.sender
            .as_ref()
            .ok_or("echo worker not started")?
            .send(start_time_ns)?;
        Ok(())
    }

    fn warmed_up(&mut self) {
        info!("echo worker warmed up");
    }

    fn complete(&mut self) -> Result<(), TaskError> {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            worker.join().map_err(|_| "echo worker panicked")?;
        }
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = BenchmarkBuilder::new()
        .throughput(Throughput::per_second(100_000))
        .warmup_iterations(50_000)
        .iterations(500_000)
        .runs(3)
        .from_env()
        .task(EchoTask::default())
        .build()?
        .start()?;

    if let Some(last) = result.end_to_end().summary_of_last_run() {
        info!(
            run = last.run,
            p50_us = last.p50_ns / 1_000.0,
            p99_us = last.p99_ns / 1_000.0,
            worst_us = last.worst_ns / 1_000.0,
            "last run"
        );
    }
    for name in result.probe_names() {
        let tail = result
            .probe(name)
            .and_then(ProbeResult::summary_of_last_run)
            .and_then(|last| last.get(Percentile::P99_99).or(last.get(Percentile::Worst)));
        if let Some(ns) = tail {
            info!(probe = name, tail_us = ns / 1_000.0, "last run tail");
        }
    }
    println!("{}", latbench::output::to_json_pretty(&result)?);
    Ok(())
}
