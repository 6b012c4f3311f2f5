//! Latencies reported from threads other than the benchmark thread.

use std::io;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use latbench::{nano_time, BenchmarkBuilder, Harness, NanoSampler, Task, TaskError, Throughput};

/// Hands each start time to a consumer thread, which reports the latency.
#[derive(Default)]
struct HandOff {
    sender: Option<Sender<u64>>,
    consumer: Option<JoinHandle<()>>,
}

impl Task for HandOff {
    fn init(&mut self, harness: &Harness) -> Result<(), TaskError> {
        let (tx, rx) = mpsc::channel::<u64>();
        let harness = harness.clone();
        let queue_probe = harness.add_probe("queue");
        self.sender = Some(tx);
        self.consumer = Some(
            thread::Builder::new()
                .name("consumer".into())
                .spawn(move || {
                    let end_to_end = harness.end_to_end();
                    for start in rx {
                        queue_probe.sample_nanos(nano_time().saturating_sub(start));
                        end_to_end.sample_nanos(nano_time().saturating_sub(start));
                    }
                })?,
        );
        Ok(())
    }

    fn run(&mut self, start_time_ns: u64) -> Result<(), TaskError> {
        let sender = self.sender.as_ref().ok_or("not initialised")?;
        sender.send(start_time_ns)?;
        Ok(())
    }

    fn complete(&mut self) -> Result<(), TaskError> {
        self.sender.take();
        if let Some(consumer) = self.consumer.take() {
            consumer.join().map_err(|_| "consumer panicked")?;
        }
        Ok(())
    }
}

#[test]
fn samples_from_consumer_thread() {
    let result = BenchmarkBuilder::new()
        .warmup_iterations(200)
        .iterations(2_000)
        .runs(2)
        .throughput(Throughput::per_second(200_000))
        .record_os_jitter(false)
        .report_to(io::sink())
        .task(HandOff::default())
        .build()
        .unwrap()
        .start()
        .unwrap();

    for run in result.end_to_end().each_run_summary() {
        assert_eq!(run.count, 2_000);
    }
    let queue = result.probe("queue").unwrap();
    for run in queue.each_run_summary() {
        assert!((2_000..=2_001).contains(&run.count), "queue: {}", run.count);
    }
}

#[test]
fn independent_benchmarks_in_parallel() {
    let handles: Vec<_> = (0..3)
        .map(|_| {
            thread::spawn(|| {
                BenchmarkBuilder::new()
                    .warmup_iterations(50)
                    .iterations(500)
                    .runs(1)
                    .throughput(Throughput::per_second(500_000))
                    .record_os_jitter(false)
                    .report_to(io::sink())
                    .task(HandOff::default())
                    .build()
                    .unwrap()
                    .start()
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        let result = handle.join().unwrap();
        assert_eq!(result.end_to_end().summary_of_last_run().unwrap().count, 500);
    }
}
