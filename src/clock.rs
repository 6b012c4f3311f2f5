//! Monotonic nanosecond clock shared by the runner, tasks and the jitter monitor.
//!
//! All timestamps handed to [`Task::run`](crate::Task::run) come from
//! [`nano_time`], so a task can compute end-to-end latency as
//! `nano_time() - start_time_ns` on any thread.

use std::hint::black_box as std_black_box;
use std::sync::OnceLock;
use std::time::Instant;

static ORIGIN: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds elapsed since the first call in this process.
///
/// Monotonic and comparable across threads.
#[inline]
pub fn nano_time() -> u64 {
    let origin = ORIGIN.get_or_init(Instant::now);
    origin.elapsed().as_nanos() as u64
}

/// Wrapper around `std::hint::black_box` for keeping measured work alive.
#[inline]
pub fn black_box<T>(x: T) -> T {
    std_black_box(x)
}

/// Spin until [`nano_time`] reaches `deadline_ns`.
#[inline]
pub fn busy_wait_until(deadline_ns: u64) {
    while nano_time() < deadline_ns {
        std::hint::spin_loop();
    }
}
