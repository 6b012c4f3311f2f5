//! Iteration pacing.
//!
//! [`PacingScheduler`] turns a [`Throughput`] into an inter-arrival interval
//! and hands out the logical start timestamp of every iteration, waiting
//! until that moment before returning.
//!
//! With coordinated-omission correction each start is `previous + interval`,
//! a fixed deadline that does not move when the task runs late, so queueing
//! delay shows up in the measured latency. Without it the scheduler waits one
//! interval from *now* and re-reads the clock, which hides that delay.

use std::thread;
use std::time::Duration;

use crate::clock::{busy_wait_until, nano_time};
use crate::config::Throughput;

/// Intervals above this sleep before spinning.
pub const HYBRID_THRESHOLD_NS: u64 = 2_000_000;

/// Time left for the final spin when the hybrid strategy sleeps.
const SPIN_WINDOW_NS: u64 = 1_000_000;

/// How the scheduler waits for the next deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingStrategy {
    /// Spin for the whole interval.
    BusySpin,
    /// Sleep until ~1ms before the deadline, then spin.
    Hybrid,
}

impl PacingStrategy {
    /// Strategy for an interval: hybrid iff `interval_ns > 2ms`.
    pub fn for_interval(interval_ns: u64) -> Self {
        if interval_ns > HYBRID_THRESHOLD_NS {
            PacingStrategy::Hybrid
        } else {
            PacingStrategy::BusySpin
        }
    }
}

/// Produces paced start timestamps for successive iterations.
#[derive(Debug, Clone)]
pub struct PacingScheduler {
    interval_ns: u64,
    strategy: PacingStrategy,
    correct_for_coordinated_omission: bool,
    last_start_ns: Option<u64>,
}

impl PacingScheduler {
    /// Create a scheduler for `throughput`.
    pub fn new(throughput: Throughput, correct_for_coordinated_omission: bool) -> Self {
        let interval_ns = throughput.interval_ns();
        Self {
            interval_ns,
            strategy: PacingStrategy::for_interval(interval_ns),
            correct_for_coordinated_omission,
            last_start_ns: None,
        }
    }

    /// Nanoseconds between iteration starts.
    pub fn interval_ns(&self) -> u64 {
        self.interval_ns
    }

    /// Strategy selected for this interval.
    pub fn strategy(&self) -> PacingStrategy {
        self.strategy
    }

    /// Whether deadlines are fixed (coordinated-omission corrected).
    pub fn is_corrected(&self) -> bool {
        self.correct_for_coordinated_omission
    }

    /// Anchor the schedule at the current instant without waiting.
    ///
    /// The next call to [`next_start`](Self::next_start) is one interval later.
    pub fn begin_run(&mut self) {
        self.last_start_ns = Some(nano_time());
    }

    /// Start immediately: returns now and anchors the schedule there.
    pub fn start_now(&mut self) -> u64 {
        let now = nano_time();
        self.last_start_ns = Some(now);
        now
    }

    /// Wait for and return the next start timestamp.
    ///
    /// Starts immediately when the schedule has not been anchored yet.
    pub fn next_start(&mut self) -> u64 {
        let Some(previous) = self.last_start_ns else {
            return self.start_now();
        };

        if self.correct_for_coordinated_omission {
            let deadline = previous + self.interval_ns;
            self.wait_until(deadline);
            self.last_start_ns = Some(deadline);
            deadline
        } else {
            self.wait_until(nano_time() + self.interval_ns);
            self.start_now()
        }
    }

    fn wait_until(&self, deadline_ns: u64) {
        if self.strategy == PacingStrategy::Hybrid {
            let now = nano_time();
            if deadline_ns > now + SPIN_WINDOW_NS {
                thread::sleep(Duration::from_nanos(deadline_ns - now - SPIN_WINDOW_NS));
            }
        }
        busy_wait_until(deadline_ns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_threshold() {
        assert_eq!(PacingStrategy::for_interval(1_000), PacingStrategy::BusySpin);
        assert_eq!(
            PacingStrategy::for_interval(HYBRID_THRESHOLD_NS),
            PacingStrategy::BusySpin
        );
        assert_eq!(
            PacingStrategy::for_interval(HYBRID_THRESHOLD_NS + 1),
            PacingStrategy::Hybrid
        );
    }

    #[test]
    fn test_interval_matches_throughput() {
        for rate in [1u64, 7, 100, 499, 10_000, 1_000_000] {
            let throughput = Throughput::per_second(rate);
            let scheduler = PacingScheduler::new(throughput, true);
            assert_eq!(scheduler.interval_ns(), 1_000_000_000 / rate);
            assert_eq!(
                scheduler.strategy() == PacingStrategy::Hybrid,
                scheduler.interval_ns() > 2_000_000
            );
        }
    }

    #[test]
    fn test_corrected_starts_are_exact_deadlines() {
        let mut scheduler = PacingScheduler::new(Throughput::per_second(200_000), true);
        scheduler.begin_run();
        let mut previous = scheduler.next_start();
        for i in 0..200 {
            // Fall behind now and then; deadlines must not move.
            if i % 50 == 0 {
                busy_wait_until(nano_time() + 100_000);
            }
            let start = scheduler.next_start();
            assert_eq!(start - previous, 5_000);
            previous = start;
        }
    }

    #[test]
    fn test_uncorrected_starts_drift() {
        let mut scheduler = PacingScheduler::new(Throughput::per_second(200_000), false);
        scheduler.begin_run();
        let mut previous = scheduler.next_start();
        for _ in 0..50 {
            let start = scheduler.next_start();
            assert!(start - previous >= 5_000);
            previous = start;
        }
        assert!(!scheduler.is_corrected());
    }

    #[test]
    fn test_unanchored_schedule_starts_immediately() {
        let mut scheduler = PacingScheduler::new(Throughput::per_second(1), true);
        let before = nano_time();
        let start = scheduler.next_start();
        // A one-second interval would be unmistakable here.
        assert!(start - before < 500_000_000);
    }

    #[test]
    fn test_hybrid_waits_full_interval() {
        let mut scheduler = PacingScheduler::new(Throughput::per_second(200), true);
        assert_eq!(scheduler.strategy(), PacingStrategy::Hybrid);
        let first = scheduler.start_now();
        let second = scheduler.next_start();
        assert_eq!(second - first, 5_000_000);
        assert!(nano_time() >= second);
    }
}
