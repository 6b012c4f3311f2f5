//! Latency sample storage.
//!
//! The harness only needs a narrow contract from a histogram: record a value,
//! count, summarise as percentiles, and reset. [`LatencyHistogram`] is the
//! default implementation, backed by an HDR histogram.

use std::sync::Arc;

use hdrhistogram::Histogram as HdrHistogram;
use parking_lot::Mutex;

use crate::output::terminal::format_percentile_line;

/// Percentiles reported beyond the 99th while the sample count supports them.
const TAIL_QUANTILES: [f64; 4] = [0.997, 0.999, 0.9997, 0.9999];

/// Thread-safe store of nanosecond latency samples.
pub trait Histogram: Send + Sync {
    /// Record one value in nanoseconds.
    fn sample(&self, value_ns: u64);

    /// Discard all recorded values.
    fn reset(&self);

    /// Number of values recorded since the last reset.
    fn total_count(&self) -> u64;

    /// Ordered percentile values in nanoseconds.
    ///
    /// Positions are 50, 90, 99, then optionally 99.7, 99.9, 99.97 and 99.99;
    /// the last element is always the worst value.
    fn percentiles(&self) -> Vec<f64>;

    /// Percentiles rendered in microseconds for reports.
    fn to_micros_format(&self) -> String {
        format_percentile_line(&self.percentiles())
    }
}

/// Creates the histograms used for end-to-end, probe and jitter samples.
pub type HistogramFactory = Arc<dyn Fn() -> Arc<dyn Histogram> + Send + Sync>;

/// Factory producing [`LatencyHistogram`]s.
pub fn default_factory() -> HistogramFactory {
    Arc::new(|| Arc::new(LatencyHistogram::new()) as Arc<dyn Histogram>)
}

const SIGNIFICANT_DIGITS: u8 = 3;

/// HDR-backed histogram with three significant digits of precision.
#[derive(Debug)]
pub struct LatencyHistogram {
    inner: Mutex<HdrHistogram<u64>>,
}

impl LatencyHistogram {
    /// Create an empty auto-resizing histogram.
    pub fn new() -> Self {
        // hdrhistogram accepts 0..=5 significant digits.
        let histogram = HdrHistogram::<u64>::new(SIGNIFICANT_DIGITS)
            .expect("constant precision is within hdrhistogram's range");
        Self {
            inner: Mutex::new(histogram),
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram for LatencyHistogram {
    fn sample(&self, value_ns: u64) {
        self.inner.lock().saturating_record(value_ns);
    }

    fn reset(&self) {
        self.inner.lock().reset();
    }

    fn total_count(&self) -> u64 {
        self.inner.lock().len()
    }

    fn percentiles(&self) -> Vec<f64> {
        let histogram = self.inner.lock();
        let count = histogram.len() as f64;

        let mut values: Vec<f64> = [0.5, 0.9, 0.99]
            .iter()
            .map(|&q| histogram.value_at_quantile(q) as f64)
            .collect();

        for q in TAIL_QUANTILES {
            if count * (1.0 - q) < 1.0 {
                break;
            }
            values.push(histogram.value_at_quantile(q) as f64);
        }

        values.push(histogram.max() as f64);
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_is_accepted() {
        assert!(HdrHistogram::<u64>::new(SIGNIFICANT_DIGITS).is_ok());
    }

    #[test]
    fn test_reset_clears_count() {
        let histogram = LatencyHistogram::new();
        for v in 1..=1_000u64 {
            histogram.sample(v);
        }
        assert_eq!(histogram.total_count(), 1_000);
        histogram.reset();
        assert_eq!(histogram.total_count(), 0);
        histogram.reset();
        assert_eq!(histogram.total_count(), 0);
    }

    #[test]
    fn test_percentile_length_tracks_count() {
        let histogram = LatencyHistogram::new();
        for v in 0..50u64 {
            histogram.sample(v * 10);
        }
        // 50, 90, 99, worst
        assert_eq!(histogram.percentiles().len(), 4);

        histogram.reset();
        for v in 0..9_000u64 {
            histogram.sample(v);
        }
        // 9000 samples support 99.7, 99.9 and 99.97 but not 99.99
        assert_eq!(histogram.percentiles().len(), 7);

        histogram.reset();
        for v in 0..20_000u64 {
            histogram.sample(v);
        }
        assert_eq!(histogram.percentiles().len(), 8);
    }

    #[test]
    fn test_percentiles_are_ordered() {
        let histogram = LatencyHistogram::new();
        for v in 1..=100_000u64 {
            histogram.sample(v);
        }
        let p = histogram.percentiles();
        assert!(p.windows(2).all(|w| w[0] <= w[1]), "{p:?}");
        let worst = *p.last().unwrap();
        assert!((worst - 100_000.0).abs() / 100_000.0 < 0.001);
        let median = p[0];
        assert!((median - 50_000.0).abs() / 50_000.0 < 0.001);
    }

    #[test]
    fn test_concurrent_sampling() {
        let histogram = Arc::new(LatencyHistogram::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let h = Arc::clone(&histogram);
                std::thread::spawn(move || {
                    for v in 0..10_000u64 {
                        h.sample(v);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(histogram.total_count(), 40_000);
    }

    #[test]
    fn test_micros_format() {
        let histogram = LatencyHistogram::new();
        for _ in 0..10 {
            histogram.sample(1_500);
        }
        let line = histogram.to_micros_format();
        assert!(line.starts_with("50/90 99 - worst was"), "{line}");
        assert!(line.contains("1.50"), "{line}");
    }
}
