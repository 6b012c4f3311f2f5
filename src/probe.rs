//! Named auxiliary samplers.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::histogram::{Histogram, HistogramFactory};

/// Anything that accepts nanosecond samples.
pub trait NanoSampler: Send + Sync {
    /// Record a duration in nanoseconds.
    fn sample_nanos(&self, nanos: u64);
}

/// A named sampler for one sub-phase of an iteration.
///
/// Cheap to clone; clones share the same histogram. Sampling is not gated
/// by warmup state.
#[derive(Clone)]
pub struct Probe {
    name: Arc<str>,
    histogram: Arc<dyn Histogram>,
}

impl Probe {
    fn new(name: &str, histogram: Arc<dyn Histogram>) -> Self {
        Self {
            name: Arc::from(name),
            histogram,
        }
    }

    /// The probe's registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backing histogram.
    pub fn histogram(&self) -> &Arc<dyn Histogram> {
        &self.histogram
    }
}

impl NanoSampler for Probe {
    #[inline]
    fn sample_nanos(&self, nanos: u64) {
        self.histogram.sample(nanos);
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("name", &self.name)
            .field("count", &self.histogram.total_count())
            .finish()
    }
}

/// Probes keyed by name, in registration order.
pub(crate) struct ProbeRegistry {
    factory: HistogramFactory,
    probes: RwLock<Vec<Probe>>,
}

impl ProbeRegistry {
    /// Empty registry creating histograms with `factory`.
    pub fn new(factory: HistogramFactory) -> Self {
        Self {
            factory,
            probes: RwLock::new(Vec::new()),
        }
    }

    /// Return the probe named `name`, creating it on first use.
    pub fn get_or_register(&self, name: &str) -> Probe {
        if let Some(probe) = self.find(name) {
            return probe;
        }
        let mut probes = self.probes.write();
        // Another thread may have registered it between the locks.
        if let Some(probe) = probes.iter().find(|p| p.name() == name) {
            return probe.clone();
        }
        let probe = Probe::new(name, (self.factory)());
        probes.push(probe.clone());
        probe
    }

    fn find(&self, name: &str) -> Option<Probe> {
        self.probes.read().iter().find(|p| p.name() == name).cloned()
    }

    /// All probes in registration order.
    pub fn snapshot(&self) -> Vec<Probe> {
        self.probes.read().clone()
    }

    /// Reset every probe histogram.
    pub fn reset_all(&self) {
        for probe in self.probes.read().iter() {
            probe.histogram.reset();
        }
    }

    /// Number of registered probes.
    pub fn len(&self) -> usize {
        self.probes.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::default_factory;

    #[test]
    fn test_registration_is_idempotent() {
        let registry = ProbeRegistry::new(default_factory());
        let a = registry.get_or_register("A");
        let again = registry.get_or_register("A");
        a.sample_nanos(10);
        again.sample_nanos(20);
        assert_eq!(registry.len(), 1);
        assert_eq!(a.histogram().total_count(), 2);
    }

    #[test]
    fn test_registration_order_and_reset() {
        let registry = ProbeRegistry::new(default_factory());
        for name in ["B", "A", "C"] {
            registry.get_or_register(name).sample_nanos(1_000);
        }
        let names: Vec<String> = registry.snapshot().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);

        registry.reset_all();
        assert!(registry
            .snapshot()
            .iter()
            .all(|p| p.histogram().total_count() == 0));
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(ProbeRegistry::new(default_factory()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = Arc::clone(&registry);
                std::thread::spawn(move || r.get_or_register("shared").sample_nanos(5))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find("shared").unwrap().histogram().total_count(), 8);
    }
}
