//! Background OS jitter monitor.
//!
//! A dedicated thread reads the clock in a tight loop and records every gap
//! larger than a threshold. The gaps are stalls the OS imposed on a thread
//! that did no work, so they give a baseline for what the benchmark thread
//! may suffer independently of the task.
//!
//! The monitor shares only its histogram and two flags with the runner.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::affinity::AffinityLock;
use crate::clock::nano_time;
use crate::histogram::Histogram;

const THREAD_NAME: &str = "latbench-jitter";

struct Shared {
    running: AtomicBool,
    reset: AtomicBool,
    histogram: Arc<dyn Histogram>,
    threshold_ns: u64,
}

/// Owned handle to the jitter monitor thread.
///
/// Dropping the handle stops and joins the thread.
pub struct JitterMonitor {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl JitterMonitor {
    /// Spawn the monitor, recording gaps above `threshold_ns` into `histogram`.
    ///
    /// With `pin`, the thread reserves its own CPU; if that fails it keeps
    /// running unpinned.
    pub fn start(histogram: Arc<dyn Histogram>, threshold_ns: u64, pin: bool) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            running: AtomicBool::new(true),
            reset: AtomicBool::new(false),
            histogram,
            threshold_ns,
        });

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let _lock = if pin { pin_self() } else { None };
                monitor_loop(&worker);
            })?;

        info!(threshold_ns, pin, "jitter monitor started");
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Ask the monitor to clear its histogram before its next reading.
    pub fn reset(&self) {
        self.shared.reset.store(true, Ordering::Release);
    }

    #[cfg(test)]
    fn reset_pending(&self) -> bool {
        self.shared.reset.load(Ordering::Acquire)
    }

    /// The histogram gaps are recorded into.
    pub fn histogram(&self) -> &Arc<dyn Histogram> {
        &self.shared.histogram
    }

    /// Whether the monitor thread is still looping.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("jitter monitor thread panicked; jitter results may be incomplete");
            } else {
                debug!("jitter monitor stopped");
            }
        }
    }
}

impl Drop for JitterMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn pin_self() -> Option<AffinityLock> {
    match AffinityLock::acquire() {
        Ok(lock) => {
            debug!(cpu = ?lock.cpu(), "jitter monitor pinned");
            Some(lock)
        }
        Err(err) => {
            warn!(error = %err, "could not pin jitter monitor, running unpinned");
            None
        }
    }
}

fn monitor_loop(shared: &Shared) {
    let mut last = nano_time();
    while shared.running.load(Ordering::Relaxed) {
        if shared.reset.load(Ordering::Relaxed) {
            shared.histogram.reset();
            shared.reset.store(false, Ordering::Release);
            last = nano_time();
        }
        let now = nano_time();
        let gap = now - last;
        if gap > shared.threshold_ns {
            shared.histogram.sample(gap);
        }
        last = now;
    }
}
