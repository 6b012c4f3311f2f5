//! CPU affinity pinning.
//!
//! [`AffinityLock`] reserves one CPU from the process's allowed set, pins
//! the calling thread to it and restores the previous mask when released or
//! dropped. Reservations are tracked per process so the benchmark thread and
//! the jitter monitor never share a core.
//!
//! Only Linux is supported; elsewhere locks are no-ops and
//! [`set_affinity`] returns [`AffinityError::Unsupported`].

use std::collections::BTreeSet;
use std::fmt;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::AffinityError;

static RESERVED: Mutex<BTreeSet<usize>> = Mutex::new(BTreeSet::new());

/// Exclusive use of one CPU by the thread that acquired it.
pub struct AffinityLock {
    cpu: Option<usize>,
    #[cfg(target_os = "linux")]
    previous: Option<libc::cpu_set_t>,
    released: bool,
}

impl AffinityLock {
    /// Reserve a free CPU and pin the calling thread to it.
    ///
    /// Candidates come from the process's mask rather than the caller's, so
    /// a thread spawned by a pinned thread can still reserve its own core.
    /// Prefers the highest-numbered free CPU and avoids CPU 0 while any other
    /// is free. Returns an unbound lock when nothing is free.
    pub fn acquire() -> Result<Self, AffinityError> {
        #[cfg(target_os = "linux")]
        {
            let previous = sys::current()?;
            let allowed = sys::cpus_in(&sys::process_mask()?);

            let cpu = {
                let mut reserved = RESERVED.lock();
                let free = allowed.iter().rev().copied().find(|c| *c != 0 && !reserved.contains(c));
                let choice = free.or_else(|| allowed.iter().copied().find(|c| !reserved.contains(c)));
                if let Some(cpu) = choice {
                    reserved.insert(cpu);
                }
                choice
            };

            let Some(cpu) = cpu else {
                warn!(allowed = allowed.len(), "no free CPU to reserve, running unpinned");
                return Ok(Self::unbound());
            };

            if let Err(err) = sys::pin(cpu) {
                RESERVED.lock().remove(&cpu);
                return Err(err);
            }
            debug!(cpu, "affinity lock acquired");

            Ok(Self {
                cpu: Some(cpu),
                previous: Some(previous),
                released: false,
            })
        }

        #[cfg(not(target_os = "linux"))]
        {
            debug!("affinity locks are not supported on this platform");
            Ok(Self::unbound())
        }
    }

    fn unbound() -> Self {
        Self {
            cpu: None,
            #[cfg(target_os = "linux")]
            previous: None,
            released: false,
        }
    }

    /// Reserved CPU, or `None` for an unbound lock.
    pub fn cpu(&self) -> Option<usize> {
        self.cpu
    }

    /// Whether a CPU was actually reserved.
    pub fn is_bound(&self) -> bool {
        self.cpu.is_some()
    }

    /// Restore the previous mask and free the CPU.
    ///
    /// Must be called on the thread that acquired the lock.
    pub fn release(mut self) -> Result<(), AffinityError> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<(), AffinityError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let Some(cpu) = self.cpu else {
            return Ok(());
        };
        RESERVED.lock().remove(&cpu);

        #[cfg(target_os = "linux")]
        {
            if let Some(previous) = self.previous.take() {
                sys::apply(&previous)?;
            }
        }
        debug!(cpu, "affinity lock released");
        Ok(())
    }
}

impl fmt::Debug for AffinityLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AffinityLock")
            .field("cpu", &self.cpu)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for AffinityLock {
    fn drop(&mut self) {
        if let Err(err) = self.release_inner() {
            warn!(error = %err, "failed to restore CPU affinity");
        }
    }
}

/// Pin the calling thread to `cpu`.
pub fn set_affinity(cpu: usize) -> Result<(), AffinityError> {
    #[cfg(target_os = "linux")]
    {
        sys::pin(cpu)
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = cpu;
        Err(AffinityError::Unsupported)
    }
}

/// CPUs the calling thread may run on.
pub fn allowed_cpus() -> Result<Vec<usize>, AffinityError> {
    #[cfg(target_os = "linux")]
    {
        Ok(sys::cpus_in(&sys::current()?))
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(AffinityError::Unsupported)
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use std::io;
    use std::mem;

    use crate::error::AffinityError;

    const SET_SIZE: usize = libc::CPU_SETSIZE as usize;

    pub(super) fn current() -> Result<libc::cpu_set_t, AffinityError> {
        // SAFETY: cpu_set_t is plain data; zeroed is a valid empty set.
        let mut set: libc::cpu_set_t = unsafe { mem::zeroed() };
        // SAFETY: pointer and size describe `set`; pid 0 is the calling thread.
        let rc = unsafe { libc::sched_getaffinity(0, mem::size_of::<libc::cpu_set_t>(), &mut set) };
        if rc != 0 {
            return Err(AffinityError::Syscall {
                op: "sched_getaffinity",
                source: io::Error::last_os_error(),
            });
        }
        Ok(set)
    }

    pub(super) fn process_mask() -> Result<libc::cpu_set_t, AffinityError> {
        // SAFETY: as in `current`; getpid names the main thread.
        let mut set: libc::cpu_set_t = unsafe { mem::zeroed() };
        let rc = unsafe {
            libc::sched_getaffinity(libc::getpid(), mem::size_of::<libc::cpu_set_t>(), &mut set)
        };
        if rc != 0 {
            return Err(AffinityError::Syscall {
                op: "sched_getaffinity",
                source: io::Error::last_os_error(),
            });
        }
        Ok(set)
    }

    pub(super) fn apply(set: &libc::cpu_set_t) -> Result<(), AffinityError> {
        // SAFETY: pointer and size describe `set`; pid 0 is the calling thread.
        let rc = unsafe { libc::sched_setaffinity(0, mem::size_of::<libc::cpu_set_t>(), set) };
        if rc != 0 {
            return Err(AffinityError::Syscall {
                op: "sched_setaffinity",
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    pub(super) fn cpus_in(set: &libc::cpu_set_t) -> Vec<usize> {
        // SAFETY: every index is below CPU_SETSIZE.
        (0..SET_SIZE).filter(|&cpu| unsafe { libc::CPU_ISSET(cpu, set) }).collect()
    }

    pub(super) fn pin(cpu: usize) -> Result<(), AffinityError> {
        if cpu >= SET_SIZE {
            return Err(AffinityError::InvalidCpu(cpu));
        }
        // SAFETY: zeroed is a valid empty set and `cpu` is in range.
        let mut set: libc::cpu_set_t = unsafe { mem::zeroed() };
        unsafe {
            libc::CPU_ZERO(&mut set);
            libc::CPU_SET(cpu, &mut set);
        }
        apply(&set)
    }
}
