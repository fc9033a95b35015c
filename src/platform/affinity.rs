//! Thread-to-CPU pinning.
//!
//! Best effort by policy: a failed pin is reported to the caller, which
//! logs a warning and keeps running. Results measured without a pin are
//! still usable, just noisier.

use nix::sched::{sched_setaffinity, CpuSet};
use nix::unistd::Pid;

/// Pin the calling thread to a single logical CPU.
pub fn pin_to_cpu(logical_cpu: usize) -> bool {
    let mut set = CpuSet::new();
    if set.set(logical_cpu).is_err() {
        return false;
    }
    sched_setaffinity(Pid::from_raw(0), &set).is_ok()
}

/// Restore the calling thread's affinity to all CPUs the mask can express.
/// CPUs that do not exist are ignored by the kernel.
pub fn unpin_thread() -> bool {
    let mut set = CpuSet::new();
    for cpu in 0.. {
        if set.set(cpu).is_err() {
            break;
        }
    }
    sched_setaffinity(Pid::from_raw(0), &set).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_to_cpu_zero() {
        // CPU 0 always exists; pinning may still be denied in constrained
        // environments, in which case unpin must not be left half-applied.
        if pin_to_cpu(0) {
            assert!(unpin_thread());
        }
    }

    #[test]
    fn test_pin_out_of_range_fails() {
        // Far beyond any mask the kernel can represent.
        assert!(!pin_to_cpu(1 << 20));
    }

    #[test]
    fn test_unpin_runs() {
        let _ = unpin_thread();
    }
}
