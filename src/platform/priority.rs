//! Scheduling priority boost for worker threads.
//!
//! The timed loops should not be preempted mid-pass. SCHED_FIFO at the
//! highest priority the process may set is attempted first; without the
//! needed privilege the fallback is the strongest nice value available.
//! Both boost and revert are best effort and report failure to the caller.

/// Raise the calling thread to the highest scheduling priority available.
pub fn boost_priority() -> bool {
    unsafe {
        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = libc::sched_get_priority_max(libc::SCHED_FIFO);
        if libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) == 0 {
            return true;
        }
        // SCHED_FIFO needs CAP_SYS_NICE; fall back to nice -20, which may
        // itself be clamped by RLIMIT_NICE.
        libc::setpriority(libc::PRIO_PROCESS, 0, -20) == 0
    }
}

/// Restore the default scheduling class and nice value.
pub fn revert_priority() -> bool {
    unsafe {
        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = 0;
        let sched_ok = libc::sched_setscheduler(0, libc::SCHED_OTHER, &param) == 0;
        let nice_ok = libc::setpriority(libc::PRIO_PROCESS, 0, 0) == 0;
        sched_ok && nice_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boost_then_revert() {
        // Unprivileged runs are expected to fail the boost; revert must
        // still leave the thread in the default class either way.
        let _ = boost_priority();
        let _ = revert_priority();
    }

    #[test]
    fn test_revert_without_boost() {
        let _ = revert_priority();
    }
}
