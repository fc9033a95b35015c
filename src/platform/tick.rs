//! High-resolution tick counter and its one-time calibration.
//!
//! `start_tick`/`stop_tick` are serializing reads of the fastest monotonic
//! counter the architecture exposes. Both sides carry compiler fences so
//! memory operations cannot be hoisted or sunk across the read; on x86_64
//! the `lfence`/`rdtscp` discipline additionally orders the pipeline.

use std::sync::atomic::{compiler_fence, Ordering};
use std::thread;
use std::time::Duration;

/// Sleep length used to calibrate ticks against wall-clock time.
pub const CALIBRATION_DURATION_MS: u64 = 1000;

/// Take a tick sample at the start of a timed region.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub fn start_tick() -> u64 {
    unsafe {
        compiler_fence(Ordering::SeqCst);
        core::arch::x86_64::_mm_lfence();
        let tick = core::arch::x86_64::_rdtsc();
        core::arch::x86_64::_mm_lfence();
        compiler_fence(Ordering::SeqCst);
        tick
    }
}

/// Take a tick sample at the end of a timed region.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub fn stop_tick() -> u64 {
    unsafe {
        compiler_fence(Ordering::SeqCst);
        let mut aux = 0u32;
        let tick = core::arch::x86_64::__rdtscp(&mut aux);
        core::arch::x86_64::_mm_lfence();
        compiler_fence(Ordering::SeqCst);
        tick
    }
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn start_tick() -> u64 {
    let tick: u64;
    unsafe {
        compiler_fence(Ordering::SeqCst);
        core::arch::asm!("isb", "mrs {t}, cntvct_el0", t = out(reg) tick, options(nostack));
        compiler_fence(Ordering::SeqCst);
    }
    tick
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn stop_tick() -> u64 {
    let tick: u64;
    unsafe {
        compiler_fence(Ordering::SeqCst);
        core::arch::asm!("isb", "mrs {t}, cntvct_el0", t = out(reg) tick, options(nostack));
        compiler_fence(Ordering::SeqCst);
    }
    tick
}

/// Fallback for architectures without an accessible cycle counter: the
/// monotonic clock in nanoseconds. One tick == one nanosecond.
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
pub fn start_tick() -> u64 {
    monotonic_ns()
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
pub fn stop_tick() -> u64 {
    monotonic_ns()
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn monotonic_ns() -> u64 {
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}

/// Process-wide timing constants, derived once at startup.
#[derive(Debug, Clone, Copy)]
pub struct TimerCalibration {
    pub ticks_per_ms: u64,
    pub ns_per_tick: f64,
}

impl TimerCalibration {
    /// Construct from a known ticks-per-ms rate. Used on platforms that
    /// report the counter frequency directly, and by tests.
    pub fn from_ticks_per_ms(ticks_per_ms: u64) -> Self {
        TimerCalibration {
            ticks_per_ms,
            ns_per_tick: 1e6 / ticks_per_ms as f64,
        }
    }
}

/// Derive ticks-per-ms and ns-per-tick by sampling the counter around a
/// fixed sleep. On aarch64 the generic timer reports its frequency in
/// `cntfrq_el0`, so no sleep is needed there.
pub fn calibrate_timer() -> TimerCalibration {
    #[cfg(target_arch = "aarch64")]
    {
        let freq_hz: u64;
        unsafe {
            core::arch::asm!("mrs {f}, cntfrq_el0", f = out(reg) freq_hz, options(nomem, nostack));
        }
        if freq_hz >= 1000 {
            return TimerCalibration::from_ticks_per_ms(freq_hz / 1000);
        }
    }

    let start = start_tick();
    thread::sleep(Duration::from_millis(CALIBRATION_DURATION_MS));
    let stop = stop_tick();
    let ticks_per_ms = (stop - start) / CALIBRATION_DURATION_MS;
    TimerCalibration::from_ticks_per_ms(ticks_per_ms.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_advance() {
        let a = start_tick();
        let b = stop_tick();
        assert!(b >= a);
    }

    #[test]
    fn test_from_ticks_per_ms() {
        let cal = TimerCalibration::from_ticks_per_ms(2_000_000);
        assert_eq!(cal.ticks_per_ms, 2_000_000);
        // 2 GHz == 0.5 ns per tick
        assert!((cal.ns_per_tick - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_timed_sleep_is_visible() {
        let a = start_tick();
        thread::sleep(Duration::from_millis(2));
        let b = stop_tick();
        assert!(b > a);
    }
}
