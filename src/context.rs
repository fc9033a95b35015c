//! Process-wide runtime context.
//!
//! Everything the benchmarks need from the environment is gathered once at
//! startup and passed down explicitly: timer calibration, host topology,
//! verbosity, and the benchmark numbering counter.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::platform::{calibrate_timer, TimerCalibration, Topology};

pub struct RuntimeContext {
    pub ticks_per_ms: u64,
    pub ns_per_tick: f64,
    pub topology: Topology,
    pub verbose: bool,
    next_bench_index: AtomicU32,
}

impl RuntimeContext {
    /// Calibrate the timer and probe the host. Blocks for the calibration
    /// sleep, so call it exactly once, before any benchmark work.
    pub fn initialize(verbose: bool, base_index: u32) -> Self {
        let cal = calibrate_timer();
        Self::from_parts(cal, Topology::detect(), verbose, base_index)
    }

    /// Assemble a context from known parts. Used by tests to avoid the
    /// calibration sleep and to fabricate topologies.
    pub fn from_parts(
        cal: TimerCalibration,
        topology: Topology,
        verbose: bool,
        base_index: u32,
    ) -> Self {
        RuntimeContext {
            ticks_per_ms: cal.ticks_per_ms,
            ns_per_tick: cal.ns_per_tick,
            topology,
            verbose,
            next_bench_index: AtomicU32::new(base_index),
        }
    }

    /// Hand out the next benchmark number. Monotonic across the process,
    /// seeded with the user-chosen base index.
    pub fn next_bench_index(&self) -> u32 {
        self.next_bench_index.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_context() -> RuntimeContext {
        RuntimeContext::from_parts(
            TimerCalibration::from_ticks_per_ms(1_000_000),
            Topology::single_node(4),
            false,
            1,
        )
    }

    #[test]
    fn test_index_counter_starts_at_base() {
        let ctx = test_context();
        assert_eq!(ctx.next_bench_index(), 1);
        assert_eq!(ctx.next_bench_index(), 2);
        assert_eq!(ctx.next_bench_index(), 3);
    }

    #[test]
    fn test_base_index_zero() {
        let ctx = RuntimeContext::from_parts(
            TimerCalibration::from_ticks_per_ms(1_000_000),
            Topology::single_node(1),
            false,
            0,
        );
        assert_eq!(ctx.next_bench_index(), 0);
    }

    #[test]
    fn test_calibration_fields_propagate() {
        let ctx = test_context();
        assert_eq!(ctx.ticks_per_ms, 1_000_000);
        assert!((ctx.ns_per_tick - 0.001).abs() < 1e-12);
    }
}
