//! Benchmark workers.
//!
//! A worker owns a view of the benchmark region, a kernel pair, and an
//! optional CPU to pin to. Configuration is immutable after construction;
//! the result record travels back through the thread join, which is the
//! only synchronization a worker needs.
//!
//! The timed loop measures blocks of 1024 kernel invocations expanded by
//! a repetition macro, so each tick pair amortizes 1024 passes and no loop
//! counter sits between timed invocations. After the live loop, the paired
//! dummy runs for exactly the same number of passes to capture everything
//! except the memory accesses themselves.

use std::thread::{self, JoinHandle};

use crate::kernels::{self, Kernel, RandomFn, SequentialFn, BYTES_PER_PASS, UNROLL_FACTOR};
use crate::platform::region::RegionView;
use crate::platform::{self, start_tick, stop_tick};

/// Target run time of the live loop, per worker.
pub const BENCHMARK_DURATION_MS: u64 = 250;

/// Below this many elapsed ticks a measurement is statistically suspect.
pub const MIN_ELAPSED_TICKS: u64 = 10_000;

/// Forward 32-bit read sweeps over the whole region before measuring.
pub const PRIME_SWEEPS: u32 = 4;

macro_rules! rep4 {
    ($b:block) => {
        $b $b $b $b
    };
}
macro_rules! rep16 {
    ($b:block) => {
        rep4! { $b }
        rep4! { $b }
        rep4! { $b }
        rep4! { $b }
    };
}
macro_rules! rep64 {
    ($b:block) => {
        rep16! { $b }
        rep16! { $b }
        rep16! { $b }
        rep16! { $b }
    };
}
macro_rules! rep256 {
    ($b:block) => {
        rep64! { $b }
        rep64! { $b }
        rep64! { $b }
        rep64! { $b }
    };
}
macro_rules! rep1024 {
    ($b:block) => {
        rep256! { $b }
        rep256! { $b }
        rep256! { $b }
        rep256! { $b }
    };
}

/// Time one unrolled block of 1024 sequential passes. The pass window
/// advances modulo the region length so successive passes cover the whole
/// working set.
#[inline(never)]
unsafe fn timed_seq_block(f: SequentialFn, base: *mut u8, len: usize, offset: &mut usize) -> u64 {
    let mut off = *offset;
    let t0 = start_tick();
    rep1024! {{
        f(base.add(off), base.add(off + BYTES_PER_PASS));
        off = (off + BYTES_PER_PASS) % len;
    }}
    let t1 = stop_tick();
    *offset = off;
    t1.wrapping_sub(t0)
}

/// Time one unrolled block of 1024 random passes, carrying the chain
/// position across invocations.
#[inline(never)]
unsafe fn timed_rand_block(f: RandomFn, next: &mut *mut usize, mlp: u32) -> u64 {
    let mut p = *next;
    let t0 = start_tick();
    rep1024! {{
        p = f(p, BYTES_PER_PASS, mlp);
    }}
    let t1 = stop_tick();
    *next = p;
    t1.wrapping_sub(t0)
}

/// Everything a worker reports back after its thread finishes.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerRecord {
    pub passes: u64,
    pub bytes_per_pass: usize,
    pub elapsed_ticks: u64,
    pub elapsed_dummy_ticks: u64,
    pub adjusted_ticks: u64,
    pub warning: bool,
    pub completed: bool,
}

/// A thread-runnable benchmark unit. All fields are fixed at construction.
pub struct Worker {
    region: RegionView,
    kernel: Kernel,
    mlp: u32,
    cpu_affinity: Option<usize>,
    ticks_per_ms: u64,
    duration_ms: u64,
}

impl Worker {
    pub fn new(
        region: RegionView,
        kernel: Kernel,
        mlp: u32,
        cpu_affinity: Option<usize>,
        ticks_per_ms: u64,
    ) -> Self {
        Worker {
            region,
            kernel,
            mlp,
            cpu_affinity,
            ticks_per_ms,
            duration_ms: BENCHMARK_DURATION_MS,
        }
    }

    /// Override the live-loop target duration. Tests use short runs.
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Spawn the worker on its own OS thread.
    pub fn start(self) -> JoinHandle<WorkerRecord> {
        thread::spawn(move || self.run())
    }

    /// The worker protocol, executed on the worker's thread.
    pub fn run(self) -> WorkerRecord {
        let pinned = match self.cpu_affinity {
            Some(cpu) => {
                let ok = platform::pin_to_cpu(cpu);
                if !ok {
                    log::warn!(
                        "failed to pin worker thread to logical CPU {}; results may be noisy",
                        cpu
                    );
                }
                ok
            }
            None => false,
        };
        if !platform::boost_priority() {
            log::warn!("failed to boost scheduling priority; running at normal priority");
        }

        // Prime: dependent read sweeps guarantee residency, warm the TLB,
        // and resolve first-touch page placement before timing starts.
        unsafe {
            let prime_end = self.region.ptr.add(self.region.len);
            for _ in 0..PRIME_SWEEPS {
                kernels::sequential::forw_read_w32_s1(self.region.ptr, prime_end);
            }
        }

        let target_ticks = self.ticks_per_ms * self.duration_ms;
        let mut passes: u64 = 0;
        let mut elapsed: u64 = 0;
        let mut elapsed_dummy: u64 = 0;

        match self.kernel {
            Kernel::Sequential { live, dummy } => {
                let mut off = 0usize;
                while elapsed < target_ticks {
                    elapsed += unsafe {
                        timed_seq_block(live, self.region.ptr, self.region.len, &mut off)
                    };
                    passes += UNROLL_FACTOR;
                }
                let mut done: u64 = 0;
                off = 0;
                while done < passes {
                    elapsed_dummy += unsafe {
                        timed_seq_block(dummy, self.region.ptr, self.region.len, &mut off)
                    };
                    done += UNROLL_FACTOR;
                }
            }
            Kernel::Random { live, dummy } => {
                let mut next = self.region.ptr as *mut usize;
                while elapsed < target_ticks {
                    elapsed += unsafe { timed_rand_block(live, &mut next, self.mlp) };
                    passes += UNROLL_FACTOR;
                }
                let mut done: u64 = 0;
                next = self.region.ptr as *mut usize;
                while done < passes {
                    elapsed_dummy += unsafe { timed_rand_block(dummy, &mut next, self.mlp) };
                    done += UNROLL_FACTOR;
                }
            }
        }

        if pinned && !platform::unpin_thread() {
            log::warn!("failed to restore worker thread affinity");
        }
        if !platform::revert_priority() {
            log::warn!("failed to revert scheduling priority");
        }

        let adjusted_ticks = elapsed.saturating_sub(elapsed_dummy);
        let warning = elapsed_dummy >= elapsed
            || elapsed < MIN_ELAPSED_TICKS
            || (adjusted_ticks as f64) < 0.5 * elapsed as f64;

        WorkerRecord {
            passes,
            bytes_per_pass: BYTES_PER_PASS,
            elapsed_ticks: elapsed,
            elapsed_dummy_ticks: elapsed_dummy,
            adjusted_ticks,
            warning,
            completed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::build_chains;
    use crate::kernels::{ChunkWidth, KernelDesc, RwMode};
    use crate::platform::Region;
    use std::time::Duration;

    fn quick_ticks_per_ms() -> u64 {
        let a = start_tick();
        thread::sleep(Duration::from_millis(20));
        let b = stop_tick();
        ((b - a) / 20).max(1)
    }

    #[test]
    fn test_sequential_worker_record_invariants() {
        let region = Region::alloc(64 * 1024, None, false).unwrap();
        let view = region.split(1).unwrap()[0];
        let kernel =
            kernels::lookup(&KernelDesc::sequential(ChunkWidth::W64, 1, RwMode::Read)).unwrap();
        let record = Worker::new(view, kernel, 1, None, quick_ticks_per_ms())
            .with_duration_ms(5)
            .run();

        assert!(record.completed);
        assert!(record.passes > 0);
        assert_eq!(record.passes % UNROLL_FACTOR, 0);
        assert_eq!(record.bytes_per_pass, BYTES_PER_PASS);
        assert!(record.elapsed_ticks >= record.elapsed_dummy_ticks || record.warning);
        assert_eq!(
            record.adjusted_ticks,
            record.elapsed_ticks.saturating_sub(record.elapsed_dummy_ticks)
        );
    }

    #[test]
    fn test_random_worker_runs_on_chained_region() {
        let region = Region::alloc(64 * 1024, None, false).unwrap();
        let view = region.split(1).unwrap()[0];
        let slice = unsafe { std::slice::from_raw_parts_mut(view.ptr, view.len) };
        build_chains(slice, std::mem::size_of::<usize>(), 1, 1).unwrap();

        let kernel =
            kernels::lookup(&KernelDesc::random(ChunkWidth::native_word(), RwMode::Read, 1))
                .unwrap();
        let record = Worker::new(view, kernel, 1, None, quick_ticks_per_ms())
            .with_duration_ms(5)
            .run();

        assert!(record.completed);
        assert_eq!(record.passes % UNROLL_FACTOR, 0);
    }

    #[test]
    fn test_worker_joins_through_handle() {
        let region = Region::alloc(16 * 1024, None, false).unwrap();
        let view = region.split(1).unwrap()[0];
        let kernel =
            kernels::lookup(&KernelDesc::sequential(ChunkWidth::W32, 1, RwMode::Write)).unwrap();
        let handle = Worker::new(view, kernel, 1, Some(0), quick_ticks_per_ms())
            .with_duration_ms(2)
            .start();
        let record = handle.join().expect("worker thread panicked");
        assert!(record.completed);
    }
}
