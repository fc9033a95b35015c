//! Delay-injected sequential read kernels.
//!
//! These drive the delay-injected loaded latency benchmark: a forward
//! stride-1 read with `D` architectural no-ops between successive accesses,
//! which throttles the load a worker applies in controlled steps. The
//! paired dummies fold the same no-op block in, so adjusted ticks isolate
//! the memory cost exclusive of the injected delay.
//!
//! Above a per-width threshold (512 no-ops for 32-bit, 256 for 64-bit) the
//! larger delays share one dummy, as the original kernel suite did; the
//! subtraction is then conservative, slightly over-subtracting overhead.

use super::{ChunkWidth, Kernel, KernelDesc};

#[inline(always)]
fn nop_block<const N: usize>() {
    for _ in 0..N {
        #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
        unsafe {
            core::arch::asm!("nop", options(nomem, nostack, preserves_flags));
        }
        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        std::hint::spin_loop();
    }
}

macro_rules! delayed_read {
    ($ty:ty, $name:ident, $dummy:ident) => {
        pub unsafe fn $name<const D: usize>(start: *mut u8, end: *mut u8) -> u32 {
            let mut p = start as *const $ty;
            let end = end as *const $ty;
            let mut acc: u64 = 0;
            while (p as usize) < (end as usize) {
                acc ^= core::ptr::read_volatile(p) as u64;
                nop_block::<D>();
                p = p.add(1);
            }
            acc as u32
        }

        pub unsafe fn $dummy<const D: usize>(start: *mut u8, end: *mut u8) -> u32 {
            let mut p = start as *const $ty;
            let end = end as *const $ty;
            let mut acc: u64 = 0;
            while (p as usize) < (end as usize) {
                acc ^= std::hint::black_box(p) as usize as u64;
                nop_block::<D>();
                p = p.add(1);
            }
            acc as u32
        }
    };
}

delayed_read!(u32, forw_read_delay_w32, dummy_delay_w32);
delayed_read!(u64, forw_read_delay_w64, dummy_delay_w64);

macro_rules! register_delay {
    ($table:ident, $width:expr, $live:ident, $dummy:ident,
     [$( ($d:literal, $dd:literal) ),+]) => {
        $(
        $table.push((
            KernelDesc::delayed($width, $d),
            Kernel::Sequential {
                live: $live::<$d>,
                dummy: $dummy::<$dd>,
            },
        ));
        )+
    };
}

pub(super) fn register(table: &mut Vec<(KernelDesc, Kernel)>) {
    register_delay!(table, ChunkWidth::W32, forw_read_delay_w32, dummy_delay_w32,
        [(1, 1), (2, 2), (4, 4), (8, 8), (16, 16), (32, 32), (64, 64),
         (128, 128), (256, 256), (512, 512), (1024, 512)]);
    register_delay!(table, ChunkWidth::W64, forw_read_delay_w64, dummy_delay_w64,
        [(1, 1), (2, 2), (4, 4), (8, 8), (16, 16), (32, 32), (64, 64),
         (128, 128), (256, 256), (512, 256), (1024, 256)]);
}
