//! Memory-access kernel library.
//!
//! Every benchmark inner loop lives here: sequential kernels covering the
//! (width x stride x direction x read/write) matrix, random pointer-chase
//! kernels parameterized on memory-level parallelism, and delay-injected
//! sequential variants. Each live kernel is paired with a dummy of the
//! same shape whose memory operation is replaced by a no-op, so the worker
//! can subtract loop and dispatch overhead from the measurement.
//!
//! Selection is value-keyed: a [`KernelDesc`] is looked up in a statically
//! registered table built once per process. Widths the host cannot execute
//! (256/512-bit without AVX2/AVX-512) are simply absent from the table.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::fmt;

use crate::error::{BenchError, Result};

pub mod delay;
pub mod random;
pub mod sequential;
#[cfg(target_arch = "x86_64")]
pub mod simd;

/// Bytes walked by one sequential pass; one pass fits comfortably in L1
/// while amortizing the call boundary.
pub const BYTES_PER_PASS: usize = 4096;

/// Kernel invocations per timed block. The worker times whole blocks so a
/// single tick pair amortizes this many passes.
pub const UNROLL_FACTOR: u64 = 1024;

/// Memory-level parallelism values with compiled-in chase kernels.
pub const MLP_VALUES: [u32; 7] = [1, 2, 4, 6, 8, 16, 32];

/// Stride magnitudes with compiled-in sequential kernels.
pub const STRIDE_MAGNITUDES: [i32; 5] = [1, 2, 4, 8, 16];

/// Injected-delay values with compiled-in kernels (plus 0 == no delay).
pub const DELAY_VALUES: [u32; 11] = [1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    Sequential,
    Random,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Sequential => write!(f, "sequential"),
            Pattern::Random => write!(f, "random"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RwMode {
    Read,
    Write,
}

impl fmt::Display for RwMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RwMode::Read => write!(f, "read"),
            RwMode::Write => write!(f, "write"),
        }
    }
}

/// Access width of a single memory operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ChunkWidth {
    W32,
    W64,
    W128,
    W256,
    W512,
}

impl ChunkWidth {
    pub const ALL: [ChunkWidth; 5] = [
        ChunkWidth::W32,
        ChunkWidth::W64,
        ChunkWidth::W128,
        ChunkWidth::W256,
        ChunkWidth::W512,
    ];

    pub fn bits(self) -> u32 {
        match self {
            ChunkWidth::W32 => 32,
            ChunkWidth::W64 => 64,
            ChunkWidth::W128 => 128,
            ChunkWidth::W256 => 256,
            ChunkWidth::W512 => 512,
        }
    }

    pub fn bytes(self) -> usize {
        self.bits() as usize / 8
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            32 => Some(ChunkWidth::W32),
            64 => Some(ChunkWidth::W64),
            128 => Some(ChunkWidth::W128),
            256 => Some(ChunkWidth::W256),
            512 => Some(ChunkWidth::W512),
            _ => None,
        }
    }

    /// The native pointer width as a chunk; this is the only width random
    /// chase chains can use for the pointer itself.
    pub fn native_word() -> Self {
        if std::mem::size_of::<usize>() == 8 {
            ChunkWidth::W64
        } else {
            ChunkWidth::W32
        }
    }
}

impl fmt::Display for ChunkWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Value key identifying one kernel implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct KernelDesc {
    pub pattern: Pattern,
    pub mode: RwMode,
    pub width: ChunkWidth,
    /// Chunks per step; the sign is the direction. Always +1 for random.
    pub stride: i32,
    /// Independent chase chains. Always 1 for sequential.
    pub mlp: u32,
    /// Architectural no-ops injected between accesses. Sequential read only.
    pub delay: u32,
}

impl KernelDesc {
    pub fn sequential(width: ChunkWidth, stride: i32, mode: RwMode) -> Self {
        KernelDesc {
            pattern: Pattern::Sequential,
            mode,
            width,
            stride,
            mlp: 1,
            delay: 0,
        }
    }

    pub fn random(width: ChunkWidth, mode: RwMode, mlp: u32) -> Self {
        KernelDesc {
            pattern: Pattern::Random,
            mode,
            width,
            stride: 1,
            mlp,
            delay: 0,
        }
    }

    pub fn delayed(width: ChunkWidth, delay: u32) -> Self {
        KernelDesc {
            pattern: Pattern::Sequential,
            mode: RwMode::Read,
            width,
            stride: 1,
            mlp: 1,
            delay,
        }
    }
}

impl fmt::Display for KernelDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} stride {:+} mlp {}",
            self.pattern, self.mode, self.width, self.stride, self.mlp
        )?;
        if self.delay > 0 {
            write!(f, " delay {}", self.delay)?;
        }
        Ok(())
    }
}

/// Sequential kernel shape: walk `[start, end)` once, return an opaque
/// accumulator so the accesses cannot be optimized away.
pub type SequentialFn = unsafe fn(*mut u8, *mut u8) -> u32;

/// Random kernel shape: follow the pointer chain rooted at `next` for
/// `bytes` worth of chunk accesses across `mlp` independent chains,
/// returning the continuation pointer for the next invocation.
pub type RandomFn = unsafe fn(*mut usize, usize, u32) -> *mut usize;

/// A live kernel paired with its overhead-measuring dummy.
#[derive(Clone, Copy, Debug)]
pub enum Kernel {
    Sequential {
        live: SequentialFn,
        dummy: SequentialFn,
    },
    Random {
        live: RandomFn,
        dummy: RandomFn,
    },
}

static REGISTRY: Lazy<Vec<(KernelDesc, Kernel)>> = Lazy::new(build_registry);

fn build_registry() -> Vec<(KernelDesc, Kernel)> {
    let mut table = Vec::new();
    sequential::register(&mut table);
    random::register(&mut table);
    delay::register(&mut table);
    #[cfg(target_arch = "x86_64")]
    simd::register(&mut table);
    table
}

/// The full kernel table for this host.
pub fn registry() -> &'static [(KernelDesc, Kernel)] {
    &REGISTRY
}

/// Find the implementation for a descriptor.
pub fn lookup(desc: &KernelDesc) -> Result<Kernel> {
    registry()
        .iter()
        .find(|(d, _)| d == desc)
        .map(|(_, k)| *k)
        .ok_or_else(|| BenchError::KernelUnavailable(desc.to_string()))
}

/// Whether this host has a kernel for the given width at all.
pub fn width_available(width: ChunkWidth) -> bool {
    registry().iter().any(|(d, _)| d.width == width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_widths_always_present() {
        for width in [ChunkWidth::W32, ChunkWidth::W64, ChunkWidth::W128] {
            for &s in &STRIDE_MAGNITUDES {
                for stride in [s, -s] {
                    for mode in [RwMode::Read, RwMode::Write] {
                        let desc = KernelDesc::sequential(width, stride, mode);
                        assert!(lookup(&desc).is_ok(), "missing kernel for {}", desc);
                    }
                }
            }
        }
    }

    #[test]
    fn test_native_word_chase_present() {
        for &mlp in &MLP_VALUES {
            for mode in [RwMode::Read, RwMode::Write] {
                let desc = KernelDesc::random(ChunkWidth::native_word(), mode, mlp);
                assert!(lookup(&desc).is_ok(), "missing kernel for {}", desc);
            }
        }
    }

    #[test]
    fn test_no_narrow_random_on_64bit() {
        if std::mem::size_of::<usize>() == 8 {
            let desc = KernelDesc::random(ChunkWidth::W32, RwMode::Read, 1);
            assert!(matches!(
                lookup(&desc),
                Err(BenchError::KernelUnavailable(_))
            ));
        }
    }

    #[test]
    fn test_pairs_share_shape() {
        for (desc, kernel) in registry() {
            match (desc.pattern, kernel) {
                (Pattern::Sequential, Kernel::Sequential { .. }) => {}
                (Pattern::Random, Kernel::Random { .. }) => {}
                _ => panic!("kernel shape does not match descriptor {}", desc),
            }
        }
    }

    #[test]
    fn test_delay_kernels_registered() {
        for &d in &DELAY_VALUES {
            for width in [ChunkWidth::W32, ChunkWidth::W64] {
                let desc = KernelDesc::delayed(width, d);
                assert!(lookup(&desc).is_ok(), "missing kernel for {}", desc);
            }
        }
    }

    #[test]
    fn test_registry_has_no_duplicate_keys() {
        let table = registry();
        for (i, (a, _)) in table.iter().enumerate() {
            for (b, _) in table.iter().skip(i + 1) {
                assert_ne!(a, b, "duplicate registry entry {}", a);
            }
        }
    }

    #[test]
    fn test_chunk_width_round_trip() {
        for width in ChunkWidth::ALL {
            assert_eq!(ChunkWidth::from_bits(width.bits()), Some(width));
        }
        assert_eq!(ChunkWidth::from_bits(48), None);
    }
}
