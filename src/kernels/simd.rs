//! 256- and 512-bit kernels for x86_64.
//!
//! These are registered only when the running CPU reports AVX2 or AVX-512F;
//! the probe feeds the registry directly so there is exactly one gate for
//! each width. The loop skeletons mirror the scalar family; accumulation
//! and fill go through vector intrinsics so the accesses stay full width.

use core::arch::x86_64::*;

use super::{ChunkWidth, Kernel, KernelDesc, RwMode};
use crate::kernels::random::chase_dummy;

#[target_feature(enable = "avx2")]
unsafe fn zero256() -> __m256i {
    _mm256_setzero_si256()
}

#[target_feature(enable = "avx2")]
unsafe fn xor256(a: __m256i, b: __m256i) -> __m256i {
    _mm256_xor_si256(a, b)
}

#[target_feature(enable = "avx2")]
unsafe fn fill256() -> __m256i {
    _mm256_set1_epi64x(-1)
}

#[target_feature(enable = "avx2")]
unsafe fn fold256(v: __m256i) -> u32 {
    _mm_cvtsi128_si32(_mm256_castsi256_si128(v)) as u32
}

#[target_feature(enable = "avx2")]
unsafe fn low_word256(v: __m256i) -> usize {
    _mm_cvtsi128_si64(_mm256_castsi256_si128(v)) as usize
}

#[target_feature(enable = "avx512f")]
unsafe fn zero512() -> __m512i {
    _mm512_setzero_si512()
}

#[target_feature(enable = "avx512f")]
unsafe fn xor512(a: __m512i, b: __m512i) -> __m512i {
    _mm512_xor_si512(a, b)
}

#[target_feature(enable = "avx512f")]
unsafe fn fill512() -> __m512i {
    _mm512_set1_epi64(-1)
}

#[target_feature(enable = "avx512f")]
unsafe fn fold512(v: __m512i) -> u32 {
    _mm_cvtsi128_si32(_mm512_castsi512_si128(v)) as u32
}

#[target_feature(enable = "avx512f")]
unsafe fn low_word512(v: __m512i) -> usize {
    _mm_cvtsi128_si64(_mm512_castsi512_si128(v)) as usize
}

macro_rules! simd_seq_family {
    ($ty:ty, $feat:literal, $width:ident, $reg:ident,
     $zero:ident, $xor:ident, $fill:ident, $fold:ident,
     $( ($s:literal, $fr:ident, $fw:ident, $rr:ident, $rw:ident, $du:ident) ),+ $(,)?) => {
        $(
        #[target_feature(enable = $feat)]
        pub unsafe fn $fr(start: *mut u8, end: *mut u8) -> u32 {
            let mut p = start as *const $ty;
            let end = end as *const $ty;
            let mut acc = $zero();
            while (p as usize) < (end as usize) {
                acc = $xor(acc, core::ptr::read_volatile(p));
                p = p.add($s);
            }
            $fold(acc)
        }

        #[target_feature(enable = $feat)]
        pub unsafe fn $fw(start: *mut u8, end: *mut u8) -> u32 {
            let mut p = start as *mut $ty;
            let end = end as *mut $ty;
            let fill = $fill();
            while (p as usize) < (end as usize) {
                core::ptr::write_volatile(p, fill);
                p = p.add($s);
            }
            0
        }

        #[target_feature(enable = $feat)]
        pub unsafe fn $rr(start: *mut u8, end: *mut u8) -> u32 {
            let start = start as *const $ty;
            let mut p = (end as *const $ty).sub($s);
            let mut acc = $zero();
            loop {
                acc = $xor(acc, core::ptr::read_volatile(p));
                if (p as usize) <= (start as usize) {
                    break;
                }
                p = p.sub($s);
            }
            $fold(acc)
        }

        #[target_feature(enable = $feat)]
        pub unsafe fn $rw(start: *mut u8, end: *mut u8) -> u32 {
            let start = start as *mut $ty;
            let mut p = (end as *mut $ty).sub($s);
            let fill = $fill();
            loop {
                core::ptr::write_volatile(p, fill);
                if (p as usize) <= (start as usize) {
                    break;
                }
                p = p.sub($s);
            }
            0
        }

        pub unsafe fn $du(start: *mut u8, end: *mut u8) -> u32 {
            let mut p = start as *const $ty;
            let end = end as *const $ty;
            let mut acc: u64 = 0;
            while (p as usize) < (end as usize) {
                acc ^= std::hint::black_box(p) as usize as u64;
                p = p.add($s);
            }
            acc as u32
        }
        )+

        fn $reg(table: &mut Vec<(KernelDesc, Kernel)>) {
            $(
            table.push((
                KernelDesc::sequential(ChunkWidth::$width, $s, RwMode::Read),
                Kernel::Sequential { live: $fr, dummy: $du },
            ));
            table.push((
                KernelDesc::sequential(ChunkWidth::$width, $s, RwMode::Write),
                Kernel::Sequential { live: $fw, dummy: $du },
            ));
            table.push((
                KernelDesc::sequential(ChunkWidth::$width, -$s, RwMode::Read),
                Kernel::Sequential { live: $rr, dummy: $du },
            ));
            table.push((
                KernelDesc::sequential(ChunkWidth::$width, -$s, RwMode::Write),
                Kernel::Sequential { live: $rw, dummy: $du },
            ));
            )+
        }
    };
}

simd_seq_family!(__m256i, "avx2", W256, register_w256, zero256, xor256, fill256, fold256,
    (1, forw_read_w256_s1, forw_write_w256_s1, rev_read_w256_s1, rev_write_w256_s1, dummy_w256_s1),
    (2, forw_read_w256_s2, forw_write_w256_s2, rev_read_w256_s2, rev_write_w256_s2, dummy_w256_s2),
    (4, forw_read_w256_s4, forw_write_w256_s4, rev_read_w256_s4, rev_write_w256_s4, dummy_w256_s4),
    (8, forw_read_w256_s8, forw_write_w256_s8, rev_read_w256_s8, rev_write_w256_s8, dummy_w256_s8),
    (16, forw_read_w256_s16, forw_write_w256_s16, rev_read_w256_s16, rev_write_w256_s16, dummy_w256_s16),
);

simd_seq_family!(__m512i, "avx512f", W512, register_w512, zero512, xor512, fill512, fold512,
    (1, forw_read_w512_s1, forw_write_w512_s1, rev_read_w512_s1, rev_write_w512_s1, dummy_w512_s1),
    (2, forw_read_w512_s2, forw_write_w512_s2, rev_read_w512_s2, rev_write_w512_s2, dummy_w512_s2),
    (4, forw_read_w512_s4, forw_write_w512_s4, rev_read_w512_s4, rev_write_w512_s4, dummy_w512_s4),
    (8, forw_read_w512_s8, forw_write_w512_s8, rev_read_w512_s8, rev_write_w512_s8, dummy_w512_s8),
    (16, forw_read_w512_s16, forw_write_w512_s16, rev_read_w512_s16, rev_write_w512_s16, dummy_w512_s16),
);

macro_rules! simd_chase_family {
    ($ty:ty, $feat:literal, $chunk:literal, $read:ident, $write:ident, $low:ident) => {
        #[target_feature(enable = $feat)]
        pub unsafe fn $read<const MLP: usize>(
            next: *mut usize,
            bytes: usize,
            _mlp: u32,
        ) -> *mut usize {
            let rounds = bytes / $chunk / MLP;
            let mut ptrs = [next; MLP];
            for i in 1..MLP {
                ptrs[i] = (next as *mut u8).add(i * $chunk) as *mut usize;
            }
            for _ in 0..rounds {
                for p in ptrs.iter_mut() {
                    let v = core::ptr::read_volatile(*p as *const $ty);
                    *p = $low(v) as *mut usize;
                }
            }
            std::hint::black_box(ptrs)[0]
        }

        #[target_feature(enable = $feat)]
        pub unsafe fn $write<const MLP: usize>(
            next: *mut usize,
            bytes: usize,
            _mlp: u32,
        ) -> *mut usize {
            let rounds = bytes / $chunk / MLP;
            let mut ptrs = [next; MLP];
            for i in 1..MLP {
                ptrs[i] = (next as *mut u8).add(i * $chunk) as *mut usize;
            }
            for _ in 0..rounds {
                for p in ptrs.iter_mut() {
                    let v = core::ptr::read_volatile(*p as *const $ty);
                    core::ptr::write_volatile(*p as *mut $ty, v);
                    *p = $low(v) as *mut usize;
                }
            }
            std::hint::black_box(ptrs)[0]
        }
    };
}

simd_chase_family!(__m256i, "avx2", 32, chase_read_w256, chase_write_w256, low_word256);
simd_chase_family!(__m512i, "avx512f", 64, chase_read_w512, chase_write_w512, low_word512);

macro_rules! register_simd_chase {
    ($table:ident, $width:expr, $chunk:literal, $read:ident, $write:ident,
     [$( $mlp:literal ),+]) => {
        $(
        $table.push((
            KernelDesc::random($width, RwMode::Read, $mlp),
            Kernel::Random {
                live: $read::<$mlp>,
                dummy: chase_dummy::<$chunk, $mlp>,
            },
        ));
        $table.push((
            KernelDesc::random($width, RwMode::Write, $mlp),
            Kernel::Random {
                live: $write::<$mlp>,
                dummy: chase_dummy::<$chunk, $mlp>,
            },
        ));
        )+
    };
}

pub(super) fn register(table: &mut Vec<(KernelDesc, Kernel)>) {
    if std::is_x86_feature_detected!("avx2") {
        register_w256(table);
        register_simd_chase!(table, ChunkWidth::W256, 32, chase_read_w256, chase_write_w256,
            [1, 2, 4, 6, 8, 16, 32]);
    }
    if std::is_x86_feature_detected!("avx512f") {
        register_w512(table);
        register_simd_chase!(table, ChunkWidth::W512, 64, chase_read_w512, chase_write_w512,
            [1, 2, 4, 6, 8, 16, 32]);
    }
}
