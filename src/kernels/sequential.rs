//! Scalar sequential kernels: 32-, 64-, and 128-bit chunks over every
//! stride and direction, in read and write flavors.
//!
//! One macro expands the whole family so every implementation shares the
//! same loop skeleton. The accesses are volatile; the loop itself carries
//! no other memory traffic, and the paired dummy walks the same pointer
//! sequence with the access replaced by an optimization barrier.

use super::{ChunkWidth, Kernel, KernelDesc, RwMode};

macro_rules! scalar_seq_family {
    ($ty:ty, $width:ident, $reg:ident,
     $( ($s:literal, $fr:ident, $fw:ident, $rr:ident, $rw:ident, $du:ident) ),+ $(,)?) => {
        $(
        pub unsafe fn $fr(start: *mut u8, end: *mut u8) -> u32 {
            let mut p = start as *const $ty;
            let end = end as *const $ty;
            let mut acc: u64 = 0;
            while (p as usize) < (end as usize) {
                acc ^= core::ptr::read_volatile(p) as u64;
                p = p.add($s);
            }
            acc as u32
        }

        pub unsafe fn $fw(start: *mut u8, end: *mut u8) -> u32 {
            let mut p = start as *mut $ty;
            let end = end as *mut $ty;
            while (p as usize) < (end as usize) {
                core::ptr::write_volatile(p, !0);
                p = p.add($s);
            }
            0
        }

        pub unsafe fn $rr(start: *mut u8, end: *mut u8) -> u32 {
            let start = start as *const $ty;
            let mut p = (end as *const $ty).sub($s);
            let mut acc: u64 = 0;
            loop {
                acc ^= core::ptr::read_volatile(p) as u64;
                if (p as usize) <= (start as usize) {
                    break;
                }
                p = p.sub($s);
            }
            acc as u32
        }

        pub unsafe fn $rw(start: *mut u8, end: *mut u8) -> u32 {
            let start = start as *mut $ty;
            let mut p = (end as *mut $ty).sub($s);
            loop {
                core::ptr::write_volatile(p, !0);
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

scalar_seq_family!(u32, W32, register_w32,
    (1, forw_read_w32_s1, forw_write_w32_s1, rev_read_w32_s1, rev_write_w32_s1, dummy_w32_s1),
    (2, forw_read_w32_s2, forw_write_w32_s2, rev_read_w32_s2, rev_write_w32_s2, dummy_w32_s2),
    (4, forw_read_w32_s4, forw_write_w32_s4, rev_read_w32_s4, rev_write_w32_s4, dummy_w32_s4),
    (8, forw_read_w32_s8, forw_write_w32_s8, rev_read_w32_s8, rev_write_w32_s8, dummy_w32_s8),
    (16, forw_read_w32_s16, forw_write_w32_s16, rev_read_w32_s16, rev_write_w32_s16, dummy_w32_s16),
);

scalar_seq_family!(u64, W64, register_w64,
    (1, forw_read_w64_s1, forw_write_w64_s1, rev_read_w64_s1, rev_write_w64_s1, dummy_w64_s1),
    (2, forw_read_w64_s2, forw_write_w64_s2, rev_read_w64_s2, rev_write_w64_s2, dummy_w64_s2),
    (4, forw_read_w64_s4, forw_write_w64_s4, rev_read_w64_s4, rev_write_w64_s4, dummy_w64_s4),
    (8, forw_read_w64_s8, forw_write_w64_s8, rev_read_w64_s8, rev_write_w64_s8, dummy_w64_s8),
    (16, forw_read_w64_s16, forw_write_w64_s16, rev_read_w64_s16, rev_write_w64_s16, dummy_w64_s16),
);

scalar_seq_family!(u128, W128, register_w128,
    (1, forw_read_w128_s1, forw_write_w128_s1, rev_read_w128_s1, rev_write_w128_s1, dummy_w128_s1),
    (2, forw_read_w128_s2, forw_write_w128_s2, rev_read_w128_s2, rev_write_w128_s2, dummy_w128_s2),
    (4, forw_read_w128_s4, forw_write_w128_s4, rev_read_w128_s4, rev_write_w128_s4, dummy_w128_s4),
    (8, forw_read_w128_s8, forw_write_w128_s8, rev_read_w128_s8, rev_write_w128_s8, dummy_w128_s8),
    (16, forw_read_w128_s16, forw_write_w128_s16, rev_read_w128_s16, rev_write_w128_s16, dummy_w128_s16),
);

pub(super) fn register(table: &mut Vec<(KernelDesc, Kernel)>) {
    register_w32(table);
    register_w64(table);
    register_w128(table);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::BYTES_PER_PASS;

    fn pass_buffer() -> Vec<u128> {
        // u128 backing keeps the buffer aligned for every scalar width.
        vec![0u128; BYTES_PER_PASS / std::mem::size_of::<u128>()]
    }

    fn bounds(buf: &mut [u128]) -> (*mut u8, *mut u8) {
        let start = buf.as_mut_ptr() as *mut u8;
        (start, unsafe { start.add(BYTES_PER_PASS) })
    }

    #[test]
    fn test_forward_write_fills_every_word() {
        let mut buf = pass_buffer();
        let (start, end) = bounds(&mut buf);
        unsafe {
            forw_write_w64_s1(start, end);
        }
        for word in &buf {
            assert_eq!(*word, !0u128);
        }
    }

    #[test]
    fn test_strided_write_skips_words() {
        let mut buf = pass_buffer();
        let (start, end) = bounds(&mut buf);
        unsafe {
            forw_write_w64_s2(start, end);
        }
        let words = unsafe {
            std::slice::from_raw_parts(start as *const u64, BYTES_PER_PASS / 8)
        };
        for (i, word) in words.iter().enumerate() {
            if i % 2 == 0 {
                assert_eq!(*word, !0u64, "word {} should be written", i);
            } else {
                assert_eq!(*word, 0u64, "word {} should be untouched", i);
            }
        }
    }

    #[test]
    fn test_reverse_write_touches_first_and_last() {
        let mut buf = pass_buffer();
        let (start, end) = bounds(&mut buf);
        unsafe {
            rev_write_w32_s4(start, end);
        }
        let words = unsafe {
            std::slice::from_raw_parts(start as *const u32, BYTES_PER_PASS / 4)
        };
        assert_eq!(words[0], !0u32);
        assert_eq!(words[words.len() - 4], !0u32);
        assert_eq!(words[1], 0);
    }

    #[test]
    fn test_read_accumulates() {
        let mut buf = pass_buffer();
        for (i, word) in buf.iter_mut().enumerate() {
            *word = i as u128;
        }
        let (start, end) = bounds(&mut buf);
        let forward = unsafe { forw_read_w64_s1(start, end) };
        let reverse = unsafe { rev_read_w64_s1(start, end) };
        // Same set of words, so the xor accumulators agree.
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_dummy_does_not_touch_memory() {
        let mut buf = pass_buffer();
        let (start, end) = bounds(&mut buf);
        unsafe {
            dummy_w64_s1(start, end);
        }
        assert!(buf.iter().all(|w| *w == 0));
    }
}
