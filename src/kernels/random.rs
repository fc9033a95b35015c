//! Random-access pointer-chase kernels.
//!
//! Each chain is a dependent-load sequence through a pre-built cyclic
//! permutation (see [`crate::chain`]). With MLP > 1 the chain builder lays
//! out one disjoint cycle per chain, interleaved by slot residue, so the
//! kernel can start chain `i` at `next + i * chunk` and every chain runs
//! with no load depending on another chain's result.
//!
//! The wider-than-word kernels read the full chunk volatilely and chase
//! the pointer stored in its first word, so the measured access is the
//! full chunk width while the dependency still runs through the load.

use super::{ChunkWidth, Kernel, KernelDesc, RwMode, MLP_VALUES};

/// Chase `bytes / PTR` native words across `MLP` chains, loads only.
pub unsafe fn chase_read_word<const MLP: usize>(
    next: *mut usize,
    bytes: usize,
    _mlp: u32,
) -> *mut usize {
    const PTR: usize = std::mem::size_of::<usize>();
    let rounds = bytes / PTR / MLP;
    let mut ptrs = [next; MLP];
    for i in 1..MLP {
        ptrs[i] = (next as *mut u8).add(i * PTR) as *mut usize;
    }
    for _ in 0..rounds {
        for p in ptrs.iter_mut() {
            *p = **p as *mut usize;
        }
    }
    std::hint::black_box(ptrs)[0]
}

/// Chase with a store on the critical path: the loaded pointer is written
/// back to its own slot before the chain follows it, which keeps the cycle
/// intact while every step carries a write.
pub unsafe fn chase_write_word<const MLP: usize>(
    next: *mut usize,
    bytes: usize,
    _mlp: u32,
) -> *mut usize {
    const PTR: usize = std::mem::size_of::<usize>();
    let rounds = bytes / PTR / MLP;
    let mut ptrs = [next; MLP];
    for i in 1..MLP {
        ptrs[i] = (next as *mut u8).add(i * PTR) as *mut usize;
    }
    for _ in 0..rounds {
        for p in ptrs.iter_mut() {
            let nxt = **p;
            core::ptr::write_volatile(*p, nxt);
            *p = nxt as *mut usize;
        }
    }
    std::hint::black_box(ptrs)[0]
}

/// 128-bit chunk chase: volatile full-chunk load, pointer in the low word.
pub unsafe fn chase_read_w128<const MLP: usize>(
    next: *mut usize,
    bytes: usize,
    _mlp: u32,
) -> *mut usize {
    const CHUNK: usize = 16;
    let rounds = bytes / CHUNK / MLP;
    let mut ptrs = [next; MLP];
    for i in 1..MLP {
        ptrs[i] = (next as *mut u8).add(i * CHUNK) as *mut usize;
    }
    for _ in 0..rounds {
        for p in ptrs.iter_mut() {
            let v = core::ptr::read_volatile(*p as *const u128);
            *p = v as u64 as *mut usize;
        }
    }
    std::hint::black_box(ptrs)[0]
}

pub unsafe fn chase_write_w128<const MLP: usize>(
    next: *mut usize,
    bytes: usize,
    _mlp: u32,
) -> *mut usize {
    const CHUNK: usize = 16;
    let rounds = bytes / CHUNK / MLP;
    let mut ptrs = [next; MLP];
    for i in 1..MLP {
        ptrs[i] = (next as *mut u8).add(i * CHUNK) as *mut usize;
    }
    for _ in 0..rounds {
        for p in ptrs.iter_mut() {
            let v = core::ptr::read_volatile(*p as *const u128);
            core::ptr::write_volatile(*p as *mut u128, v);
            *p = v as u64 as *mut usize;
        }
    }
    std::hint::black_box(ptrs)[0]
}

/// Shared dummy: the same per-round skeleton with the dereference replaced
/// by an optimization barrier. `CHUNK` fixes the round count to match the
/// live kernel it is paired with.
pub unsafe fn chase_dummy<const CHUNK: usize, const MLP: usize>(
    next: *mut usize,
    bytes: usize,
    _mlp: u32,
) -> *mut usize {
    let rounds = bytes / CHUNK / MLP;
    let mut ptrs = [next; MLP];
    for i in 1..MLP {
        ptrs[i] = (next as *mut u8).add(i * CHUNK) as *mut usize;
    }
    for _ in 0..rounds {
        for p in ptrs.iter_mut() {
            *p = std::hint::black_box(*p);
        }
    }
    ptrs[0]
}

macro_rules! register_chase {
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
    let word = ChunkWidth::native_word();
    register_chase!(table, word, 8, chase_read_word, chase_write_word,
        [1, 2, 4, 6, 8, 16, 32]);
    if std::mem::size_of::<usize>() == 8 {
        register_chase!(table, ChunkWidth::W128, 16, chase_read_w128, chase_write_w128,
            [1, 2, 4, 6, 8, 16, 32]);
    }
    debug_assert_eq!(MLP_VALUES.len(), 7);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::build_chains;
    use crate::kernels::BYTES_PER_PASS;

    fn chained_buffer(words: usize) -> Vec<usize> {
        let mut buf = vec![0usize; words];
        let len = words * std::mem::size_of::<usize>();
        let bytes = unsafe { std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut u8, len) };
        build_chains(bytes, std::mem::size_of::<usize>(), 1, 42).unwrap();
        buf
    }

    #[test]
    fn test_read_chase_stays_in_region() {
        let mut buf = chained_buffer(1024);
        let base = buf.as_mut_ptr() as usize;
        let len = buf.len() * std::mem::size_of::<usize>();
        let next = unsafe {
            chase_read_word::<1>(buf.as_mut_ptr(), BYTES_PER_PASS, 1)
        };
        let addr = next as usize;
        assert!(addr >= base && addr < base + len);
        assert_eq!((addr - base) % std::mem::size_of::<usize>(), 0);
    }

    #[test]
    fn test_write_chase_preserves_cycle() {
        let mut buf = chained_buffer(512);
        let before = buf.clone();
        unsafe {
            chase_write_word::<1>(buf.as_mut_ptr(), BYTES_PER_PASS, 1);
        }
        // The write kernel stores each slot's own value back, so the chain
        // is bitwise unchanged.
        assert_eq!(buf, before);
    }

    #[test]
    fn test_dummy_chase_leaves_memory_alone() {
        let mut buf = chained_buffer(512);
        let before = buf.clone();
        unsafe {
            chase_dummy::<8, 4>(buf.as_mut_ptr(), BYTES_PER_PASS, 4);
        }
        assert_eq!(buf, before);
    }

    #[test]
    fn test_mlp_chains_cover_disjoint_slots() {
        const MLP: usize = 4;
        let words = 1024usize;
        let mut buf = vec![0usize; words];
        let len = words * std::mem::size_of::<usize>();
        let bytes = unsafe { std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut u8, len) };
        build_chains(bytes, std::mem::size_of::<usize>(), MLP, 7).unwrap();
        // One full lap of every chain returns each start pointer home.
        let base = buf.as_mut_ptr();
        for lane in 0..MLP {
            let start = unsafe { base.add(lane) };
            let mut p = start;
            for _ in 0..words / MLP {
                p = unsafe { *p as *mut usize };
            }
            assert_eq!(p, start, "chain {} is not a closed cycle", lane);
        }
    }
}
