//! Pointer-chain construction for the random-access kernels.
//!
//! The region is divided into chunk-sized slots; each slot's first word
//! receives the absolute address of another slot so that following the
//! stored pointers walks a closed cycle. With `mlp` chains the slots are
//! split by residue class (slot index mod `mlp`) into that many disjoint
//! cycles: chain `i` then starts at `base + i * chunk` and never shares a
//! slot with any other chain, which is what makes the chains' cache misses
//! truly independent.
//!
//! Construction is index-based; pointers are materialized in place at the
//! end of each lane. Seeding is deterministic per benchmark iteration so a
//! run can be replayed, while successive iterations get fresh layouts.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{BenchError, Result};

/// Rewrite `region` as `mlp` disjoint pointer cycles over `chunk_bytes`
/// slots. Every slot belongs to exactly one cycle; each cycle visits its
/// slots exactly once before returning to its start.
pub fn build_chains(region: &mut [u8], chunk_bytes: usize, mlp: usize, seed: u64) -> Result<()> {
    let ptr_bytes = std::mem::size_of::<usize>();
    if chunk_bytes < ptr_bytes {
        return Err(BenchError::ChainBuild(format!(
            "chunk of {} bytes cannot hold a {}-byte pointer",
            chunk_bytes, ptr_bytes
        )));
    }
    if mlp == 0 {
        return Err(BenchError::ChainBuild("mlp must be at least 1".to_string()));
    }
    if region.is_empty() || region.len() % chunk_bytes != 0 {
        return Err(BenchError::ChainBuild(format!(
            "region of {} bytes is not a positive multiple of the {}-byte chunk",
            region.len(),
            chunk_bytes
        )));
    }
    let slots = region.len() / chunk_bytes;
    // Chains must stay equal-length so a continuation pointer plus the
    // lane stagger can never step past the last slot; any remainder slots
    // are simply left out of the chase.
    let slots = slots - slots % mlp;
    if slots < 2 * mlp {
        return Err(BenchError::ChainBuild(format!(
            "each of {} chains needs at least 2 of the {} slots",
            mlp,
            region.len() / chunk_bytes
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let base = region.as_mut_ptr();
    for lane in 0..mlp {
        let mut order: Vec<usize> = (lane..slots).step_by(mlp).collect();
        order.shuffle(&mut rng);
        for k in 0..order.len() {
            let from = order[k];
            let to = order[(k + 1) % order.len()];
            unsafe {
                let slot = base.add(from * chunk_bytes) as *mut usize;
                *slot = base.add(to * chunk_bytes) as usize;
            }
        }
    }
    Ok(())
}

/// Chain seed for one benchmark iteration: replayable for a given
/// (benchmark, iteration) pair, distinct across iterations.
pub fn iteration_seed(bench_index: u32, iteration: u32) -> u64 {
    ((bench_index as u64) << 32) | iteration as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words_of(buf: &mut Vec<usize>) -> &mut [u8] {
        let len = buf.len() * std::mem::size_of::<usize>();
        unsafe { std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut u8, len) }
    }

    fn follow(buf: &[usize], start_word: usize, steps: usize) -> usize {
        let base = buf.as_ptr() as usize;
        let mut addr = base + start_word * std::mem::size_of::<usize>();
        for _ in 0..steps {
            let word = (addr - base) / std::mem::size_of::<usize>();
            addr = buf[word];
        }
        (addr - base) / std::mem::size_of::<usize>()
    }

    #[test]
    fn test_single_chain_is_a_full_cycle() {
        let n = 256;
        let mut buf = vec![0usize; n];
        build_chains(words_of(&mut buf), 8, 1, 1).unwrap();

        let base = buf.as_ptr() as usize;
        let mut seen = vec![false; n];
        let mut addr = base;
        for _ in 0..n {
            let word = (addr - base) / 8;
            assert!(!seen[word], "slot {} visited twice inside one lap", word);
            seen[word] = true;
            addr = buf[word];
        }
        // Step n + 1 lands back on the start.
        assert_eq!(addr, base);
        assert!(seen.iter().all(|v| *v));
    }

    #[test]
    fn test_wide_chunks_use_first_word() {
        let n = 64;
        let chunk = 64;
        let mut buf = vec![0usize; n * chunk / 8];
        build_chains(words_of(&mut buf), chunk, 1, 3).unwrap();

        let base = buf.as_ptr() as usize;
        for slot in 0..n {
            let target = buf[slot * chunk / 8];
            assert_eq!((target - base) % chunk, 0, "slot {} points mid-chunk", slot);
        }
    }

    #[test]
    fn test_mlp_lanes_stay_in_residue_class() {
        let n = 240;
        let mlp = 6;
        let mut buf = vec![0usize; n];
        build_chains(words_of(&mut buf), 8, mlp, 99).unwrap();

        for lane in 0..mlp {
            let end = follow(&buf, lane, n / mlp);
            assert_eq!(end, lane, "lane {} does not close after {} steps", lane, n / mlp);
            // Every hop stays inside the lane's residue class.
            let mut word = lane;
            for _ in 0..n / mlp {
                word = (buf[word] - buf.as_ptr() as usize) / 8;
                assert_eq!(word % mlp, lane);
            }
        }
    }

    #[test]
    fn test_same_seed_reproduces_layout() {
        let mut a = vec![0usize; 128];
        let mut b = vec![0usize; 128];
        build_chains(words_of(&mut a), 8, 1, 7).unwrap();
        build_chains(words_of(&mut b), 8, 1, 7).unwrap();
        let rel = |buf: &Vec<usize>| -> Vec<usize> {
            let base = buf.as_ptr() as usize;
            buf.iter().map(|v| v - base).collect()
        };
        assert_eq!(rel(&a), rel(&b));
    }

    #[test]
    fn test_different_iterations_differ() {
        let mut a = vec![0usize; 128];
        let mut b = vec![0usize; 128];
        build_chains(words_of(&mut a), 8, 1, iteration_seed(1, 0)).unwrap();
        build_chains(words_of(&mut b), 8, 1, iteration_seed(1, 1)).unwrap();
        let rel = |buf: &Vec<usize>| -> Vec<usize> {
            let base = buf.as_ptr() as usize;
            buf.iter().map(|v| v - base).collect()
        };
        assert_ne!(rel(&a), rel(&b));
    }

    #[test]
    fn test_too_small_region_rejected() {
        let mut buf = vec![0usize; 1];
        assert!(matches!(
            build_chains(words_of(&mut buf), 8, 1, 0),
            Err(BenchError::ChainBuild(_))
        ));
    }

    #[test]
    fn test_chunk_narrower_than_pointer_rejected() {
        let mut buf = vec![0usize; 64];
        let narrow = std::mem::size_of::<usize>() / 2;
        assert!(matches!(
            build_chains(words_of(&mut buf), narrow, 1, 0),
            Err(BenchError::ChainBuild(_))
        ));
    }
}
