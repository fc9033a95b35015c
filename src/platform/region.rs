//! Benchmark memory regions.
//!
//! A `Region` is a contiguous, page-aligned anonymous mapping, optionally
//! backed by huge pages and optionally bound to one memory NUMA node. The
//! owning benchmark partitions it into disjoint per-worker views; views
//! never outlive the region.

use std::num::NonZeroUsize;
use std::ptr::NonNull;

use libc::c_void;
use nix::sys::mman::{mmap_anonymous, munmap, MapFlags, ProtFlags};

use crate::error::{BenchError, Result};

/// Smallest allocation granule; working sets are multiples of this.
pub const PAGE_4K: usize = 4096;

/// A non-owning window into a region, handed to exactly one worker.
#[derive(Clone, Copy, Debug)]
pub struct RegionView {
    pub ptr: *mut u8,
    pub len: usize,
}

// Views are handed across the spawn boundary; disjointness is guaranteed
// by `Region::split`, and the region outlives every worker join.
unsafe impl Send for RegionView {}

/// An owned, page-aligned block of benchmark memory.
#[derive(Debug)]
pub struct Region {
    base: NonNull<c_void>,
    len: usize,
}

unsafe impl Send for Region {}

impl Region {
    /// Map `len` bytes, optionally on huge pages, optionally bound to
    /// `mem_node`. `len` must be a positive multiple of 4 KiB.
    pub fn alloc(len: usize, mem_node: Option<u32>, large_pages: bool) -> Result<Self> {
        if len == 0 || len % PAGE_4K != 0 {
            return Err(BenchError::Alloc(format!(
                "region length {} is not a positive multiple of {} bytes",
                len, PAGE_4K
            )));
        }
        let length = NonZeroUsize::new(len)
            .ok_or_else(|| BenchError::Alloc("region length is zero".to_string()))?;

        let mut flags = MapFlags::MAP_PRIVATE | MapFlags::MAP_ANONYMOUS;
        if large_pages {
            flags |= MapFlags::MAP_HUGETLB;
        }

        let base = unsafe {
            mmap_anonymous(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                flags,
            )
        }
        .map_err(|e| {
            BenchError::Alloc(format!(
                "mmap of {} bytes failed (large_pages={}): {}",
                len, large_pages, e
            ))
        })?;

        let region = Region { base, len };

        if let Some(node) = mem_node {
            // Bind before first touch so the pages fault in on the chosen
            // node when the worker primes them.
            region.bind_to_node(node)?;
        }

        Ok(region)
    }

    fn bind_to_node(&self, node: u32) -> Result<()> {
        const MASK_WORDS: usize = 8;
        let bits_per_word = 8 * std::mem::size_of::<libc::c_ulong>();
        let mut nodemask = [0 as libc::c_ulong; MASK_WORDS];
        let idx = node as usize / bits_per_word;
        if idx >= MASK_WORDS {
            return Err(BenchError::Alloc(format!(
                "memory NUMA node {} exceeds supported mask width",
                node
            )));
        }
        nodemask[idx] |= 1 << (node as usize % bits_per_word);

        let rc = unsafe {
            libc::syscall(
                libc::SYS_mbind,
                self.base.as_ptr(),
                self.len as libc::c_ulong,
                libc::MPOL_BIND,
                nodemask.as_ptr(),
                (MASK_WORDS * bits_per_word) as libc::c_ulong,
                0,
            )
        };
        if rc != 0 {
            return Err(BenchError::Alloc(format!(
                "mbind to node {} failed: {}",
                node,
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.base.as_ptr() as *mut u8
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Partition the region into `parts` equal, disjoint views.
    /// The region length must divide evenly.
    pub fn split(&self, parts: usize) -> Result<Vec<RegionView>> {
        if parts == 0 || self.len % parts != 0 {
            return Err(BenchError::Internal(format!(
                "cannot split {} bytes into {} equal views",
                self.len, parts
            )));
        }
        let chunk = self.len / parts;
        Ok((0..parts)
            .map(|i| RegionView {
                ptr: unsafe { self.as_mut_ptr().add(i * chunk) },
                len: chunk,
            })
            .collect())
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        unsafe {
            let _ = munmap(self.base, self.len);
        }
    }
}
