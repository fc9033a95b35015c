//! Option validation and platform fall-throughs.
//!
//! Everything that can be rejected before allocating a single byte is
//! rejected here. Soft platform limitations (no huge pages) degrade with a
//! warning instead; the rule is that only contradictory or impossible
//! requests are errors.

use super::{Options, WORKING_SET_GRANULE_KIB};
use crate::error::{BenchError, Result};
use crate::kernels::{ChunkWidth, MLP_VALUES, STRIDE_MAGNITUDES};
use crate::platform::Topology;

/// Check `opts` against the host and normalize list-valued options in
/// place (deduplicated, sorted, defaults filled).
pub fn validate(opts: &mut Options, topology: &Topology) -> Result<()> {
    if !opts.run_latency && !opts.run_throughput && !opts.run_delay_extension {
        return Err(BenchError::Config(
            "at least one benchmark type must be selected".to_string(),
        ));
    }
    if !opts.sequential && !opts.random {
        return Err(BenchError::Config(
            "no access pattern was selected".to_string(),
        ));
    }
    if !opts.reads && !opts.writes {
        return Err(BenchError::Config(
            "no read/write mode was selected".to_string(),
        ));
    }

    if opts.working_set_kib == 0 || opts.working_set_kib % WORKING_SET_GRANULE_KIB != 0 {
        return Err(BenchError::Config(format!(
            "working set size must be specified in KiB and be a multiple of {} KiB",
            WORKING_SET_GRANULE_KIB
        )));
    }

    if opts.num_workers < 1 {
        return Err(BenchError::Config(
            "at least one worker thread is required".to_string(),
        ));
    }
    if opts.num_workers > topology.num_logical_cpus {
        return Err(BenchError::Config(format!(
            "number of worker threads may not exceed the number of logical CPUs ({})",
            topology.num_logical_cpus
        )));
    }
    if opts.iterations < 1 {
        return Err(BenchError::Config(
            "at least one iteration is required".to_string(),
        ));
    }

    for &bits in &opts.chunk_bits {
        if ChunkWidth::from_bits(bits).is_none() {
            return Err(BenchError::Config(format!(
                "invalid chunk size {}; allowed values are 32, 64, 128, 256 and 512",
                bits
            )));
        }
    }
    opts.chunk_bits.sort_unstable();
    opts.chunk_bits.dedup();

    for &stride in &opts.strides {
        if !STRIDE_MAGNITUDES.contains(&stride.abs()) {
            return Err(BenchError::Config(format!(
                "invalid stride size {}; allowed values are 1, -1, 2, -2, 4, -4, 8, -8, 16 and -16",
                stride
            )));
        }
    }
    // Canonical enumeration order: +1, -1, +2, -2, ...
    opts.strides.sort_unstable_by_key(|s| (s.abs(), *s < 0));
    opts.strides.dedup();

    if !MLP_VALUES.contains(&opts.mlp) {
        return Err(BenchError::Config(format!(
            "invalid MLP {}; allowed values are 1, 2, 4, 6, 8, 16 and 32",
            opts.mlp
        )));
    }

    if opts.run_delay_extension && opts.num_workers < 2 {
        return Err(BenchError::Config(
            "the delay-injected loaded latency extension needs at least 2 worker threads"
                .to_string(),
        ));
    }

    validate_nodes(opts, topology)?;

    if opts.large_pages {
        if topology.huge_page_size.is_none() {
            log::warn!("large pages are not available on this host; using base pages instead");
            opts.large_pages = false;
        } else if !opts.ignore_numa && topology.num_numa_nodes() > 1 {
            return Err(BenchError::Config(
                "large pages cannot be combined with NUMA binding; force UMA with --ignore_numa"
                    .to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_nodes(opts: &mut Options, topology: &Topology) -> Result<()> {
    let num_nodes = topology.num_numa_nodes() as u32;

    if opts.ignore_numa {
        if !opts.cpu_nodes.is_empty() || !opts.mem_nodes.is_empty() {
            log::warn!("NUMA is being ignored; overriding node affinities to node 0");
        }
        opts.cpu_nodes = vec![0];
        opts.mem_nodes = vec![0];
        return Ok(());
    }

    for &node in &opts.cpu_nodes {
        if node >= num_nodes {
            return Err(BenchError::Config(format!(
                "CPU NUMA node affinity {} is not supported; this system has {} node(s)",
                node, num_nodes
            )));
        }
    }
    for &node in &opts.mem_nodes {
        if node >= num_nodes {
            return Err(BenchError::Config(format!(
                "memory NUMA node affinity {} is not supported; this system has {} node(s)",
                node, num_nodes
            )));
        }
    }

    if opts.cpu_nodes.is_empty() {
        opts.cpu_nodes = (0..num_nodes).collect();
    }
    if opts.mem_nodes.is_empty() {
        opts.mem_nodes = (0..num_nodes).collect();
    }
    opts.cpu_nodes.sort_unstable();
    opts.cpu_nodes.dedup();
    opts.mem_nodes.sort_unstable();
    opts.mem_nodes.dedup();

    Ok(())
}
