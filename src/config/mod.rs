//! Run configuration: the option bag and the benchmark plan derived from it.
//!
//! `Options` is the normalized form of the command line (or of a test's
//! hand-built configuration): toggle groups have already collapsed to
//! concrete selections, so defaults live in `Default::default()` and the
//! CLI adapter only overrides what the user actually passed. `plan` turns
//! a validated bag into the ordered benchmark list.

pub mod plan;
pub mod validate;

use std::path::PathBuf;

pub use plan::build_plan;
pub use validate::validate;

/// KiB granule the working set must respect.
pub const WORKING_SET_GRANULE_KIB: u64 = 4;

/// Default per-thread working set: 4 MiB.
pub const DEFAULT_WORKING_SET_KIB: u64 = 4096;

/// The fully-specified run configuration.
#[derive(Debug, Clone)]
pub struct Options {
    pub run_latency: bool,
    pub run_throughput: bool,
    /// Delay-injected loaded latency extension.
    pub run_delay_extension: bool,
    pub sequential: bool,
    pub random: bool,
    pub reads: bool,
    pub writes: bool,
    pub chunk_bits: Vec<u32>,
    pub strides: Vec<i32>,
    pub mlp: u32,
    pub num_workers: usize,
    pub iterations: u32,
    pub base_index: u32,
    pub working_set_kib: u64,
    pub cpu_nodes: Vec<u32>,
    pub mem_nodes: Vec<u32>,
    pub ignore_numa: bool,
    pub large_pages: bool,
    pub verbose: bool,
    pub output_file: Option<PathBuf>,
    /// Live-loop target per worker; not exposed on the CLI, shortened by
    /// tests.
    pub duration_ms: u64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            run_latency: true,
            run_throughput: true,
            run_delay_extension: false,
            sequential: true,
            random: false,
            reads: true,
            writes: true,
            chunk_bits: vec![if std::mem::size_of::<usize>() == 8 { 64 } else { 32 }],
            strides: vec![1],
            mlp: 1,
            num_workers: 1,
            iterations: 1,
            base_index: 1,
            working_set_kib: DEFAULT_WORKING_SET_KIB,
            cpu_nodes: Vec::new(),
            mem_nodes: Vec::new(),
            ignore_numa: false,
            large_pages: false,
            verbose: false,
            output_file: None,
            duration_ms: crate::worker::BENCHMARK_DURATION_MS,
        }
    }
}

impl Options {
    /// The `--all` expansion: every width, both patterns, both modes, both
    /// benchmark families, every stride, MLP held at 1.
    pub fn expand_all(&mut self) {
        self.run_latency = true;
        self.run_throughput = true;
        self.sequential = true;
        self.random = true;
        self.reads = true;
        self.writes = true;
        self.chunk_bits = vec![32, 64, 128, 256, 512];
        self.strides = vec![1, -1, 2, -2, 4, -4, 8, -8, 16, -16];
        self.mlp = 1;
    }

    pub fn working_set_bytes(&self) -> usize {
        (self.working_set_kib * 1024) as usize
    }
}
