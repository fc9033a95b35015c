//! Command-line interface.
//!
//! The flag set mirrors the classic memory-benchmark CLI: repeatable axis
//! flags, single-letter shorts, and toggle groups where naming any member
//! of a group replaces that group's defaults (e.g. `-R` alone selects
//! reads only, while naming neither `-R` nor `-W` selects both).

use std::path::PathBuf;

use clap::Parser;

use crate::config::{Options, DEFAULT_WORKING_SET_KIB};
use crate::error::{BenchError, Result};

#[derive(Parser, Debug)]
#[command(name = "memprobe", version, about = "Memory subsystem micro-benchmark harness")]
pub struct Cli {
    /// Run all default-category benchmarks: every chunk size, stride,
    /// access pattern and read/write mode
    #[arg(short = 'a', long)]
    pub all: bool,

    /// Chunk size in bits for load kernels; repeatable.
    /// Allowed: 32, 64, 128, 256, 512 (platform dependent)
    #[arg(short = 'c', long = "chunk_size", value_name = "BITS")]
    pub chunk_size: Vec<u32>,

    /// Run an extension by number; repeatable.
    /// Extension 0 is the delay-injected loaded latency benchmark
    #[arg(short = 'e', long = "extension", value_name = "EXT")]
    pub extension: Vec<u32>,

    /// Write results in CSV format to the given file
    #[arg(short = 'f', long = "output_file", value_name = "PATH")]
    pub output_file: Option<PathBuf>,

    /// Base index for numbering the first benchmark
    #[arg(short = 'i', long = "base_test_index", value_name = "N", default_value_t = 1)]
    pub base_test_index: u32,

    /// Number of worker threads; may not exceed the number of logical CPUs
    #[arg(short = 'j', long = "num_worker_threads", value_name = "N", default_value_t = 1)]
    pub num_worker_threads: usize,

    /// Latency benchmarking mode: unloaded with 1 worker thread, loaded
    /// otherwise
    #[arg(short = 'l', long)]
    pub latency: bool,

    /// Independent iterations per benchmark
    #[arg(short = 'n', long, value_name = "N", default_value_t = 1)]
    pub iterations: u32,

    /// Use a random access pattern in load threads
    #[arg(short = 'r', long = "random_access")]
    pub random_access: bool,

    /// Use a sequential/strided access pattern in load threads
    #[arg(short = 's', long = "sequential_access")]
    pub sequential_access: bool,

    /// Throughput benchmarking mode: aggregate across all worker threads
    #[arg(short = 't', long)]
    pub throughput: bool,

    /// Force uniform memory access: limit benchmarking to node 0
    #[arg(short = 'u', long = "ignore_numa")]
    pub ignore_numa: bool,

    /// Verbose console reporting
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Working set size per worker thread in KiB; must be a multiple of 4
    #[arg(short = 'w', long = "working_set_size", value_name = "KIB",
          default_value_t = DEFAULT_WORKING_SET_KIB)]
    pub working_set_size: u64,

    /// Include a CPU NUMA node in the benchmark matrix; repeatable
    #[arg(short = 'C', long = "cpu_numa_node_affinity", value_name = "NODE")]
    pub cpu_numa_node_affinity: Vec<u32>,

    /// Allocate benchmark memory on huge pages
    #[arg(short = 'L', long = "large_pages")]
    pub large_pages: bool,

    /// Include a memory NUMA node in the benchmark matrix; repeatable
    #[arg(short = 'M', long = "memory_numa_node_affinity", value_name = "NODE")]
    pub memory_numa_node_affinity: Vec<u32>,

    /// Include read-based load kernels
    #[arg(short = 'R', long)]
    pub reads: bool,

    /// Include write-based load kernels
    #[arg(short = 'W', long)]
    pub writes: bool,

    /// Stride in chunks, sign giving the direction; repeatable.
    /// Allowed: 1, -1, 2, -2, 4, -4, 8, -8, 16, -16
    #[arg(short = 'S', long = "stride_size", value_name = "STRIDE",
          allow_hyphen_values = true)]
    pub stride_size: Vec<i32>,

    /// Memory-level parallelism for random kernels.
    /// Allowed: 1, 2, 4, 6, 8, 16, 32
    #[arg(short = 'm', long, value_name = "MLP")]
    pub mlp: Option<u32>,
}

impl Cli {
    /// Collapse the raw flags into a normalized option bag.
    pub fn into_options(self) -> Result<Options> {
        for &ext in &self.extension {
            if ext != 0 {
                return Err(BenchError::Config(format!(
                    "invalid extension number {}; available extensions: 0 \
                     (delay-injected loaded latency)",
                    ext
                )));
            }
        }

        let mut opts = Options {
            run_delay_extension: self.extension.contains(&0),
            num_workers: self.num_worker_threads,
            iterations: self.iterations,
            base_index: self.base_test_index,
            working_set_kib: self.working_set_size,
            cpu_nodes: self.cpu_numa_node_affinity,
            mem_nodes: self.memory_numa_node_affinity,
            ignore_numa: self.ignore_numa,
            large_pages: self.large_pages,
            verbose: self.verbose,
            output_file: self.output_file,
            ..Options::default()
        };

        if self.latency || self.throughput {
            opts.run_latency = self.latency;
            opts.run_throughput = self.throughput;
        }
        if self.random_access || self.sequential_access {
            opts.random = self.random_access;
            opts.sequential = self.sequential_access;
        }
        if self.reads || self.writes {
            opts.reads = self.reads;
            opts.writes = self.writes;
        }
        if !self.chunk_size.is_empty() {
            opts.chunk_bits = self.chunk_size;
        }
        if !self.stride_size.is_empty() {
            opts.strides = self.stride_size;
        }
        if let Some(mlp) = self.mlp {
            opts.mlp = mlp;
        }
        if self.all {
            opts.expand_all();
        }

        Ok(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("memprobe").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_without_flags() {
        let opts = parse(&[]).into_options().unwrap();
        assert!(opts.run_latency && opts.run_throughput);
        assert!(opts.sequential && !opts.random);
        assert!(opts.reads && opts.writes);
    }

    #[test]
    fn test_latency_flag_clears_throughput_default() {
        let opts = parse(&["-l"]).into_options().unwrap();
        assert!(opts.run_latency);
        assert!(!opts.run_throughput);
    }

    #[test]
    fn test_reads_flag_clears_writes_default() {
        let opts = parse(&["-t", "-R"]).into_options().unwrap();
        assert!(opts.reads);
        assert!(!opts.writes);
    }

    #[test]
    fn test_repeatable_axis_flags() {
        let opts = parse(&["-c", "64", "-c", "256", "-S", "1", "-S", "-8", "-C", "0", "-C", "1"])
            .into_options()
            .unwrap();
        assert_eq!(opts.chunk_bits, vec![64, 256]);
        assert_eq!(opts.strides, vec![1, -8]);
        assert_eq!(opts.cpu_nodes, vec![0, 1]);
    }

    #[test]
    fn test_negative_stride_parses() {
        let opts = parse(&["-S", "-16"]).into_options().unwrap();
        assert_eq!(opts.strides, vec![-16]);
    }

    #[test]
    fn test_all_expands_matrix() {
        let opts = parse(&["-a", "-v"]).into_options().unwrap();
        assert!(opts.random && opts.sequential);
        assert_eq!(opts.chunk_bits.len(), 5);
        assert_eq!(opts.strides.len(), 10);
        assert!(opts.verbose);
    }

    #[test]
    fn test_scenario_flags_round_trip() {
        let opts = parse(&["-t", "-j4", "-w131072", "-c64", "-S1", "-R", "-u"])
            .into_options()
            .unwrap();
        assert!(opts.run_throughput && !opts.run_latency);
        assert_eq!(opts.num_workers, 4);
        assert_eq!(opts.working_set_kib, 131072);
        assert!(opts.ignore_numa);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let err = parse(&["-e", "7"]).into_options().unwrap_err();
        assert!(err.to_string().contains("invalid extension number"));
    }

    #[test]
    fn test_extension_zero_enables_delay_benchmark() {
        let opts = parse(&["-e", "0", "-j2"]).into_options().unwrap();
        assert!(opts.run_delay_extension);
    }
}
