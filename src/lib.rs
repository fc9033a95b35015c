//! memprobe: a memory subsystem micro-benchmark harness.
//!
//! Measures unloaded and loaded access latency and aggregate read/write
//! throughput across a matrix of access-pattern parameters: chunk width,
//! stride and direction, read/write mix, sequential vs. random access,
//! memory-level parallelism, NUMA placement, large pages, and worker
//! count.
//!
//! The crate is organized leaf-first:
//! - **error**: unified error type
//! - **platform**: tick counter, affinity, priority, regions, topology
//! - **context**: calibrated process-wide runtime context
//! - **kernels**: the unrolled access kernels and their paired dummies
//! - **chain**: cyclic pointer-permutation builder for the chase kernels
//! - **worker**: the thread-runnable measurement unit
//! - **bench**: benchmark drivers and the power sampler seam
//! - **config**: option bag, validation, and plan enumeration
//! - **cli / report / logging**: thin adapters around the core

pub mod bench;
pub mod chain;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod kernels;
pub mod logging;
pub mod platform;
pub mod report;
pub mod worker;

pub use bench::{Benchmark, BenchmarkKind, BenchmarkParams};
pub use config::Options;
pub use context::RuntimeContext;
pub use error::{BenchError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
