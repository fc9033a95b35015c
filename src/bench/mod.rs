//! Benchmark drivers.
//!
//! Three benchmark shapes share one orchestration skeleton: throughput
//! (all workers load), unloaded latency (one chasing worker), and loaded
//! latency (worker 0 chases while the rest generate load). Each iteration
//! allocates nothing: the region is mapped once per benchmark, chains are
//! rebuilt per iteration with a fresh deterministic seed, workers are
//! spawned, joined, and reduced to one or two metrics.

pub mod power;

use serde::Serialize;

use crate::chain::{build_chains, iteration_seed};
use crate::context::RuntimeContext;
use crate::error::{BenchError, Result};
use crate::kernels::{self, ChunkWidth, Kernel, KernelDesc, Pattern, RwMode};
use crate::platform::Region;
use crate::worker::{Worker, WorkerRecord};
use power::{PowerSample, PowerSampler};

const MB: f64 = (1 << 20) as f64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkKind {
    Throughput,
    UnloadedLatency,
    LoadedLatency,
}

/// Everything that defines one benchmark in the plan.
#[derive(Clone, Debug)]
pub struct BenchmarkParams {
    pub index: u32,
    pub name: String,
    pub kind: BenchmarkKind,
    pub pattern: Pattern,
    pub mode: RwMode,
    pub width: ChunkWidth,
    pub stride: i32,
    pub mlp: u32,
    /// Injected no-ops for the delay-extension load kernel; 0 otherwise.
    pub delay: u32,
    pub cpu_node: u32,
    pub mem_node: u32,
    /// Bind the region via mbind; None on UMA runs.
    pub mem_bind: Option<u32>,
    pub num_workers: usize,
    pub working_set_per_thread: usize,
    pub iterations: u32,
    pub large_pages: bool,
    pub duration_ms: u64,
}

impl BenchmarkParams {
    /// The kernel the load workers run.
    pub fn load_kernel_desc(&self) -> KernelDesc {
        if self.delay > 0 {
            KernelDesc::delayed(self.width, self.delay)
        } else {
            match self.pattern {
                Pattern::Sequential => KernelDesc::sequential(self.width, self.stride, self.mode),
                Pattern::Random => KernelDesc::random(self.width, self.mode, self.mlp),
            }
        }
    }

    /// The kernel the latency worker runs: a native-word chase, MLP 1.
    pub fn latency_kernel_desc(&self) -> KernelDesc {
        KernelDesc::random(ChunkWidth::native_word(), RwMode::Read, 1)
    }

    pub fn metric_units(&self) -> &'static str {
        match self.kind {
            BenchmarkKind::Throughput => "MB/s",
            BenchmarkKind::UnloadedLatency | BenchmarkKind::LoadedLatency => "ns/access",
        }
    }
}

/// One iteration's reduced results.
#[derive(Debug, Clone)]
pub struct IterationResult {
    pub metric: f64,
    pub load_metric: Option<f64>,
    pub warning: bool,
    pub power_samples: Vec<PowerSample>,
}

/// A runnable benchmark with its accumulated results.
pub struct Benchmark {
    pub params: BenchmarkParams,
    has_run: bool,
    results: Vec<IterationResult>,
    warning: bool,
}

impl Benchmark {
    pub fn new(params: BenchmarkParams) -> Self {
        Benchmark {
            params,
            has_run: false,
            results: Vec::new(),
            warning: false,
        }
    }

    pub fn has_run(&self) -> bool {
        self.has_run
    }

    pub fn warning(&self) -> bool {
        self.warning
    }

    pub fn iteration_results(&self) -> &[IterationResult] {
        &self.results
    }

    pub fn mean_metric(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.results.iter().map(|r| r.metric).sum::<f64>() / self.results.len() as f64
    }

    pub fn mean_load_metric(&self) -> Option<f64> {
        let loads: Vec<f64> = self.results.iter().filter_map(|r| r.load_metric).collect();
        if loads.is_empty() {
            return None;
        }
        Some(loads.iter().sum::<f64>() / loads.len() as f64)
    }

    /// Execute every iteration. A benchmark runs at most once.
    pub fn run(
        &mut self,
        ctx: &RuntimeContext,
        samplers: &mut [Box<dyn PowerSampler>],
    ) -> Result<()> {
        if self.has_run {
            return Err(BenchError::Internal(format!(
                "benchmark #{} was run twice",
                self.params.index
            )));
        }
        self.has_run = true;

        let p = self.params.clone();
        let load_kernel = kernels::lookup(&p.load_kernel_desc())?;
        let latency_kernel = match p.kind {
            BenchmarkKind::Throughput => None,
            _ => Some(kernels::lookup(&p.latency_kernel_desc())?),
        };

        let cpus = ctx.topology.cpus_in_node(p.cpu_node as usize).to_vec();
        if cpus.is_empty() {
            return Err(BenchError::Internal(format!(
                "CPU NUMA node {} has no CPUs",
                p.cpu_node
            )));
        }

        let total_len = p.working_set_per_thread * p.num_workers;
        let region = Region::alloc(total_len, p.mem_bind, p.large_pages)?;
        let views = region.split(p.num_workers)?;

        log::debug!("benchmark #{} ({}): starting {} iteration(s)", p.index, p.name, p.iterations);

        for iter in 0..p.iterations {
            for sampler in samplers.iter_mut() {
                if let Err(e) = sampler.start() {
                    log::warn!("power sampler {} failed to start: {}", sampler.name(), e);
                    self.warning = true;
                }
            }

            let seed = iteration_seed(p.index, iter);
            self.build_iteration_chains(&views, seed)?;

            let mut handles = Vec::with_capacity(views.len());
            for (w, view) in views.iter().enumerate() {
                let (kernel, mlp): (Kernel, u32) = match (latency_kernel, w) {
                    (Some(lat), 0) => (lat, 1),
                    _ => (load_kernel, p.mlp),
                };
                let cpu = cpus[w % cpus.len()];
                handles.push(
                    Worker::new(*view, kernel, mlp, Some(cpu), ctx.ticks_per_ms)
                        .with_duration_ms(p.duration_ms)
                        .start(),
                );
            }

            let records: Vec<WorkerRecord> = handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        log::warn!("a worker thread panicked; marking iteration suspect");
                        WorkerRecord {
                            warning: true,
                            ..WorkerRecord::default()
                        }
                    })
                })
                .collect();

            let mut power_samples = Vec::new();
            for sampler in samplers.iter_mut() {
                if let Err(e) = sampler.stop() {
                    log::warn!("power sampler {} failed to stop: {}", sampler.name(), e);
                    self.warning = true;
                } else {
                    power_samples.extend_from_slice(sampler.samples());
                }
            }

            let (metric, load_metric) = match p.kind {
                BenchmarkKind::Throughput => {
                    (aggregate_throughput(&records, ctx.ns_per_tick), None)
                }
                BenchmarkKind::UnloadedLatency => {
                    (latency_ns_per_access(&records[0], ctx.ns_per_tick), None)
                }
                BenchmarkKind::LoadedLatency => (
                    latency_ns_per_access(&records[0], ctx.ns_per_tick),
                    Some(aggregate_throughput(&records[1..], ctx.ns_per_tick)),
                ),
            };

            let warning = records.iter().any(|r| r.warning || !r.completed);
            self.warning |= warning;

            log::debug!(
                "benchmark #{} iteration {}: {:.3} {}{}",
                p.index,
                iter,
                metric,
                self.params.metric_units(),
                load_metric
                    .map(|m| format!(" under {:.3} MB/s of load", m))
                    .unwrap_or_default()
            );

            self.results.push(IterationResult {
                metric,
                load_metric,
                warning,
                power_samples,
            });
        }

        Ok(())
    }

    /// Rebuild the pointer chains every chasing worker needs this iteration.
    fn build_iteration_chains(
        &self,
        views: &[crate::platform::region::RegionView],
        seed: u64,
    ) -> Result<()> {
        let p = &self.params;
        let latency_bench = !matches!(p.kind, BenchmarkKind::Throughput);
        for (w, view) in views.iter().enumerate() {
            let slice = unsafe { std::slice::from_raw_parts_mut(view.ptr, view.len) };
            if latency_bench && w == 0 {
                build_chains(slice, std::mem::size_of::<usize>(), 1, seed)?;
            } else if p.pattern == Pattern::Random && p.delay == 0 {
                build_chains(slice, p.width.bytes(), p.mlp as usize, seed.wrapping_add(w as u64))?;
            }
        }
        Ok(())
    }
}

/// Aggregate MB/s across load workers: total bytes moved over the mean
/// adjusted time.
fn aggregate_throughput(records: &[WorkerRecord], ns_per_tick: f64) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let total_bytes: f64 = records
        .iter()
        .map(|r| (r.passes * r.bytes_per_pass as u64) as f64)
        .sum();
    let mean_adjusted: f64 =
        records.iter().map(|r| r.adjusted_ticks as f64).sum::<f64>() / records.len() as f64;
    let seconds = mean_adjusted * ns_per_tick / 1e9;
    if seconds <= 0.0 {
        return 0.0;
    }
    (total_bytes / MB) / seconds
}

/// Nanoseconds per dependent access for a chasing worker.
fn latency_ns_per_access(record: &WorkerRecord, ns_per_tick: f64) -> f64 {
    let accesses_per_pass = (record.bytes_per_pass / std::mem::size_of::<usize>()) as f64;
    let total_accesses = record.passes as f64 * accesses_per_pass;
    if total_accesses <= 0.0 {
        return 0.0;
    }
    record.adjusted_ticks as f64 * ns_per_tick / total_accesses
}
