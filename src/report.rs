//! Result adapters: CSV emission and the console report.
//!
//! One CSV row per (benchmark, iteration) plus a summary row per
//! benchmark. The console report goes through the `log` facade: run-level
//! lines at `info`, configuration echo and per-iteration detail at
//! `debug` so `--verbose` turns them on.

use std::io;
use std::path::Path;

use serde::Serialize;

use crate::bench::{Benchmark, BenchmarkKind};
use crate::config::Options;
use crate::context::RuntimeContext;
use crate::error::Result;
use crate::kernels::{Pattern, RwMode};

#[derive(Serialize)]
struct CsvRow<'a> {
    benchmark: u32,
    name: &'a str,
    iteration: &'a str,
    cpu_node: u32,
    mem_node: u32,
    workers: usize,
    chunk_bits: u32,
    stride: i32,
    pattern: Pattern,
    mode: RwMode,
    mlp: u32,
    delay: u32,
    metric: f64,
    units: &'a str,
    load_metric: Option<f64>,
    warning: bool,
}

fn row<'a>(
    bench: &'a Benchmark,
    iteration: &'a str,
    metric: f64,
    load_metric: Option<f64>,
    warning: bool,
) -> CsvRow<'a> {
    let p = &bench.params;
    CsvRow {
        benchmark: p.index,
        name: &p.name,
        iteration,
        cpu_node: p.cpu_node,
        mem_node: p.mem_node,
        workers: p.num_workers,
        chunk_bits: p.width.bits(),
        stride: p.stride,
        pattern: p.pattern,
        mode: p.mode,
        mlp: p.mlp,
        delay: p.delay,
        metric,
        units: p.metric_units(),
        load_metric,
        warning,
    }
}

/// Write one row per iteration and a summary row per benchmark.
pub fn write_csv(path: &Path, benchmarks: &[Benchmark]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_to_io)?;
    for bench in benchmarks {
        if !bench.has_run() {
            continue;
        }
        for (i, result) in bench.iteration_results().iter().enumerate() {
            let iteration = i.to_string();
            writer
                .serialize(row(
                    bench,
                    &iteration,
                    result.metric,
                    result.load_metric,
                    result.warning,
                ))
                .map_err(csv_to_io)?;
        }
        writer
            .serialize(row(
                bench,
                "mean",
                bench.mean_metric(),
                bench.mean_load_metric(),
                bench.warning(),
            ))
            .map_err(csv_to_io)?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_to_io(e: csv::Error) -> crate::error::BenchError {
    crate::error::BenchError::Io(io::Error::other(e))
}

/// Pages the working set occupies, rounded up; mirrors what the original
/// tool printed next to the working set size.
pub fn pages_for_working_set(working_set: usize, page: usize) -> usize {
    if working_set <= page {
        1
    } else if working_set % page == 0 {
        working_set / page
    } else {
        working_set / page + 1
    }
}

/// Echo the effective configuration. Debug level, so only verbose runs
/// show it.
pub fn log_configuration(opts: &Options, ctx: &RuntimeContext) {
    let topo = &ctx.topology;
    log::debug!(
        "timer: {} ticks/ms, {:.4} ns/tick",
        ctx.ticks_per_ms,
        ctx.ns_per_tick
    );
    log::debug!(
        "topology: {} logical CPUs across {} NUMA node(s), page size {} B",
        topo.num_logical_cpus,
        topo.num_numa_nodes(),
        topo.page_size
    );
    let ws = opts.working_set_bytes();
    if opts.large_pages {
        let huge = topo.huge_page_size.unwrap_or(topo.page_size);
        log::debug!(
            "working set per thread: {} B == {} KiB (fits in {} large page(s))",
            ws,
            ws / 1024,
            pages_for_working_set(ws, huge)
        );
    } else {
        log::debug!(
            "working set per thread: {} B == {} KiB ({} page(s))",
            ws,
            ws / 1024,
            pages_for_working_set(ws, topo.page_size)
        );
    }
    log::debug!(
        "benchmark modes: latency={} throughput={} delay_extension={}",
        opts.run_latency,
        opts.run_throughput,
        opts.run_delay_extension
    );
    log::debug!(
        "axes: chunks={:?} strides={:?} mlp={} patterns[seq={} rand={}] modes[R={} W={}]",
        opts.chunk_bits,
        opts.strides,
        opts.mlp,
        opts.sequential,
        opts.random,
        opts.reads,
        opts.writes
    );
    log::debug!(
        "placement: cpu_nodes={:?} mem_nodes={:?} workers={} large_pages={}",
        opts.cpu_nodes,
        opts.mem_nodes,
        opts.num_workers,
        opts.large_pages
    );
}

/// Summarize one finished benchmark at info level.
pub fn report_benchmark(bench: &Benchmark) {
    let p = &bench.params;
    let flag = if bench.warning() { " [warning]" } else { "" };
    match p.kind {
        BenchmarkKind::LoadedLatency => {
            log::info!(
                "#{} {}: {:.3} {} under {:.3} MB/s load{}",
                p.index,
                p.name,
                bench.mean_metric(),
                p.metric_units(),
                bench.mean_load_metric().unwrap_or(0.0),
                flag
            );
        }
        _ => {
            log::info!(
                "#{} {}: {:.3} {}{}",
                p.index,
                p.name,
                bench.mean_metric(),
                p.metric_units(),
                flag
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_round_up() {
        let huge = 2 * 1024 * 1024;
        assert_eq!(pages_for_working_set(huge, huge), 1);
        assert_eq!(pages_for_working_set(huge / 2, huge), 1);
        assert_eq!(pages_for_working_set(3 * huge, huge), 3);
        assert_eq!(pages_for_working_set(3 * huge + 1, huge), 4);
        assert_eq!(pages_for_working_set(4096, 4096), 1);
        assert_eq!(pages_for_working_set(8192, 4096), 2);
    }
}
