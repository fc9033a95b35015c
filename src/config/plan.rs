//! Benchmark plan enumeration.
//!
//! The plan is the cross product of every enabled axis, emitted in a fixed
//! order: memory node, then CPU node, then throughput benchmarks, then
//! latency benchmarks, then the delay extension. Numbering is handed out
//! by the runtime context in emission order, starting at the user's base
//! index.

use super::Options;
use crate::bench::{Benchmark, BenchmarkKind, BenchmarkParams};
use crate::context::RuntimeContext;
use crate::error::{BenchError, Result};
use crate::kernels::{self, ChunkWidth, KernelDesc, Pattern, RwMode, DELAY_VALUES};

/// Expand validated options into the ordered list of benchmarks to run.
pub fn build_plan(opts: &Options, ctx: &RuntimeContext) -> Result<Vec<Benchmark>> {
    let widths: Vec<ChunkWidth> = opts
        .chunk_bits
        .iter()
        .filter_map(|&bits| ChunkWidth::from_bits(bits))
        .filter(|&width| {
            if kernels::width_available(width) {
                true
            } else {
                log::warn!("{} chunks are not supported on this host; skipping", width);
                false
            }
        })
        .collect();
    if widths.is_empty() {
        return Err(BenchError::Config(
            "none of the selected chunk widths are supported on this host".to_string(),
        ));
    }

    let mut patterns = Vec::new();
    if opts.sequential {
        patterns.push(Pattern::Sequential);
    }
    if opts.random {
        patterns.push(Pattern::Random);
    }
    let mut modes = Vec::new();
    if opts.reads {
        modes.push(RwMode::Read);
    }
    if opts.writes {
        modes.push(RwMode::Write);
    }

    if opts.random && widths.contains(&ChunkWidth::W32) && std::mem::size_of::<usize>() == 8 {
        log::warn!(
            "random-access kernels do not support 32-bit chunks on a 64-bit host; \
             those combinations are omitted"
        );
    }

    let mem_bind_enabled = !opts.ignore_numa && ctx.topology.num_numa_nodes() > 1;
    let mut plan = Vec::new();

    for &mem_node in &opts.mem_nodes {
        for &cpu_node in &opts.cpu_nodes {
            let mem_bind = if mem_bind_enabled { Some(mem_node) } else { None };

            if opts.run_throughput {
                push_load_matrix(
                    &mut plan,
                    opts,
                    ctx,
                    BenchmarkKind::Throughput,
                    &patterns,
                    &modes,
                    &widths,
                    cpu_node,
                    mem_node,
                    mem_bind,
                );
            }

            if opts.run_latency {
                if opts.num_workers == 1 {
                    plan.push(unloaded_latency(opts, ctx, cpu_node, mem_node, mem_bind));
                } else {
                    push_load_matrix(
                        &mut plan,
                        opts,
                        ctx,
                        BenchmarkKind::LoadedLatency,
                        &patterns,
                        &modes,
                        &widths,
                        cpu_node,
                        mem_node,
                        mem_bind,
                    );
                }
            }

            if opts.run_delay_extension {
                push_delay_matrix(&mut plan, opts, ctx, &widths, cpu_node, mem_node, mem_bind);
            }
        }
    }

    if plan.is_empty() {
        return Err(BenchError::Config(
            "the selected options produce no benchmarks".to_string(),
        ));
    }
    Ok(plan)
}

#[allow(clippy::too_many_arguments)]
fn push_load_matrix(
    plan: &mut Vec<Benchmark>,
    opts: &Options,
    ctx: &RuntimeContext,
    kind: BenchmarkKind,
    patterns: &[Pattern],
    modes: &[RwMode],
    widths: &[ChunkWidth],
    cpu_node: u32,
    mem_node: u32,
    mem_bind: Option<u32>,
) {
    for &pattern in patterns {
        for &mode in modes {
            for &width in widths {
                match pattern {
                    Pattern::Sequential => {
                        for &stride in &opts.strides {
                            plan.push(make_benchmark(
                                opts, ctx, kind, pattern, mode, width, stride, opts.mlp, 0,
                                cpu_node, mem_node, mem_bind,
                            ));
                        }
                    }
                    Pattern::Random => {
                        let desc = KernelDesc::random(width, mode, opts.mlp);
                        if kernels::lookup(&desc).is_ok() {
                            plan.push(make_benchmark(
                                opts, ctx, kind, pattern, mode, width, 1, opts.mlp, 0, cpu_node,
                                mem_node, mem_bind,
                            ));
                        }
                    }
                }
            }
        }
    }
}

fn push_delay_matrix(
    plan: &mut Vec<Benchmark>,
    opts: &Options,
    ctx: &RuntimeContext,
    widths: &[ChunkWidth],
    cpu_node: u32,
    mem_node: u32,
    mem_bind: Option<u32>,
) {
    let delay_widths: Vec<ChunkWidth> = widths
        .iter()
        .copied()
        .filter(|w| matches!(w, ChunkWidth::W32 | ChunkWidth::W64))
        .collect();
    if delay_widths.is_empty() {
        log::warn!(
            "the delay-injected extension supports 32- and 64-bit chunks only; \
             none are selected, skipping"
        );
        return;
    }
    for &width in &delay_widths {
        for delay in std::iter::once(0).chain(DELAY_VALUES) {
            plan.push(make_benchmark(
                opts,
                ctx,
                BenchmarkKind::LoadedLatency,
                Pattern::Sequential,
                RwMode::Read,
                width,
                1,
                1,
                delay,
                cpu_node,
                mem_node,
                mem_bind,
            ));
        }
    }
}

fn unloaded_latency(
    opts: &Options,
    ctx: &RuntimeContext,
    cpu_node: u32,
    mem_node: u32,
    mem_bind: Option<u32>,
) -> Benchmark {
    make_benchmark(
        opts,
        ctx,
        BenchmarkKind::UnloadedLatency,
        Pattern::Random,
        RwMode::Read,
        ChunkWidth::native_word(),
        1,
        1,
        0,
        cpu_node,
        mem_node,
        mem_bind,
    )
}

#[allow(clippy::too_many_arguments)]
fn make_benchmark(
    opts: &Options,
    ctx: &RuntimeContext,
    kind: BenchmarkKind,
    pattern: Pattern,
    mode: RwMode,
    width: ChunkWidth,
    stride: i32,
    mlp: u32,
    delay: u32,
    cpu_node: u32,
    mem_node: u32,
    mem_bind: Option<u32>,
) -> Benchmark {
    let index = ctx.next_bench_index();
    let name = bench_name(kind, pattern, mode, width, stride, mlp, delay);
    Benchmark::new(BenchmarkParams {
        index,
        name,
        kind,
        pattern,
        mode,
        width,
        stride,
        mlp,
        delay,
        cpu_node,
        mem_node,
        mem_bind,
        num_workers: opts.num_workers,
        working_set_per_thread: opts.working_set_bytes(),
        iterations: opts.iterations,
        large_pages: opts.large_pages,
        duration_ms: opts.duration_ms,
    })
}

fn bench_name(
    kind: BenchmarkKind,
    pattern: Pattern,
    mode: RwMode,
    width: ChunkWidth,
    stride: i32,
    mlp: u32,
    delay: u32,
) -> String {
    let family = match kind {
        BenchmarkKind::Throughput => "throughput",
        BenchmarkKind::UnloadedLatency => return "unloaded latency".to_string(),
        BenchmarkKind::LoadedLatency => "loaded latency",
    };
    if delay > 0 {
        return format!("{}: delayed sequential read {} delay {}", family, width, delay);
    }
    match pattern {
        Pattern::Sequential => {
            format!("{}: sequential {} {} stride {:+}", family, mode, width, stride)
        }
        Pattern::Random => format!("{}: random {} {} mlp {}", family, mode, width, mlp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate;
    use crate::platform::{TimerCalibration, Topology};

    fn ctx_with(topology: Topology, base_index: u32) -> RuntimeContext {
        RuntimeContext::from_parts(
            TimerCalibration::from_ticks_per_ms(1_000_000),
            topology,
            false,
            base_index,
        )
    }

    fn plan_for(mut opts: Options, ctx: &RuntimeContext) -> Vec<Benchmark> {
        validate(&mut opts, &ctx.topology).unwrap();
        build_plan(&opts, ctx).unwrap()
    }

    #[test]
    fn test_latency_only_single_worker_is_one_benchmark() {
        let ctx = ctx_with(Topology::single_node(4), 1);
        let opts = Options {
            run_throughput: false,
            ..Options::default()
        };
        let plan = plan_for(opts, &ctx);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].params.kind, BenchmarkKind::UnloadedLatency);
        assert_eq!(plan[0].params.index, 1);
    }

    #[test]
    fn test_numa_cross_product_numbering() {
        let ctx = ctx_with(Topology::fabricated(2, 2), 1);
        let opts = Options {
            run_latency: false,
            writes: false,
            num_workers: 2,
            cpu_nodes: vec![0, 1],
            mem_nodes: vec![0, 1],
            ..Options::default()
        };
        let plan = plan_for(opts, &ctx);
        assert_eq!(plan.len(), 4);
        let indices: Vec<u32> = plan.iter().map(|b| b.params.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
        let combos: Vec<(u32, u32)> = plan
            .iter()
            .map(|b| (b.params.mem_node, b.params.cpu_node))
            .collect();
        assert_eq!(combos, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn test_single_worker_suppresses_loaded_latency() {
        let ctx = ctx_with(Topology::single_node(4), 1);
        let opts = Options {
            writes: false,
            ..Options::default()
        };
        let plan = plan_for(opts, &ctx);
        // One sequential read throughput benchmark plus one unloaded
        // latency benchmark; nothing loaded.
        assert_eq!(plan.len(), 2);
        assert!(plan
            .iter()
            .all(|b| b.params.kind != BenchmarkKind::LoadedLatency));
        assert!(plan
            .iter()
            .any(|b| b.params.kind == BenchmarkKind::UnloadedLatency));
    }

    #[test]
    fn test_multi_worker_latency_is_loaded() {
        let ctx = ctx_with(Topology::single_node(4), 1);
        let opts = Options {
            run_throughput: false,
            writes: false,
            num_workers: 4,
            ..Options::default()
        };
        let plan = plan_for(opts, &ctx);
        assert!(!plan.is_empty());
        assert!(plan
            .iter()
            .all(|b| b.params.kind == BenchmarkKind::LoadedLatency));
    }

    #[test]
    fn test_all_matrix_skips_random_32bit_on_64bit() {
        let ctx = ctx_with(Topology::single_node(4), 1);
        let mut opts = Options::default();
        opts.expand_all();
        let plan = plan_for(opts, &ctx);
        if std::mem::size_of::<usize>() == 8 {
            assert!(!plan.iter().any(|b| {
                b.params.pattern == Pattern::Random && b.params.width == ChunkWidth::W32
            }));
        }
        // Sequential benchmarks cover every selected stride.
        for &stride in &[1, -1, 2, -2, 4, -4, 8, -8, 16, -16] {
            assert!(plan.iter().any(|b| {
                b.params.pattern == Pattern::Sequential && b.params.stride == stride
            }));
        }
        assert!(plan.iter().all(|b| b.params.mlp == 1));
    }

    #[test]
    fn test_base_index_offsets_numbering() {
        let ctx = ctx_with(Topology::single_node(4), 100);
        let opts = Options {
            run_throughput: false,
            ..Options::default()
        };
        let plan = plan_for(opts, &ctx);
        assert_eq!(plan[0].params.index, 100);
    }

    #[test]
    fn test_delay_extension_enumerates_ladder() {
        let ctx = ctx_with(Topology::single_node(4), 1);
        let opts = Options {
            run_latency: false,
            run_throughput: false,
            run_delay_extension: true,
            num_workers: 2,
            ..Options::default()
        };
        let plan = plan_for(opts, &ctx);
        // Default chunk is the native 64-bit word: delays 0..=1024.
        assert_eq!(plan.len(), 1 + DELAY_VALUES.len());
        assert!(plan
            .iter()
            .all(|b| b.params.kind == BenchmarkKind::LoadedLatency));
        assert!(plan.iter().any(|b| b.params.delay == 1024));
    }
}
