use clap::Parser;

use memprobe::bench::power::PowerSampler;
use memprobe::cli::Cli;
use memprobe::{config, logging, report, BenchError, RuntimeContext};

const EXIT_ARG_ERROR: i32 = -1;
const EXIT_INTERNAL: i32 = -2;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    std::process::exit(match run(cli) {
        Ok(true) => 0,
        Ok(false) => {
            log::error!("no benchmark produced a valid result");
            EXIT_ARG_ERROR
        }
        Err(err) => {
            log::error!("{}", err);
            match err {
                BenchError::Internal(_) => EXIT_INTERNAL,
                _ => EXIT_ARG_ERROR,
            }
        }
    });
}

fn run(cli: Cli) -> memprobe::Result<bool> {
    let mut opts = cli.into_options()?;

    log::info!("memprobe {}", memprobe::VERSION);
    log::info!("calibrating timer and probing topology...");
    let ctx = RuntimeContext::initialize(opts.verbose, opts.base_index);

    config::validate(&mut opts, &ctx.topology)?;
    report::log_configuration(&opts, &ctx);

    let mut plan = config::build_plan(&opts, &ctx)?;
    log::info!("running {} benchmark(s)", plan.len());

    // Platform power samplers would be constructed here and handed to
    // every benchmark; none ship by default.
    let mut samplers: Vec<Box<dyn PowerSampler>> = Vec::new();

    let mut succeeded = 0usize;
    for bench in plan.iter_mut() {
        match bench.run(&ctx, &mut samplers) {
            Ok(()) => {
                report::report_benchmark(bench);
                succeeded += 1;
            }
            Err(err) => {
                log::error!("benchmark #{} failed: {}", bench.params.index, err);
            }
        }
    }

    if let Some(path) = opts.output_file.clone() {
        report::write_csv(&path, &plan)?;
        log::info!("wrote CSV results to {}", path.display());
    }

    Ok(succeeded > 0)
}
