//! Stderr logging backend for the `log` facade.
//!
//! All console output from the core goes through `log::info!` and friends;
//! this logger routes it to stderr with a level tag. Verbose mode widens
//! the filter to `Debug`, which is where per-iteration detail lives.

use log::{Level, LevelFilter, Log, Metadata, Record};

struct StderrLogger {
    level: LevelFilter,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match record.level() {
            Level::Info => eprintln!("{}", record.args()),
            level => eprintln!("[{}] {}", level, record.args()),
        }
    }

    fn flush(&self) {}
}

/// Register the stderr logger as the global `log` backend.
///
/// Safe to call more than once; subsequent calls are no-ops because the
/// facade only accepts one logger per process.
pub fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if log::set_boxed_logger(Box::new(StderrLogger { level })).is_ok() {
        log::set_max_level(level);
    }
}
