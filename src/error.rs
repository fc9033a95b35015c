//! Unified error type for memprobe.
//!
//! Configuration errors abort the run before any benchmark executes.
//! Per-benchmark failures abort that benchmark and the driver continues
//! with the next. Soft per-worker failures (affinity, priority, sampler)
//! never surface here; they degrade to warnings on the result record.

use std::io;
use thiserror::Error;

/// Failure categories raised by the benchmark core.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("memory region allocation failed: {0}")]
    Alloc(String),

    #[error("pointer chain construction failed: {0}")]
    ChainBuild(String),

    #[error("no kernel available for {0}")]
    KernelUnavailable(String),

    #[error("internal invalid state: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Crate-wide result type for operations that may fail.
pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = BenchError::Config("working set size must be a multiple of 4 KiB".to_string());
        assert_eq!(
            err.to_string(),
            "invalid configuration: working set size must be a multiple of 4 KiB"
        );
    }

    #[test]
    fn test_kernel_unavailable_display() {
        let err = BenchError::KernelUnavailable("random 32-bit chunks on a 64-bit host".to_string());
        assert!(err.to_string().contains("no kernel available"));
    }

    #[test]
    fn test_io_error_converts() {
        fn fails() -> Result<()> {
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(BenchError::Io(_))));
    }
}
