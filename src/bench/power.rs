//! Power sampler seam.
//!
//! The driver treats samplers as opaque: start before an iteration, stop
//! after it, collect the samples. A failing sampler degrades the benchmark
//! to a warning, never an error. Platform samplers (RAPL and friends) plug
//! in behind this trait; the built-in sampler reports zero watts on a
//! fixed period and exists to exercise the wiring.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use serde::Serialize;

use crate::error::{BenchError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct PowerSample {
    pub at: DateTime<Utc>,
    pub watts: f64,
}

pub trait PowerSampler: Send {
    fn name(&self) -> &str;
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    /// Samples gathered between the last start/stop pair.
    fn samples(&self) -> &[PowerSample];
}

/// Sampler that measures nothing, on schedule.
pub struct NullSampler {
    interval: Duration,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<Vec<PowerSample>>>,
    samples: Vec<PowerSample>,
}

impl NullSampler {
    pub fn new(interval: Duration) -> Self {
        NullSampler {
            interval,
            stop_tx: None,
            handle: None,
            samples: Vec::new(),
        }
    }
}

impl PowerSampler for NullSampler {
    fn name(&self) -> &str {
        "null"
    }

    fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Err(BenchError::Internal(
                "power sampler started twice".to_string(),
            ));
        }
        self.samples.clear();
        let (tx, rx) = bounded::<()>(1);
        let interval = self.interval;
        self.stop_tx = Some(tx);
        self.handle = Some(thread::spawn(move || {
            let mut out = Vec::new();
            loop {
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => out.push(PowerSample {
                        at: Utc::now(),
                        watts: 0.0,
                    }),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            out
        }));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            self.samples = handle
                .join()
                .map_err(|_| BenchError::Internal("power sampler thread panicked".to_string()))?;
        }
        Ok(())
    }

    fn samples(&self) -> &[PowerSample] {
        &self.samples
    }
}
