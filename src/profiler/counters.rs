use std::fs;
use std::time::Instant;

use log::warn;
use strum_macros::{Display, EnumIter};

use crate::error::{Error, Result};

/// The counter kinds a measurement slot can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum CounterKind {
    /// Wall-clock duration of the bracket, milliseconds.
    Timer,
    /// Process working-set delta across the bracket, MB.
    WorkingSetDelta,
    /// Device shared-memory delta across the bracket, MB.
    GpuSharedDelta,
    /// Device dedicated-memory delta across the bracket, MB.
    GpuDedicatedDelta,
}

/// One completed start/stop bracket. Memory counters are `None` when
/// the underlying probe could not read them; that degrades the metric
/// to "N/A" and never aborts a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterSample {
    pub timer_ms: f64,
    pub working_set_start_mb: Option<f64>,
    pub working_set_delta_mb: Option<f64>,
    pub gpu_shared_start_mb: Option<f64>,
    pub gpu_shared_delta_mb: Option<f64>,
    pub gpu_dedicated_delta_mb: Option<f64>,
}

impl CounterSample {
    pub fn counter(&self, kind: CounterKind) -> Option<f64> {
        match kind {
            CounterKind::Timer => Some(self.timer_ms),
            CounterKind::WorkingSetDelta => self.working_set_delta_mb,
            CounterKind::GpuSharedDelta => self.gpu_shared_delta_mb,
            CounterKind::GpuDedicatedDelta => self.gpu_dedicated_delta_mb,
        }
    }
}

/// Wall-clock timer measuring the span between the last start/stop
/// pair, used to cross-check the profiler's own instrumentation.
#[derive(Debug, Default)]
pub struct Timer {
    started: Option<Instant>,
}

impl Timer {
    pub fn new() -> Self {
        Timer::default()
    }

    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Elapsed milliseconds since the matching `start`, 0 if never
    /// started.
    pub fn stop(&mut self) -> f64 {
        match self.started.take() {
            Some(at) => at.elapsed().as_secs_f64() * 1e3,
            None => 0.0,
        }
    }
}

/// Collaborator over the OS process and device memory counters.
/// Implementations report `CounterUnavailable` where a counter cannot
/// be read; callers degrade that sample to "N/A".
pub trait MemoryProbe: Send + Sync {
    fn working_set_mb(&self) -> Result<f64>;
    fn gpu_shared_mb(&self) -> Result<f64>;
    fn gpu_dedicated_mb(&self) -> Result<f64>;

    /// Name of the primary adapter, for the hardware banner.
    fn adapter_name(&self) -> Option<String> {
        None
    }
}

/// Read one counter, logging and degrading failures to `None`.
pub(crate) fn read_or_na(result: Result<f64>, what: &str) -> Option<f64> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("{} counter unavailable: {}", what, err);
            None
        }
    }
}

/// Probe backed by `/proc/self/status` (VmRSS). Device counters are not
/// available without an adapter-specific backend.
#[derive(Debug, Default)]
pub struct ProcStatusProbe;

impl MemoryProbe for ProcStatusProbe {
    fn working_set_mb(&self) -> Result<f64> {
        let status = fs::read_to_string("/proc/self/status")?;
        for line in status.lines() {
            if let Some(rest) = line.strip_prefix("VmRSS:") {
                let kb: f64 = rest
                    .trim()
                    .trim_end_matches("kB")
                    .trim()
                    .parse()
                    .map_err(|e| Error::CounterUnavailable(format!("VmRSS parse: {}", e)))?;
                return Ok(kb / 1024.0);
            }
        }
        Err(Error::CounterUnavailable(
            "VmRSS not present in /proc/self/status".to_string(),
        ))
    }

    fn gpu_shared_mb(&self) -> Result<f64> {
        Err(Error::CounterUnavailable(
            "no device adapter backend".to_string(),
        ))
    }

    fn gpu_dedicated_mb(&self) -> Result<f64> {
        Err(Error::CounterUnavailable(
            "no device adapter backend".to_string(),
        ))
    }
}

/// Probe that reports every counter as unavailable. Measurement
/// degrades to timers only.
#[derive(Debug, Default)]
pub struct NullProbe;

impl MemoryProbe for NullProbe {
    fn working_set_mb(&self) -> Result<f64> {
        Err(Error::CounterUnavailable("null probe".to_string()))
    }

    fn gpu_shared_mb(&self) -> Result<f64> {
        Err(Error::CounterUnavailable("null probe".to_string()))
    }

    fn gpu_dedicated_mb(&self) -> Result<f64> {
        Err(Error::CounterUnavailable("null probe".to_string()))
    }
}
