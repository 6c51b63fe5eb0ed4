use std::ops::{Index, IndexMut};
use std::time::Instant;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::error::{Error, Result};
use crate::profiler::counters::{read_or_na, CounterKind, CounterSample, MemoryProbe};

/// The named phases of one benchmark configuration. Load and session
/// creation are measured once per configuration, bind and evaluate once
/// per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Phase {
    LoadModel,
    CreateSession,
    BindValue,
    EvalModel,
}

impl Phase {
    fn index(self) -> usize {
        self as usize
    }
}

/// Counter readings captured when a bracket opened.
#[derive(Debug, Clone, Copy)]
struct OpenBracket {
    started: Instant,
    working_set_mb: Option<f64>,
    gpu_shared_mb: Option<f64>,
    gpu_dedicated_mb: Option<f64>,
}

/// One named measurement slot accumulating per-invocation samples.
#[derive(Debug, Default)]
pub struct MeasurementSlot {
    in_flight: Option<OpenBracket>,
    samples: Vec<CounterSample>,
}

impl MeasurementSlot {
    pub fn samples(&self) -> &[CounterSample] {
        &self.samples
    }

    #[cfg(test)]
    pub(crate) fn samples_mut(&mut self) -> &mut Vec<CounterSample> {
        &mut self.samples
    }

    /// Arithmetic mean over all recorded samples of one counter kind.
    /// `None` when the slot has no samples or the counter was never
    /// available; a zero-count series must never average as zero.
    pub fn average(&self, kind: CounterKind) -> Option<f64> {
        let values: Vec<f64> = self
            .samples
            .iter()
            .filter_map(|s| s.counter(kind))
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }

    fn clear(&mut self) {
        self.in_flight = None;
        self.samples.clear();
    }
}

/// A fixed registry of measurement slots keyed by phase, reading the
/// process/device memory counters at each bracket edge. Reset between
/// run configurations so no sample bleeds across devices.
pub struct Profiler<'p> {
    probe: &'p dyn MemoryProbe,
    slots: [MeasurementSlot; 4],
}

impl<'p> Profiler<'p> {
    pub fn new(probe: &'p dyn MemoryProbe) -> Self {
        Profiler {
            probe,
            slots: Default::default(),
        }
    }

    /// Open a measurement bracket. Opening a slot that is already open
    /// is an imbalanced bracket.
    pub fn start(&mut self, phase: Phase) -> Result<()> {
        let probe = self.probe;
        let slot = &mut self.slots[phase.index()];
        if slot.in_flight.is_some() {
            return Err(Error::ImbalancedBracket(phase.to_string()));
        }
        slot.in_flight = Some(OpenBracket {
            started: Instant::now(),
            working_set_mb: read_or_na(probe.working_set_mb(), "working set"),
            gpu_shared_mb: read_or_na(probe.gpu_shared_mb(), "GPU shared"),
            gpu_dedicated_mb: read_or_na(probe.gpu_dedicated_mb(), "GPU dedicated"),
        });
        Ok(())
    }

    /// Close the bracket and record one sample. Stopping without a
    /// matching start is an imbalanced bracket.
    pub fn stop(&mut self, phase: Phase) -> Result<CounterSample> {
        let probe = self.probe;
        let slot = &mut self.slots[phase.index()];
        let open = slot
            .in_flight
            .take()
            .ok_or_else(|| Error::ImbalancedBracket(phase.to_string()))?;

        let delta = |start: Option<f64>, end: Option<f64>| match (start, end) {
            (Some(s), Some(e)) => Some(e - s),
            _ => None,
        };
        let sample = CounterSample {
            timer_ms: open.started.elapsed().as_secs_f64() * 1e3,
            working_set_start_mb: open.working_set_mb,
            working_set_delta_mb: delta(
                open.working_set_mb,
                read_or_na(probe.working_set_mb(), "working set"),
            ),
            gpu_shared_start_mb: open.gpu_shared_mb,
            gpu_shared_delta_mb: delta(
                open.gpu_shared_mb,
                read_or_na(probe.gpu_shared_mb(), "GPU shared"),
            ),
            gpu_dedicated_delta_mb: delta(
                open.gpu_dedicated_mb,
                read_or_na(probe.gpu_dedicated_mb(), "GPU dedicated"),
            ),
        };
        slot.samples.push(sample);
        Ok(sample)
    }

    /// Discard an open bracket without recording a sample, so a failed
    /// iteration does not pollute the averages.
    pub fn cancel(&mut self, phase: Phase) {
        self.slots[phase.index()].in_flight = None;
    }

    pub fn average(&self, phase: Phase, kind: CounterKind) -> Option<f64> {
        self.slots[phase.index()].average(kind)
    }

    /// Clear every slot's sample history. Must run between run
    /// configurations.
    pub fn reset(&mut self) {
        for phase in Phase::iter() {
            self.slots[phase.index()].clear();
        }
    }
}

impl Index<Phase> for Profiler<'_> {
    type Output = MeasurementSlot;

    fn index(&self, phase: Phase) -> &MeasurementSlot {
        &self.slots[phase.index()]
    }
}

impl IndexMut<Phase> for Profiler<'_> {
    fn index_mut(&mut self, phase: Phase) -> &mut MeasurementSlot {
        &mut self.slots[phase.index()]
    }
}
