pub mod counters;
pub mod slots;

pub use counters::{CounterKind, CounterSample, MemoryProbe, NullProbe, ProcStatusProbe, Timer};
pub use slots::{MeasurementSlot, Phase, Profiler};
