pub mod binding;
pub mod error;
pub mod model;
pub mod profiler;
pub mod report;
pub mod runner;
pub mod runtime;

// Re-export commonly used types
pub use binding::{build_tensor, BoundTensor, GarbageGenerator, PixelBuffer, PixelFormat, TensorData, TensorSource};
pub use error::{Error, Result};
pub use model::{Dimension, ElementKind, FeatureDescriptor, FeatureKind};
pub use profiler::{CounterKind, MemoryProbe, NullProbe, Phase, ProcStatusProbe, Profiler};
pub use report::{ConfigurationLabel, ConsoleReporter, MetricsAggregator, ReportWriter};
pub use runner::{InputSource, RunConfiguration, RunOptions, RunOrchestrator};
pub use runtime::{BindingLocation, Device, EvalOutputs, ModelHandle, ModelRuntime, OutputValue, Session};
