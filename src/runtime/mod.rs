pub mod fixture;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::binding::BoundTensor;
use crate::error::Result;
use crate::model::FeatureDescriptor;

/// Compute device an evaluation session runs on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
pub enum Device {
    Cpu,
    Accelerator,
}

/// Where a bound input lives when the session consumes it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
pub enum BindingLocation {
    Host,
    Device,
}

/// One value a session evaluation produces.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    Tensor(BoundTensor),
    /// A sequence of maps, keys rendered to strings in a stable order.
    SequenceOfMaps(Vec<BTreeMap<String, f64>>),
}

impl OutputValue {
    /// Short rendering for the per-iteration report: argmax for float
    /// tensors, the winning key for a sequence of maps.
    pub fn preview(&self) -> String {
        match self {
            OutputValue::Tensor(tensor) => tensor.preview(),
            OutputValue::SequenceOfMaps(maps) => match maps.first() {
                Some(map) => match map
                    .iter()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                {
                    Some((key, value)) => format!("{} {}", key, value),
                    None => "<empty>".to_string(),
                },
                None => "<empty>".to_string(),
            },
        }
    }

    pub fn content_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        match self {
            OutputValue::Tensor(tensor) => tensor.content_hash(),
            OutputValue::SequenceOfMaps(maps) => {
                let mut hasher = DefaultHasher::new();
                for map in maps {
                    for (key, value) in map {
                        key.hash(&mut hasher);
                        value.to_bits().hash(&mut hasher);
                    }
                }
                hasher.finish()
            }
        }
    }
}

/// All outputs of one evaluation, keyed by feature name.
pub type EvalOutputs = HashMap<String, OutputValue>;

/// A loaded model: static feature metadata plus identity.
pub trait ModelHandle {
    fn name(&self) -> &str;
    fn input_features(&self) -> &[FeatureDescriptor];
    fn output_features(&self) -> &[FeatureDescriptor];
}

/// An evaluation session bound to one device. Inputs are handed over
/// one at a time; `evaluate` runs the model against whatever is bound.
pub trait Session {
    fn bind(&mut self, name: &str, tensor: BoundTensor, location: BindingLocation) -> Result<()>;
    fn evaluate(&mut self) -> Result<EvalOutputs>;
}

/// The opaque model-loading/evaluation runtime the harness drives.
pub trait ModelRuntime {
    type Model: ModelHandle;
    type Session: Session;

    fn load(&self, path: &Path) -> Result<Self::Model>;
    fn create_session(&self, model: &Self::Model, device: Device) -> Result<Self::Session>;
}
