//! A small JSON-backed reference runtime. It stands in for a real
//! inference engine in tests, benches and demos: models are JSON
//! descriptor files, evaluation is a deterministic reduction of the
//! bound inputs, optionally slowed down to simulate model cost.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::binding::{BoundTensor, TensorData};
use crate::error::{Error, Result};
use crate::model::{ElementKind, FeatureDescriptor};
use crate::runtime::{
    BindingLocation, Device, EvalOutputs, ModelHandle, ModelRuntime, OutputValue, Session,
};

/// One feature in a fixture model descriptor. Negative dimensions mark
/// free (dynamic) dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureFeature {
    pub name: String,
    pub element_kind: String,
    pub shape: Vec<i64>,
}

/// On-disk JSON shape of a fixture model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSpec {
    pub name: String,
    pub inputs: Vec<FixtureFeature>,
    pub outputs: Vec<FixtureFeature>,
    /// Artificial per-evaluation delay, to exercise time budgets.
    #[serde(default)]
    pub eval_delay_ms: u64,
}

impl FixtureSpec {
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Validation(format!("fixture serialize: {}", e)))?;
        fs::write(path, json)?;
        Ok(())
    }
}

fn parse_feature(raw: &FixtureFeature) -> Result<FeatureDescriptor> {
    let kind: ElementKind = raw
        .element_kind
        .parse()
        .map_err(|_| Error::Validation(format!("unknown element kind {:?}", raw.element_kind)))?;
    Ok(FeatureDescriptor::tensor(raw.name.clone(), kind, &raw.shape))
}

pub struct FixtureModel {
    name: String,
    inputs: Vec<FeatureDescriptor>,
    outputs: Vec<FeatureDescriptor>,
    eval_delay: Duration,
}

impl ModelHandle for FixtureModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_features(&self) -> &[FeatureDescriptor] {
        &self.inputs
    }

    fn output_features(&self) -> &[FeatureDescriptor] {
        &self.outputs
    }
}

pub struct FixtureSession {
    outputs: Vec<FeatureDescriptor>,
    bound: HashMap<String, BoundTensor>,
    eval_delay: Duration,
}

impl Session for FixtureSession {
    fn bind(&mut self, name: &str, tensor: BoundTensor, location: BindingLocation) -> Result<()> {
        debug!("fixture bind {} ({} elements) to {}", name, tensor.element_count(), location);
        self.bound.insert(name.to_string(), tensor);
        Ok(())
    }

    fn evaluate(&mut self) -> Result<EvalOutputs> {
        if self.bound.is_empty() {
            return Err(Error::Evaluation("no inputs bound".to_string()));
        }
        if !self.eval_delay.is_zero() {
            std::thread::sleep(self.eval_delay);
        }

        // Deterministic output: every element is the mean of all bound
        // input elements, so a given binding always hashes the same.
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for tensor in self.bound.values() {
            if let Some(values) = tensor.data.as_f64_values() {
                sum += values.iter().sum::<f64>();
                count += values.len();
            }
        }
        let mean = if count > 0 { sum / count as f64 } else { 0.0 };

        let mut results = EvalOutputs::new();
        for output in &self.outputs {
            let (_, shape) = output.bound_tensor_shape()?;
            let len: usize = shape.iter().product();
            let data: Vec<f32> = (0..len).map(|i| (mean + i as f64) as f32).collect();
            let tensor = BoundTensor::new(output.name.clone(), shape, TensorData::Float32(data))?;
            results.insert(output.name.clone(), OutputValue::Tensor(tensor));
        }
        Ok(results)
    }
}

/// Runtime that "loads" JSON fixture descriptors.
#[derive(Debug, Default)]
pub struct FixtureRuntime;

impl ModelRuntime for FixtureRuntime {
    type Model = FixtureModel;
    type Session = FixtureSession;

    fn load(&self, path: &Path) -> Result<Self::Model> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::ModelLoad(path.to_path_buf(), e.to_string()))?;
        let spec: FixtureSpec = serde_json::from_str(&text)
            .map_err(|e| Error::ModelLoad(path.to_path_buf(), e.to_string()))?;

        let inputs = spec
            .inputs
            .iter()
            .map(parse_feature)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| Error::ModelLoad(path.to_path_buf(), e.to_string()))?;
        let outputs = spec
            .outputs
            .iter()
            .map(parse_feature)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| Error::ModelLoad(path.to_path_buf(), e.to_string()))?;

        Ok(FixtureModel {
            name: spec.name,
            inputs,
            outputs,
            eval_delay: Duration::from_millis(spec.eval_delay_ms),
        })
    }

    fn create_session(&self, model: &Self::Model, device: Device) -> Result<Self::Session> {
        debug!("fixture session for {} on {}", model.name, device);
        Ok(FixtureSession {
            outputs: model.outputs.clone(),
            bound: HashMap::new(),
            eval_delay: model.eval_delay,
        })
    }
}
