use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::binding::PixelFormat;
use crate::error::{Error, Result};
use crate::runtime::{BindingLocation, Device};

/// Where input feature values come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputSource {
    /// Fill every bindable input with generated garbage data.
    Synthetic,
    /// One CSV file, one value column per element of the input tensor.
    Csv { path: PathBuf },
    /// Raw pixel data to be de-interleaved and normalized into a
    /// planar tensor before binding.
    Image {
        path: PathBuf,
        format: PixelFormat,
        height: usize,
        width: usize,
    },
}

impl InputSource {
    pub fn label(&self) -> String {
        match self {
            InputSource::Synthetic => "Synthetic".to_string(),
            InputSource::Csv { path } => format!("CSV: {}", path.display()),
            InputSource::Image { path, .. } => format!("Image: {}", path.display()),
        }
    }
}

fn default_iterations() -> usize {
    1
}

fn default_devices() -> Vec<Device> {
    vec![Device::Cpu]
}

fn default_binding_locations() -> Vec<BindingLocation> {
    vec![BindingLocation::Host]
}

fn default_threads() -> usize {
    1
}

fn default_input() -> InputSource {
    InputSource::Synthetic
}

/// Everything one harness invocation needs, loadable from a JSON file.
/// Devices and binding locations are lists; the run expands them into
/// a configuration per combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunOptions {
    #[serde(default = "default_devices")]
    pub devices: Vec<Device>,
    #[serde(default = "default_binding_locations")]
    pub binding_locations: Vec<BindingLocation>,
    #[serde(default = "default_input")]
    pub input: InputSource,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Exclude the first evaluation from averages when more than one
    /// iteration ran; the first one pays one-time warm-up costs.
    #[serde(default)]
    pub ignore_first: bool,
    /// Stop starting new iterations once the cumulative evaluation
    /// time after the first iteration exceeds this budget.
    #[serde(default)]
    pub time_budget_ms: Option<u64>,
    #[serde(default)]
    pub summary_path: Option<PathBuf>,
    #[serde(default)]
    pub per_iteration_path: Option<PathBuf>,
    #[serde(default)]
    pub raw_output_path: Option<PathBuf>,
    #[serde(default)]
    pub silent: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Delay between worker thread launches, in milliseconds.
    #[serde(default)]
    pub thread_interval_ms: u64,
    /// Make every worker load its own model copy at the same instant
    /// instead of reusing one loaded upfront.
    #[serde(default)]
    pub concurrent_load: bool,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Upper bound for generated integer garbage values.
    #[serde(default)]
    pub garbage_max_value: Option<u32>,
    /// Divisor applied to image channel values after the offset is
    /// subtracted.
    #[serde(default)]
    pub image_scale: Option<f32>,
    /// Per-channel (R, G, B) offsets subtracted before scaling.
    #[serde(default)]
    pub image_offsets: Option<[f32; 3]>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            devices: default_devices(),
            binding_locations: default_binding_locations(),
            input: default_input(),
            iterations: default_iterations(),
            ignore_first: false,
            time_budget_ms: None,
            summary_path: None,
            per_iteration_path: None,
            raw_output_path: None,
            silent: false,
            verbose: false,
            threads: default_threads(),
            thread_interval_ms: 0,
            concurrent_load: false,
            seed: None,
            garbage_max_value: None,
            image_scale: None,
            image_offsets: None,
        }
    }
}

impl RunOptions {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let options: RunOptions = serde_json::from_str(&text)
            .map_err(|e| Error::Validation(format!("invalid options file {}: {}", path.display(), e)))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::Validation("iterations must be at least 1".into()));
        }
        if self.threads == 0 {
            return Err(Error::Validation("threads must be at least 1".into()));
        }
        if self.devices.is_empty() {
            return Err(Error::Validation("at least one device is required".into()));
        }
        if self.binding_locations.is_empty() {
            return Err(Error::Validation(
                "at least one binding location is required".into(),
            ));
        }
        if let Some(scale) = self.image_scale {
            if scale == 0.0 {
                return Err(Error::Validation("image scale must be non-zero".into()));
            }
        }
        if self.threads > 1 && self.time_budget_ms.is_some() {
            return Err(Error::Validation(
                "a time budget cannot be combined with concurrent workers".into(),
            ));
        }
        Ok(())
    }

    /// Expand the device and binding-location lists into the full
    /// matrix of configurations, in declaration order.
    pub fn configurations(&self) -> Vec<RunConfiguration> {
        let mut configurations = Vec::new();
        for &device in &self.devices {
            for &binding_location in &self.binding_locations {
                configurations.push(RunConfiguration {
                    device,
                    binding_location,
                    input: self.input.clone(),
                });
            }
        }
        configurations
    }
}

/// One cell of the expanded run matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfiguration {
    pub device: Device,
    pub binding_location: BindingLocation,
    pub input: InputSource,
}
