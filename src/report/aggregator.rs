use std::collections::BTreeSet;
use std::path::Path;

use crate::profiler::{CounterKind, Phase, Profiler};
use crate::report::csv_writer::{cell, NOT_AVAILABLE};
use crate::runtime::{EvalOutputs, OutputValue};

/// Identity of one benchmark configuration, repeated on every row the
/// configuration emits so rows from different runs can be appended to
/// the same file and still be told apart.
#[derive(Debug, Clone)]
pub struct ConfigurationLabel {
    pub model_name: String,
    pub device: String,
    pub input_binding: String,
    pub input_source: String,
}

impl ConfigurationLabel {
    fn cells(&self) -> Vec<String> {
        vec![
            self.model_name.clone(),
            self.device.clone(),
            self.input_binding.clone(),
            self.input_source.clone(),
        ]
    }
}

/// Outcome of a single evaluate call.
#[derive(Debug, Clone)]
pub struct IterationRecord {
    pub index: usize,
    pub success: bool,
    /// Human-readable summary of the outputs, empty on failure.
    pub preview: String,
    /// Stable hash of the output values, empty on failure.
    pub hash: String,
    /// Error description, empty on success.
    pub detail: String,
}

/// One output value buffered for the raw-output report.
struct RawOutput {
    iteration: usize,
    feature: String,
    value: OutputValue,
}

fn mean_of(values: &[f64], skip_first: bool) -> Option<f64> {
    let values = if skip_first && values.len() > 1 {
        &values[1..]
    } else {
        values
    };
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn file_cell(path: Option<&Path>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Collects per-iteration outcomes for one configuration and renders
/// the report rows from them together with the profiler's samples.
///
/// Wall-clock times are recorded separately from the profiler's own
/// timers, as a cross-check on the instrumentation overhead.
pub struct MetricsAggregator {
    label: ConfigurationLabel,
    ignore_first: bool,
    iterations: Vec<IterationRecord>,
    raw_outputs: Vec<RawOutput>,
    wall_load_ms: Option<f64>,
    wall_bind_ms: Vec<f64>,
    wall_eval_ms: Vec<f64>,
}

impl MetricsAggregator {
    pub fn new(label: ConfigurationLabel, ignore_first: bool) -> Self {
        MetricsAggregator {
            label,
            ignore_first,
            iterations: Vec::new(),
            raw_outputs: Vec::new(),
            wall_load_ms: None,
            wall_bind_ms: Vec::new(),
            wall_eval_ms: Vec::new(),
        }
    }

    pub fn label(&self) -> &ConfigurationLabel {
        &self.label
    }

    pub fn record_success(&mut self, index: usize, outputs: &EvalOutputs) {
        let mut names: Vec<&String> = outputs.keys().collect();
        names.sort();

        let preview = names
            .iter()
            .map(|name| format!("{}: {}", name, outputs[*name].preview()))
            .collect::<Vec<_>>()
            .join("; ");
        let hash = names
            .iter()
            .map(|name| format!("{:016x}", outputs[*name].content_hash()))
            .collect::<Vec<_>>()
            .join(";");

        for name in &names {
            self.raw_outputs.push(RawOutput {
                iteration: index,
                feature: (*name).clone(),
                value: outputs[*name].clone(),
            });
        }

        self.iterations.push(IterationRecord {
            index,
            success: true,
            preview,
            hash,
            detail: String::new(),
        });
    }

    pub fn record_failure(&mut self, index: usize, detail: &str) {
        self.iterations.push(IterationRecord {
            index,
            success: false,
            preview: String::new(),
            hash: String::new(),
            detail: detail.to_string(),
        });
    }

    pub fn set_wall_load(&mut self, ms: f64) {
        self.wall_load_ms = Some(ms);
    }

    pub fn record_wall_bind(&mut self, ms: f64) {
        self.wall_bind_ms.push(ms);
    }

    pub fn record_wall_eval(&mut self, ms: f64) {
        self.wall_eval_ms.push(ms);
    }

    pub fn iterations(&self) -> &[IterationRecord] {
        &self.iterations
    }

    pub fn completed(&self) -> usize {
        self.iterations.iter().filter(|r| r.success).count()
    }

    pub fn any_attempted(&self) -> bool {
        !self.iterations.is_empty()
    }

    /// Average over evaluate-phase samples of one counter, skipping the
    /// first sample when more than one exists and first-iteration
    /// warm-up costs are being excluded.
    pub fn evaluate_average(&self, profiler: &Profiler, kind: CounterKind) -> Option<f64> {
        let values: Vec<f64> = profiler[Phase::EvalModel]
            .samples()
            .iter()
            .filter_map(|sample| sample.counter(kind))
            .collect();
        mean_of(&values, self.ignore_first)
    }

    pub fn wall_eval_average(&self) -> Option<f64> {
        mean_of(&self.wall_eval_ms, self.ignore_first)
    }

    pub fn wall_bind_average(&self) -> Option<f64> {
        mean_of(&self.wall_bind_ms, false)
    }

    pub fn summary_header() -> Vec<String> {
        [
            "Model Name",
            "Device",
            "Input Binding",
            "Input Source",
            "Iterations",
            "Load Model (ms)",
            "Create Session (ms)",
            "Bind Value (ms)",
            "Evaluate (ms)",
            "Total (ms)",
            "Wall-Clock Load (ms)",
            "Wall-Clock Bind (ms)",
            "Wall-Clock Evaluate (ms)",
            "Wall-Clock Total (ms)",
            "Working Set Delta (MB)",
            "GPU Shared Memory Delta (MB)",
            "GPU Dedicated Memory Delta (MB)",
            "GPU Load (%)",
            "Per-Iteration File",
            "Raw Output File",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    pub fn summary_row(
        &self,
        profiler: &Profiler,
        per_iteration_file: Option<&Path>,
        raw_output_file: Option<&Path>,
    ) -> Vec<String> {
        let load = profiler.average(Phase::LoadModel, CounterKind::Timer);
        let session = profiler.average(Phase::CreateSession, CounterKind::Timer);
        let bind = profiler.average(Phase::BindValue, CounterKind::Timer);
        let eval = self.evaluate_average(profiler, CounterKind::Timer);
        let total = match (load, session, bind, eval) {
            (Some(l), Some(s), Some(b), Some(e)) => Some(l + s + b + e),
            _ => None,
        };
        let wall_bind = self.wall_bind_average();
        let wall_eval = self.wall_eval_average();
        let wall_total = match (self.wall_load_ms, wall_bind, wall_eval) {
            (Some(l), Some(b), Some(e)) => Some(l + b + e),
            _ => None,
        };

        let mut row = self.label.cells();
        row.push(self.completed().to_string());
        row.push(cell(load));
        row.push(cell(session));
        row.push(cell(bind));
        row.push(cell(eval));
        row.push(cell(total));
        row.push(cell(self.wall_load_ms));
        row.push(cell(wall_bind));
        row.push(cell(wall_eval));
        row.push(cell(wall_total));
        row.push(cell(self.evaluate_average(profiler, CounterKind::WorkingSetDelta)));
        row.push(cell(self.evaluate_average(profiler, CounterKind::GpuSharedDelta)));
        row.push(cell(self.evaluate_average(profiler, CounterKind::GpuDedicatedDelta)));
        // Per-engine utilization sampling is not portable; the column
        // is kept so existing consumers of the schema keep parsing.
        row.push(NOT_AVAILABLE.to_string());
        row.push(file_cell(per_iteration_file));
        row.push(file_cell(raw_output_file));
        row
    }

    pub fn per_iteration_header() -> Vec<String> {
        [
            "Model Name",
            "Device",
            "Input Binding",
            "Input Source",
            "Iteration",
            "Status",
            "Load Model (ms)",
            "Create Session (ms)",
            "Bind Value (ms)",
            "Evaluate (ms)",
            "Working Set Start (MB)",
            "Working Set Delta (MB)",
            "GPU Shared Memory Start (MB)",
            "GPU Shared Memory Delta (MB)",
            "GPU Dedicated Memory Delta (MB)",
            "Output Preview",
            "Output Hash",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// One row per attempted iteration. Load and session times were
    /// measured once for the configuration, so every row repeats them;
    /// bind and evaluate cells come from that iteration's own samples.
    pub fn per_iteration_rows(&self, profiler: &Profiler) -> Vec<Vec<String>> {
        let load = cell(profiler.average(Phase::LoadModel, CounterKind::Timer));
        let session = cell(profiler.average(Phase::CreateSession, CounterKind::Timer));
        let bind_samples = profiler[Phase::BindValue].samples();
        let eval_samples = profiler[Phase::EvalModel].samples();

        let mut successes_seen = 0;
        self.iterations
            .iter()
            .map(|record| {
                let mut row = self.label.cells();
                row.push(record.index.to_string());
                row.push(if record.success {
                    "OK".to_string()
                } else {
                    format!("FAILED: {}", record.detail)
                });
                row.push(load.clone());
                row.push(session.clone());
                // A bind sample exists for every iteration whose bind
                // bracket closed, in iteration order; evaluate samples
                // only for successful iterations, in success order.
                row.push(
                    bind_samples
                        .get(record.index)
                        .map(|s| cell(s.counter(CounterKind::Timer)))
                        .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                );
                let eval_sample = if record.success {
                    let sample = eval_samples.get(successes_seen);
                    successes_seen += 1;
                    sample
                } else {
                    None
                };
                match eval_sample {
                    Some(sample) => {
                        row.push(cell(sample.counter(CounterKind::Timer)));
                        row.push(cell(sample.working_set_start_mb));
                        row.push(cell(sample.counter(CounterKind::WorkingSetDelta)));
                        row.push(cell(sample.gpu_shared_start_mb));
                        row.push(cell(sample.counter(CounterKind::GpuSharedDelta)));
                        row.push(cell(sample.counter(CounterKind::GpuDedicatedDelta)));
                    }
                    None => {
                        for _ in 0..6 {
                            row.push(NOT_AVAILABLE.to_string());
                        }
                    }
                }
                row.push(record.preview.clone());
                row.push(record.hash.clone());
                row
            })
            .collect()
    }

    /// The raw-output schema is shaped by the configuration's own
    /// outputs: one `Result [i]` column per tensor element, and one
    /// column per map key (the union over every map that appeared),
    /// with `key;value` cells. Buffering per configuration is what
    /// makes the union computable before anything is written.
    pub fn raw_output_report(&self) -> (Vec<String>, Vec<Vec<String>>) {
        let mut max_elements = 0usize;
        let mut keys: BTreeSet<String> = BTreeSet::new();
        for raw in &self.raw_outputs {
            match &raw.value {
                OutputValue::Tensor(tensor) => {
                    max_elements = max_elements.max(tensor.element_count());
                }
                OutputValue::SequenceOfMaps(maps) => {
                    for map in maps {
                        keys.extend(map.keys().cloned());
                    }
                }
            }
        }

        let mut header: Vec<String> = [
            "Model Name",
            "Device",
            "Input Binding",
            "Input Source",
            "Iteration",
            "Feature",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        for i in 0..max_elements {
            header.push(format!("Result [{}]", i));
        }
        header.extend(keys.iter().cloned());

        let mut rows = Vec::new();
        for raw in &self.raw_outputs {
            let prefix = {
                let mut cells = self.label.cells();
                cells.push(raw.iteration.to_string());
                cells.push(raw.feature.clone());
                cells
            };
            match &raw.value {
                OutputValue::Tensor(tensor) => {
                    let mut row = prefix;
                    let elements = tensor.data.render_elements();
                    for i in 0..max_elements {
                        row.push(elements.get(i).cloned().unwrap_or_default());
                    }
                    row.extend(std::iter::repeat(String::new()).take(keys.len()));
                    rows.push(row);
                }
                OutputValue::SequenceOfMaps(maps) => {
                    // One row per map in the sequence.
                    for map in maps {
                        let mut row = prefix.clone();
                        row.extend(std::iter::repeat(String::new()).take(max_elements));
                        for key in &keys {
                            row.push(
                                map.get(key)
                                    .map(|value| format!("{};{}", key, value))
                                    .unwrap_or_default(),
                            );
                        }
                        rows.push(row);
                    }
                }
            }
        }
        (header, rows)
    }
}
