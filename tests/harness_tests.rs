use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use infer_bench::runtime::fixture::{FixtureFeature, FixtureRuntime, FixtureSpec};
use infer_bench::{
    BindingLocation, BoundTensor, Device, Error, EvalOutputs, FeatureDescriptor, InputSource,
    ModelHandle, ModelRuntime, NullProbe, OutputValue, ProcStatusProbe, RunOptions,
    RunOrchestrator, Session, TensorData,
};

fn fixture_spec(name: &str, eval_delay_ms: u64) -> FixtureSpec {
    FixtureSpec {
        name: name.to_string(),
        inputs: vec![FixtureFeature {
            name: "data".to_string(),
            element_kind: "Float32".to_string(),
            shape: vec![-1, 3, 2, 2],
        }],
        outputs: vec![FixtureFeature {
            name: "scores".to_string(),
            element_kind: "Float32".to_string(),
            shape: vec![1, 4],
        }],
        eval_delay_ms,
    }
}

fn write_model(dir: &Path, file: &str, spec: &FixtureSpec) -> PathBuf {
    let path = dir.join(file);
    spec.write_to(&path).unwrap();
    path
}

struct Reports {
    summary: PathBuf,
    per_iteration: PathBuf,
    raw: PathBuf,
}

fn report_options(dir: &Path) -> (RunOptions, Reports) {
    let reports = Reports {
        summary: dir.join("summary.csv"),
        per_iteration: dir.join("iterations.csv"),
        raw: dir.join("raw.csv"),
    };
    let options = RunOptions {
        summary_path: Some(reports.summary.clone()),
        per_iteration_path: Some(reports.per_iteration.clone()),
        raw_output_path: Some(reports.raw.clone()),
        silent: true,
        ..Default::default()
    };
    (options, reports)
}

fn read_rows(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader
        .headers()
        .unwrap()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(|s| s.to_string()).collect())
        .collect();
    (header, rows)
}

fn column(header: &[String], name: &str) -> usize {
    header
        .iter()
        .position(|h| h == name)
        .unwrap_or_else(|| panic!("missing column {:?}", name))
}

#[test]
fn synthetic_run_writes_all_three_reports() {
    let dir = TempDir::new().unwrap();
    let model = write_model(dir.path(), "model.json", &fixture_spec("net", 0));
    let (mut options, reports) = report_options(dir.path());
    options.iterations = 3;

    let probe = ProcStatusProbe;
    let orchestrator = RunOrchestrator::new(&FixtureRuntime, options, &probe).unwrap();
    orchestrator.run_path(&model).unwrap();

    let (header, rows) = read_rows(&reports.summary);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][column(&header, "Model Name")], "net");
    assert_eq!(rows[0][column(&header, "Iterations")], "3");
    assert_eq!(rows[0][column(&header, "GPU Load (%)")], "N/A");
    // Free leading dimension binds as batch size 1: never a failure.
    assert_ne!(rows[0][column(&header, "Evaluate (ms)")], "N/A");
    // The wall clock is measured independently of the profiler.
    let wall_eval: f64 = rows[0][column(&header, "Wall-Clock Evaluate (ms)")]
        .parse()
        .unwrap();
    assert!(wall_eval > 0.0);
    assert_ne!(rows[0][column(&header, "Wall-Clock Load (ms)")], "N/A");
    assert_ne!(rows[0][column(&header, "Wall-Clock Total (ms)")], "N/A");
    // The summary row points at the sibling report files.
    assert_eq!(
        rows[0][column(&header, "Per-Iteration File")],
        reports.per_iteration.display().to_string()
    );
    assert_eq!(
        rows[0][column(&header, "Raw Output File")],
        reports.raw.display().to_string()
    );

    let (iter_header, iteration_rows) = read_rows(&reports.per_iteration);
    assert_eq!(iteration_rows.len(), 3);
    // The probe reads VmRSS, so the start column carries a real value.
    let ws_start: f64 = iteration_rows[0][column(&iter_header, "Working Set Start (MB)")]
        .parse()
        .unwrap();
    assert!(ws_start > 0.0);
    assert_eq!(
        iteration_rows[0][column(&iter_header, "GPU Shared Memory Start (MB)")],
        "N/A"
    );

    let (raw_header, raw_rows) = read_rows(&reports.raw);
    assert_eq!(raw_rows.len(), 3);
    assert_eq!(raw_rows[0][column(&raw_header, "Feature")], "scores");
    // The fixture output has 4 elements: one column each.
    let result_columns: Vec<&String> = raw_header
        .iter()
        .filter(|h| h.starts_with("Result ["))
        .collect();
    assert_eq!(result_columns.len(), 4);
    assert!(!raw_rows[0][column(&raw_header, "Result [3]")].is_empty());
}

#[test]
fn summary_header_written_once_across_separate_runs() {
    let dir = TempDir::new().unwrap();
    let model = write_model(dir.path(), "model.json", &fixture_spec("net", 0));
    let (options, reports) = report_options(dir.path());

    let probe = NullProbe;
    for _ in 0..3 {
        // A fresh orchestrator per run, as separate invocations would be.
        let orchestrator = RunOrchestrator::new(&FixtureRuntime, options.clone(), &probe).unwrap();
        orchestrator.run_path(&model).unwrap();
    }

    let text = fs::read_to_string(&reports.summary).unwrap();
    let headers = text.lines().filter(|l| l.starts_with("Model Name")).count();
    assert_eq!(headers, 1);
    assert_eq!(text.lines().count(), 4);
}

#[test]
fn device_matrix_produces_one_summary_row_per_cell() {
    let dir = TempDir::new().unwrap();
    let model = write_model(dir.path(), "model.json", &fixture_spec("net", 0));
    let (mut options, reports) = report_options(dir.path());
    options.devices = vec![Device::Cpu, Device::Accelerator];
    options.binding_locations = vec![BindingLocation::Host, BindingLocation::Device];

    let probe = NullProbe;
    RunOrchestrator::new(&FixtureRuntime, options, &probe)
        .unwrap()
        .run_path(&model)
        .unwrap();

    let (header, rows) = read_rows(&reports.summary);
    assert_eq!(rows.len(), 4);
    let devices: Vec<&str> = rows
        .iter()
        .map(|r| r[column(&header, "Device")].as_str())
        .collect();
    assert_eq!(devices, vec!["Cpu", "Cpu", "Accelerator", "Accelerator"]);
}

#[test]
fn time_budget_caps_iteration_count() {
    let dir = TempDir::new().unwrap();
    let model = write_model(dir.path(), "slow.json", &fixture_spec("slow", 5));
    let (mut options, reports) = report_options(dir.path());
    options.iterations = 1000;
    options.time_budget_ms = Some(25);

    let probe = NullProbe;
    RunOrchestrator::new(&FixtureRuntime, options, &probe)
        .unwrap()
        .run_path(&model)
        .unwrap();

    let (header, rows) = read_rows(&reports.summary);
    let completed: usize = rows[0][column(&header, "Iterations")].parse().unwrap();
    assert!(completed >= 1, "the first iteration always runs");
    assert!(
        completed < 1000,
        "budget must stop the loop early, completed {}",
        completed
    );
}

#[test]
fn ignore_first_still_reports_every_iteration_row() {
    let dir = TempDir::new().unwrap();
    let model = write_model(dir.path(), "model.json", &fixture_spec("net", 0));
    let (mut options, reports) = report_options(dir.path());
    options.iterations = 5;
    options.ignore_first = true;

    let probe = NullProbe;
    RunOrchestrator::new(&FixtureRuntime, options, &probe)
        .unwrap()
        .run_path(&model)
        .unwrap();

    let (_, iteration_rows) = read_rows(&reports.per_iteration);
    assert_eq!(iteration_rows.len(), 5);
    let (header, rows) = read_rows(&reports.summary);
    assert_eq!(rows[0][column(&header, "Iterations")], "5");
}

#[test]
fn directory_batch_isolates_a_failing_model() {
    let dir = TempDir::new().unwrap();
    let models = dir.path().join("models");
    fs::create_dir(&models).unwrap();
    write_model(&models, "a_good.json", &fixture_spec("good-model", 0));
    fs::write(models.join("b_broken.json"), "{ not json").unwrap();

    let (options, reports) = report_options(dir.path());
    let probe = NullProbe;
    RunOrchestrator::new(&FixtureRuntime, options, &probe)
        .unwrap()
        .run_directory(&models, "json")
        .unwrap();

    let (header, rows) = read_rows(&reports.summary);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][column(&header, "Model Name")], "good-model");
}

#[test]
fn empty_model_directory_is_an_error() {
    let dir = TempDir::new().unwrap();
    let (options, _) = report_options(dir.path());
    let probe = NullProbe;
    let orchestrator = RunOrchestrator::new(&FixtureRuntime, options, &probe).unwrap();
    assert!(matches!(
        orchestrator.run_directory(dir.path(), "json"),
        Err(Error::Validation(_))
    ));
}

#[test]
fn csv_input_with_wrong_arity_fails_the_configuration() {
    let dir = TempDir::new().unwrap();
    let model = write_model(dir.path(), "model.json", &fixture_spec("net", 0));
    let csv_path = dir.path().join("input.csv");
    // The model input takes 12 elements; hand it 3.
    fs::write(&csv_path, "1,2,3\n").unwrap();

    let (mut options, _) = report_options(dir.path());
    options.input = InputSource::Csv { path: csv_path };

    let probe = NullProbe;
    let orchestrator = RunOrchestrator::new(&FixtureRuntime, options, &probe).unwrap();
    assert!(matches!(
        orchestrator.run_path(&model),
        Err(Error::SizeMismatch { .. })
    ));
}

#[test]
fn csv_input_with_garbage_cell_is_a_validation_error() {
    let dir = TempDir::new().unwrap();
    let model = write_model(dir.path(), "model.json", &fixture_spec("net", 0));
    let csv_path = dir.path().join("input.csv");
    fs::write(&csv_path, "1,2,3,4,5,6,7,8,9,10,11,oops\n").unwrap();

    let (mut options, _) = report_options(dir.path());
    options.input = InputSource::Csv { path: csv_path };

    let probe = NullProbe;
    let orchestrator = RunOrchestrator::new(&FixtureRuntime, options, &probe).unwrap();
    assert!(matches!(
        orchestrator.run_path(&model),
        Err(Error::Validation(_))
    ));
}

#[test]
fn csv_input_drives_deterministic_output_hashes() {
    let dir = TempDir::new().unwrap();
    let model = write_model(dir.path(), "model.json", &fixture_spec("net", 0));
    let csv_path = dir.path().join("input.csv");
    fs::write(&csv_path, "1,2,3,4,5,6,7,8,9,10,11,12\n").unwrap();

    let (mut options, reports) = report_options(dir.path());
    options.iterations = 2;
    options.input = InputSource::Csv { path: csv_path };

    let probe = NullProbe;
    RunOrchestrator::new(&FixtureRuntime, options, &probe)
        .unwrap()
        .run_path(&model)
        .unwrap();

    let (header, rows) = read_rows(&reports.per_iteration);
    let hash_column = column(&header, "Output Hash");
    assert_eq!(rows.len(), 2);
    assert!(!rows[0][hash_column].is_empty());
    // Same input, same model: the outputs must hash identically.
    assert_eq!(rows[0][hash_column], rows[1][hash_column]);
}

#[test]
fn summary_average_matches_per_iteration_samples() {
    let dir = TempDir::new().unwrap();
    let model = write_model(dir.path(), "model.json", &fixture_spec("net", 1));
    let (mut options, reports) = report_options(dir.path());
    options.iterations = 4;

    let probe = NullProbe;
    RunOrchestrator::new(&FixtureRuntime, options, &probe)
        .unwrap()
        .run_path(&model)
        .unwrap();

    let (iter_header, iteration_rows) = read_rows(&reports.per_iteration);
    let eval_column = column(&iter_header, "Evaluate (ms)");
    let samples: Vec<f64> = iteration_rows
        .iter()
        .map(|row| row[eval_column].parse().unwrap())
        .collect();

    let (header, rows) = read_rows(&reports.summary);
    let reported: f64 = rows[0][column(&header, "Evaluate (ms)")].parse().unwrap();
    let expected = statistical::mean(&samples);
    assert!(
        (reported - expected).abs() < 1e-9,
        "summary {} vs samples {}",
        reported,
        expected
    );
}

#[test]
fn concurrent_workers_concatenate_their_rows() {
    let dir = TempDir::new().unwrap();
    let model = write_model(dir.path(), "model.json", &fixture_spec("net", 0));
    let (mut options, reports) = report_options(dir.path());
    options.threads = 3;
    options.iterations = 2;
    options.concurrent_load = true;

    let probe = NullProbe;
    RunOrchestrator::new(&FixtureRuntime, options, &probe)
        .unwrap()
        .run_path(&model)
        .unwrap();

    let (_, summary_rows) = read_rows(&reports.summary);
    assert_eq!(summary_rows.len(), 3, "one summary row per worker");
    let (_, iteration_rows) = read_rows(&reports.per_iteration);
    assert_eq!(iteration_rows.len(), 6);
}

// A runtime whose sessions drop the device after a fixed number of
// evaluations, for exercising mid-run failure handling.
struct FlakyRuntime {
    fail_after: usize,
}

struct FlakyModel {
    inputs: Vec<FeatureDescriptor>,
    outputs: Vec<FeatureDescriptor>,
}

impl ModelHandle for FlakyModel {
    fn name(&self) -> &str {
        "flaky"
    }
    fn input_features(&self) -> &[FeatureDescriptor] {
        &self.inputs
    }
    fn output_features(&self) -> &[FeatureDescriptor] {
        &self.outputs
    }
}

struct FlakySession {
    evaluations: usize,
    fail_after: usize,
}

impl Session for FlakySession {
    fn bind(&mut self, _: &str, _: BoundTensor, _: BindingLocation) -> Result<(), Error> {
        Ok(())
    }

    fn evaluate(&mut self) -> Result<EvalOutputs, Error> {
        let n = self.evaluations;
        self.evaluations += 1;
        if n >= self.fail_after {
            return Err(Error::DeviceLost("adapter reset".to_string()));
        }
        let tensor = BoundTensor::new(
            "out".to_string(),
            vec![1],
            TensorData::Float32(vec![1.0]),
        )?;
        let mut outputs = EvalOutputs::new();
        outputs.insert("out".to_string(), OutputValue::Tensor(tensor));
        Ok(outputs)
    }
}

impl ModelRuntime for FlakyRuntime {
    type Model = FlakyModel;
    type Session = FlakySession;

    fn load(&self, _: &Path) -> Result<Self::Model, Error> {
        Ok(FlakyModel {
            inputs: vec![FeatureDescriptor::tensor(
                "in",
                infer_bench::ElementKind::Float32,
                &[1, 4],
            )],
            outputs: vec![FeatureDescriptor::tensor(
                "out",
                infer_bench::ElementKind::Float32,
                &[1],
            )],
        })
    }

    fn create_session(&self, _: &Self::Model, _: Device) -> Result<Self::Session, Error> {
        Ok(FlakySession {
            evaluations: 0,
            fail_after: self.fail_after,
        })
    }
}

#[test]
fn device_loss_abandons_the_configuration_but_still_reports() {
    let dir = TempDir::new().unwrap();
    let (mut options, reports) = report_options(dir.path());
    options.iterations = 10;

    let runtime = FlakyRuntime { fail_after: 3 };
    let probe = NullProbe;
    RunOrchestrator::new(&runtime, options, &probe)
        .unwrap()
        .run_path(Path::new("ignored"))
        .unwrap();

    let (header, rows) = read_rows(&reports.summary);
    assert_eq!(rows.len(), 1);
    // Three evaluations completed before the device went away.
    assert_eq!(rows[0][column(&header, "Iterations")], "3");

    let (iter_header, iteration_rows) = read_rows(&reports.per_iteration);
    assert_eq!(iteration_rows.len(), 4);
    let status = column(&iter_header, "Status");
    assert_eq!(iteration_rows[2][status], "OK");
    assert!(iteration_rows[3][status].starts_with("FAILED:"));
    // The aborted iteration contributes no evaluate sample.
    assert_eq!(iteration_rows[3][column(&iter_header, "Evaluate (ms)")], "N/A");
}

#[test]
fn device_loss_on_the_first_evaluation_still_reports() {
    let dir = TempDir::new().unwrap();
    let (options, _) = report_options(dir.path());

    // Fails on the very first evaluation in every configuration.
    let runtime = FlakyRuntime { fail_after: 0 };
    let probe = NullProbe;
    let orchestrator = RunOrchestrator::new(&runtime, options, &probe).unwrap();
    // Device loss with zero completed iterations still reports a row
    // and the run is considered attempted, not errored.
    orchestrator.run_path(Path::new("ignored")).unwrap();
}
