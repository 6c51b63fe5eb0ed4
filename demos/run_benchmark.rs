//! End-to-end demo: generate a fixture model, benchmark it on the CPU
//! with synthetic inputs, and print where the reports landed.
//!
//!     cargo run --example run_benchmark

use anyhow::Result;

use infer_bench::runtime::fixture::{FixtureFeature, FixtureRuntime, FixtureSpec};
use infer_bench::{ProcStatusProbe, RunOptions, RunOrchestrator};

fn main() -> Result<()> {
    env_logger::init();

    let dir = tempfile::tempdir()?;
    let model_path = dir.path().join("squeezenet-fixture.json");
    FixtureSpec {
        name: "squeezenet-fixture".to_string(),
        inputs: vec![FixtureFeature {
            name: "data".to_string(),
            element_kind: "Float32".to_string(),
            shape: vec![-1, 3, 224, 224],
        }],
        outputs: vec![FixtureFeature {
            name: "scores".to_string(),
            element_kind: "Float32".to_string(),
            shape: vec![1, 1000],
        }],
        eval_delay_ms: 2,
    }
    .write_to(&model_path)?;

    let options = RunOptions {
        iterations: 25,
        ignore_first: true,
        summary_path: Some("summary.csv".into()),
        per_iteration_path: Some("per_iteration.csv".into()),
        seed: Some(42),
        ..Default::default()
    };

    let probe = ProcStatusProbe;
    let runtime = FixtureRuntime;
    let orchestrator = RunOrchestrator::new(&runtime, options, &probe)?;
    orchestrator.run_path(&model_path)?;

    println!("\nSummary appended to summary.csv, per-iteration rows to per_iteration.csv");
    Ok(())
}
