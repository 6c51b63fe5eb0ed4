use crate::model::FeatureDescriptor;
use crate::profiler::{CounterKind, MemoryProbe, Phase, Profiler};
use crate::report::aggregator::MetricsAggregator;
use crate::report::csv_writer::NOT_AVAILABLE;

fn render(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.3}", v),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Human-facing run narration. Everything here is presentation only;
/// the CSV artifacts are written regardless of the silent flag.
pub struct ConsoleReporter {
    silent: bool,
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(silent: bool, verbose: bool) -> Self {
        ConsoleReporter { silent, verbose }
    }

    pub fn print_banner(&self, probe: &dyn MemoryProbe) {
        if self.silent {
            return;
        }
        if let Some(adapter) = probe.adapter_name() {
            println!("Adapter: {}", adapter);
        }
    }

    pub fn print_model_info(
        &self,
        name: &str,
        inputs: &[FeatureDescriptor],
        outputs: &[FeatureDescriptor],
    ) {
        if self.silent {
            return;
        }
        println!();
        println!("=================================================================");
        println!("Model: {}", name);
        for feature in inputs {
            println!("  input:  {}", feature.describe());
        }
        for feature in outputs {
            println!("  output: {}", feature.describe());
        }
        println!("=================================================================");
    }

    pub fn print_configuration(&self, aggregator: &MetricsAggregator) {
        if self.silent {
            return;
        }
        let label = aggregator.label();
        println!(
            "\nRunning on {} ({} binding, {} input)",
            label.device, label.input_binding, label.input_source
        );
    }

    pub fn print_iteration(&self, index: usize, preview: &str) {
        if self.silent || !self.verbose {
            return;
        }
        println!("  iteration {}: {}", index, preview);
    }

    pub fn print_results(&self, aggregator: &MetricsAggregator, profiler: &Profiler) {
        if self.silent {
            return;
        }
        println!("\nResults ({} iterations completed):", aggregator.completed());
        println!(
            "  Load model:     {} ms",
            render(profiler.average(Phase::LoadModel, CounterKind::Timer))
        );
        println!(
            "  Create session: {} ms",
            render(profiler.average(Phase::CreateSession, CounterKind::Timer))
        );
        println!(
            "  Bind value:     {} ms",
            render(profiler.average(Phase::BindValue, CounterKind::Timer))
        );
        println!(
            "  Evaluate:       {} ms",
            render(aggregator.evaluate_average(profiler, CounterKind::Timer))
        );
        println!(
            "  Working set delta:        {} MB",
            render(aggregator.evaluate_average(profiler, CounterKind::WorkingSetDelta))
        );
        println!(
            "  GPU shared memory delta:  {} MB",
            render(aggregator.evaluate_average(profiler, CounterKind::GpuSharedDelta))
        );
        println!(
            "  GPU dedicated mem delta:  {} MB",
            render(aggregator.evaluate_average(profiler, CounterKind::GpuDedicatedDelta))
        );
        println!("  GPU load:                 {}", NOT_AVAILABLE);
    }

    pub fn print_failure(&self, model: &str, detail: &str) {
        if self.silent {
            return;
        }
        eprintln!("{}: {}", model, detail);
    }
}
