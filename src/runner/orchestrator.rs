use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::binding::{build_tensor, GarbageGenerator, PixelBuffer, TensorSource};
use crate::error::{Error, Result};
use crate::profiler::{MemoryProbe, Phase, Profiler, Timer};
use crate::report::{ConfigurationLabel, ConsoleReporter, MetricsAggregator, ReportWriter};
use crate::runner::config::{InputSource, RunConfiguration, RunOptions};
use crate::runner::worker;
use crate::runtime::{ModelHandle, ModelRuntime, Session};

/// Input data read once per run and rebound on every iteration.
pub(crate) enum LoadedInput {
    Synthetic,
    Csv(Vec<String>),
    Image(PixelBuffer),
}

impl LoadedInput {
    pub(crate) fn load(source: &InputSource) -> Result<Self> {
        match source {
            InputSource::Synthetic => Ok(LoadedInput::Synthetic),
            InputSource::Csv { path } => {
                let mut reader = csv::ReaderBuilder::new()
                    .has_headers(false)
                    .from_path(path)?;
                let mut records = reader.records();
                let record = records
                    .next()
                    .ok_or_else(|| {
                        Error::Validation(format!("CSV input {} is empty", path.display()))
                    })??;
                Ok(LoadedInput::Csv(
                    record.iter().map(|cell| cell.to_string()).collect(),
                ))
            }
            InputSource::Image {
                path,
                format,
                height,
                width,
            } => {
                let bytes = fs::read(path)?;
                Ok(LoadedInput::Image(PixelBuffer::new(
                    *format, *height, *width, bytes,
                )?))
            }
        }
    }
}

fn bind_inputs<S: Session>(
    session: &mut S,
    features: &[crate::model::FeatureDescriptor],
    configuration: &RunConfiguration,
    input: &LoadedInput,
    generator: &mut GarbageGenerator,
    options: &RunOptions,
) -> Result<()> {
    for feature in features {
        let tensor = match input {
            LoadedInput::Synthetic => build_tensor(feature, TensorSource::Synthetic(generator))?,
            LoadedInput::Csv(row) => build_tensor(feature, TensorSource::Csv(row))?,
            LoadedInput::Image(pixels) => build_tensor(
                feature,
                TensorSource::Image {
                    pixels,
                    scale: options.image_scale.unwrap_or(1.0),
                    offsets: options.image_offsets.unwrap_or([0.0; 3]),
                },
            )?,
        };
        session.bind(&feature.name, tensor, configuration.binding_location)?;
    }
    Ok(())
}

/// Run one configuration end to end: load, create a session, then the
/// bind/evaluate loop, then the reports. Every caller gets its own
/// profiler and aggregator, so concurrent pipelines never share
/// mutable state except the report files.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_pipeline<R: ModelRuntime>(
    runtime: &R,
    model_path: &Path,
    configuration: &RunConfiguration,
    options: &RunOptions,
    input: &LoadedInput,
    probe: &dyn MemoryProbe,
    writer: &ReportWriter,
    reporter: &ConsoleReporter,
    announce_model: bool,
    seed_offset: u64,
) -> Result<usize> {
    let mut profiler = Profiler::new(probe);
    // An independent wall clock runs alongside the profiler's own
    // timers, so the reports can expose instrumentation overhead.
    let mut wall = Timer::new();

    wall.start();
    profiler.start(Phase::LoadModel)?;
    let model = match runtime.load(model_path) {
        Ok(model) => model,
        Err(e) => {
            profiler.cancel(Phase::LoadModel);
            return Err(e);
        }
    };
    profiler.stop(Phase::LoadModel)?;
    let wall_load_ms = wall.stop();

    if announce_model {
        reporter.print_model_info(model.name(), model.input_features(), model.output_features());
    }

    let label = ConfigurationLabel {
        model_name: model.name().to_string(),
        device: configuration.device.to_string(),
        input_binding: configuration.binding_location.to_string(),
        input_source: configuration.input.label(),
    };
    let mut aggregator = MetricsAggregator::new(label, options.ignore_first);
    aggregator.set_wall_load(wall_load_ms);
    reporter.print_configuration(&aggregator);

    profiler.start(Phase::CreateSession)?;
    let mut session = match runtime.create_session(&model, configuration.device) {
        Ok(session) => session,
        Err(e) => {
            profiler.cancel(Phase::CreateSession);
            return Err(e);
        }
    };
    profiler.stop(Phase::CreateSession)?;

    let seed = options.seed.unwrap_or(0).wrapping_add(seed_offset);
    let mut generator = match options.garbage_max_value {
        Some(max) => GarbageGenerator::with_max_value(seed, max),
        None => GarbageGenerator::new(seed),
    };

    // The budget clock starts when the first iteration finishes, so a
    // slow warm-up never reduces the run to a single sample by itself.
    let mut after_first: Option<Instant> = None;
    for index in 0..options.iterations {
        if let (Some(budget_ms), Some(mark)) = (options.time_budget_ms, after_first) {
            if mark.elapsed() >= Duration::from_millis(budget_ms) {
                info!(
                    "time budget of {} ms exhausted after {} iterations",
                    budget_ms, index
                );
                break;
            }
        }

        wall.start();
        profiler.start(Phase::BindValue)?;
        if let Err(e) = bind_inputs(
            &mut session,
            model.input_features(),
            configuration,
            input,
            &mut generator,
            options,
        ) {
            profiler.cancel(Phase::BindValue);
            aggregator.record_failure(index, &e.to_string());
            report(&aggregator, &profiler, writer, reporter)?;
            return Err(e);
        }
        profiler.stop(Phase::BindValue)?;
        aggregator.record_wall_bind(wall.stop());

        wall.start();
        profiler.start(Phase::EvalModel)?;
        match session.evaluate() {
            Ok(outputs) => {
                profiler.stop(Phase::EvalModel)?;
                aggregator.record_wall_eval(wall.stop());
                aggregator.record_success(index, &outputs);
                if let Some(record) = aggregator.iterations().last() {
                    reporter.print_iteration(index, &record.preview);
                }
            }
            Err(e) => {
                // A failed evaluation must not contribute a sample.
                profiler.cancel(Phase::EvalModel);
                aggregator.record_failure(index, &e.to_string());
                if e.is_configuration_fatal() {
                    warn!("abandoning configuration: {}", e);
                    break;
                }
            }
        }

        if index == 0 {
            after_first = Some(Instant::now());
        }
    }

    let completed = aggregator.completed();
    report(&aggregator, &profiler, writer, reporter)?;
    Ok(completed)
}

fn report(
    aggregator: &MetricsAggregator,
    profiler: &Profiler,
    writer: &ReportWriter,
    reporter: &ConsoleReporter,
) -> Result<()> {
    if !aggregator.any_attempted() {
        return Ok(());
    }
    writer.write_summary(
        &MetricsAggregator::summary_header(),
        &aggregator.summary_row(
            profiler,
            writer.per_iteration_path(),
            writer.raw_output_path(),
        ),
    )?;
    writer.write_per_iteration(
        &MetricsAggregator::per_iteration_header(),
        &aggregator.per_iteration_rows(profiler),
    )?;
    let (raw_header, raw_rows) = aggregator.raw_output_report();
    writer.write_raw_output(&raw_header, &raw_rows)?;
    reporter.print_results(aggregator, profiler);
    Ok(())
}

/// Drives a full benchmark run: expands the configuration matrix and
/// runs each cell, isolating failures so one broken configuration or
/// model never takes down the rest of the batch.
pub struct RunOrchestrator<'a, R: ModelRuntime> {
    runtime: &'a R,
    options: RunOptions,
    probe: &'a dyn MemoryProbe,
    writer: ReportWriter,
    reporter: ConsoleReporter,
}

impl<'a, R: ModelRuntime + Sync> RunOrchestrator<'a, R> {
    pub fn new(runtime: &'a R, options: RunOptions, probe: &'a dyn MemoryProbe) -> Result<Self> {
        options.validate()?;
        let writer = ReportWriter::new(
            options.summary_path.clone(),
            options.per_iteration_path.clone(),
            options.raw_output_path.clone(),
        );
        let reporter = ConsoleReporter::new(options.silent, options.verbose);
        Ok(RunOrchestrator {
            runtime,
            options,
            probe,
            writer,
            reporter,
        })
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Benchmark a single model file across the whole configuration
    /// matrix. Fails only when no configuration produced results.
    pub fn run_path(&self, model_path: &Path) -> Result<()> {
        self.reporter.print_banner(self.probe);
        let input = LoadedInput::load(&self.options.input)?;

        let mut successes = 0usize;
        let mut first_error: Option<Error> = None;
        for (index, configuration) in self.options.configurations().iter().enumerate() {
            let outcome = if self.options.threads > 1 {
                worker::run_concurrent(
                    self.runtime,
                    model_path,
                    configuration,
                    &self.options,
                    &input,
                    self.probe,
                    &self.writer,
                    &self.reporter,
                )
            } else {
                run_pipeline(
                    self.runtime,
                    model_path,
                    configuration,
                    &self.options,
                    &input,
                    self.probe,
                    &self.writer,
                    &self.reporter,
                    index == 0,
                    0,
                )
                .map(|_| ())
            };
            match outcome {
                Ok(()) => successes += 1,
                Err(e) => {
                    self.reporter
                        .print_failure(&model_path.display().to_string(), &e.to_string());
                    warn!(
                        "configuration {} on {} failed: {}",
                        configuration.device,
                        model_path.display(),
                        e
                    );
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match (successes, first_error) {
            (0, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }

    /// Benchmark every model file in a directory with the given
    /// extension. A model that fails is reported and skipped; the rest
    /// of the batch still runs.
    pub fn run_directory(&self, directory: &Path, extension: &str) -> Result<()> {
        let mut paths: Vec<PathBuf> = fs::read_dir(directory)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .map(|e| e.eq_ignore_ascii_case(extension))
                        .unwrap_or(false)
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(Error::Validation(format!(
                "no .{} models found in {}",
                extension,
                directory.display()
            )));
        }

        for path in &paths {
            if let Err(e) = self.run_path(path) {
                self.reporter
                    .print_failure(&path.display().to_string(), &e.to_string());
                warn!("model {} skipped: {}", path.display(), e);
            }
        }
        Ok(())
    }
}
