use std::path::Path;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use log::debug;

use crate::error::Result;
use crate::profiler::MemoryProbe;
use crate::report::{ConsoleReporter, ReportWriter};
use crate::runner::config::{RunConfiguration, RunOptions};
use crate::runner::orchestrator::{run_pipeline, LoadedInput};
use crate::runtime::ModelRuntime;

/// Run one configuration on several worker threads at once, for
/// throughput-style measurements. Every worker owns a complete
/// pipeline (model, session, profiler, aggregator) and appends its own
/// rows; the shared report files are the only point of contact, so
/// results merge by concatenation and nothing is averaged across
/// workers.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_concurrent<R: ModelRuntime + Sync>(
    runtime: &R,
    model_path: &Path,
    configuration: &RunConfiguration,
    options: &RunOptions,
    input: &LoadedInput,
    probe: &dyn MemoryProbe,
    writer: &ReportWriter,
    reporter: &ConsoleReporter,
) -> Result<()> {
    let threads = options.threads;
    let barrier = Barrier::new(threads);

    let outcomes: Vec<Result<usize>> = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(threads);
        for worker in 0..threads {
            let barrier = &barrier;
            handles.push(scope.spawn(move || {
                if options.thread_interval_ms > 0 {
                    thread::sleep(Duration::from_millis(
                        worker as u64 * options.thread_interval_ms,
                    ));
                }
                // All workers hit the runtime's model loader in the
                // same instant, the worst case for loader contention.
                if options.concurrent_load {
                    barrier.wait();
                }
                debug!("worker {} starting on {}", worker, configuration.device);
                run_pipeline(
                    runtime,
                    model_path,
                    configuration,
                    options,
                    input,
                    probe,
                    writer,
                    reporter,
                    worker == 0,
                    worker as u64,
                )
            }));
        }
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(outcome) => outcome,
                Err(_) => Err(crate::error::Error::Evaluation(
                    "worker thread panicked".to_string(),
                )),
            })
            .collect()
    });

    let mut first_error = None;
    let mut successes = 0usize;
    for outcome in outcomes {
        match outcome {
            Ok(_) => successes += 1,
            Err(e) => {
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
