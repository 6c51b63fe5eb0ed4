pub mod config;
pub mod orchestrator;
mod worker;

pub use config::{InputSource, RunConfiguration, RunOptions};
pub use orchestrator::RunOrchestrator;
