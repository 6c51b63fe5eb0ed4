pub mod aggregator;
pub mod console;
pub mod csv_writer;

pub use aggregator::{ConfigurationLabel, IterationRecord, MetricsAggregator};
pub use console::ConsoleReporter;
pub use csv_writer::{CsvAppender, ReportWriter};
