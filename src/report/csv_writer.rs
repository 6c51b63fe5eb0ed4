use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;

use crate::error::Result;

/// Cell value for a metric that was not measured or not applicable.
pub const NOT_AVAILABLE: &str = "N/A";

/// Render an optional metric as a CSV cell.
pub fn cell(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Append-only CSV file that writes its header exactly once: on the
/// first append to an empty (or absent) file. The empty-check/append
/// sequence is serialized so concurrent workers sharing a report file
/// cannot both decide the file is new.
pub struct CsvAppender {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvAppender {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvAppender {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, header: &[String], row: &[String]) -> Result<()> {
        self.append_all(header, std::slice::from_ref(&row.to_vec()))
    }

    /// Append several rows under one lock acquisition.
    pub fn append_all(&self, header: &[String], rows: &[Vec<String>]) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poison| poison.into_inner());

        let is_new = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            debug!("writing header to new report file {}", self.path.display());
            writer.write_record(header)?;
        }
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// The three per-run report files. Each is independently optional:
/// an unset path makes the corresponding write a silent no-op.
#[derive(Default)]
pub struct ReportWriter {
    summary: Option<CsvAppender>,
    per_iteration: Option<CsvAppender>,
    raw_output: Option<CsvAppender>,
}

impl ReportWriter {
    pub fn new(
        summary: Option<PathBuf>,
        per_iteration: Option<PathBuf>,
        raw_output: Option<PathBuf>,
    ) -> Self {
        ReportWriter {
            summary: summary.map(CsvAppender::new),
            per_iteration: per_iteration.map(CsvAppender::new),
            raw_output: raw_output.map(CsvAppender::new),
        }
    }

    pub fn summary_path(&self) -> Option<&Path> {
        self.summary.as_ref().map(CsvAppender::path)
    }

    pub fn per_iteration_path(&self) -> Option<&Path> {
        self.per_iteration.as_ref().map(CsvAppender::path)
    }

    pub fn raw_output_path(&self) -> Option<&Path> {
        self.raw_output.as_ref().map(CsvAppender::path)
    }

    pub fn write_summary(&self, header: &[String], row: &[String]) -> Result<()> {
        match &self.summary {
            Some(appender) => appender.append(header, row),
            None => Ok(()), // output is opt-in per artifact
        }
    }

    pub fn write_per_iteration(&self, header: &[String], rows: &[Vec<String>]) -> Result<()> {
        match &self.per_iteration {
            Some(appender) => appender.append_all(header, rows),
            None => Ok(()),
        }
    }

    pub fn write_raw_output(&self, header: &[String], rows: &[Vec<String>]) -> Result<()> {
        match &self.raw_output {
            Some(appender) => appender.append_all(header, rows),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn header_written_once_across_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let header = strings(&["a", "b"]);

        // Three "process restarts": a fresh appender each time.
        for i in 0..3 {
            let appender = CsvAppender::new(&path);
            appender
                .append(&header, &strings(&[&i.to_string(), "x"]))
                .unwrap();
        }

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "a,b");
        assert_eq!(lines[1], "0,x");
        assert_eq!(lines[3], "2,x");
    }

    #[test]
    fn unset_path_writes_nothing() {
        let writer = ReportWriter::default();
        writer
            .write_summary(&strings(&["a"]), &strings(&["1"]))
            .unwrap();
        writer.write_per_iteration(&strings(&["a"]), &[]).unwrap();
    }

    #[test]
    fn na_cell_rendering() {
        assert_eq!(cell(None), "N/A");
        assert_eq!(cell(Some(1.5)), "1.5");
    }

    #[test]
    fn concurrent_appends_write_one_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.csv");
        let appender = std::sync::Arc::new(CsvAppender::new(&path));
        let header = strings(&["col"]);

        std::thread::scope(|scope| {
            for t in 0..8 {
                let appender = appender.clone();
                let header = header.clone();
                scope.spawn(move || {
                    appender.append(&header, &strings(&[&t.to_string()])).unwrap();
                });
            }
        });

        let contents = fs::read_to_string(&path).unwrap();
        let headers = contents.lines().filter(|l| *l == "col").count();
        assert_eq!(headers, 1);
        assert_eq!(contents.lines().count(), 9);
    }
}
