//! Turns a complete result set into the experiment's output table.
//!
//! Writers replace the target file as a whole: rows are staged in a temporary
//! file next to the target and persisted over it only after a clean flush, so
//! a failed sweep never leaves a half-written table behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use pendulum_sweep_core::contract::{ResultSet, SimulationResult, ValidationError};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Result, SweepError};

pub const OUTPUT_COLUMNS: [&str; 8] = [
    "theta1_init",
    "theta2_init",
    "theta1",
    "theta2",
    "x1",
    "x2",
    "y1",
    "y2",
];

pub trait ResultSink {
    /// Writes every result and returns the number of rows written.
    fn write_results(&self, results: &ResultSet) -> Result<usize>;
    fn describe(&self) -> String;
}

/// One row of the output table, in column order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    pub theta1_init: f64,
    pub theta2_init: f64,
    pub theta1: f64,
    pub theta2: f64,
    pub x1: f64,
    pub x2: f64,
    pub y1: f64,
    pub y2: f64,
}

impl From<&SimulationResult> for OutputRow {
    fn from(result: &SimulationResult) -> Self {
        Self {
            theta1_init: result.theta1_init,
            theta2_init: result.theta2_init,
            theta1: result.theta1_final,
            theta2: result.theta2_final,
            x1: result.x1_final,
            x2: result.x2_final,
            y1: result.y1_final,
            y2: result.y2_final,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsvResultWriter {
    path: PathBuf,
}

impl CsvResultWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for CsvResultWriter {
    fn write_results(&self, results: &ResultSet) -> Result<usize> {
        ensure_complete(results)?;

        replace_file(&self.path, |file| {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file);
            writer.write_record(OUTPUT_COLUMNS)?;
            for result in results.results() {
                writer.serialize(OutputRow::from(result))?;
            }
            writer.flush()?;
            Ok(())
        })?;

        Ok(results.len())
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// Same rows as [`CsvResultWriter`], as a pretty-printed JSON array.
#[derive(Debug, Clone)]
pub struct JsonResultWriter {
    path: PathBuf,
}

impl JsonResultWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResultSink for JsonResultWriter {
    fn write_results(&self, results: &ResultSet) -> Result<usize> {
        ensure_complete(results)?;

        let rows: Vec<OutputRow> = results.results().iter().map(OutputRow::from).collect();
        replace_file(&self.path, |file| {
            serde_json::to_writer_pretty(&mut *file, &rows)?;
            file.write_all(b"\n")?;
            Ok(())
        })?;

        Ok(rows.len())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

pub fn read_results_csv(path: &Path) -> Result<Vec<OutputRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    if headers.iter().ne(OUTPUT_COLUMNS) {
        return Err(ValidationError::new(format!(
            "unexpected results header in {}: {}",
            path.display(),
            headers.iter().collect::<Vec<_>>().join(",")
        ))
        .into());
    }

    reader
        .deserialize()
        .map(|row| row.map_err(SweepError::from))
        .collect()
}

fn ensure_complete(results: &ResultSet) -> Result<()> {
    if results.is_complete() {
        Ok(())
    } else {
        Err(SweepError::incomplete(
            results.expected(),
            results.len(),
            "result set size does not match the request",
        ))
    }
}

fn replace_file<F>(target: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> Result<()>,
{
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut staged = NamedTempFile::new_in(dir)?;
    write(staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    staged
        .persist(target)
        .map_err(|error| SweepError::Io(error.error))?;
    Ok(())
}
