//! Append-mode CSV result writing.
//!
//! Result files accumulate across invocations, so sweeps can be resumed
//! and parallel parameter scans can share a directory. The header row is
//! written exactly when the file is empty at open time; every later open
//! just appends rows.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::common::Error;

/// CSV writer that appends to its file and emits the header at most once.
#[derive(Debug)]
pub struct CsvAppender {
    file: std::fs::File,
    path: PathBuf,
    delimiter: char,
}

impl CsvAppender {
    /// Opens `path` for appending with the given `header` columns, writing
    /// the header only when the file is empty.
    pub fn open(path: &Path, delimiter: char, header: &[&str]) -> Result<CsvAppender, Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = CsvAppender {
            file,
            path: path.to_owned(),
            delimiter,
        };
        if writer.file.metadata()?.len() == 0 {
            let row: Vec<String> = header.iter().map(|s| (*s).to_owned()).collect();
            writer.write_row(&row)?;
        }
        Ok(writer)
    }

    /// Appends one row of already-formatted fields.
    pub fn write_row(&mut self, fields: &[String]) -> Result<(), Error> {
        let mut line = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                line.push(self.delimiter);
            }
            line.push_str(field);
        }
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Flushes buffered rows to disk.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.file.flush()?;
        Ok(())
    }

    /// Path this writer appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Formats a float for a CSV cell without trailing noise.
pub fn fmt_f64(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value:.6}")
    }
}
