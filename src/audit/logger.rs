//! Append-only audit log file
//!
//! Provides the JsonlSink that writes audit records to a log file.
//! Each record is written as a single JSON line and flushed immediately.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{AuditError, AuditResult};

use super::entry::AuditRecord;
use super::sink::AuditSink;

/// Writes audit records to a line-delimited JSON file (JSONL)
///
/// Each line is a complete JSON object representing one audit record.
#[derive(Debug)]
pub struct JsonlSink {
    /// Path to the audit log file
    log_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlSink {
    /// Create a sink that appends to the specified path
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            log_path,
            write_lock: Mutex::new(()),
        }
    }

    /// Append one record
    ///
    /// Each write is flushed immediately to ensure durability.
    pub fn log(&self, record: &AuditRecord) -> AuditResult<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| AuditError::Json(format!("Failed to serialize audit record: {}", e)))?;

        let _guard = self.write_lock.lock();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| AuditError::Io(format!("Failed to open audit log: {}", e)))?;

        writeln!(file, "{}", json)
            .map_err(|e| AuditError::Io(format!("Failed to write audit record: {}", e)))?;

        file.flush()
            .map_err(|e| AuditError::Io(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }

    /// Read all audit records from the log file
    ///
    /// Returns records in the order they were written (oldest first).
    pub fn read_all(&self) -> AuditResult<Vec<AuditRecord>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| AuditError::Io(format!("Failed to open audit log: {}", e)))?;

        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                AuditError::Io(format!("Failed to read audit log line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let record: AuditRecord = serde_json::from_str(&line).map_err(|e| {
                AuditError::Json(format!(
                    "Failed to parse audit record at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            records.push(record);
        }

        Ok(records)
    }

    /// Read the most recent N records from the log
    pub fn read_recent(&self, count: usize) -> AuditResult<Vec<AuditRecord>> {
        let mut records = self.read_all()?;
        let start = records.len().saturating_sub(count);
        Ok(records.split_off(start))
    }

    /// Get the number of records in the audit log
    pub fn entry_count(&self) -> AuditResult<usize> {
        if !self.log_path.exists() {
            return Ok(0);
        }

        let file = File::open(&self.log_path)
            .map_err(|e| AuditError::Io(format!("Failed to open audit log: {}", e)))?;

        let reader = BufReader::new(file);
        let count = reader
            .lines()
            .map_while(Result::ok)
            .filter(|l| !l.trim().is_empty())
            .count();

        Ok(count)
    }

    /// Check if the audit log file exists
    pub fn exists(&self) -> bool {
        self.log_path.exists()
    }

    /// Get the path to the audit log file
    pub fn path(&self) -> &Path {
        &self.log_path
    }
}

impl AuditSink for JsonlSink {
    fn emit(&self, record: &AuditRecord) -> AuditResult<()> {
        self.log(record)
    }
}
