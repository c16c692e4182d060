//! Dated archival report and its JSON file writer

use crate::core::{ArchiveError, Result, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Summary of one archival run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivalReport {
    pub date: NaiveDate,
    pub archived_user_count: usize,
    pub archived_user_ids: Vec<UserId>,
}

impl ArchivalReport {
    /// The count is always derived from the list.
    pub fn new(date: NaiveDate, archived_user_ids: Vec<UserId>) -> Self {
        Self {
            date,
            archived_user_count: archived_user_ids.len(),
            archived_user_ids,
        }
    }

    /// `YYYY-MM-DD.json`
    pub fn file_name(&self) -> String {
        format!("{}.json", self.date.format("%Y-%m-%d"))
    }

    /// Pretty JSON with 4-space indentation.
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        String::from_utf8(buf).map_err(|e| ArchiveError::Serialization(e.to_string()))
    }
}

/// Writes reports into a directory, one file per date.
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the report atomically and return its path. An existing report
    /// for the same date is replaced.
    pub fn write(&self, report: &ArchivalReport) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| ArchiveError::Io(format!("Failed to create report directory: {}", e)))?;

        let path = self.dir.join(report.file_name());
        let json = report.to_json()?;

        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| ArchiveError::Io(format!("Failed to create temp report: {}", e)))?;
        temp.write_all(json.as_bytes())
            .and_then(|_| temp.flush())
            .map_err(|e| ArchiveError::Io(format!("Failed to write report: {}", e)))?;
        temp.persist(&path)
            .map_err(|e| ArchiveError::Io(format!("Failed to save report: {}", e)))?;

        tracing::info!(
            path = %path.display(),
            archived = report.archived_user_count,
            "Report written"
        );
        Ok(path)
    }
}
