use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use dropwatch_core::ProbeOutcome;
use tempfile::NamedTempFile;
use thiserror::Error;
use watch_logging::watch_warn;

/// Fixed column set of the durable run log.
pub const LOG_COLUMNS: [&str; 10] = [
    "timestamp",
    "target_label",
    "rank",
    "identifier",
    "status",
    "label_text",
    "style_class",
    "action_target",
    "elapsed_ms",
    "note",
];

#[derive(Debug, Error)]
pub enum RunLogError {
    #[error("log directory missing or not writable: {0}")]
    LogDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Append-only run log.
///
/// One instance owns the file for the duration of a run; records are written
/// in probe order, one per call, never batched or reordered.
pub struct RunLog {
    path: PathBuf,
    target_label: String,
}

impl RunLog {
    /// Opens the log for one run: creates parent directories and the header
    /// when absent, and migrates a historical header when present.
    pub fn open(
        path: impl Into<PathBuf>,
        target_label: impl Into<String>,
    ) -> Result<Self, RunLogError> {
        let log = Self {
            path: path.into(),
            target_label: target_label.into(),
        };
        log.ensure_schema()?;
        // Migration is best effort; appends proceed against the existing
        // file when it fails.
        if let Err(err) = log.normalize_schema() {
            watch_warn!("run log normalization failed for {:?}: {}", log.path, err);
        }
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends exactly one record, flushed to disk before returning.
    pub fn append(&mut self, outcome: &ProbeOutcome) -> Result<(), RunLogError> {
        let fields = [
            Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            self.target_label.clone(),
            outcome.candidate.rank.to_string(),
            outcome.candidate.identifier.clone(),
            outcome.status.as_str().to_string(),
            outcome.label.clone(),
            outcome.style_class.clone(),
            outcome.action_target.clone(),
            format!("{:.1}", outcome.elapsed_ms),
            outcome.note.clone(),
        ];
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        file.write_all(encode_row(&fields).as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    fn ensure_schema(&self) -> Result<(), RunLogError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| RunLogError::LogDir(e.to_string()))?;
            }
        }
        if !self.path.exists() {
            let mut file = File::create(&self.path)?;
            file.write_all(encode_row(&LOG_COLUMNS).as_bytes())?;
            file.sync_data()?;
        }
        Ok(())
    }

    /// Rewrites a log created under an older schema: the header is replaced
    /// and every data row is padded or truncated to the current column
    /// count, preserving all prior rows. The swap goes through a sibling
    /// temp file so readers never observe a partial rewrite.
    fn normalize_schema(&self) -> Result<(), RunLogError> {
        let content = fs::read_to_string(&self.path)?;
        let mut lines = content.lines();
        let Some(header) = lines.next() else {
            return Ok(());
        };
        if split_row(header) == LOG_COLUMNS {
            return Ok(());
        }

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(encode_row(&LOG_COLUMNS).as_bytes())?;
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let mut fields = split_row(line);
            fields.resize(LOG_COLUMNS.len(), String::new());
            tmp.write_all(encode_row(&fields).as_bytes())?;
        }
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&self.path).map_err(|e| RunLogError::Io(e.error))?;
        Ok(())
    }
}

fn encode_row<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = String::new();
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            line.push(',');
        }
        encode_field(field.as_ref(), &mut line);
    }
    line.push('\n');
    line
}

fn encode_field(field: &str, out: &mut String) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        if quoted {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            } else {
                field.push(ch);
            }
        } else {
            match ch {
                '"' => quoted = true,
                ',' => fields.push(std::mem::take(&mut field)),
                _ => field.push(ch),
            }
        }
    }
    fields.push(field);
    fields
}
