use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Flat, append-only log of the prompts sent to the AI (oldest first).
pub struct HistoryLog {
    path: PathBuf,
    session_entries: Vec<String>,
}

impl HistoryLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            session_entries: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Only real prompts are kept: no blanks and no slash commands.
    pub fn is_recordable(line: &str) -> bool {
        let trimmed = line.trim();
        !trimmed.is_empty() && !trimmed.starts_with('/')
    }

    /// Entries stored by earlier runs.
    pub fn load(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read history file {}", self.path.display()))?;

        let entries: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        debug!(count = entries.len(), path = %self.path.display(), "loaded history");
        Ok(entries)
    }

    /// Appends `line` to the log and to this session's entries.
    /// Returns `false` when the line is not worth recording.
    pub fn record(&mut self, line: &str) -> Result<bool> {
        if !Self::is_recordable(line) {
            return Ok(false);
        }

        // One entry per line in the file, so embedded newlines are flattened.
        let entry = line.trim().replace(['\r', '\n'], " ");
        self.session_entries.push(entry.clone());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create history directory {}", parent.display())
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open history file {}", self.path.display()))?;
        writeln!(file, "{entry}")
            .with_context(|| format!("Failed to append to history file {}", self.path.display()))?;

        Ok(true)
    }

    /// Prompts recorded during this run, oldest first.
    pub fn session_entries(&self) -> &[String] {
        &self.session_entries
    }
}
