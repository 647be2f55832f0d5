// SPDX-License-Identifier: MIT

//! Log Tail Store (spec §4.H): an append-only per-team log file with
//! bounded tail reads. No rotation.

use crate::error::StorageError;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

/// The HTTP layer caps requested line counts at this value (spec §4.F
/// `GET /api/team/logs?lines=N`).
pub const MAX_TAIL_LINES: usize = 2000;

pub struct LogTailStore {
    home_dir: PathBuf,
}

impl LogTailStore {
    pub fn new(home_dir: PathBuf) -> Self {
        Self { home_dir }
    }

    fn path(&self, team: &str) -> PathBuf {
        self.home_dir.join("logs").join(format!("{team}.log"))
    }

    pub fn append(&self, team: &str, line: &str) -> Result<(), StorageError> {
        let path = self.path(team);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Return the last `n` lines, capped at [`MAX_TAIL_LINES`].
    pub fn tail(&self, team: &str, n: usize) -> Result<Vec<String>, StorageError> {
        let n = n.min(MAX_TAIL_LINES);
        let path = self.path(team);
        let file = match std::fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let reader = BufReader::new(file);
        // Simple and correct for a file that's at most a few MB: a resident
        // orchestrator's cycle log doesn't need streaming tail logic.
        let mut all_lines: Vec<String> = Vec::new();
        for line in reader.lines() {
            all_lines.push(line?);
        }
        let start = all_lines.len().saturating_sub(n);
        Ok(all_lines.split_off(start))
    }
}

#[cfg(test)]
#[path = "log_tail_tests.rs"]
mod tests;
