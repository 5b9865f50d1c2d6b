//! Write-Ahead Log (WAL) for dose persistence.
//!
//! Dose events are appended to a JSONL (JSON Lines) file with file
//! locking to ensure safe concurrent access. Undo rewrites the file
//! atomically through a temp file in the same directory.

use crate::{DoseEvent, Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Dose sink trait for persisting dose events
pub trait DoseSink {
    fn append(&mut self, dose: &DoseEvent) -> Result<()>;
}

/// JSONL-based dose sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Sink appending to the WAL at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl DoseSink for JsonlSink {
    fn append(&mut self, dose: &DoseEvent) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(dose)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Appended dose {} to WAL", dose.id);
        Ok(())
    }
}

/// Read all dose events from a WAL file
pub fn read_doses(path: &Path) -> Result<Vec<DoseEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut doses = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<DoseEvent>(&line) {
            Ok(dose) => doses.push(dose),
            Err(e) => {
                // Skip damaged lines and keep reading
                tracing::warn!("Failed to parse dose at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} doses from WAL", doses.len());
    Ok(doses)
}

/// Remove the most recent dose from a WAL file
///
/// "Most recent" means the latest `occurred_at`, with the later line
/// winning a timestamp tie. The surviving lines go to a temp file in the
/// same directory, which is synced and then renamed over the original.
///
/// Unparseable lines are carried over untouched. Returns the removed
/// event, or `None` when the WAL is missing or holds no readable dose.
pub fn remove_latest_dose(path: &Path) -> Result<Option<DoseEvent>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)?;
    // Hold the exclusive lock across read and rewrite so appenders wait
    file.lock_exclusive()?;

    let mut lines = Vec::new();
    {
        let reader = BufReader::new(&file);
        for line_result in reader.lines() {
            lines.push(line_result?);
        }
    }

    let mut latest: Option<(usize, DoseEvent)> = None;
    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(dose) = serde_json::from_str::<DoseEvent>(line) {
            let newer = match &latest {
                Some((_, current)) => dose.occurred_at >= current.occurred_at,
                None => true,
            };
            if newer {
                latest = Some((idx, dose));
            }
        }
    }

    let (removed_idx, removed) = match latest {
        Some(found) => found,
        None => {
            file.unlock()?;
            return Ok(None);
        }
    };

    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "WAL path missing parent")
    })?;
    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        for (idx, line) in lines.iter().enumerate() {
            if idx == removed_idx || line.trim().is_empty() {
                continue;
            }
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    temp.as_file().sync_all()?;

    // Atomically replace the WAL, then release the old handle's lock
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    file.unlock()?;

    tracing::debug!("Removed dose {} from WAL", removed.id);
    Ok(Some(removed))
}
