//! WAL-to-CSV archival.
//!
//! The append-only WAL is the write-hot path; rollup batches its doses
//! into the long-term CSV archive and retires the WAL file.

use crate::{DoseEvent, Result};
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV archive
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    beverage_id: Option<String>,
    amount_mg: f64,
    occurred_at: String,
    note: Option<String>,
}

impl From<&DoseEvent> for CsvRow {
    fn from(dose: &DoseEvent) -> Self {
        CsvRow {
            id: dose.id.to_string(),
            beverage_id: dose.beverage_id.clone(),
            amount_mg: dose.amount_mg,
            occurred_at: dose.occurred_at.to_rfc3339(),
            note: dose.note.clone(),
        }
    }
}

/// Roll the WAL's doses into the CSV archive and retire the WAL
///
/// The CSV is flushed and synced before the WAL is renamed to
/// `.wal.processed`, so an interrupted rollup leaves the WAL in place
/// for a retry. A retry may append the same rows again; history loading
/// collapses duplicates by id. Returns the number of doses archived.
pub fn wal_to_csv_and_archive(wal_path: &Path, csv_path: &Path) -> Result<usize> {
    let doses = crate::wal::read_doses(wal_path)?;
    if doses.is_empty() {
        tracing::info!("No doses in WAL to roll up");
        return Ok(0);
    }

    append_rows(csv_path, &doses)?;
    tracing::info!("Wrote {} doses to CSV", doses.len());

    let archived = wal_path.with_extension("wal.processed");
    std::fs::rename(wal_path, &archived)?;
    tracing::info!("Archived WAL to {:?}", archived);

    Ok(doses.len())
}

/// Append doses to the CSV, writing the header row only on a fresh file
fn append_rows(csv_path: &Path, doses: &[DoseEvent]) -> Result<()> {
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;
    let write_headers = out.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(write_headers)
        .from_writer(out);
    for dose in doses {
        writer.serialize(CsvRow::from(dose))?;
    }
    writer.flush()?;

    let out = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    out.sync_all()?;
    Ok(())
}

/// Remove retired `.wal.processed` files under `dir`
pub fn cleanup_processed_wals(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let retired = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(".wal.processed"))
            .unwrap_or(false);

        if retired {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed processed WAL: {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed WAL files", count);
    }
    Ok(count)
}
