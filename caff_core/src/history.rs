//! Dose history loading with a rolling window.
//!
//! This module loads recent dose events from both WAL and CSV files
//! to provide the snapshot for curve evaluation and scheduling.

use crate::{DoseEvent, Result};
use chrono::{DateTime, Duration, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

/// CSV row format for reading archived doses
#[derive(Debug, Deserialize)]
struct CsvRow {
    id: String,
    beverage_id: Option<String>,
    amount_mg: f64,
    occurred_at: String,
    note: Option<String>,
}

impl TryFrom<CsvRow> for DoseEvent {
    type Error = crate::Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| crate::Error::Parse(format!("Invalid UUID: {}", e)))?;

        let occurred_at = DateTime::parse_from_rfc3339(&row.occurred_at)
            .map_err(|e| crate::Error::Parse(format!("Invalid date: {}", e)))?
            .with_timezone(&Utc);

        Ok(DoseEvent {
            id,
            beverage_id: row.beverage_id,
            amount_mg: row.amount_mg,
            occurred_at,
            note: row.note,
        })
    }
}

/// Load doses from the last N days from both WAL and CSV
///
/// Returns doses sorted by occurred_at (newest first).
/// Automatically deduplicates doses that appear in both WAL and CSV.
pub fn load_recent_doses(wal_path: &Path, csv_path: &Path, days: i64) -> Result<Vec<DoseEvent>> {
    let cutoff = Utc::now() - Duration::days(days);
    let mut doses = Vec::new();
    let mut seen_ids = HashSet::new();

    // WAL holds the newest doses
    if wal_path.exists() {
        let wal_doses = crate::wal::read_doses(wal_path)?;
        for dose in wal_doses {
            if dose.occurred_at >= cutoff {
                seen_ids.insert(dose.id);
                doses.push(dose);
            }
        }
        tracing::debug!("Loaded {} doses from WAL", doses.len());
    }

    // Archived doses, minus anything already seen in the WAL
    if csv_path.exists() {
        let csv_doses = load_doses_from_csv(csv_path)?;
        let mut csv_count = 0;
        for dose in csv_doses {
            if dose.occurred_at >= cutoff && !seen_ids.contains(&dose.id) {
                seen_ids.insert(dose.id);
                doses.push(dose);
                csv_count += 1;
            }
        }
        tracing::debug!("Loaded {} doses from CSV", csv_count);
    }

    // Sort by occurred_at, newest first
    doses.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));

    tracing::info!("Loaded {} total doses from last {} days", doses.len(), days);

    Ok(doses)
}

/// Load all doses from a CSV file
fn load_doses_from_csv(path: &Path) -> Result<Vec<DoseEvent>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut doses = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        match result {
            Ok(row) => match DoseEvent::try_from(row) {
                Ok(dose) => doses.push(dose),
                Err(e) => {
                    tracing::warn!("Skipping unparseable archive row: {}", e);
                }
            },
            Err(e) => {
                tracing::warn!("Skipping malformed archive row: {}", e);
            }
        }
    }

    Ok(doses)
}

/// Find the latest dose with `start <= occurred_at < end`
///
/// Order-independent scan, so callers need not pre-sort.
pub fn last_dose_in_window(
    doses: &[DoseEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Option<&DoseEvent> {
    doses
        .iter()
        .filter(|d| d.occurred_at >= start && d.occurred_at < end)
        .max_by_key(|d| d.occurred_at)
}

/// Total milligrams logged with `start <= occurred_at < end`
pub fn total_mg_in_window(doses: &[DoseEvent], start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    doses
        .iter()
        .filter(|d| d.occurred_at >= start && d.occurred_at < end)
        .map(|d| d.amount_mg)
        .sum()
}
