//! External sleep tracker signal loader.
//!
//! This module loads the last recorded wake-up time from an external file
//! (typically dropped by a sleep tracker export) so the schedule can follow
//! the actual morning instead of the configured one.

use crate::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::path::Path;

/// A wake-up event reported by an external tracker
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SleepSignal {
    pub woke_at: DateTime<Utc>,
    #[serde(default)]
    pub source: Option<String>,
}

impl SleepSignal {
    /// Whether the signal is recent enough to override the configured wake time
    ///
    /// A signal is fresh when it lies in the past but less than 24 hours
    /// back. Future timestamps are treated as clock skew and ignored.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.woke_at <= now && now - self.woke_at < Duration::hours(24)
    }
}

/// Load the sleep signal from a JSON file
///
/// Returns None if the file doesn't exist (no tracker in use). A file
/// that cannot be read or parsed is logged and ignored rather than
/// failing the caller.
pub fn load_sleep_signal(path: &Path) -> Result<Option<SleepSignal>> {
    if !path.exists() {
        tracing::debug!("No sleep signal file found at {:?}", path);
        return Ok(None);
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(
                "Failed to read sleep signal at {:?}: {}. Ignoring signal.",
                path,
                e
            );
            return Ok(None);
        }
    };

    let signal: SleepSignal = match serde_json::from_str(&contents) {
        Ok(signal) => signal,
        Err(e) => {
            tracing::warn!(
                "Failed to parse sleep signal at {:?}: {}. Ignoring signal.",
                path,
                e
            );
            return Ok(None);
        }
    };

    tracing::info!(
        "Loaded sleep signal: woke at {} ({})",
        signal.woke_at,
        signal.source.as_deref().unwrap_or("unknown source")
    );

    Ok(Some(signal))
}
