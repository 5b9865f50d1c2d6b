//! Core domain types for the caffeine tracking system.
//!
//! Everything the model and engine operate on lives here:
//! - Dose events (one logged intake each)
//! - Decay and schedule profiles (model configuration)
//! - Curve sample points
//! - Beverage catalog entries
//! - The engine's input context

use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// Dose Types
// ============================================================================

/// One recorded caffeine intake.
///
/// Immutable once logged. Editing or deleting is the store's job: it
/// removes/replaces the record in the list handed to the core, which only
/// ever sees a snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DoseEvent {
    pub id: Uuid,
    /// Catalog entry this dose was logged from, if any. Informational only;
    /// the model ignores it.
    pub beverage_id: Option<String>,
    pub amount_mg: f64,
    pub occurred_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// A not-yet-committed dose used for what-if simulation.
///
/// The sampler accepts this as an explicit parameter instead of having
/// callers splice a fake `DoseEvent` into the real history, so the boundary
/// between committed and candidate state stays visible in the API.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HypotheticalDose {
    pub amount_mg: f64,
    pub at: DateTime<Utc>,
}

// ============================================================================
// Profile Types
// ============================================================================

/// Pharmacokinetic model configuration.
///
/// A single half-life drives every computation in a call. The default of
/// 5 hours is the commonly cited adult caffeine half-life.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecayProfile {
    pub half_life_hours: f64,
}

impl Default for DecayProfile {
    fn default() -> Self {
        Self {
            half_life_hours: 5.0,
        }
    }
}

impl DecayProfile {
    /// Reject invalid configuration at the call boundary.
    pub fn validate(&self) -> Result<()> {
        if !(self.half_life_hours > 0.0) {
            return Err(Error::Config(format!(
                "half_life_hours must be positive, got {}",
                self.half_life_hours
            )));
        }
        Ok(())
    }
}

/// Constraint set for the dose recommender.
///
/// `wake_at` and `sleep_at` are absolute instants for the current 24 h
/// cycle; the caller resolves times-of-day and time zones into instants
/// before building the profile. The engine performs only the single
/// day-crossing normalization (`sleep_at` gains a day when it does not
/// already follow `wake_at`).
#[derive(Clone, Debug)]
pub struct ScheduleProfile {
    /// Soft daily budget in mg.
    pub optimal_daily_mg: f64,
    pub wake_at: DateTime<Utc>,
    pub sleep_at: DateTime<Utc>,
    pub min_dose_mg: f64,
    pub max_dose_mg: f64,
    /// Minimum spacing from the last dose to the next recommendation.
    pub min_gap_between_doses: Duration,
    /// Instantaneous level that must never be exceeded in the 24 h after a
    /// candidate dose. Derived by the config layer as a fraction of
    /// `optimal_daily_mg`.
    pub peak_safety_cap_mg: f64,
    /// Level under which the sleep window counts as undisrupted.
    pub sleep_threshold_mg: f64,
    /// Length of the window after bedtime that must stay under threshold,
    /// at most one full cycle (24 h). Also determines the recommendation
    /// cutoff: bedtime minus this span.
    pub sleep_window_hours: f64,
}

impl ScheduleProfile {
    /// Reject invalid configuration at the call boundary.
    ///
    /// Degenerate wake/sleep ordering is not checked here. The engine
    /// normalizes day-crossing bedtimes first, then rejects schedules
    /// that stay degenerate after gaining the day.
    pub fn validate(&self) -> Result<()> {
        if !(self.optimal_daily_mg > 0.0) {
            return Err(Error::Config(format!(
                "optimal_daily_mg must be positive, got {}",
                self.optimal_daily_mg
            )));
        }
        if !(self.min_dose_mg > 0.0) {
            return Err(Error::Config(format!(
                "min_dose_mg must be positive, got {}",
                self.min_dose_mg
            )));
        }
        if !(self.max_dose_mg >= self.min_dose_mg) {
            return Err(Error::Config(format!(
                "max_dose_mg ({}) must be >= min_dose_mg ({})",
                self.max_dose_mg, self.min_dose_mg
            )));
        }
        if self.min_gap_between_doses < Duration::zero() {
            return Err(Error::Config(
                "min_gap_between_doses must not be negative".into(),
            ));
        }
        if !(self.peak_safety_cap_mg > 0.0) {
            return Err(Error::Config(format!(
                "peak_safety_cap_mg must be positive, got {}",
                self.peak_safety_cap_mg
            )));
        }
        if !(self.sleep_threshold_mg >= 0.0) {
            return Err(Error::Config(format!(
                "sleep_threshold_mg must not be negative, got {}",
                self.sleep_threshold_mg
            )));
        }
        if !(self.sleep_window_hours > 0.0 && self.sleep_window_hours <= 24.0) {
            return Err(Error::Config(format!(
                "sleep_window_hours must be in (0, 24], got {}",
                self.sleep_window_hours
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Sample Types
// ============================================================================

/// One point of a sampled level curve: the modeled level at an instant.
///
/// Also used for window aggregates (peak level and its timestamp).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SamplePoint {
    pub at: DateTime<Utc>,
    pub level_mg: f64,
}

// ============================================================================
// Catalog Types
// ============================================================================

/// A beverage definition the logging layer can record doses from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Beverage {
    pub id: String,
    pub name: String,
    /// Caffeine content of one serving.
    pub caffeine_mg: f64,
    /// Display string for the serving size, e.g. "250 ml can".
    pub serving: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
}

/// The complete catalog of known beverages.
#[derive(Clone, Debug)]
pub struct Catalog {
    pub beverages: HashMap<String, Beverage>,
}

// ============================================================================
// Engine Context
// ============================================================================

/// Runtime snapshot handed to the recommendation engine.
///
/// The engine never mutates anything outside its own stack; callers own the
/// history and pass a fresh snapshot per call.
#[derive(Clone, Debug)]
pub struct DoseContext {
    pub now: DateTime<Utc>,
    pub doses: Vec<DoseEvent>,
    pub decay: DecayProfile,
    pub schedule: ScheduleProfile,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_schedule() -> ScheduleProfile {
        let wake = Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap();
        let sleep = Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).unwrap();
        ScheduleProfile {
            optimal_daily_mg: 300.0,
            wake_at: wake,
            sleep_at: sleep,
            min_dose_mg: 40.0,
            max_dose_mg: 200.0,
            min_gap_between_doses: Duration::minutes(60),
            peak_safety_cap_mg: 180.0,
            sleep_threshold_mg: 50.0,
            sleep_window_hours: 6.0,
        }
    }

    #[test]
    fn test_decay_profile_default_validates() {
        assert!(DecayProfile::default().validate().is_ok());
    }

    #[test]
    fn test_decay_profile_rejects_nonpositive_half_life() {
        assert!(DecayProfile {
            half_life_hours: 0.0
        }
        .validate()
        .is_err());
        assert!(DecayProfile {
            half_life_hours: -2.0
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_schedule_profile_validates() {
        assert!(base_schedule().validate().is_ok());
    }

    #[test]
    fn test_schedule_profile_rejects_inverted_dose_bounds() {
        let mut profile = base_schedule();
        profile.min_dose_mg = 100.0;
        profile.max_dose_mg = 50.0;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_schedule_profile_rejects_zero_sleep_window() {
        let mut profile = base_schedule();
        profile.sleep_window_hours = 0.0;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_schedule_profile_rejects_sleep_window_over_a_day() {
        let mut profile = base_schedule();
        profile.sleep_window_hours = 1e12;
        assert!(profile.validate().is_err());

        profile.sleep_window_hours = 25.0;
        assert!(profile.validate().is_err());

        profile.sleep_window_hours = 24.0;
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_schedule_profile_rejects_nan_budget() {
        let mut profile = base_schedule();
        profile.optimal_daily_mg = f64::NAN;
        assert!(profile.validate().is_err());
    }
}
