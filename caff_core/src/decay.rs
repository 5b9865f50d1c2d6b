//! Exponential decay model for caffeine elimination.
//!
//! Single-compartment, first-order kinetics: every dose decays
//! independently under one shared half-life, and the instantaneous body
//! level is the sum of the surviving contributions. Pure arithmetic, no
//! state; every other component is built on these two functions.

use crate::{DecayProfile, DoseEvent};
use chrono::{DateTime, Utc};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Fractional hours from `from` to `to` at millisecond resolution.
///
/// Negative when `to` precedes `from`.
pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

/// Remaining contribution of a single dose after `elapsed_hours`.
///
/// Computes `dose_mg * 0.5^(elapsed_hours / half_life_hours)`. A dose has
/// no effect before it occurs, so any negative elapsed time yields exactly
/// zero rather than extrapolating upward.
///
/// The profile is assumed validated (`DecayProfile::validate`) at the call
/// boundary; display rounding is the caller's concern.
pub fn remaining_after(dose_mg: f64, elapsed_hours: f64, decay: &DecayProfile) -> f64 {
    if elapsed_hours < 0.0 {
        return 0.0;
    }
    dose_mg * 0.5_f64.powf(elapsed_hours / decay.half_life_hours)
}

/// Instantaneous level at `at`: the sum of every dose's surviving
/// contribution.
///
/// Doses occurring strictly after `at` contribute zero automatically via
/// the elapsed-time guard, so callers never need to pre-filter the
/// snapshot.
pub fn level_at(doses: &[DoseEvent], at: DateTime<Utc>, decay: &DecayProfile) -> f64 {
    doses
        .iter()
        .map(|d| remaining_after(d.amount_mg, hours_between(d.occurred_at, at), decay))
        .sum()
}
