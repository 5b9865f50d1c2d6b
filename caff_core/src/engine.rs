//! Scheduling engine for recommending the next caffeine dose.
//!
//! This module implements the forward-search scheduling logic:
//! - Normalize the wake/sleep cycle and derive the pre-sleep cutoff
//! - Tally the budget consumed in the current cycle
//! - Scan candidate times and amounts against both safety caps

use crate::{curve, decay, history, DoseContext, Error, HypotheticalDose, Result};
use chrono::{DateTime, Duration, Utc};

const WAKE_GRACE_MINUTES: i64 = 60;
const DOSE_SLOT_HOURS: f64 = 3.0;
const DOSE_DECREMENT_MG: f64 = 5.0;
const SCAN_STEP_MINUTES: i64 = 15;
const PEAK_HORIZON_HOURS: i64 = 24;

/// A recommended dose with its placement
#[derive(Clone, Debug, PartialEq)]
pub struct RecommendedDose {
    pub amount_mg: f64,
    pub dose_at: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// Outcome of a scheduling request
///
/// Declining to place a dose is a normal outcome, not an error.
#[derive(Clone, Debug, PartialEq)]
pub enum Recommendation {
    Recommended(RecommendedDose),
    NoMoreDosesToday { reason: NoDoseReason },
}

/// Why the engine declined to place another dose in the current cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoDoseReason {
    /// The cycle's milligram budget has been spent down below the minimum dose
    BudgetExhausted,
    /// The current time is already past the pre-sleep cutoff
    PastCutoff,
    /// No time/amount combination cleared both safety checks
    NoAdmissibleSlot,
}

impl std::fmt::Display for NoDoseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoDoseReason::BudgetExhausted => write!(f, "the daily budget is spent"),
            NoDoseReason::PastCutoff => write!(f, "it is past the pre-sleep cutoff"),
            NoDoseReason::NoAdmissibleSlot => {
                write!(f, "no remaining slot clears the safety caps")
            }
        }
    }
}

/// Resolved boundaries of the current wake/sleep cycle
///
/// `sleep_at` is normalized to follow `wake_at` even when the nominal
/// bedtime crosses midnight. The budget cycle covers the 24 hours ending
/// at `sleep_at`; `cutoff` is the last admissible intake instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CycleBounds {
    pub cycle_start: DateTime<Utc>,
    pub sleep_at: DateTime<Utc>,
    pub cutoff: DateTime<Utc>,
}

/// Resolve the cycle boundaries for a schedule
pub fn cycle_bounds(schedule: &crate::ScheduleProfile) -> CycleBounds {
    let sleep_at = if schedule.sleep_at <= schedule.wake_at {
        schedule.sleep_at + Duration::hours(24)
    } else {
        schedule.sleep_at
    };

    CycleBounds {
        cycle_start: sleep_at - Duration::hours(24),
        sleep_at,
        cutoff: sleep_at - hours_duration(schedule.sleep_window_hours),
    }
}

/// Recommend the next dose for the given context
///
/// ## Scheduling Logic
///
/// 1. **Hard stops**: past the cutoff, cycle budget spent below the
///    minimum dose, or the earliest candidate landing past the cutoff,
///    means no further doses today
///
/// 2. **Earliest candidate**: one gap after the last dose of the cycle,
///    or one hour after waking when the cycle has no doses yet, never
///    earlier than now
///
/// 3. **Target sizing**: the remaining budget split across three-hour
///    slots between the anchor (last dose, or now/wake for a fresh
///    cycle) and the cutoff, clamped to the dose bounds
///
/// 4. **Forward search**: amounts step down 5 mg from the target; for
///    each amount, candidate times advance from the earliest slot to the
///    cutoff in 15-minute steps, and the first pair clearing both the
///    24-hour peak cap and the bedtime threshold wins. Larger doses are
///    preferred over earlier times.
///
pub fn recommend_next_dose(ctx: &DoseContext) -> Result<Recommendation> {
    ctx.decay.validate()?;
    ctx.schedule.validate()?;

    let bounds = cycle_bounds(&ctx.schedule);

    // A bedtime that trails the wake time even after gaining a day means
    // the schedule never closes; refuse it rather than planning into it
    if bounds.sleep_at <= ctx.schedule.wake_at {
        return Err(Error::Config(format!(
            "wake_at ({}) must precede sleep_at ({}) within one day",
            ctx.schedule.wake_at, bounds.sleep_at
        )));
    }

    if ctx.now > bounds.cutoff {
        tracing::info!(
            "Now ({}) is past the intake cutoff ({}), declining",
            ctx.now,
            bounds.cutoff
        );
        return Ok(Recommendation::NoMoreDosesToday {
            reason: NoDoseReason::PastCutoff,
        });
    }

    let consumed = history::total_mg_in_window(&ctx.doses, bounds.cycle_start, bounds.sleep_at);
    let remaining_budget = ctx.schedule.optimal_daily_mg - consumed;

    if remaining_budget < ctx.schedule.min_dose_mg {
        tracing::info!(
            "Remaining budget {:.1}mg is below the minimum dose {:.1}mg, declining",
            remaining_budget,
            ctx.schedule.min_dose_mg
        );
        return Ok(Recommendation::NoMoreDosesToday {
            reason: NoDoseReason::BudgetExhausted,
        });
    }

    let last_dose_at = history::last_dose_in_window(&ctx.doses, bounds.cycle_start, bounds.sleep_at)
        .map(|d| d.occurred_at);

    let earliest = match last_dose_at {
        Some(at) => (at + ctx.schedule.min_gap_between_doses).max(ctx.now),
        None => (ctx.schedule.wake_at + Duration::minutes(WAKE_GRACE_MINUTES)).max(ctx.now),
    };
    if earliest > bounds.cutoff {
        tracing::info!(
            "Earliest candidate ({}) already past the cutoff ({}), declining",
            earliest,
            bounds.cutoff
        );
        return Ok(Recommendation::NoMoreDosesToday {
            reason: NoDoseReason::NoAdmissibleSlot,
        });
    }

    let anchor = last_dose_at.unwrap_or_else(|| ctx.now.max(ctx.schedule.wake_at));
    let target = target_amount(ctx, remaining_budget, anchor, bounds.cutoff);
    tracing::debug!(
        "Searching from {} with target {:.1}mg ({:.1}mg budget left)",
        earliest,
        target,
        remaining_budget
    );

    let step = Duration::minutes(SCAN_STEP_MINUTES);

    let mut decrements = 0;
    loop {
        let amount = target - decrements as f64 * DOSE_DECREMENT_MG;
        if amount < ctx.schedule.min_dose_mg {
            break;
        }

        let mut dose_at = earliest;
        while dose_at <= bounds.cutoff {
            let candidate = HypotheticalDose {
                amount_mg: amount,
                at: dose_at,
            };

            if passes_safety_checks(ctx, &bounds, candidate, step)? {
                let amount_mg = amount
                    .round()
                    .clamp(ctx.schedule.min_dose_mg, ctx.schedule.max_dose_mg);
                tracing::info!("Recommending {:.0}mg at {}", amount_mg, dose_at);
                return Ok(Recommendation::Recommended(RecommendedDose {
                    amount_mg,
                    dose_at,
                    window_end: bounds.cutoff,
                }));
            }
            dose_at += step;
        }
        decrements += 1;
    }

    tracing::info!("No admissible dose before the cutoff ({})", bounds.cutoff);
    Ok(Recommendation::NoMoreDosesToday {
        reason: NoDoseReason::NoAdmissibleSlot,
    })
}

/// Split the remaining budget across the slots between anchor and cutoff
fn target_amount(
    ctx: &DoseContext,
    remaining_budget: f64,
    anchor: DateTime<Utc>,
    cutoff: DateTime<Utc>,
) -> f64 {
    let available_hours = decay::hours_between(anchor, cutoff);
    let slots = (available_hours / DOSE_SLOT_HOURS).floor().max(1.0);
    (remaining_budget / slots).clamp(ctx.schedule.min_dose_mg, ctx.schedule.max_dose_mg)
}

/// Both safety checks for one candidate dose
///
/// The peak check covers the 24 hours after intake and must stay at or
/// under the cap; the bedtime check covers the sleep window and must stay
/// strictly under the threshold.
fn passes_safety_checks(
    ctx: &DoseContext,
    bounds: &CycleBounds,
    candidate: HypotheticalDose,
    step: Duration,
) -> Result<bool> {
    let day_peak = curve::peak_in_window_with(
        &ctx.doses,
        Some(candidate),
        candidate.at,
        candidate.at + Duration::hours(PEAK_HORIZON_HOURS),
        &ctx.decay,
        step,
    )?;
    if day_peak.level_mg > ctx.schedule.peak_safety_cap_mg {
        return Ok(false);
    }

    let sleep_max = curve::max_level_in_sleep_window(
        &ctx.doses,
        candidate,
        bounds.sleep_at,
        ctx.schedule.sleep_window_hours,
        &ctx.decay,
        step,
    )?;
    Ok(sleep_max < ctx.schedule.sleep_threshold_mg)
}

fn hours_duration(hours: f64) -> Duration {
    Duration::milliseconds((hours * 3_600_000.0) as i64)
}
