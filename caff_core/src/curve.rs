//! Curve sampling over the decay model.
//!
//! Turns a dose snapshot into evenly spaced `SamplePoint`s for charting,
//! peak detection, and the scheduler's safety checks. A hypothetical dose
//! can be overlaid on the recorded history without mutating it.

use crate::decay::{hours_between, level_at, remaining_after};
use crate::{DecayProfile, DoseEvent, Error, HypotheticalDose, Result, SamplePoint};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Hard ceiling on the points one sampling call may produce. Requests that
/// would exceed it keep their window and get a wider step instead.
pub const MAX_SAMPLE_POINTS: i64 = 5000;

/// Default sampling resolution for charts and safety scans.
pub const DEFAULT_STEP_MINUTES: i64 = 15;

/// Sample the combined level of `doses` at fixed intervals across
/// `[start, end]`.
///
/// The first sample always lands exactly on `start`; the last lands on or
/// after `end` but less than one step beyond it, so the window is fully
/// covered. A degenerate window (`start == end`) yields a single point.
pub fn sample_curve(
    doses: &[DoseEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    decay: &DecayProfile,
    step: Duration,
) -> Result<Vec<SamplePoint>> {
    sample_curve_with(doses, None, start, end, decay, step)
}

/// Like [`sample_curve`], with an optional hypothetical dose layered on
/// top of the recorded history.
pub fn sample_curve_with(
    doses: &[DoseEvent],
    hypothetical: Option<HypotheticalDose>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    decay: &DecayProfile,
    step: Duration,
) -> Result<Vec<SamplePoint>> {
    decay.validate()?;
    if end < start {
        return Err(Error::Config(format!(
            "sample window ends before it starts ({} > {})",
            start, end
        )));
    }
    let mut step_ms = step.num_milliseconds();
    if step_ms <= 0 {
        return Err(Error::Config("sample step must be positive".to_string()));
    }

    let span_ms = (end - start).num_milliseconds();
    let projected = if span_ms == 0 {
        1
    } else {
        (span_ms - 1) / step_ms + 2
    };
    if projected > MAX_SAMPLE_POINTS {
        let widened = (span_ms - 1) / (MAX_SAMPLE_POINTS - 1) + 1;
        debug!(
            "Sampling {} points at {}ms would exceed the ceiling, widening step to {}ms",
            projected, step_ms, widened
        );
        step_ms = widened.max(step_ms);
    }
    let step = Duration::milliseconds(step_ms);

    let mut samples = Vec::new();
    let mut at = start;
    loop {
        samples.push(SamplePoint {
            at,
            level_mg: level_with(doses, hypothetical, at, decay),
        });
        if at >= end {
            break;
        }
        at += step;
    }
    Ok(samples)
}

/// Highest sampled level across `[start, end]`.
///
/// Comparison is strict, so among equal-level samples the earliest
/// timestamp wins.
pub fn peak_in_window(
    doses: &[DoseEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    decay: &DecayProfile,
    step: Duration,
) -> Result<SamplePoint> {
    peak_in_window_with(doses, None, start, end, decay, step)
}

/// Like [`peak_in_window`], with an optional hypothetical dose included.
pub fn peak_in_window_with(
    doses: &[DoseEvent],
    hypothetical: Option<HypotheticalDose>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    decay: &DecayProfile,
    step: Duration,
) -> Result<SamplePoint> {
    let samples = sample_curve_with(doses, hypothetical, start, end, decay, step)?;
    let mut iter = samples.into_iter();
    let mut peak = match iter.next() {
        Some(point) => point,
        None => return Err(Error::Other("sample window produced no points".to_string())),
    };
    for point in iter {
        if point.level_mg > peak.level_mg {
            peak = point;
        }
    }
    Ok(peak)
}

/// Peak level across the sleep window `[sleep_at, sleep_at + window]`,
/// simulating the recorded history plus one candidate dose.
///
/// The what-if building block of the scheduler: the candidate is passed
/// explicitly instead of being spliced into the history, so committed
/// state is never mutated to answer the question.
pub fn max_level_in_sleep_window(
    doses: &[DoseEvent],
    candidate: HypotheticalDose,
    sleep_at: DateTime<Utc>,
    sleep_window_hours: f64,
    decay: &DecayProfile,
    step: Duration,
) -> Result<f64> {
    if !(sleep_window_hours > 0.0 && sleep_window_hours <= 24.0) {
        return Err(Error::Config(format!(
            "sleep window must be in (0, 24] hours, got {}",
            sleep_window_hours
        )));
    }
    let window = Duration::milliseconds((sleep_window_hours * 3_600_000.0) as i64);
    let peak = peak_in_window_with(doses, Some(candidate), sleep_at, sleep_at + window, decay, step)?;
    Ok(peak.level_mg)
}

fn level_with(
    doses: &[DoseEvent],
    hypothetical: Option<HypotheticalDose>,
    at: DateTime<Utc>,
    decay: &DecayProfile,
) -> f64 {
    let mut level = level_at(doses, at, decay);
    if let Some(extra) = hypothetical {
        level += remaining_after(extra.amount_mg, hours_between(extra.at, at), decay);
    }
    level
}
