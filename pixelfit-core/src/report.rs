//! Decay reporting: human-readable durations and decay tables.

use std::fmt::Write as _;
use std::num::NonZeroU32;

use serde::Serialize;

use crate::decay::{self, MAX_HAPPINESS, MIN_HAPPINESS};
use crate::error::Result;

/// `"{d}d {h}h {m}m {s}s"`, truncating at every unit.
///
/// Negative input is outside the domain and formats as zero.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn format_duration(seconds: f64) -> String {
    let mut rest = seconds.max(0.0);
    let days = (rest / 86_400.0).floor();
    rest %= 86_400.0;
    let hours = (rest / 3_600.0).floor();
    rest %= 3_600.0;
    let minutes = (rest / 60.0).floor();
    rest %= 60.0;

    format!(
        "{}d {}h {}m {}s",
        days as u64, hours as u64, minutes as u64, rest as u64
    )
}

/// A run of consecutive points in the decay table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecayBlock {
    /// Happiness at the start of the block.
    pub from: i32,
    /// Happiness at the end of the block.
    pub to: i32,
    /// Mean seconds per point inside the block.
    pub avg_seconds_per_point: f64,
    /// Seconds to get from `from` to `to`.
    pub total_seconds: f64,
}

/// One decrement, for traces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecayStep {
    /// Happiness before the decrement.
    pub happiness: i32,
    /// Segment the rate was taken from.
    pub segment: u32,
    /// `1.1^segment`.
    pub multiplier: f64,
    /// Seconds the decrement takes.
    pub seconds: f64,
}

/// Per-point trace from `from` down to 0.
///
/// # Errors
/// [`crate::PixelfitError::InvalidHappinessRange`] outside `[0, 100]`.
pub fn decay_trace(from: i32) -> Result<Vec<DecayStep>> {
    decay::segment(from)?;
    (MIN_HAPPINESS + 1..=from)
        .rev()
        .map(|happiness| {
            let segment = decay::segment(happiness)?;
            Ok(DecayStep {
                happiness,
                segment,
                multiplier: decay::rate_multiplier(segment),
                seconds: decay::time_to_decrement(happiness)?,
            })
        })
        .collect()
}

/// Full 100→0 decay, grouped into blocks that end on multiples of `block`.
///
/// # Errors
/// Never fails for the fixed 100→0 range; the `Result` carries engine errors
/// through.
pub fn decay_table(block: NonZeroU32) -> Result<Vec<DecayBlock>> {
    let width = i32::try_from(block.get()).unwrap_or(MAX_HAPPINESS);
    let mut blocks = Vec::new();
    let mut start = MAX_HAPPINESS;
    let mut total = 0.0;
    let mut points = 0_u32;

    for step in decay_trace(MAX_HAPPINESS)? {
        total += step.seconds;
        points += 1;
        let after = step.happiness - 1;
        if after % width == 0 {
            blocks.push(DecayBlock {
                from: start,
                to: after,
                avg_seconds_per_point: total / f64::from(points),
                total_seconds: total,
            });
            start = after;
            total = 0.0;
            points = 0;
        }
    }
    Ok(blocks)
}

/// Fixed-width rendering of [`decay_table`] with a grand total.
#[must_use]
pub fn render_table(blocks: &[DecayBlock]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<15} | {:<15} | {:<20}", "Range", "Avg Sec/Point", "Time Taken");
    let _ = writeln!(out, "{}", "-".repeat(60));
    for b in blocks {
        let range = format!("{}->{}", b.from, b.to);
        let _ = writeln!(
            out,
            "{:<15} | {:<15.2} | {:<20}",
            range,
            b.avg_seconds_per_point,
            format_duration(b.total_seconds)
        );
    }
    let _ = writeln!(out, "{}", "-".repeat(60));
    let total: f64 = blocks.iter().map(|b| b.total_seconds).sum();
    let (from, to) = match (blocks.first(), blocks.last()) {
        (Some(first), Some(last)) => (first.from, last.to),
        _ => (MAX_HAPPINESS, MAX_HAPPINESS),
    };
    let _ = writeln!(out, "Total Time ({from} -> {to}): {}", format_duration(total));
    out
}

/// Step-by-step rendering of [`decay_trace`].
#[must_use]
pub fn render_trace(steps: &[DecayStep]) -> String {
    let mut out = String::new();
    for s in steps {
        let _ = writeln!(out, "Happiness {} -> {}:", s.happiness, s.happiness - 1);
        let _ = writeln!(out, "  Segment: {}", s.segment);
        let _ = writeln!(out, "  Multiplier: {:.4}", s.multiplier);
        let _ = writeln!(out, "  Time required: {:.2}s", s.seconds);
    }
    let _ = writeln!(out, "{}", "-".repeat(60));
    let total: f64 = steps.iter().map(|s| s.seconds).sum();
    let from = steps.first().map_or(MIN_HAPPINESS, |s| s.happiness);
    let _ = writeln!(out, "Total Time ({from} -> 0): {}", format_duration(total));
    out
}
