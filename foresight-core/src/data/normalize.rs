//! Normalization engine: raw daily bars to a canonical gap-free series.
//!
//! Pipeline, in order: deduplicate by date (per-field arithmetic mean),
//! bound to the window, densify to a complete daily calendar, fill
//! weekend closes from the preceding Friday and weekend opens from the
//! following Monday, linearly interpolate remaining close gaps, then
//! project to (date, close).
//!
//! The engine is pure in-memory computation over timezone-naive calendar
//! days. Callers resolve "now" to a date in the reference zone before
//! invoking it.

use super::provider::RawBar;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// One day of the canonical cleaned series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedPoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Errors from normalization. All are per-entity failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("invalid window: start {start} is after end {end}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },

    #[error("no usable close values in window")]
    NoAnchors,

    #[error("a single close value cannot cover a multi-day window")]
    SingleAnchor,
}

/// One slot of the dense daily calendar before interpolation.
#[derive(Debug, Clone, PartialEq)]
struct DaySlot {
    date: NaiveDate,
    open: Option<f64>,
    close: Option<f64>,
}

/// Normalize raw bars into a gap-free daily close series over
/// `[window_start, window_end]`, both ends inclusive.
pub fn normalize(
    bars: &[RawBar],
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Result<Vec<CleanedPoint>, NormalizeError> {
    if window_start > window_end {
        return Err(NormalizeError::InvalidWindow {
            start: window_start,
            end: window_end,
        });
    }

    let deduped = dedup_by_date(bars, window_start, window_end);

    let calendar_days = (window_end - window_start).num_days() + 1;
    let anchors = deduped.values().filter(|(_, close)| close.is_some()).count();
    if anchors == 0 {
        return Err(NormalizeError::NoAnchors);
    }
    if anchors == 1 && calendar_days > 1 {
        return Err(NormalizeError::SingleAnchor);
    }

    let mut slots = densify(&deduped, window_start, window_end);
    fill_weekend_gaps(&mut slots);
    let closes = interpolate_closes(&slots);

    Ok(slots
        .iter()
        .zip(closes)
        .map(|(slot, close)| CleanedPoint {
            date: slot.date,
            close,
        })
        .collect())
}

// ─── Pipeline steps ─────────────────────────────────────────────────

/// Collapse duplicate dates to per-field means, keeping only in-window
/// rows. Non-finite field values are ignored, so a date whose every
/// close is NaN carries no close.
fn dedup_by_date(
    bars: &[RawBar],
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> BTreeMap<NaiveDate, (Option<f64>, Option<f64>)> {
    struct Acc {
        open_sum: f64,
        open_n: u32,
        close_sum: f64,
        close_n: u32,
    }

    let mut by_date: BTreeMap<NaiveDate, Acc> = BTreeMap::new();

    for bar in bars {
        if bar.date < window_start || bar.date > window_end {
            continue;
        }
        let acc = by_date.entry(bar.date).or_insert(Acc {
            open_sum: 0.0,
            open_n: 0,
            close_sum: 0.0,
            close_n: 0,
        });
        if bar.open.is_finite() {
            acc.open_sum += bar.open;
            acc.open_n += 1;
        }
        if bar.close.is_finite() {
            acc.close_sum += bar.close;
            acc.close_n += 1;
        }
    }

    by_date
        .into_iter()
        .map(|(date, acc)| {
            let open = (acc.open_n > 0).then(|| acc.open_sum / acc.open_n as f64);
            let close = (acc.close_n > 0).then(|| acc.close_sum / acc.close_n as f64);
            (date, (open, close))
        })
        .collect()
}

/// Expand deduped rows onto a complete daily calendar. Days without a
/// raw row are null for both fields.
fn densify(
    deduped: &BTreeMap<NaiveDate, (Option<f64>, Option<f64>)>,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Vec<DaySlot> {
    let mut slots = Vec::new();
    let mut current = window_start;

    while current <= window_end {
        let (open, close) = deduped.get(&current).copied().unwrap_or((None, None));
        slots.push(DaySlot {
            date: current,
            open,
            close,
        });
        current += chrono::Duration::days(1);
    }

    slots
}

/// Fill weekend nulls: Saturday and Sunday closes copy the preceding
/// Friday's close; their opens copy the following Monday's open. Days
/// that already carry a value are left alone.
fn fill_weekend_gaps(slots: &mut [DaySlot]) {
    for i in 0..slots.len() {
        let (friday_offset, monday_offset) = match slots[i].date.weekday() {
            Weekday::Sat => (1, 2),
            Weekday::Sun => (2, 1),
            _ => continue,
        };

        if slots[i].close.is_none() && i >= friday_offset {
            slots[i].close = slots[i - friday_offset].close;
        }
        if slots[i].open.is_none() && i + monday_offset < slots.len() {
            slots[i].open = slots[i + monday_offset].open;
        }
    }
}

/// Linearly interpolate null closes against the nearest known closes on
/// either side, by day index. Positions before the first anchor take the
/// first anchor's value; positions after the last take the last's.
fn interpolate_closes(slots: &[DaySlot]) -> Vec<f64> {
    let anchors: Vec<(usize, f64)> = slots
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| slot.close.map(|c| (i, c)))
        .collect();

    let mut out = Vec::with_capacity(slots.len());
    let mut seg = 0;

    for i in 0..slots.len() {
        while seg + 1 < anchors.len() && anchors[seg + 1].0 < i {
            seg += 1;
        }

        let (ia, va) = anchors[seg];
        let value = if i <= ia {
            va
        } else if seg + 1 < anchors.len() {
            let (ib, vb) = anchors[seg + 1];
            if i >= ib {
                vb
            } else {
                va + (vb - va) * (i - ia) as f64 / (ib - ia) as f64
            }
        } else {
            va
        };
        out.push(value);
    }

    out
}
