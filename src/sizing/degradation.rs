//! Nearest-match profile selection and curve lookups.
//!
//! The selection weights below are a fixed policy: changing them changes
//! which curve a project is sized against.

use crate::catalog::{RteBand, RteProfile, SohProfile};
use crate::error::{SizingError, SizingResult};

/// Weight applied to the C-rate difference when scoring SOH profiles.
pub const C_RATE_WEIGHT: f64 = 10.0;
/// Divisor applied to the cycle-count difference when scoring SOH profiles.
pub const CYCLES_DIVISOR: f64 = 365.0;

/// Picks the SOH profile closest to the operating point.
///
/// Score is `|Δc_rate| * 10 + |Δcycles| / 365`; the first lowest score in
/// catalog order wins.
///
/// # Errors
///
/// Returns `SizingError::Catalog` if the catalog is empty.
pub fn select_soh_profile(
    effective_c_rate: f64,
    cycles_per_year: f64,
    catalog: &[SohProfile],
) -> SizingResult<&SohProfile> {
    first_min_by_score(catalog, |p| {
        (p.c_rate - effective_c_rate).abs() * C_RATE_WEIGHT
            + (p.cycles_per_year - cycles_per_year).abs() / CYCLES_DIVISOR
    })
    .ok_or_else(|| SizingError::catalog("SOH profile catalog is empty"))
}

/// Picks the RTE profile with the closest C-rate; first wins on ties.
///
/// # Errors
///
/// Returns `SizingError::Catalog` if the catalog is empty.
pub fn select_rte_profile(
    effective_c_rate: f64,
    catalog: &[RteProfile],
) -> SizingResult<&RteProfile> {
    first_min_by_score(catalog, |p| (p.c_rate - effective_c_rate).abs())
        .ok_or_else(|| SizingError::catalog("RTE profile catalog is empty"))
}

fn first_min_by_score<T>(items: &[T], score: impl Fn(&T) -> f64) -> Option<&T> {
    let mut best: Option<(&T, f64)> = None;
    for item in items {
        let s = score(item);
        match best {
            Some((_, best_score)) if s >= best_score => {}
            _ => best = Some((item, s)),
        }
    }
    best.map(|(item, _)| item)
}

/// Relative SOH at `year`; past the end of the curve the last point holds.
///
/// # Errors
///
/// Returns `SizingError::Catalog` if the curve is empty.
pub fn soh_at_year(year: u32, curve: &SohProfile) -> SizingResult<f64> {
    let points = &curve.soh_by_year;
    points
        .get(year as usize)
        .or_else(|| points.last())
        .copied()
        .ok_or_else(|| {
            SizingError::catalog(format!("SOH profile `{}` has no points", curve.name))
        })
}

/// RTE of the highest band whose threshold is at or below `soh_absolute`.
///
/// When no band qualifies the lowest band applies. `bands` must be sorted
/// by descending threshold, as [`RteProfile::bands`] is.
///
/// # Errors
///
/// Returns `SizingError::Catalog` if there are no bands.
pub fn rte_at_soh(soh_absolute: f64, bands: &[RteBand]) -> SizingResult<f64> {
    bands
        .iter()
        .find(|b| b.min_soh <= soh_absolute)
        .or_else(|| bands.last())
        .map(|b| b.rte)
        .ok_or_else(|| SizingError::catalog("RTE profile has no bands"))
}
