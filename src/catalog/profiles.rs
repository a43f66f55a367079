//! Aging (SOH) curves and round-trip-efficiency band tables.

use serde::{Deserialize, Serialize};

use crate::error::{SizingError, SizingResult};

/// A relative state-of-health curve measured at one operating point.
///
/// `soh_by_year[i]` is the SOH fraction at the start of year `i`, so the
/// curve is contiguous from year 0 by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SohProfile {
    pub name: String,
    /// C-rate at which the curve was measured.
    pub c_rate: f64,
    /// Full cycles per year at which the curve was measured.
    pub cycles_per_year: f64,
    pub soh_by_year: Vec<f64>,
}

impl SohProfile {
    pub fn new(name: &str, c_rate: f64, cycles_per_year: f64, soh_by_year: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            c_rate,
            cycles_per_year,
            soh_by_year,
        }
    }

    /// Last year index the curve defines.
    pub fn last_year(&self) -> Option<u32> {
        self.soh_by_year
            .len()
            .checked_sub(1)
            .and_then(|n| u32::try_from(n).ok())
    }

    /// # Errors
    ///
    /// Returns `SizingError::Catalog` for an empty curve or a point outside (0, 1].
    pub fn validate(&self) -> SizingResult<()> {
        if self.soh_by_year.is_empty() {
            return Err(SizingError::catalog(format!(
                "SOH profile `{}` has no points",
                self.name
            )));
        }
        if let Some(bad) = self
            .soh_by_year
            .iter()
            .find(|v| !(v.is_finite() && **v > 0.0 && **v <= 1.0))
        {
            return Err(SizingError::catalog(format!(
                "SOH profile `{}` has point {bad} outside (0, 1]",
                self.name
            )));
        }
        Ok(())
    }
}

/// One RTE band: applies when absolute SOH is at or above `min_soh`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RteBand {
    pub min_soh: f64,
    pub rte: f64,
}

/// DC round-trip efficiency as a step function of absolute SOH.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRteProfile")]
pub struct RteProfile {
    pub name: String,
    /// C-rate at which the table was measured.
    pub c_rate: f64,
    bands: Vec<RteBand>,
}

impl RteProfile {
    /// Builds a profile, storing bands sorted by descending threshold.
    pub fn new(name: &str, c_rate: f64, mut bands: Vec<RteBand>) -> Self {
        bands.sort_by(|a, b| b.min_soh.total_cmp(&a.min_soh));
        Self {
            name: name.to_string(),
            c_rate,
            bands,
        }
    }

    /// Bands, highest threshold first.
    pub fn bands(&self) -> &[RteBand] {
        &self.bands
    }

    /// # Errors
    ///
    /// Returns `SizingError::Catalog` for an empty table or an RTE outside (0, 1].
    pub fn validate(&self) -> SizingResult<()> {
        if self.bands.is_empty() {
            return Err(SizingError::catalog(format!(
                "RTE profile `{}` has no bands",
                self.name
            )));
        }
        for band in &self.bands {
            if !(band.rte.is_finite() && band.rte > 0.0 && band.rte <= 1.0) {
                return Err(SizingError::catalog(format!(
                    "RTE profile `{}` has RTE {} outside (0, 1]",
                    self.name, band.rte
                )));
            }
            if !band.min_soh.is_finite() {
                return Err(SizingError::catalog(format!(
                    "RTE profile `{}` has a non-finite threshold",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Deserialisation shape; band order in files is arbitrary.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRteProfile {
    name: String,
    c_rate: f64,
    bands: Vec<RteBand>,
}

impl From<RawRteProfile> for RteProfile {
    fn from(raw: RawRteProfile) -> Self {
        Self::new(&raw.name, raw.c_rate, raw.bands)
    }
}

/// Built-in SOH curves, 21 points (years 0..=20) each.
pub fn default_soh_profiles() -> Vec<SohProfile> {
    vec![
        SohProfile::new(
            "0.25C-365cyc",
            0.25,
            365.0,
            vec![
                1.000, 0.955, 0.930, 0.911, 0.895, 0.880, 0.866, 0.853, 0.841, 0.829, 0.818,
                0.807, 0.796, 0.786, 0.776, 0.766, 0.757, 0.748, 0.739, 0.730, 0.722,
            ],
        ),
        SohProfile::new(
            "0.5C-365cyc",
            0.5,
            365.0,
            vec![
                1.000, 0.948, 0.920, 0.899, 0.881, 0.865, 0.850, 0.836, 0.823, 0.810, 0.798,
                0.786, 0.775, 0.764, 0.753, 0.743, 0.733, 0.723, 0.714, 0.705, 0.696,
            ],
        ),
        SohProfile::new(
            "0.5C-730cyc",
            0.5,
            730.0,
            vec![
                1.000, 0.935, 0.898, 0.869, 0.845, 0.823, 0.803, 0.784, 0.766, 0.749, 0.733,
                0.718, 0.703, 0.689, 0.675, 0.662, 0.649, 0.637, 0.625, 0.613, 0.602,
            ],
        ),
        SohProfile::new(
            "1C-365cyc",
            1.0,
            365.0,
            vec![
                1.000, 0.940, 0.908, 0.884, 0.863, 0.844, 0.826, 0.810, 0.794, 0.779, 0.765,
                0.751, 0.738, 0.725, 0.713, 0.701, 0.689, 0.678, 0.667, 0.656, 0.646,
            ],
        ),
    ]
}

/// Built-in RTE tables.
pub fn default_rte_profiles() -> Vec<RteProfile> {
    let band = |min_soh, rte| RteBand { min_soh, rte };
    vec![
        RteProfile::new(
            "0.25C",
            0.25,
            vec![band(0.9, 0.950), band(0.8, 0.940), band(0.7, 0.930), band(0.0, 0.920)],
        ),
        RteProfile::new(
            "0.5C",
            0.5,
            vec![band(0.9, 0.940), band(0.8, 0.930), band(0.7, 0.920), band(0.0, 0.910)],
        ),
        RteProfile::new(
            "1C",
            1.0,
            vec![band(0.9, 0.925), band(0.8, 0.915), band(0.7, 0.905), band(0.0, 0.895)],
        ),
    ]
}
