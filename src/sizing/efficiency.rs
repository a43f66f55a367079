//! One-way transmission efficiency chain from DC terminals to the POI.

use serde::Serialize;

use crate::error::{SizingError, SizingResult};

/// Five independent stage efficiencies, each in (0, 1].
///
/// Fields are private so a constructed chain is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EfficiencyChain {
    dc_cabling: f64,
    pcs: f64,
    transformer: f64,
    ac_cabling: f64,
    hv_other: f64,
}

impl EfficiencyChain {
    /// Builds a chain after range-checking every stage.
    ///
    /// # Errors
    ///
    /// Returns `SizingError::InvalidInput` naming the first stage outside (0, 1].
    pub fn new(
        dc_cabling: f64,
        pcs: f64,
        transformer: f64,
        ac_cabling: f64,
        hv_other: f64,
    ) -> SizingResult<Self> {
        let stages = [
            ("dc_cabling", dc_cabling),
            ("pcs", pcs),
            ("transformer", transformer),
            ("ac_cabling", ac_cabling),
            ("hv_other", hv_other),
        ];
        for (name, value) in stages {
            check_fraction(name, value)?;
        }
        Ok(Self {
            dc_cabling,
            pcs,
            transformer,
            ac_cabling,
            hv_other,
        })
    }

    /// Lossless chain.
    pub fn ideal() -> Self {
        Self {
            dc_cabling: 1.0,
            pcs: 1.0,
            transformer: 1.0,
            ac_cabling: 1.0,
            hv_other: 1.0,
        }
    }

    /// Product of the five stages.
    pub fn one_way(&self) -> f64 {
        self.dc_cabling * self.pcs * self.transformer * self.ac_cabling * self.hv_other
    }

    pub fn stages(&self) -> [f64; 5] {
        [
            self.dc_cabling,
            self.pcs,
            self.transformer,
            self.ac_cabling,
            self.hv_other,
        ]
    }
}

/// Checks that `value` lies in (0, 1].
pub(crate) fn check_fraction(name: &str, value: f64) -> SizingResult<()> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(SizingError::invalid(format!(
            "{name} must be in (0, 1], got {value}"
        )))
    }
}
