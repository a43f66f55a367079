//! AC block templates: PCS units plus transformer behind one MV connection.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SizingError, SizingResult};

/// One power-conversion block layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcBlockTemplate {
    /// Number of PCS units in the block.
    pub pcs_units: u32,
    /// Rated power of one PCS unit (kW).
    pub pcs_unit_kw: f64,
}

impl AcBlockTemplate {
    pub fn new(pcs_units: u32, pcs_unit_kw: f64) -> Self {
        Self {
            pcs_units,
            pcs_unit_kw,
        }
    }

    /// Block rating in MW.
    pub fn rated_mw(&self) -> f64 {
        f64::from(self.pcs_units) * self.pcs_unit_kw / 1000.0
    }

    /// # Errors
    ///
    /// Returns `SizingError::Catalog` for zero units or a non-positive unit rating.
    pub fn validate(&self) -> SizingResult<()> {
        if self.pcs_units == 0 {
            return Err(SizingError::catalog("AC block template has zero PCS units"));
        }
        if !self.pcs_unit_kw.is_finite() || self.pcs_unit_kw <= 0.0 {
            return Err(SizingError::catalog(format!(
                "AC block template has non-positive PCS rating {} kW",
                self.pcs_unit_kw
            )));
        }
        Ok(())
    }
}

impl fmt::Display for AcBlockTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}kW={}MW",
            self.pcs_units,
            self.pcs_unit_kw,
            self.rated_mw()
        )
    }
}

/// Built-in AC block catalog, smallest rating first.
pub fn default_ac_blocks() -> Vec<AcBlockTemplate> {
    vec![
        AcBlockTemplate::new(2, 1250.0),
        AcBlockTemplate::new(2, 1725.0),
        AcBlockTemplate::new(4, 1250.0),
        AcBlockTemplate::new(4, 1500.0),
        AcBlockTemplate::new(4, 1725.0),
    ]
}
