//! POI requirement to DC requirement through the loss chain.

use serde::Serialize;

use super::efficiency::{EfficiencyChain, check_fraction};
use crate::error::{SizingError, SizingResult};

/// Self-commissioning loss (%) by whole months, index 0 = month 1.
const SC_LOSS_PCT: [f64; 12] = [2.0, 2.2, 2.4, 2.6, 2.8, 3.0, 3.2, 3.4, 3.7, 4.0, 4.25, 4.5];

/// Shortest self-commissioning period the table is applied to.
pub const SC_MIN_MONTHS: u32 = 3;

/// Loss added per month past the end of the table (%).
const SC_EXTRA_PCT_PER_MONTH: f64 = 0.25;

/// Parameters for [`compute_requirement`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityInputs {
    /// Required power at the POI (MW).
    pub poi_power_mw: f64,
    /// Required usable energy at the POI (MWh).
    pub poi_energy_mwh: f64,
    pub efficiency: EfficiencyChain,
    /// Depth of discharge, in (0, 1].
    pub dod_frac: f64,
    /// DC round-trip efficiency at BOL, in (0, 1].
    pub dc_round_trip_efficiency_frac: f64,
    /// Months between energisation and commercial operation.
    pub self_commissioning_months: u32,
}

/// Derived DC-side requirement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityRequirement {
    pub poi_power_mw: f64,
    pub poi_energy_mwh: f64,
    pub eff_chain_oneway_frac: f64,
    /// Months after clamping to [`SC_MIN_MONTHS`].
    pub self_commissioning_months: u32,
    pub sc_loss_frac: f64,
    pub dod_frac: f64,
    pub dc_round_trip_efficiency_frac: f64,
    pub dc_one_way_efficiency_frac: f64,
    pub dc_usable_bol_frac: f64,
    pub dc_energy_required_mwh: f64,
    pub dc_power_required_mw: f64,
}

impl CapacityRequirement {
    /// DC-side C-rate implied by the requirement.
    pub fn effective_c_rate(&self) -> f64 {
        self.dc_power_required_mw / self.dc_energy_required_mwh
    }
}

/// Self-commissioning loss fraction for a period in months.
///
/// Returns `(months_used, loss_frac)`. Periods shorter than
/// [`SC_MIN_MONTHS`] are clamped up; periods past the table extrapolate
/// linearly.
pub fn self_commissioning_loss(months: u32) -> (u32, f64) {
    let months = months.max(SC_MIN_MONTHS);
    let table_len = SC_LOSS_PCT.len() as u32;
    let pct = if months <= table_len {
        SC_LOSS_PCT[(months - 1) as usize]
    } else {
        SC_LOSS_PCT[SC_LOSS_PCT.len() - 1] + f64::from(months - table_len) * SC_EXTRA_PCT_PER_MONTH
    };
    (months, pct / 100.0)
}

/// Converts a POI power/energy requirement into the DC nameplate requirement.
///
/// # Errors
///
/// Returns `SizingError::InvalidInput` for non-positive POI values, a
/// DOD or DC RTE outside (0, 1], or a loss stack that leaves no usable
/// energy.
pub fn compute_requirement(inputs: &CapacityInputs) -> SizingResult<CapacityRequirement> {
    if !(inputs.poi_power_mw.is_finite() && inputs.poi_power_mw > 0.0) {
        return Err(SizingError::invalid(format!(
            "poi_power_mw must be > 0, got {}",
            inputs.poi_power_mw
        )));
    }
    if !(inputs.poi_energy_mwh.is_finite() && inputs.poi_energy_mwh > 0.0) {
        return Err(SizingError::invalid(format!(
            "poi_energy_mwh must be > 0, got {}",
            inputs.poi_energy_mwh
        )));
    }
    check_fraction("dod_frac", inputs.dod_frac)?;
    check_fraction(
        "dc_round_trip_efficiency_frac",
        inputs.dc_round_trip_efficiency_frac,
    )?;

    let eff_chain_oneway = inputs.efficiency.one_way();
    let (sc_months, sc_loss_frac) = self_commissioning_loss(inputs.self_commissioning_months);
    // Charge and discharge are assumed to share the DC losses equally.
    let dc_one_way = inputs.dc_round_trip_efficiency_frac.sqrt();
    let dc_usable_bol_frac = inputs.dod_frac * dc_one_way;

    let denominator = (1.0 - sc_loss_frac) * dc_usable_bol_frac * eff_chain_oneway;
    if denominator <= 0.0 {
        return Err(SizingError::invalid(format!(
            "loss chain leaves no usable energy (self-commissioning loss {:.2}%)",
            sc_loss_frac * 100.0
        )));
    }

    Ok(CapacityRequirement {
        poi_power_mw: inputs.poi_power_mw,
        poi_energy_mwh: inputs.poi_energy_mwh,
        eff_chain_oneway_frac: eff_chain_oneway,
        self_commissioning_months: sc_months,
        sc_loss_frac,
        dod_frac: inputs.dod_frac,
        dc_round_trip_efficiency_frac: inputs.dc_round_trip_efficiency_frac,
        dc_one_way_efficiency_frac: dc_one_way,
        dc_usable_bol_frac,
        dc_energy_required_mwh: inputs.poi_energy_mwh / denominator,
        dc_power_required_mw: inputs.poi_power_mw / eff_chain_oneway,
    })
}
