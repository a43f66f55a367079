//! End-of-run sizing summary.

use std::fmt;

use serde::Serialize;

use super::ac_match::{AcBlockConfiguration, AdjustmentSuggestion};
use super::capacity::CapacityRequirement;
use super::convergence::ConvergenceOutcome;

/// AC and DC blocks landing on one medium-voltage feeder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeederAllocation {
    /// 1-based feeder number.
    pub feeder: u32,
    pub ac_blocks: u32,
    pub dc_blocks: u32,
}

/// Everything a sizing run produced.
///
/// Serialises to JSON as-is; `Display` renders the human summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizingReport {
    pub requirement: CapacityRequirement,
    /// DC power over DC energy, used for profile selection.
    pub effective_c_rate: f64,
    pub soh_profile: String,
    pub rte_profile: String,
    pub container_code: String,
    pub cabinet_code: Option<String>,
    pub convergence: ConvergenceOutcome,
    pub ac_configuration: Option<AcBlockConfiguration>,
    /// Nearby DC layouts that do admit an AC configuration, filled only
    /// when `ac_configuration` is `None`.
    pub adjustments: Vec<AdjustmentSuggestion>,
    pub feeders: Vec<FeederAllocation>,
    pub warnings: Vec<String>,
}

impl SizingReport {
    /// Guarantee met and an AC configuration found.
    pub fn is_feasible(&self) -> bool {
        self.convergence.converged && self.ac_configuration.is_some()
    }
}

impl fmt::Display for SizingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let req = &self.requirement;
        let conv = &self.convergence;
        let cfg = &conv.configuration;

        writeln!(f, "--- Sizing Report ---")?;
        writeln!(
            f,
            "POI requirement:       {:.2} MW / {:.2} MWh",
            req.poi_power_mw, req.poi_energy_mwh
        )?;
        writeln!(
            f,
            "DC requirement (BOL):  {:.2} MW / {:.3} MWh",
            req.dc_power_required_mw, req.dc_energy_required_mwh
        )?;
        writeln!(
            f,
            "Loss chain:            {:.4} one-way, SC loss {:.2}% ({} months)",
            req.eff_chain_oneway_frac,
            req.sc_loss_frac * 100.0,
            req.self_commissioning_months
        )?;
        writeln!(
            f,
            "Profiles:              SOH {} / RTE {} (C-rate {:.3})",
            self.soh_profile, self.rte_profile, self.effective_c_rate
        )?;
        writeln!(f, "Mode:                  {}", cfg.mode)?;
        match &self.cabinet_code {
            Some(cab) => writeln!(
                f,
                "DC blocks:             {} x {} + {} x {} ({} busbars)",
                cfg.container_count,
                self.container_code,
                cfg.cabinet_count,
                cab,
                cfg.busbars_needed
            )?,
            None => writeln!(
                f,
                "DC blocks:             {} x {}",
                cfg.container_count, self.container_code
            )?,
        }
        writeln!(
            f,
            "DC nameplate:          {:.3} MWh ({:+.2}% vs searched)",
            cfg.nameplate_mwh,
            cfg.config_adjustment_frac * 100.0
        )?;
        let status = match conv.failure {
            Some(reason) => format!("FAILED ({reason})"),
            None => "converged".to_string(),
        };
        writeln!(
            f,
            "Guarantee:             year {} {:.3} MWh vs target {:.3} MWh, {} after {} iterations",
            conv.guarantee_year,
            conv.usable_at_guarantee_mwh,
            conv.target_mwh,
            status,
            conv.iterations
        )?;
        match &self.ac_configuration {
            Some(ac) => writeln!(
                f,
                "AC blocks:             {ac} (oversize {:.2} MW)",
                ac.oversize_mw
            )?,
            None => writeln!(f, "AC blocks:             no feasible configuration")?,
        }
        for (i, s) in self.adjustments.iter().enumerate() {
            writeln!(f, "  option {}: {s}", i + 1)?;
        }
        for feeder in &self.feeders {
            writeln!(
                f,
                "Feeder {}:              {} AC blocks, {} DC blocks",
                feeder.feeder, feeder.ac_blocks, feeder.dc_blocks
            )?;
        }
        for w in &self.warnings {
            writeln!(f, "warning: {w}")?;
        }
        write!(f, "Feasible:              {}", self.is_feasible())
    }
}
