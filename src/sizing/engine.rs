//! End-to-end sizing pipeline.
//!
//! Requirement, profile selection, guarantee convergence, AC matching and
//! feeder allocation, in that order. Every stage reads the same
//! [`SizingCatalogs`]; nothing is cached between runs.

use std::sync::atomic::AtomicBool;

use tracing::{info, warn};

use super::ac_match::AcBlockMatcher;
use super::allocation::{allocate_balanced, evenly_distribute};
use super::blocks::{BlockSearch, SizingMode};
use super::capacity::{CapacityInputs, compute_requirement};
use super::convergence::{ConvergenceContext, ConvergenceSettings};
use super::degradation::{select_rte_profile, select_soh_profile};
use super::report::{FeederAllocation, SizingReport};
use crate::catalog::{BlockForm, SizingCatalogs};
use crate::error::{SizingError, SizingResult};

/// Everything one sizing run needs besides the catalogs.
#[derive(Debug, Clone, PartialEq)]
pub struct SizingInputs {
    pub capacity: CapacityInputs,
    pub project_life_years: u32,
    pub guarantee_year: u32,
    pub cycles_per_year: f64,
    pub mode: SizingMode,
    /// `None` uses the catalog default container.
    pub container_code: Option<String>,
    /// `None` uses the catalog default cabinet when the mode needs one.
    pub cabinet_code: Option<String>,
    pub max_cabinets_per_busbar: u32,
    pub max_iterations: u32,
    pub epsilon_mwh: f64,
    pub ac_search_extra: u32,
    pub adjustment_max_delta: u32,
    pub feeders: u32,
    pub min_ac_blocks_per_feeder: u32,
}

/// Runs sizing against a fixed set of catalogs.
#[derive(Debug, Clone)]
pub struct SizingEngine {
    catalogs: SizingCatalogs,
}

impl SizingEngine {
    /// # Errors
    ///
    /// Returns `SizingError::Catalog` if any catalog entry is invalid.
    pub fn new(catalogs: SizingCatalogs) -> SizingResult<Self> {
        catalogs.validate()?;
        Ok(Self { catalogs })
    }

    pub fn catalogs(&self) -> &SizingCatalogs {
        &self.catalogs
    }

    /// Sizes one project.
    ///
    /// A missed guarantee or a missing AC configuration is reported on the
    /// returned [`SizingReport`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns `SizingError::InvalidInput` for out-of-range inputs and
    /// `SizingError::Catalog` when a requested template or profile is
    /// missing.
    pub fn run(
        &self,
        inputs: &SizingInputs,
        cancel: Option<&AtomicBool>,
    ) -> SizingResult<SizingReport> {
        if inputs.feeders == 0 {
            return Err(SizingError::invalid("feeders must be > 0"));
        }
        if !(inputs.cycles_per_year.is_finite() && inputs.cycles_per_year > 0.0) {
            return Err(SizingError::invalid(format!(
                "cycles_per_year must be > 0, got {}",
                inputs.cycles_per_year
            )));
        }

        let requirement = compute_requirement(&inputs.capacity)?;
        let effective_c_rate = requirement.effective_c_rate();
        let soh = select_soh_profile(
            effective_c_rate,
            inputs.cycles_per_year,
            &self.catalogs.soh_profiles,
        )?;
        let rte = select_rte_profile(effective_c_rate, &self.catalogs.rte_profiles)?;

        let container = self
            .catalogs
            .resolve_dc_block(BlockForm::Container, inputs.container_code.as_deref())?;
        let cabinet = if inputs.mode != SizingMode::ContainerOnly || inputs.cabinet_code.is_some()
        {
            Some(
                self.catalogs
                    .resolve_dc_block(BlockForm::Cabinet, inputs.cabinet_code.as_deref())?,
            )
        } else {
            None
        };

        info!(
            mode = %inputs.mode,
            dc_energy_required_mwh = requirement.dc_energy_required_mwh,
            c_rate = effective_c_rate,
            soh_profile = %soh.name,
            rte_profile = %rte.name,
            "sizing started"
        );

        let search = BlockSearch {
            mode: inputs.mode,
            container,
            cabinet,
            max_cabinets_per_busbar: inputs.max_cabinets_per_busbar,
        };
        let settings = ConvergenceSettings {
            max_iterations: inputs.max_iterations,
            epsilon_mwh: inputs.epsilon_mwh,
            ..ConvergenceSettings::new(inputs.guarantee_year, inputs.project_life_years)
        };
        let convergence =
            ConvergenceContext::new(search, &requirement, soh, rte, settings)?.run(cancel)?;

        let mut warnings = Vec::new();
        if let Some(reason) = convergence.failure {
            warnings.push(format!(
                "guarantee not met ({reason}): {:.3} MWh at year {} vs {:.3} MWh target",
                convergence.usable_at_guarantee_mwh,
                convergence.guarantee_year,
                convergence.target_mwh
            ));
        }

        let dc = &convergence.configuration;
        let matcher = AcBlockMatcher::new(&self.catalogs.ac_blocks, inputs.ac_search_extra);
        let poi_mw = requirement.poi_power_mw;
        let ac_configuration = if dc.cabinet_count == 0 {
            matcher.find_container_only(poi_mw, dc.container_count)
        } else {
            None
        }
        .or_else(|| matcher.find_mixed(poi_mw, dc.container_count, dc.cabinet_count));

        let mut adjustments = Vec::new();
        let mut feeders = Vec::new();
        match &ac_configuration {
            Some(ac) => {
                feeders = allocate_feeders(
                    ac.ac_block_qty,
                    dc.total_blocks(),
                    inputs.feeders,
                    inputs.min_ac_blocks_per_feeder,
                )?;
                let floor = u64::from(inputs.feeders) * u64::from(inputs.min_ac_blocks_per_feeder);
                if u64::from(ac.ac_block_qty) < floor {
                    warnings.push(format!(
                        "{} AC blocks cannot give {} feeders {} each; split evenly instead",
                        ac.ac_block_qty, inputs.feeders, inputs.min_ac_blocks_per_feeder
                    ));
                }
            }
            None => {
                adjustments = matcher.suggest_adjustments(
                    poi_mw,
                    dc.container_count,
                    dc.cabinet_count,
                    inputs.adjustment_max_delta,
                );
                warn!(
                    containers = dc.container_count,
                    cabinets = dc.cabinet_count,
                    suggestions = adjustments.len(),
                    "no feasible AC configuration"
                );
                warnings.push(format!(
                    "no AC configuration for {} containers and {} cabinets \
                     without 3 DC blocks on one AC block",
                    dc.container_count, dc.cabinet_count
                ));
            }
        }

        let report = SizingReport {
            effective_c_rate,
            soh_profile: soh.name.clone(),
            rte_profile: rte.name.clone(),
            container_code: container.code.clone(),
            cabinet_code: cabinet.map(|c| c.code.clone()),
            requirement,
            convergence,
            ac_configuration,
            adjustments,
            feeders,
            warnings,
        };
        info!(
            feasible = report.is_feasible(),
            warnings = report.warnings.len(),
            "sizing finished"
        );
        Ok(report)
    }
}

/// Splits AC blocks over feeders, then DC blocks over AC blocks, and sums
/// the DC blocks landing on each feeder.
///
/// # Errors
///
/// Returns `SizingError::InvalidInput` when `feeders` or `ac_blocks` is zero.
pub fn allocate_feeders(
    ac_blocks: u32,
    dc_blocks: u32,
    feeders: u32,
    min_ac_per_feeder: u32,
) -> SizingResult<Vec<FeederAllocation>> {
    let ac_per_feeder = allocate_balanced(ac_blocks, feeders, min_ac_per_feeder)?;
    let dc_per_ac = evenly_distribute(dc_blocks, ac_blocks)?;

    let mut dc_iter = dc_per_ac.into_iter();
    Ok(ac_per_feeder
        .into_iter()
        .zip(1..)
        .map(|(ac, feeder)| FeederAllocation {
            feeder,
            ac_blocks: ac,
            dc_blocks: dc_iter.by_ref().take(ac as usize).sum(),
        })
        .collect())
}
