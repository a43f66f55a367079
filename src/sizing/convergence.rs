//! Multi-year performance projection and the guarantee convergence loop.
//!
//! Block counts are a step function of the requested energy, so the loop is
//! modelled as an explicit state machine: every call to
//! [`ConvergenceContext::step`] consumes one `Searching` state and yields the
//! next state. `Converged` and `Failed` are terminal.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::blocks::{BlockConfiguration, BlockSearch};
use super::capacity::CapacityRequirement;
use super::degradation::{rte_at_soh, soh_at_year};
use crate::catalog::{RteProfile, SohProfile};
use crate::error::{SizingError, SizingResult};

/// Default iteration cap.
pub const DEFAULT_MAX_ITERATIONS: u32 = 20;
/// Default tolerance on the guarantee comparison (MWh).
pub const DEFAULT_EPSILON_MWH: f64 = 1e-6;

/// Projected performance of one configuration in one operating year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyPerformanceRecord {
    pub year_index: u32,
    /// SOH from the aging curve, relative to BOL.
    pub soh_relative: f64,
    /// SOH including the self-commissioning loss.
    pub soh_absolute: f64,
    pub dc_gross_mwh: f64,
    pub dc_usable_mwh: f64,
    pub dc_rte_frac: f64,
    pub system_rte_frac: f64,
    pub poi_usable_mwh: f64,
    pub meets_guarantee: bool,
}

/// Everything the yearly projection reads besides the configuration.
#[derive(Debug, Clone, Copy)]
pub struct Projection<'a> {
    pub requirement: &'a CapacityRequirement,
    pub soh_profile: &'a SohProfile,
    pub rte_profile: &'a RteProfile,
    pub project_life_years: u32,
    /// Energy that must be deliverable at the POI (MWh).
    pub target_mwh: f64,
    pub epsilon_mwh: f64,
}

/// Builds one record per year for `0..=project_life_years`.
///
/// The one-way chain is applied once, on discharge.
///
/// # Errors
///
/// Returns `SizingError::Catalog` if a profile has no points or bands.
pub fn project_performance(
    cfg: &BlockConfiguration,
    projection: &Projection<'_>,
) -> SizingResult<Vec<YearlyPerformanceRecord>> {
    let req = projection.requirement;
    let chain = req.eff_chain_oneway_frac;
    (0..=projection.project_life_years)
        .map(|year| {
            let soh_relative = soh_at_year(year, projection.soh_profile)?;
            let soh_absolute = soh_relative * (1.0 - req.sc_loss_frac);
            let dc_rte_frac = rte_at_soh(soh_absolute, projection.rte_profile.bands())?;
            let dc_gross_mwh = cfg.nameplate_mwh * soh_absolute;
            let dc_usable_mwh = dc_gross_mwh * req.dod_frac * dc_rte_frac.sqrt();
            let poi_usable_mwh = dc_usable_mwh * chain;
            Ok(YearlyPerformanceRecord {
                year_index: year,
                soh_relative,
                soh_absolute,
                dc_gross_mwh,
                dc_usable_mwh,
                dc_rte_frac,
                system_rte_frac: dc_rte_frac * chain * chain,
                poi_usable_mwh,
                meets_guarantee: poi_usable_mwh >= projection.target_mwh - projection.epsilon_mwh,
            })
        })
        .collect()
}

/// Loop horizon and limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceSettings {
    pub guarantee_year: u32,
    pub project_life_years: u32,
    pub max_iterations: u32,
    pub epsilon_mwh: f64,
}

impl ConvergenceSettings {
    pub fn new(guarantee_year: u32, project_life_years: u32) -> Self {
        Self {
            guarantee_year,
            project_life_years,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            epsilon_mwh: DEFAULT_EPSILON_MWH,
        }
    }
}

/// Why a run ended without meeting the guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Two consecutive iterations produced the same block layout.
    Stalled,
    IterationLimit,
    Cancelled,
    /// The configuration delivers nothing at the guarantee year, so no
    /// growth factor exists.
    NoUsableEnergy,
    /// The grown requirement needs more blocks than a count can hold.
    Unreachable,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Stalled => "block layout stopped changing",
            Self::IterationLimit => "iteration limit reached",
            Self::Cancelled => "cancelled",
            Self::NoUsableEnergy => "no usable energy at guarantee year",
            Self::Unreachable => "required block count out of range",
        };
        f.write_str(text)
    }
}

/// One evaluated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub configuration: BlockConfiguration,
    pub records: Vec<YearlyPerformanceRecord>,
    pub usable_at_guarantee_mwh: f64,
}

/// Loop state between iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchState {
    /// Iterations completed so far.
    pub iteration: u32,
    /// DC energy the next iteration will search for (MWh).
    pub required_mwh: f64,
    /// Result of the previous iteration, if any.
    pub last: Option<Evaluation>,
}

/// Final result of a convergence run, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceOutcome {
    pub configuration: BlockConfiguration,
    pub records: Vec<YearlyPerformanceRecord>,
    pub iterations: u32,
    pub converged: bool,
    pub failure: Option<FailureReason>,
    pub guarantee_year: u32,
    pub target_mwh: f64,
    pub usable_at_guarantee_mwh: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConvergenceState {
    Searching(SearchState),
    Converged(ConvergenceOutcome),
    Failed(ConvergenceOutcome),
}

impl ConvergenceState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Searching(_))
    }
}

/// Read-only inputs shared by every iteration of one run.
#[derive(Debug, Clone, Copy)]
pub struct ConvergenceContext<'a> {
    search: BlockSearch<'a>,
    projection: Projection<'a>,
    settings: ConvergenceSettings,
}

impl<'a> ConvergenceContext<'a> {
    /// Validates the horizon and builds the context.
    ///
    /// The target is the requirement's POI energy.
    ///
    /// # Errors
    ///
    /// Returns `SizingError::InvalidInput` when the guarantee year is past
    /// the project life, the iteration cap is zero, epsilon is negative, or
    /// the target is not positive.
    pub fn new(
        search: BlockSearch<'a>,
        requirement: &'a CapacityRequirement,
        soh_profile: &'a SohProfile,
        rte_profile: &'a RteProfile,
        settings: ConvergenceSettings,
    ) -> SizingResult<Self> {
        if settings.guarantee_year > settings.project_life_years {
            return Err(SizingError::invalid(format!(
                "guarantee_year {} is past project_life_years {}",
                settings.guarantee_year, settings.project_life_years
            )));
        }
        if settings.max_iterations == 0 {
            return Err(SizingError::invalid("max_iterations must be > 0"));
        }
        if !(settings.epsilon_mwh.is_finite() && settings.epsilon_mwh >= 0.0) {
            return Err(SizingError::invalid(format!(
                "epsilon_mwh must be >= 0, got {}",
                settings.epsilon_mwh
            )));
        }
        if !(requirement.poi_energy_mwh.is_finite() && requirement.poi_energy_mwh > 0.0) {
            return Err(SizingError::invalid(format!(
                "guarantee target must be > 0, got {}",
                requirement.poi_energy_mwh
            )));
        }
        Ok(Self {
            search,
            projection: Projection {
                requirement,
                soh_profile,
                rte_profile,
                project_life_years: settings.project_life_years,
                target_mwh: requirement.poi_energy_mwh,
                epsilon_mwh: settings.epsilon_mwh,
            },
            settings,
        })
    }

    pub fn target_mwh(&self) -> f64 {
        self.projection.target_mwh
    }

    /// State before the first iteration: search for the BOL requirement.
    pub fn initial_state(&self) -> ConvergenceState {
        ConvergenceState::Searching(SearchState {
            iteration: 0,
            required_mwh: self.projection.requirement.dc_energy_required_mwh,
            last: None,
        })
    }

    /// Evaluates `R = state.required_mwh` once and decides the next state.
    ///
    /// On a miss, `R` grows to `max(R, nameplate) * target / usable`, which is
    /// strictly above the current nameplate, so the next search adds blocks.
    /// A grown `R` that no block count can cover ends the run as
    /// `Failed(Unreachable)` with this iteration's result.
    ///
    /// # Errors
    ///
    /// Propagates search and projection errors.
    pub fn step(&self, state: SearchState) -> SizingResult<ConvergenceState> {
        let iteration = state.iteration + 1;
        let configuration = self.search.search(state.required_mwh)?;
        let records = project_performance(&configuration, &self.projection)?;
        let usable = records
            .get(self.settings.guarantee_year as usize)
            .map(|r| r.poi_usable_mwh)
            .ok_or_else(|| SizingError::invalid("guarantee year outside projection"))?;
        let target = self.target_mwh();

        debug!(
            iteration,
            required_mwh = state.required_mwh,
            containers = configuration.container_count,
            cabinets = configuration.cabinet_count,
            usable_mwh = usable,
            target_mwh = target,
            "convergence iteration"
        );

        let stalled = state
            .last
            .as_ref()
            .is_some_and(|prev| prev.configuration.same_layout(&configuration));
        let evaluation = Evaluation {
            configuration,
            records,
            usable_at_guarantee_mwh: usable,
        };

        if usable >= target - self.settings.epsilon_mwh {
            return Ok(ConvergenceState::Converged(
                self.finish(evaluation, iteration, None),
            ));
        }
        let failure = if stalled {
            Some(FailureReason::Stalled)
        } else if iteration >= self.settings.max_iterations {
            Some(FailureReason::IterationLimit)
        } else if usable.is_nan() || usable <= 0.0 {
            Some(FailureReason::NoUsableEnergy)
        } else {
            None
        };
        if let Some(reason) = failure {
            return Ok(ConvergenceState::Failed(
                self.finish(evaluation, iteration, Some(reason)),
            ));
        }

        let base = state
            .required_mwh
            .max(evaluation.configuration.nameplate_mwh);
        let required_mwh = base * target / usable;
        // Same search parameters as this iteration, so only the size can fail.
        if let Err(err) = self.search.search(required_mwh) {
            debug!(iteration, required_mwh, %err, "grown requirement out of range");
            return Ok(ConvergenceState::Failed(self.finish(
                evaluation,
                iteration,
                Some(FailureReason::Unreachable),
            )));
        }
        Ok(ConvergenceState::Searching(SearchState {
            iteration,
            required_mwh,
            last: Some(evaluation),
        }))
    }

    /// Steps until a terminal state.
    ///
    /// `cancel` is polled once per iteration; when set, the run ends as
    /// `Failed(Cancelled)` with the latest evaluation.
    ///
    /// # Errors
    ///
    /// Only malformed inputs error; failing to converge is reported on the
    /// outcome.
    pub fn run(&self, cancel: Option<&AtomicBool>) -> SizingResult<ConvergenceOutcome> {
        let mut state = self.initial_state();
        loop {
            match state {
                ConvergenceState::Searching(search) => {
                    state = self.step(search)?;
                    let cancelled = cancel.is_some_and(|c| c.load(Ordering::Relaxed));
                    if let (true, ConvergenceState::Searching(search)) = (cancelled, &state) {
                        if let Some(evaluation) = search.last.clone() {
                            let outcome = self.finish(
                                evaluation,
                                search.iteration,
                                Some(FailureReason::Cancelled),
                            );
                            warn!(iterations = outcome.iterations, "sizing cancelled");
                            return Ok(outcome);
                        }
                    }
                }
                ConvergenceState::Converged(outcome) => {
                    info!(
                        iterations = outcome.iterations,
                        nameplate_mwh = outcome.configuration.nameplate_mwh,
                        usable_mwh = outcome.usable_at_guarantee_mwh,
                        "guarantee met"
                    );
                    return Ok(outcome);
                }
                ConvergenceState::Failed(outcome) => {
                    warn!(
                        iterations = outcome.iterations,
                        usable_mwh = outcome.usable_at_guarantee_mwh,
                        target_mwh = outcome.target_mwh,
                        reason = %outcome.failure.map_or_else(String::new, |r| r.to_string()),
                        "guarantee not met"
                    );
                    return Ok(outcome);
                }
            }
        }
    }

    fn finish(
        &self,
        evaluation: Evaluation,
        iterations: u32,
        failure: Option<FailureReason>,
    ) -> ConvergenceOutcome {
        ConvergenceOutcome {
            configuration: evaluation.configuration,
            records: evaluation.records,
            iterations,
            converged: failure.is_none(),
            failure,
            guarantee_year: self.settings.guarantee_year,
            target_mwh: self.target_mwh(),
            usable_at_guarantee_mwh: evaluation.usable_at_guarantee_mwh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BlockForm, DcBlockTemplate, RteBand};
    use crate::sizing::blocks::SizingMode;
    use crate::sizing::capacity::{CapacityInputs, compute_requirement};
    use crate::sizing::efficiency::EfficiencyChain;

    fn requirement(poi_energy_mwh: f64) -> CapacityRequirement {
        compute_requirement(&CapacityInputs {
            poi_power_mw: poi_energy_mwh / 4.0,
            poi_energy_mwh,
            efficiency: EfficiencyChain::new(0.99, 0.985, 0.99, 0.995, 0.998)
                .expect("stages are in range"),
            dod_frac: 0.95,
            dc_round_trip_efficiency_frac: 0.94,
            self_commissioning_months: 6,
        })
        .expect("valid inputs")
    }

    fn soh() -> SohProfile {
        SohProfile::new("linear", 0.25, 365.0, vec![1.0, 0.96, 0.92, 0.88, 0.84, 0.80])
    }

    fn rte() -> RteProfile {
        RteProfile::new(
            "flat",
            0.25,
            vec![RteBand {
                min_soh: 0.0,
                rte: 0.94,
            }],
        )
    }

    fn container() -> DcBlockTemplate {
        DcBlockTemplate::new(BlockForm::Container, 5.0, "C5", "5 MWh")
    }

    fn search(template: &DcBlockTemplate) -> BlockSearch<'_> {
        BlockSearch {
            mode: SizingMode::ContainerOnly,
            container: template,
            cabinet: None,
            max_cabinets_per_busbar: 4,
        }
    }

    #[test]
    fn projection_year_zero_matches_requirement_chain() {
        let req = requirement(100.0);
        let (soh, rte) = (soh(), rte());
        let cont = container();
        let cfg = search(&cont).search(req.dc_energy_required_mwh).expect("search");
        let projection = Projection {
            requirement: &req,
            soh_profile: &soh,
            rte_profile: &rte,
            project_life_years: 8,
            target_mwh: 100.0,
            epsilon_mwh: 1e-6,
        };
        let records = project_performance(&cfg, &projection).expect("projection");
        assert_eq!(records.len(), 9);
        let y0 = &records[0];
        let expected = cfg.nameplate_mwh * (1.0 - req.sc_loss_frac) * req.dod_frac
            * 0.94_f64.sqrt()
            * req.eff_chain_oneway_frac;
        assert!((y0.poi_usable_mwh - expected).abs() < 1e-9);
        assert!(y0.meets_guarantee);
        // Curve ends at year 5; later years hold flat.
        assert_eq!(records[8].soh_relative, 0.80);
        assert!(records.windows(2).all(|w| w[1].poi_usable_mwh <= w[0].poi_usable_mwh));
    }

    #[test]
    fn converges_when_guarantee_reachable() {
        let req = requirement(100.0);
        let (soh, rte) = (soh(), rte());
        let cont = container();
        let ctx = ConvergenceContext::new(
            search(&cont),
            &req,
            &soh,
            &rte,
            ConvergenceSettings::new(5, 10),
        )
        .expect("valid context");
        let outcome = ctx.run(None).expect("run");
        assert!(outcome.converged);
        assert!(outcome.failure.is_none());
        assert!(outcome.usable_at_guarantee_mwh >= 100.0 - 1e-6);
        assert!(outcome.iterations >= 2, "year-5 fade needs growth");
        assert!(outcome.configuration.nameplate_mwh > req.dc_energy_required_mwh);
        assert_eq!(outcome.records.len(), 11);
        assert!(outcome.records[5].meets_guarantee);
    }

    #[test]
    fn guarantee_at_bol_converges_first_iteration() {
        let req = requirement(100.0);
        let (soh, rte) = (soh(), rte());
        let cont = container();
        let ctx = ConvergenceContext::new(
            search(&cont),
            &req,
            &soh,
            &rte,
            ConvergenceSettings::new(0, 5),
        )
        .expect("valid context");
        let outcome = ctx.run(None).expect("run");
        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn iteration_limit_returns_best_effort() {
        let req = requirement(100.0);
        let (soh, rte) = (soh(), rte());
        let cont = container();
        let settings = ConvergenceSettings {
            max_iterations: 1,
            ..ConvergenceSettings::new(5, 5)
        };
        let ctx = ConvergenceContext::new(search(&cont), &req, &soh, &rte, settings)
            .expect("valid context");
        let outcome = ctx.run(None).expect("run");
        assert!(!outcome.converged);
        assert_eq!(outcome.failure, Some(FailureReason::IterationLimit));
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.configuration.container_count > 0);
    }

    #[test]
    fn identical_layout_twice_stalls() {
        let req = requirement(100.0);
        let (soh, rte) = (soh(), rte());
        let cont = container();
        let ctx = ConvergenceContext::new(
            search(&cont),
            &req,
            &soh,
            &rte,
            ConvergenceSettings::new(5, 5),
        )
        .expect("valid context");

        let required = req.dc_energy_required_mwh;
        let cfg = search(&cont).search(required).expect("search");
        let records = project_performance(&cfg, &ctx.projection).expect("projection");
        let usable = records[5].poi_usable_mwh;
        let state = SearchState {
            iteration: 3,
            required_mwh: required,
            last: Some(Evaluation {
                configuration: cfg,
                records,
                usable_at_guarantee_mwh: usable,
            }),
        };
        match ctx.step(state).expect("step") {
            ConvergenceState::Failed(outcome) => {
                assert_eq!(outcome.failure, Some(FailureReason::Stalled));
                assert_eq!(outcome.iterations, 4);
            }
            other => panic!("expected stall, got {other:?}"),
        }
    }

    #[test]
    fn step_grows_requirement_past_nameplate() {
        let req = requirement(100.0);
        let (soh, rte) = (soh(), rte());
        let cont = container();
        let ctx = ConvergenceContext::new(
            search(&cont),
            &req,
            &soh,
            &rte,
            ConvergenceSettings::new(5, 5),
        )
        .expect("valid context");
        let ConvergenceState::Searching(first) = ctx.initial_state() else {
            panic!("initial state must be searching");
        };
        let next = ctx.step(first.clone()).expect("step");
        let ConvergenceState::Searching(second) = next else {
            panic!("year-5 fade should need another iteration");
        };
        let nameplate = second
            .last
            .as_ref()
            .map_or(0.0, |e| e.configuration.nameplate_mwh);
        assert_eq!(second.iteration, 1);
        assert!(second.required_mwh > first.required_mwh);
        assert!(second.required_mwh > nameplate);
    }

    #[test]
    fn cancellation_stops_after_one_iteration() {
        let req = requirement(100.0);
        let (soh, rte) = (soh(), rte());
        let cont = container();
        let ctx = ConvergenceContext::new(
            search(&cont),
            &req,
            &soh,
            &rte,
            ConvergenceSettings::new(5, 5),
        )
        .expect("valid context");
        let cancel = AtomicBool::new(true);
        let outcome = ctx.run(Some(&cancel)).expect("run");
        assert_eq!(outcome.failure, Some(FailureReason::Cancelled));
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn collapsed_curve_fails_instead_of_erroring() {
        let req = requirement(100.0);
        let soh = SohProfile::new("collapse", 0.25, 365.0, vec![1.0, 1e-9]);
        let rte = rte();
        let cont = container();
        let ctx = ConvergenceContext::new(
            search(&cont),
            &req,
            &soh,
            &rte,
            ConvergenceSettings::new(1, 1),
        )
        .expect("valid context");
        let outcome = ctx.run(None).expect("an unreachable target is not an error");
        assert!(!outcome.converged);
        assert_eq!(outcome.failure, Some(FailureReason::Unreachable));
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.usable_at_guarantee_mwh > 0.0);
        assert!(outcome.usable_at_guarantee_mwh < outcome.target_mwh);
        assert!(outcome.configuration.container_count > 0);
    }

    #[test]
    fn guarantee_past_life_rejected() {
        let req = requirement(100.0);
        let (soh, rte) = (soh(), rte());
        let cont = container();
        let result = ConvergenceContext::new(
            search(&cont),
            &req,
            &soh,
            &rte,
            ConvergenceSettings::new(11, 10),
        );
        assert!(matches!(result, Err(SizingError::InvalidInput(_))));
    }

    #[test]
    fn zero_iterations_rejected() {
        let req = requirement(100.0);
        let (soh, rte) = (soh(), rte());
        let cont = container();
        let settings = ConvergenceSettings {
            max_iterations: 0,
            ..ConvergenceSettings::new(5, 10)
        };
        let result = ConvergenceContext::new(search(&cont), &req, &soh, &rte, settings);
        assert!(result.is_err());
    }
}
