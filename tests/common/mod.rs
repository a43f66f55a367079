//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use bess_sizing::catalog::SizingCatalogs;
use bess_sizing::sizing::blocks::SizingMode;
use bess_sizing::sizing::capacity::{CapacityInputs, CapacityRequirement, compute_requirement};
use bess_sizing::sizing::efficiency::EfficiencyChain;
use bess_sizing::sizing::{SizingEngine, SizingInputs};

/// Default loss chain (0.99, 0.985, 0.99, 0.995, 0.998).
pub fn default_chain() -> EfficiencyChain {
    EfficiencyChain::new(0.99, 0.985, 0.99, 0.995, 0.998).expect("stages are in range")
}

/// 100 MW / 400 MWh requirement inputs, 95% DOD, 94% DC RTE, 6-month commissioning.
pub fn default_capacity_inputs() -> CapacityInputs {
    CapacityInputs {
        poi_power_mw: 100.0,
        poi_energy_mwh: 400.0,
        efficiency: default_chain(),
        dod_frac: 0.95,
        dc_round_trip_efficiency_frac: 0.94,
        self_commissioning_months: 6,
    }
}

/// Requirement derived from [`default_capacity_inputs`].
pub fn default_requirement() -> CapacityRequirement {
    compute_requirement(&default_capacity_inputs()).expect("valid inputs")
}

/// Container-only run over 20 years, guaranteed at year 20, two feeders.
pub fn default_inputs() -> SizingInputs {
    SizingInputs {
        capacity: default_capacity_inputs(),
        project_life_years: 20,
        guarantee_year: 20,
        cycles_per_year: 365.0,
        mode: SizingMode::ContainerOnly,
        container_code: None,
        cabinet_code: None,
        max_cabinets_per_busbar: 6,
        max_iterations: 20,
        epsilon_mwh: 1e-6,
        ac_search_extra: 40,
        adjustment_max_delta: 2,
        feeders: 2,
        min_ac_blocks_per_feeder: 1,
    }
}

/// Engine over the built-in catalogs, with debug logs routed to the test output.
pub fn default_engine() -> SizingEngine {
    bess_sizing::logging::init_test();
    SizingEngine::new(SizingCatalogs::default()).expect("built-in catalogs are valid")
}
