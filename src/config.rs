//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::catalog::{BlockForm, SizingCatalogs};
use crate::sizing::SizingInputs;
use crate::sizing::ac_match::DEFAULT_SEARCH_EXTRA;
use crate::sizing::blocks::SizingMode;
use crate::sizing::capacity::CapacityInputs;
use crate::sizing::convergence::{DEFAULT_EPSILON_MWH, DEFAULT_MAX_ITERATIONS};
use crate::sizing::efficiency::EfficiencyChain;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// POI requirement and project horizon.
    #[serde(default)]
    pub project: ProjectConfig,
    /// Loss chain, depth of discharge and commissioning period.
    #[serde(default)]
    pub efficiency: EfficiencyConfig,
    /// Block search, convergence and AC matching knobs.
    #[serde(default)]
    pub sizing: SizingConfig,
    /// Catalog overrides; omitted tables keep the built-in catalogs.
    #[serde(default)]
    pub catalogs: SizingCatalogs,
}

/// POI requirement and project horizon.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Required power at the POI (MW, > 0).
    pub poi_power_mw: f64,
    /// Required usable energy at the POI (MWh, > 0).
    pub poi_energy_mwh: f64,
    /// Years of operation projected after BOL (> 0).
    pub project_life_years: u32,
    /// Full cycles per year, used for SOH profile selection.
    pub cycles_per_year: f64,
    /// Year the POI energy must still be delivered (<= project life).
    pub guarantee_year: u32,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            poi_power_mw: 100.0,
            poi_energy_mwh: 400.0,
            project_life_years: 20,
            cycles_per_year: 365.0,
            guarantee_year: 20,
        }
    }
}

/// Loss chain, depth of discharge and commissioning period.
///
/// Every fraction lies in (0, 1].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EfficiencyConfig {
    pub dc_cabling: f64,
    pub pcs: f64,
    pub transformer: f64,
    pub ac_cabling: f64,
    pub hv_other: f64,
    /// Depth of discharge.
    pub dod: f64,
    /// DC round-trip efficiency at BOL.
    pub dc_round_trip: f64,
    /// Months between energisation and COD (clamped up to 3).
    pub self_commissioning_months: u32,
}

impl Default for EfficiencyConfig {
    fn default() -> Self {
        Self {
            dc_cabling: 0.99,
            pcs: 0.985,
            transformer: 0.99,
            ac_cabling: 0.995,
            hv_other: 0.998,
            dod: 0.95,
            dc_round_trip: 0.94,
            self_commissioning_months: 6,
        }
    }
}

/// Block search, convergence and AC matching knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizingConfig {
    /// `container_only`, `hybrid` or `cabinet_only`.
    pub mode: SizingMode,
    /// Container template code; catalog default when omitted.
    pub container_code: Option<String>,
    /// Cabinet template code; catalog default when omitted.
    pub cabinet_code: Option<String>,
    /// Cabinets per busbar in cabinet-only mode (> 0).
    pub max_cabinets_per_busbar: u32,
    pub max_iterations: u32,
    /// Tolerance on the guarantee comparison (MWh, >= 0).
    pub epsilon_mwh: f64,
    /// AC quantities scanned above the minimum per template.
    pub ac_search_extra: u32,
    /// DC count perturbation range for AC adjustment suggestions.
    pub adjustment_max_delta: u32,
    /// Medium-voltage feeders (> 0).
    pub feeders: u32,
    /// AC blocks every feeder should receive before the rest is spread.
    pub min_ac_blocks_per_feeder: u32,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            mode: SizingMode::ContainerOnly,
            container_code: None,
            cabinet_code: None,
            max_cabinets_per_busbar: 6,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            epsilon_mwh: DEFAULT_EPSILON_MWH,
            ac_search_extra: DEFAULT_SEARCH_EXTRA,
            adjustment_max_delta: 2,
            feeders: 2,
            min_ac_blocks_per_feeder: 1,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"project.poi_power_mw"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl ScenarioConfig {
    /// Returns the baseline scenario: 100 MW / 400 MWh, containers only,
    /// energy guaranteed through year 20.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the hybrid preset: containers topped up with cabinets and a
    /// year-15 guarantee.
    pub fn hybrid() -> Self {
        Self {
            project: ProjectConfig {
                poi_power_mw: 50.0,
                poi_energy_mwh: 200.0,
                project_life_years: 20,
                guarantee_year: 15,
                ..ProjectConfig::default()
            },
            sizing: SizingConfig {
                mode: SizingMode::Hybrid,
                feeders: 1,
                ..SizingConfig::default()
            },
            ..Self::default()
        }
    }

    /// Returns the long-duration preset: 8-hour storage cycled every other
    /// day over 25 years.
    pub fn long_duration() -> Self {
        Self {
            project: ProjectConfig {
                poi_power_mw: 50.0,
                poi_energy_mwh: 400.0,
                project_life_years: 25,
                cycles_per_year: 180.0,
                guarantee_year: 20,
            },
            efficiency: EfficiencyConfig {
                self_commissioning_months: 9,
                ..EfficiencyConfig::default()
            },
            sizing: SizingConfig {
                feeders: 3,
                min_ac_blocks_per_feeder: 2,
                ..SizingConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "hybrid", "long_duration"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "hybrid" => Ok(Self::hybrid()),
            "long_duration" => Ok(Self::long_duration()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let p = &self.project;
        positive(&mut errors, "project.poi_power_mw", p.poi_power_mw);
        positive(&mut errors, "project.poi_energy_mwh", p.poi_energy_mwh);
        positive(&mut errors, "project.cycles_per_year", p.cycles_per_year);
        if p.project_life_years == 0 {
            errors.push(ConfigError::new("project.project_life_years", "must be > 0"));
        }
        if p.guarantee_year > p.project_life_years {
            errors.push(ConfigError::new(
                "project.guarantee_year",
                "must be <= project.project_life_years",
            ));
        }

        let e = &self.efficiency;
        for (field, value) in [
            ("efficiency.dc_cabling", e.dc_cabling),
            ("efficiency.pcs", e.pcs),
            ("efficiency.transformer", e.transformer),
            ("efficiency.ac_cabling", e.ac_cabling),
            ("efficiency.hv_other", e.hv_other),
            ("efficiency.dod", e.dod),
            ("efficiency.dc_round_trip", e.dc_round_trip),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                errors.push(ConfigError::new(
                    field,
                    format!("must be in (0.0, 1.0], got {value}"),
                ));
            }
        }

        let s = &self.sizing;
        if s.max_cabinets_per_busbar == 0 {
            errors.push(ConfigError::new("sizing.max_cabinets_per_busbar", "must be > 0"));
        }
        if s.max_iterations == 0 {
            errors.push(ConfigError::new("sizing.max_iterations", "must be > 0"));
        }
        if !(s.epsilon_mwh.is_finite() && s.epsilon_mwh >= 0.0) {
            errors.push(ConfigError::new("sizing.epsilon_mwh", "must be >= 0"));
        }
        if s.feeders == 0 {
            errors.push(ConfigError::new("sizing.feeders", "must be > 0"));
        }

        if let Err(err) = self.catalogs.validate() {
            errors.push(ConfigError::new("catalogs", err.to_string()));
            return errors;
        }
        if let Err(err) = self
            .catalogs
            .resolve_dc_block(BlockForm::Container, s.container_code.as_deref())
        {
            errors.push(ConfigError::new("sizing.container_code", err.to_string()));
        }
        if s.mode != SizingMode::ContainerOnly || s.cabinet_code.is_some() {
            if let Err(err) = self
                .catalogs
                .resolve_dc_block(BlockForm::Cabinet, s.cabinet_code.as_deref())
            {
                errors.push(ConfigError::new("sizing.cabinet_code", err.to_string()));
            }
        }

        errors
    }

    /// Builds engine inputs from a validated scenario.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if an efficiency stage is out of range.
    pub fn sizing_inputs(&self) -> Result<SizingInputs, ConfigError> {
        let e = &self.efficiency;
        let efficiency =
            EfficiencyChain::new(e.dc_cabling, e.pcs, e.transformer, e.ac_cabling, e.hv_other)
                .map_err(|err| ConfigError::new("efficiency", err.to_string()))?;
        let p = &self.project;
        let s = &self.sizing;
        Ok(SizingInputs {
            capacity: CapacityInputs {
                poi_power_mw: p.poi_power_mw,
                poi_energy_mwh: p.poi_energy_mwh,
                efficiency,
                dod_frac: e.dod,
                dc_round_trip_efficiency_frac: e.dc_round_trip,
                self_commissioning_months: e.self_commissioning_months,
            },
            project_life_years: p.project_life_years,
            guarantee_year: p.guarantee_year,
            cycles_per_year: p.cycles_per_year,
            mode: s.mode,
            container_code: s.container_code.clone(),
            cabinet_code: s.cabinet_code.clone(),
            max_cabinets_per_busbar: s.max_cabinets_per_busbar,
            max_iterations: s.max_iterations,
            epsilon_mwh: s.epsilon_mwh,
            ac_search_extra: s.ac_search_extra,
            adjustment_max_delta: s.adjustment_max_delta,
            feeders: s.feeders,
            min_ac_blocks_per_feeder: s.min_ac_blocks_per_feeder,
        })
    }
}

fn positive(errors: &mut Vec<ConfigError>, field: &str, value: f64) {
    if !(value.is_finite() && value > 0.0) {
        errors.push(ConfigError::new(field, format!("must be > 0, got {value}")));
    }
}
