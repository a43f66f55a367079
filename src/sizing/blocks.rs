//! Discrete DC block configuration search against the template catalog.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{BlockForm, DcBlockTemplate};
use crate::error::{SizingError, SizingResult};

/// How the DC energy is split across enclosure forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMode {
    /// Containers only, rounded up.
    ContainerOnly,
    /// Whole containers plus cabinets for the remainder.
    Hybrid,
    /// Cabinets only, grouped onto busbars.
    CabinetOnly,
}

impl SizingMode {
    pub const ALL: [SizingMode; 3] = [Self::ContainerOnly, Self::Hybrid, Self::CabinetOnly];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContainerOnly => "container_only",
            Self::Hybrid => "hybrid",
            Self::CabinetOnly => "cabinet_only",
        }
    }
}

impl fmt::Display for SizingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one search call. Replaced wholesale on every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockConfiguration {
    pub mode: SizingMode,
    pub container_count: u32,
    pub cabinet_count: u32,
    pub busbars_needed: u32,
    pub nameplate_mwh: f64,
    /// Energy the search was asked for (MWh).
    pub required_mwh: f64,
    pub oversize_mwh: f64,
    pub config_adjustment_frac: f64,
}

impl BlockConfiguration {
    /// Total DC blocks of both forms.
    pub fn total_blocks(&self) -> u32 {
        self.container_count + self.cabinet_count
    }

    /// `true` when both configurations build the same hardware.
    pub fn same_layout(&self, other: &Self) -> bool {
        self.mode == other.mode
            && self.container_count == other.container_count
            && self.cabinet_count == other.cabinet_count
            && self.busbars_needed == other.busbars_needed
    }
}

/// Search parameters fixed for a sizing run.
#[derive(Debug, Clone, Copy)]
pub struct BlockSearch<'a> {
    pub mode: SizingMode,
    pub container: &'a DcBlockTemplate,
    pub cabinet: Option<&'a DcBlockTemplate>,
    /// Maximum cabinets on one busbar (must be > 0).
    pub max_cabinets_per_busbar: u32,
}

impl BlockSearch<'_> {
    /// Converts a required DC energy into discrete block counts.
    ///
    /// # Errors
    ///
    /// Returns `SizingError::InvalidInput` for a negative requirement, a
    /// zero busbar limit, or a non-positive template capacity, and
    /// `SizingError::Catalog` when the mode needs a cabinet template and
    /// none was given, or a template has the wrong form.
    pub fn search(&self, required_mwh: f64) -> SizingResult<BlockConfiguration> {
        if !required_mwh.is_finite() || required_mwh < 0.0 {
            return Err(SizingError::invalid(format!(
                "required energy must be >= 0, got {required_mwh}"
            )));
        }
        if self.max_cabinets_per_busbar == 0 {
            return Err(SizingError::invalid("max_cabinets_per_busbar must be > 0"));
        }

        let cabinet_capacity = self.cabinet.map_or(0.0, |c| c.capacity_mwh);
        let nameplate = |containers: u32, cabinets: u32| {
            block_energy(containers, self.container.capacity_mwh)
                + block_energy(cabinets, cabinet_capacity)
        };

        let (container_count, cabinet_count, busbars_needed) = match self.mode {
            SizingMode::ContainerOnly => {
                let cap = template_capacity(self.container, BlockForm::Container)?;
                let count = cover_count(floor_count(required_mwh / cap)?, |n| {
                    nameplate(n, 0) >= required_mwh
                })?;
                (count, 0, 0)
            }
            SizingMode::CabinetOnly => {
                let cab = self.cabinet_template()?;
                let cap = template_capacity(cab, BlockForm::Cabinet)?;
                let count = cover_count(floor_count(required_mwh / cap)?, |n| {
                    nameplate(0, n) >= required_mwh
                })?;
                (0, count, count.div_ceil(self.max_cabinets_per_busbar))
            }
            SizingMode::Hybrid => {
                let cont_cap = template_capacity(self.container, BlockForm::Container)?;
                let cab = self.cabinet_template()?;
                let cab_cap = template_capacity(cab, BlockForm::Cabinet)?;
                let cabinets_for = |containers: u32| -> SizingResult<u32> {
                    let remainder = required_mwh - f64::from(containers) * cont_cap;
                    cover_count(floor_count(remainder.max(0.0) / cab_cap)?, |n| {
                        nameplate(containers, n) >= required_mwh
                    })
                };
                let mut cont_count = floor_count(required_mwh / cont_cap)?;
                let mut cab_count = cabinets_for(cont_count)?;
                // A container's worth of cabinets becomes one more container.
                if f64::from(cab_count) * cab_cap >= cont_cap {
                    cont_count = next_count(cont_count)?;
                    cab_count = cabinets_for(cont_count)?;
                }
                (cont_count, cab_count, u32::from(cab_count > 0))
            }
        };

        let nameplate_mwh = nameplate(container_count, cabinet_count);
        let config_adjustment_frac = if required_mwh > 0.0 {
            nameplate_mwh / required_mwh - 1.0
        } else {
            0.0
        };

        Ok(BlockConfiguration {
            mode: self.mode,
            container_count,
            cabinet_count,
            busbars_needed,
            nameplate_mwh,
            required_mwh,
            oversize_mwh: nameplate_mwh - required_mwh,
            config_adjustment_frac,
        })
    }

    fn cabinet_template(&self) -> SizingResult<&DcBlockTemplate> {
        self.cabinet.ok_or_else(|| {
            SizingError::catalog(format!("mode {} requires a cabinet template", self.mode))
        })
    }
}

fn template_capacity(template: &DcBlockTemplate, form: BlockForm) -> SizingResult<f64> {
    if template.form != form {
        return Err(SizingError::catalog(format!(
            "template `{}` is a {}, expected a {}",
            template.code,
            template.form.as_str(),
            form.as_str()
        )));
    }
    if !template.capacity_mwh.is_finite() || template.capacity_mwh <= 0.0 {
        return Err(SizingError::invalid(format!(
            "template `{}` capacity must be > 0, got {}",
            template.code, template.capacity_mwh
        )));
    }
    Ok(template.capacity_mwh)
}

/// Unused forms contribute nothing, whatever their template says.
fn block_energy(count: u32, capacity_mwh: f64) -> f64 {
    if count == 0 {
        0.0
    } else {
        f64::from(count) * capacity_mwh
    }
}

/// Whole blocks at or below `ratio`.
fn floor_count(ratio: f64) -> SizingResult<u32> {
    to_count(ratio.floor())
}

/// Smallest count from `start` upward for which `covers` holds.
///
/// `start` is a floor, so this runs at most a couple of times; checking the
/// rebuilt nameplate keeps division noise from ever leaving a shortfall.
fn cover_count(start: u32, covers: impl Fn(u32) -> bool) -> SizingResult<u32> {
    let mut count = start;
    while !covers(count) {
        count = next_count(count)?;
    }
    Ok(count)
}

fn next_count(count: u32) -> SizingResult<u32> {
    count
        .checked_add(1)
        .ok_or_else(|| SizingError::invalid("block count exceeds supported range"))
}

fn to_count(value: f64) -> SizingResult<u32> {
    if value > f64::from(u32::MAX) {
        return Err(SizingError::invalid(format!(
            "block count {value} exceeds supported range"
        )));
    }
    // Non-negative and in range after the check above.
    Ok(value.max(0.0) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container() -> DcBlockTemplate {
        DcBlockTemplate::new(BlockForm::Container, 5.0, "C5", "5 MWh container")
    }

    fn cabinet() -> DcBlockTemplate {
        DcBlockTemplate::new(BlockForm::Cabinet, 0.4, "K04", "400 kWh cabinet")
    }

    fn search(mode: SizingMode, required: f64) -> SizingResult<BlockConfiguration> {
        let cont = container();
        let cab = cabinet();
        BlockSearch {
            mode,
            container: &cont,
            cabinet: Some(&cab),
            max_cabinets_per_busbar: 4,
        }
        .search(required)
    }

    #[test]
    fn container_only_rounds_up() {
        let cfg = search(SizingMode::ContainerOnly, 101.0).expect("valid search");
        assert_eq!(cfg.container_count, 21);
        assert_eq!(cfg.cabinet_count, 0);
        assert_eq!(cfg.busbars_needed, 0);
        assert!((cfg.nameplate_mwh - 105.0).abs() < 1e-12);
        assert!((cfg.oversize_mwh - 4.0).abs() < 1e-12);
        assert!((cfg.config_adjustment_frac - (105.0 / 101.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn exact_multiple_has_no_oversize() {
        let cfg = search(SizingMode::ContainerOnly, 100.0).expect("valid search");
        assert_eq!(cfg.container_count, 20);
        assert!(cfg.oversize_mwh.abs() < 1e-12);
    }

    #[test]
    fn float_noise_does_not_add_a_block() {
        let cont = DcBlockTemplate::new(BlockForm::Container, 5.016, "C", "c");
        let nameplate = 37.0 * 5.016;
        let cfg = BlockSearch {
            mode: SizingMode::ContainerOnly,
            container: &cont,
            cabinet: None,
            max_cabinets_per_busbar: 1,
        }
        .search(nameplate)
        .expect("valid search");
        assert_eq!(cfg.container_count, 37);
    }

    #[test]
    fn just_above_a_multiple_adds_a_block() {
        let cfg = search(SizingMode::ContainerOnly, 100.000000004).expect("valid search");
        assert_eq!(cfg.container_count, 21);
        assert!(cfg.nameplate_mwh >= cfg.required_mwh);
        assert!(cfg.oversize_mwh > 0.0);

        let cfg = search(SizingMode::CabinetOnly, 4.000000001).expect("valid search");
        assert_eq!(cfg.cabinet_count, 11);
        assert!(cfg.oversize_mwh > 0.0);
    }

    #[test]
    fn hybrid_folds_a_container_of_cabinets() {
        let cont = container();
        let cab = DcBlockTemplate::new(BlockForm::Cabinet, 0.5, "K05", "500 kWh cabinet");
        let search = BlockSearch {
            mode: SizingMode::Hybrid,
            container: &cont,
            cabinet: Some(&cab),
            max_cabinets_per_busbar: 4,
        };
        // 4 containers leave 4.8 MWh, which would take 10 cabinets.
        let cfg = search.search(24.8).expect("valid search");
        assert_eq!(cfg.container_count, 5);
        assert_eq!(cfg.cabinet_count, 0);
        assert_eq!(cfg.busbars_needed, 0);
        assert!(cfg.nameplate_mwh >= 24.8);

        let again = search.search(cfg.nameplate_mwh).expect("valid search");
        assert!(again.same_layout(&cfg));
    }

    #[test]
    fn cabinet_only_groups_busbars() {
        let cfg = search(SizingMode::CabinetOnly, 4.1).expect("valid search");
        assert_eq!(cfg.cabinet_count, 11);
        assert_eq!(cfg.busbars_needed, 3);
        assert_eq!(cfg.container_count, 0);
    }

    #[test]
    fn hybrid_covers_remainder_with_cabinets() {
        let cfg = search(SizingMode::Hybrid, 21.0).expect("valid search");
        assert_eq!(cfg.container_count, 4);
        assert_eq!(cfg.cabinet_count, 3);
        assert_eq!(cfg.busbars_needed, 1);
        assert!(cfg.nameplate_mwh >= 21.0);
    }

    #[test]
    fn hybrid_without_remainder_has_no_busbar() {
        let cfg = search(SizingMode::Hybrid, 20.0).expect("valid search");
        assert_eq!(cfg.container_count, 4);
        assert_eq!(cfg.cabinet_count, 0);
        assert_eq!(cfg.busbars_needed, 0);
    }

    #[test]
    fn zero_requirement_builds_nothing() {
        let cfg = search(SizingMode::ContainerOnly, 0.0).expect("valid search");
        assert_eq!(cfg.total_blocks(), 0);
        assert_eq!(cfg.config_adjustment_frac, 0.0);
    }

    #[test]
    fn negative_requirement_rejected() {
        assert!(matches!(
            search(SizingMode::ContainerOnly, -1.0),
            Err(SizingError::InvalidInput(_))
        ));
    }

    #[test]
    fn hybrid_without_cabinet_is_catalog_error() {
        let cont = container();
        let result = BlockSearch {
            mode: SizingMode::Hybrid,
            container: &cont,
            cabinet: None,
            max_cabinets_per_busbar: 4,
        }
        .search(10.0);
        assert!(matches!(result, Err(SizingError::Catalog(_))));
    }

    #[test]
    fn zero_busbar_limit_rejected() {
        let cont = container();
        let cab = cabinet();
        let result = BlockSearch {
            mode: SizingMode::CabinetOnly,
            container: &cont,
            cabinet: Some(&cab),
            max_cabinets_per_busbar: 0,
        }
        .search(10.0);
        assert!(matches!(result, Err(SizingError::InvalidInput(_))));
    }

    #[test]
    fn zero_capacity_template_rejected() {
        let cont = DcBlockTemplate::new(BlockForm::Container, 0.0, "Z", "zero");
        let result = BlockSearch {
            mode: SizingMode::ContainerOnly,
            container: &cont,
            cabinet: None,
            max_cabinets_per_busbar: 4,
        }
        .search(10.0);
        assert!(matches!(result, Err(SizingError::InvalidInput(_))));
    }
}
