//! DC block templates: battery enclosures with a nameplate energy rating.

use serde::{Deserialize, Serialize};

use crate::error::{SizingError, SizingResult};

/// Enclosure form factor of a DC block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockForm {
    Container,
    Cabinet,
}

impl BlockForm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Cabinet => "cabinet",
        }
    }
}

/// A catalog entry describing one manufacturable DC block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DcBlockTemplate {
    /// Container or cabinet.
    pub form: BlockForm,
    /// Nameplate energy per block (MWh, must be > 0).
    pub capacity_mwh: f64,
    /// Short catalog code, unique within a catalog.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Inactive entries are kept for reference but never auto-selected.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Preferred entry for its form when no code is given.
    #[serde(default)]
    pub is_default: bool,
}

fn default_true() -> bool {
    true
}

impl DcBlockTemplate {
    pub fn new(form: BlockForm, capacity_mwh: f64, code: &str, name: &str) -> Self {
        Self {
            form,
            capacity_mwh,
            code: code.to_string(),
            name: name.to_string(),
            is_active: true,
            is_default: false,
        }
    }

    /// Marks this template as the default for its form.
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Marks this template as inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Checks the template fields.
    ///
    /// # Errors
    ///
    /// Returns `SizingError::Catalog` for an empty code or a non-positive
    /// (or non-finite) capacity.
    pub fn validate(&self) -> SizingResult<()> {
        if self.code.trim().is_empty() {
            return Err(SizingError::catalog("DC block template has an empty code"));
        }
        if !self.capacity_mwh.is_finite() || self.capacity_mwh <= 0.0 {
            return Err(SizingError::catalog(format!(
                "DC block template `{}` has non-positive capacity {}",
                self.code, self.capacity_mwh
            )));
        }
        Ok(())
    }
}

/// Looks up a template by code.
pub fn find_by_code<'a>(
    templates: &'a [DcBlockTemplate],
    code: &str,
) -> Option<&'a DcBlockTemplate> {
    templates.iter().find(|t| t.code == code)
}

/// Returns the default active template of a form.
///
/// Falls back to the first active template of that form when none is
/// flagged as default.
pub fn default_for(templates: &[DcBlockTemplate], form: BlockForm) -> Option<&DcBlockTemplate> {
    let usable = |t: &&DcBlockTemplate| t.form == form && t.is_active;
    templates
        .iter()
        .filter(usable)
        .find(|t| t.is_default)
        .or_else(|| templates.iter().find(usable))
}

/// Built-in DC block catalog.
pub fn default_dc_blocks() -> Vec<DcBlockTemplate> {
    use BlockForm::{Cabinet, Container};

    vec![
        DcBlockTemplate::new(Container, 5.016, "CNT-5016", "5.0 MWh liquid-cooled container")
            .as_default(),
        DcBlockTemplate::new(Container, 3.727, "CNT-3727", "3.7 MWh liquid-cooled container"),
        DcBlockTemplate::new(Container, 2.752, "CNT-2752", "2.7 MWh air-cooled container")
            .inactive(),
        DcBlockTemplate::new(Cabinet, 0.418, "CAB-0418", "418 kWh outdoor cabinet").as_default(),
        DcBlockTemplate::new(Cabinet, 0.261, "CAB-0261", "261 kWh outdoor cabinet"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_is_valid() {
        for t in default_dc_blocks() {
            assert!(t.validate().is_ok(), "{} should be valid", t.code);
        }
    }

    #[test]
    fn default_for_prefers_flagged_entry() {
        let catalog = default_dc_blocks();
        let cont = default_for(&catalog, BlockForm::Container).map(|t| t.code.as_str());
        let cab = default_for(&catalog, BlockForm::Cabinet).map(|t| t.code.as_str());
        assert_eq!(cont, Some("CNT-5016"));
        assert_eq!(cab, Some("CAB-0418"));
    }

    #[test]
    fn default_for_falls_back_to_first_active() {
        let catalog = vec![
            DcBlockTemplate::new(BlockForm::Container, 2.0, "OLD", "old").inactive(),
            DcBlockTemplate::new(BlockForm::Container, 3.0, "A", "a"),
            DcBlockTemplate::new(BlockForm::Container, 4.0, "B", "b"),
        ];
        assert_eq!(
            default_for(&catalog, BlockForm::Container).map(|t| t.code.as_str()),
            Some("A")
        );
        assert!(default_for(&catalog, BlockForm::Cabinet).is_none());
    }

    #[test]
    fn zero_capacity_is_a_catalog_error() {
        let t = DcBlockTemplate::new(BlockForm::Cabinet, 0.0, "BAD", "bad");
        assert!(matches!(t.validate(), Err(SizingError::Catalog(_))));
    }

    #[test]
    fn find_by_code_matches_exactly() {
        let catalog = default_dc_blocks();
        assert!(find_by_code(&catalog, "CNT-3727").is_some());
        assert!(find_by_code(&catalog, "cnt-3727").is_none());
    }
}
