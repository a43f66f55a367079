//! Read-only template catalogs and degradation curves.
//!
//! Catalogs are bundled into one [`SizingCatalogs`] value that the caller
//! builds once and passes by reference into every engine call.

/// AC block (PCS + transformer) templates.
pub mod ac_block;
/// DC block (battery enclosure) templates.
pub mod dc_block;
pub mod profiles;

use serde::{Deserialize, Serialize};

use crate::error::{SizingError, SizingResult};

pub use ac_block::AcBlockTemplate;
pub use dc_block::{BlockForm, DcBlockTemplate};
pub use profiles::{RteBand, RteProfile, SohProfile};

/// Every catalog the engine reads, loaded once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizingCatalogs {
    pub dc_blocks: Vec<DcBlockTemplate>,
    pub ac_blocks: Vec<AcBlockTemplate>,
    pub soh_profiles: Vec<SohProfile>,
    pub rte_profiles: Vec<RteProfile>,
}

impl Default for SizingCatalogs {
    fn default() -> Self {
        Self {
            dc_blocks: dc_block::default_dc_blocks(),
            ac_blocks: ac_block::default_ac_blocks(),
            soh_profiles: profiles::default_soh_profiles(),
            rte_profiles: profiles::default_rte_profiles(),
        }
    }
}

impl SizingCatalogs {
    /// Checks every entry of every catalog.
    ///
    /// # Errors
    ///
    /// Returns the first `SizingError::Catalog` found, including an empty
    /// AC, SOH or RTE catalog and duplicate DC block codes.
    pub fn validate(&self) -> SizingResult<()> {
        for (i, t) in self.dc_blocks.iter().enumerate() {
            t.validate()?;
            if self.dc_blocks[..i].iter().any(|o| o.code == t.code) {
                return Err(SizingError::catalog(format!(
                    "duplicate DC block code `{}`",
                    t.code
                )));
            }
        }
        if self.ac_blocks.is_empty() {
            return Err(SizingError::catalog("AC block catalog is empty"));
        }
        for t in &self.ac_blocks {
            t.validate()?;
        }
        if self.soh_profiles.is_empty() {
            return Err(SizingError::catalog("SOH profile catalog is empty"));
        }
        for p in &self.soh_profiles {
            p.validate()?;
        }
        if self.rte_profiles.is_empty() {
            return Err(SizingError::catalog("RTE profile catalog is empty"));
        }
        for p in &self.rte_profiles {
            p.validate()?;
        }
        Ok(())
    }

    /// Resolves a DC block template by code, or the default for `form`.
    ///
    /// # Errors
    ///
    /// Returns `SizingError::Catalog` when the code is unknown, names a
    /// template of the other form, or no active template of `form` exists.
    pub fn resolve_dc_block(
        &self,
        form: BlockForm,
        code: Option<&str>,
    ) -> SizingResult<&DcBlockTemplate> {
        let template = match code {
            Some(code) => dc_block::find_by_code(&self.dc_blocks, code).ok_or_else(|| {
                SizingError::catalog(format!("unknown DC block code `{code}`"))
            })?,
            None => dc_block::default_for(&self.dc_blocks, form).ok_or_else(|| {
                SizingError::catalog(format!("no active {} template in catalog", form.as_str()))
            })?,
        };
        if template.form != form {
            return Err(SizingError::catalog(format!(
                "DC block `{}` is a {}, expected a {}",
                template.code,
                template.form.as_str(),
                form.as_str()
            )));
        }
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalogs_validate() {
        assert!(SizingCatalogs::default().validate().is_ok());
    }

    #[test]
    fn empty_soh_catalog_rejected() {
        let catalogs = SizingCatalogs {
            soh_profiles: Vec::new(),
            ..SizingCatalogs::default()
        };
        assert!(matches!(catalogs.validate(), Err(SizingError::Catalog(_))));
    }

    #[test]
    fn duplicate_code_rejected() {
        let mut catalogs = SizingCatalogs::default();
        let dup = catalogs.dc_blocks[0].clone();
        catalogs.dc_blocks.push(dup);
        assert!(catalogs.validate().is_err());
    }

    #[test]
    fn resolve_rejects_wrong_form() {
        let catalogs = SizingCatalogs::default();
        let err = catalogs.resolve_dc_block(BlockForm::Container, Some("CAB-0418"));
        assert!(matches!(err, Err(SizingError::Catalog(_))));
    }

    #[test]
    fn resolve_defaults_per_form() {
        let catalogs = SizingCatalogs::default();
        let cab = catalogs.resolve_dc_block(BlockForm::Cabinet, None);
        assert_eq!(cab.map(|t| t.code.as_str()), Ok("CAB-0418"));
    }
}
