//! Error taxonomy for the sizing engine.
//!
//! Only malformed inputs and malformed catalogs are errors. An AC match that
//! finds nothing is `None`, and a guarantee that cannot be met is reported as
//! `converged == false` on the convergence result.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SizingError {
    /// Negative/zero numeric parameters, fractions outside (0, 1], or
    /// inconsistent horizons such as a guarantee year past the project life.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Missing template for the selected mode, empty profile catalog, or a
    /// malformed catalog entry.
    #[error("catalog error: {0}")]
    Catalog(String),
}

impl SizingError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub(crate) fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }
}

pub type SizingResult<T> = Result<T, SizingError>;
