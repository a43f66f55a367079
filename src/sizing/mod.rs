//! Sizing engine: DC requirement, block search, degradation, guarantee
//! convergence, AC matching and feeder allocation.

pub mod ac_match;
/// Integer distribution helpers.
pub mod allocation;
pub mod blocks;
pub mod capacity;
pub mod convergence;
/// SOH/RTE profile selection and lookups.
pub mod degradation;
pub mod efficiency;
pub mod engine;
pub mod report;

pub use engine::{SizingEngine, SizingInputs};
pub use report::{FeederAllocation, SizingReport};
