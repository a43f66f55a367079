//! Battery energy storage sizing against an end-of-guarantee energy target.

/// DC/AC block templates and degradation curves.
pub mod catalog;
pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod sizing;
