//! rck - repository check
//!
//! Finds every Git repository under a directory and reports the ones that are
//! not up to date with their remotes: unpushed commits or uncommitted changes.
//! Repositories that could not be checked are reported separately.

pub mod adapters;
pub mod check;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod report;
pub mod run;
pub mod scan;

// Re-exports for ergonomics
pub use check::check_repository;
pub use domain::*;
pub use error::*;
pub use run::run;
