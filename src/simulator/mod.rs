//! Vault balance simulator for Monte Carlo analysis.
//!
//! Run many simulated vaults to analyze:
//! - Actions needed to clear a library
//! - Unlock mix across cheap, moderate and epic items
//! - Key income from key items and progress-track rewards
//! - How often players sit idle waiting for regeneration
//!
//! Runs use `VaultSession` directly, so simulation results follow the same
//! rules as real play.

mod config;
mod library;
mod report;
mod runner;

pub use config::SimConfig;
pub use library::{synthetic_library, SyntheticSource};
pub use report::{RunStats, SimReport};
pub use runner::run_simulation;
