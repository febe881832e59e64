//! Simulation configuration.

use std::path::PathBuf;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Number of simulation runs to perform
    pub num_runs: u32,

    /// Random seed for reproducibility (None = random)
    pub seed: Option<u64>,

    /// Items in each synthetic library
    pub library_size: u32,

    /// Share of the library that has never been played (0.0 - 1.0)
    pub unplayed_fraction: f64,

    /// Maximum player actions per run before timeout
    pub max_actions: u64,

    /// Balance document to simulate (None = built-in defaults)
    pub balance_path: Option<PathBuf>,

    /// Log verbosity (0 = silent, 1 = summary, 2 = detailed)
    pub verbosity: u8,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_runs: 200,
            seed: None,
            library_size: 120,
            unplayed_fraction: 0.3,
            max_actions: 200_000,
            balance_path: None,
            verbosity: 1,
        }
    }
}

impl SimConfig {
    /// Small libraries, few runs
    pub fn quick() -> Self {
        Self {
            num_runs: 25,
            library_size: 40,
            max_actions: 50_000,
            ..Default::default()
        }
    }

    /// Large backlog typical of long-time collectors
    pub fn large_library() -> Self {
        Self {
            num_runs: 50,
            library_size: 600,
            unplayed_fraction: 0.5,
            max_actions: 2_000_000,
            ..Default::default()
        }
    }
}
