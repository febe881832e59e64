//! Core data model, balance configuration and economy formulas.

pub mod config;
pub mod constants;
pub mod formulas;
pub mod state;
pub mod types;

pub use config::{BalanceConfig, ConfigError, ConfigLoader};
pub use state::{
    ItemProgress, Pool, Pools, ProgressReward, ProgressTrack, RewardKind, UnlockRecord, VaultState,
};
pub use types::{ItemId, Library, LibraryItem, ShopSlot, Tier};
