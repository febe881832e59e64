//! Vault Escape - progression engine for a game-library collection game
//!
//! A player's library is split into three pools: unlocked items generate
//! Collection Power when clicked, hidden items are offered in a five-slot
//! shop and bought with power, and never-played key items pay out
//! Liberation Keys once they are finally played. This crate holds the
//! rules; fetching the library and drawing the screen are left to callers.

pub mod core;
pub mod draw;
pub mod enrichment;
pub mod key_items;
pub mod persistence;
pub mod pools;
pub mod power;
pub mod session;
pub mod shop;
pub mod simulator;

pub use crate::core::{BalanceConfig, ConfigLoader, ItemId, Library, LibraryItem, Pool, Tier, VaultState};
pub use enrichment::{EnrichError, MetadataSource};
pub use persistence::{LoadOutcome, MemoryStore, PersistenceError, SaveManager, VaultStore};
pub use session::{SessionError, VaultSession};
