//! Pool manager: first-run partition of the library and pool transitions.

use crate::core::config::BalanceConfig;
use crate::core::constants::MINUTES_PER_HOUR;
use crate::core::state::{Pool, Pools, VaultState};
use crate::core::types::{ItemId, Library, LibraryItem};
use crate::enrichment::{enrich_in_library, MetadataSource};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

/// Outcome of [`initialize_pools`].
#[derive(Debug, Clone, PartialEq)]
pub struct PoolInit {
    pub pools: Pools,
    pub starting_item: Option<ItemId>,
}

/// Pool sizes for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub unlocked: usize,
    pub hidden: usize,
    pub key_items: usize,
    pub total: usize,
}

/// Picks the item the vault starts with.
///
/// Cascade: quality inside the configured band and playtime inside the
/// configured window, then any item inside the playtime window, then the
/// least-played item. Ties in the first two steps are broken randomly.
pub fn select_starting_item<'a>(
    items: &[&'a LibraryItem],
    config: &BalanceConfig,
    rng: &mut impl Rng,
) -> Option<&'a LibraryItem> {
    let played: Vec<&LibraryItem> = items.iter().copied().filter(|i| i.is_played()).collect();
    if played.is_empty() {
        return None;
    }

    let window = &config.starting_game;
    let min_minutes = window.hours_played_min * MINUTES_PER_HOUR;
    let max_minutes = window.hours_played_max * MINUTES_PER_HOUR;
    let in_window = |item: &&LibraryItem| (min_minutes..=max_minutes).contains(&item.played_minutes);

    let ideal: Vec<&LibraryItem> = played
        .iter()
        .copied()
        .filter(in_window)
        .filter(|item| {
            item.quality
                .is_some_and(|q| (window.metacritic_min..=window.metacritic_max).contains(&q))
        })
        .collect();
    if let Some(item) = ideal.choose(rng) {
        return Some(*item);
    }

    let mid_range: Vec<&LibraryItem> = played.iter().copied().filter(in_window).collect();
    if let Some(item) = mid_range.choose(rng) {
        return Some(*item);
    }

    played.into_iter().min_by_key(|item| (item.played_minutes, item.id))
}

/// Splits a fresh library into the three pools.
///
/// Never-played items become key items, one played item is unlocked as the
/// starting item (enriched first if it has no pricing metadata), and every
/// other played item is hidden.
pub fn initialize_pools(
    library: &mut Library,
    config: &BalanceConfig,
    source: &dyn MetadataSource,
    rng: &mut impl Rng,
) -> PoolInit {
    let starting_item = {
        let items: Vec<&LibraryItem> = library.iter().collect();
        select_starting_item(&items, config, rng).map(|item| item.id)
    };

    if let Some(id) = starting_item {
        let needs_metadata = library.get(id).is_some_and(|item| !item.is_priced());
        if needs_metadata {
            if let Err(err) = enrich_in_library(library, id, source, config) {
                warn!(id, error = %err, "could not enrich starting item");
            }
        }
    }

    let mut pools = Pools::new();
    for item in library.iter() {
        let pool = if Some(item.id) == starting_item {
            Pool::Unlocked
        } else if item.is_played() {
            Pool::Hidden
        } else {
            Pool::KeyItem
        };
        pools.insert(item.id, pool);
    }

    info!(
        unlocked = pools.count(Pool::Unlocked),
        hidden = pools.count(Pool::Hidden),
        key_items = pools.count(Pool::KeyItem),
        starting_item = ?starting_item,
        "pools initialized"
    );

    PoolInit {
        pools,
        starting_item,
    }
}

/// Moves a key item into the hidden pool once it has been played.
///
/// Returns false and leaves the state untouched when `id` is not a key item,
/// so duplicate detections are harmless.
pub fn promote_key_item(state: &mut VaultState, id: ItemId) -> bool {
    let moved = state.pools.transfer(id, Pool::KeyItem, Pool::Hidden);
    if moved {
        info!(id, "key item promoted to hidden pool");
    } else {
        debug!(id, "promotion skipped, item is not a key item");
    }
    moved
}

/// Moves a hidden item into the unlocked pool. Same no-op contract as
/// [`promote_key_item`].
pub fn unlock_item(state: &mut VaultState, id: ItemId) -> bool {
    let moved = state.pools.transfer(id, Pool::Hidden, Pool::Unlocked);
    if moved {
        info!(id, "item unlocked");
    } else {
        debug!(id, "unlock skipped, item is not hidden");
    }
    moved
}

/// Adds library items the pools have never seen (new purchases).
pub fn place_new_items(pools: &mut Pools, library: &Library, ids: &[ItemId]) -> usize {
    let mut placed = 0;
    for &id in ids {
        let Some(item) = library.get(id) else {
            continue;
        };
        let pool = if item.is_played() {
            Pool::Hidden
        } else {
            Pool::KeyItem
        };
        if pools.insert(id, pool) {
            placed += 1;
        }
    }
    placed
}

/// A save without pools has to go through first-run initialization.
pub fn needs_pool_initialization(saved: Option<&VaultState>) -> bool {
    saved.map_or(true, |state| state.pools.is_empty())
}

pub fn pool_stats(pools: &Pools) -> PoolStats {
    PoolStats {
        unlocked: pools.count(Pool::Unlocked),
        hidden: pools.count(Pool::Hidden),
        key_items: pools.count(Pool::KeyItem),
        total: pools.len(),
    }
}
