//! Shop manager: the five offer slots and their refills.

use crate::core::config::BalanceConfig;
use crate::core::constants::{INITIAL_SHOP_TIERS, SHOP_SLOT_COUNT};
use crate::core::formulas::item_tier;
use crate::core::types::{ItemId, Library, LibraryItem, ShopSlot, Tier};
use crate::draw::{eligible_items, DrawResult, TierBuckets};
use crate::enrichment::{enrich_in_library, unpriced_ids, MetadataSource};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

/// Groups items into tier buckets by unlock cost.
pub fn categorize_by_tier<'a>(
    items: impl IntoIterator<Item = &'a LibraryItem>,
    config: &BalanceConfig,
) -> TierBuckets {
    TierBuckets::from_items(items, config)
}

/// How many items of each tier a fresh shop wants.
fn initial_demand(tier: Tier) -> usize {
    INITIAL_SHOP_TIERS.iter().filter(|t| **t == tier).count()
}

fn composition_satisfied(buckets: &TierBuckets) -> bool {
    Tier::ALL
        .iter()
        .all(|tier| buckets.count(*tier) >= initial_demand(*tier))
}

/// Fills a fresh shop with three cheap, one moderate and one epic item.
///
/// Unpriced hidden items are enriched one at a time, in random order, until
/// every tier can be served or no candidates remain. Items are drawn without
/// replacement; a tier that runs dry leaves its slot empty.
pub fn initialize_shop(
    hidden: &[ItemId],
    library: &mut Library,
    source: &dyn MetadataSource,
    config: &BalanceConfig,
    rng: &mut impl Rng,
) -> [ShopSlot; SHOP_SLOT_COUNT] {
    let mut slots = [ShopSlot::empty(); SHOP_SLOT_COUNT];
    if hidden.is_empty() {
        warn!("hidden pool is empty, shop stays empty");
        return slots;
    }

    let mut buckets = categorize_by_tier(eligible_items(hidden, library, &[]), config);

    if !composition_satisfied(&buckets) {
        let mut candidates = unpriced_ids(hidden, library);
        candidates.shuffle(rng);
        for id in candidates {
            if composition_satisfied(&buckets) {
                break;
            }
            if let Err(err) = enrich_in_library(library, id, source, config) {
                warn!(id, error = %err, "could not price shop candidate");
                continue;
            }
            match library.get(id) {
                Some(item) if item.is_priced() => buckets.push(item_tier(item, config), id),
                _ => debug!(id, "enriched shop candidate is still unpriced"),
            }
        }
    }

    for (slot, tier) in slots.iter_mut().zip(INITIAL_SHOP_TIERS) {
        if let Some(id) = buckets.take_random(tier, rng) {
            *slot = ShopSlot::filled(id, tier);
        }
    }

    info!(
        cheap = slots[..3].iter().filter(|s| !s.is_empty()).count(),
        moderate = usize::from(!slots[3].is_empty()),
        epic = usize::from(!slots[4].is_empty()),
        "shop initialized"
    );
    slots
}

/// Draws a replacement for a slot aiming at `target`.
///
/// The target tier is tried with the redraw weight, an adjacent tier with
/// the adjacent weight and an opposite tier otherwise. Where the adjacency
/// table lists several candidates one is picked at random. If that bucket
/// is empty the first non-empty tier from cheap to epic is used.
pub fn draw_new_game(
    target: Tier,
    hidden: &[ItemId],
    library: &Library,
    exclude: &[ItemId],
    config: &BalanceConfig,
    rng: &mut impl Rng,
) -> Option<DrawResult> {
    let mut buckets = categorize_by_tier(eligible_items(hidden, library, exclude), config);
    if buckets.is_empty() {
        warn!(target = target.name(), "no priced items available for redraw");
        return None;
    }

    let draws = &config.draws;
    let neighbors = draws.adjacency.neighbors(target);
    let roll: f64 = rng.gen();
    let preferred = if roll < draws.redraw_target_weight {
        Some(target)
    } else if roll < draws.redraw_target_weight + draws.redraw_adjacent_weight {
        neighbors.adjacent.choose(rng).copied()
    } else {
        neighbors.opposite.choose(rng).copied()
    };

    if let Some(tier) = preferred {
        if let Some(id) = buckets.take_random(tier, rng) {
            debug!(id, tier = tier.name(), target = target.name(), "redraw hit preferred tier");
            return Some(DrawResult { item_id: id, tier });
        }
    }

    for tier in Tier::ALL {
        if let Some(id) = buckets.take_random(tier, rng) {
            debug!(id, tier = tier.name(), target = target.name(), "redraw fell back");
            return Some(DrawResult { item_id: id, tier });
        }
    }
    None
}
