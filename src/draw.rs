//! Draw manager: weighted picks from the hidden pool for shop slots.

use crate::core::config::BalanceConfig;
use crate::core::constants::SLOT_TIER_PATTERN;
use crate::core::formulas::item_tier;
use crate::core::types::{ItemId, Library, LibraryItem, Tier};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawResult {
    pub item_id: ItemId,
    pub tier: Tier,
}

/// Item ids grouped by tier, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierBuckets {
    cheap: Vec<ItemId>,
    moderate: Vec<ItemId>,
    epic: Vec<ItemId>,
}

impl TierBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items<'a>(
        items: impl IntoIterator<Item = &'a LibraryItem>,
        config: &BalanceConfig,
    ) -> Self {
        let mut buckets = Self::new();
        for item in items {
            buckets.push(item_tier(item, config), item.id);
        }
        buckets
    }

    pub fn push(&mut self, tier: Tier, id: ItemId) {
        self.bucket_mut(tier).push(id);
    }

    pub fn get(&self, tier: Tier) -> &[ItemId] {
        match tier {
            Tier::Cheap => &self.cheap,
            Tier::Moderate => &self.moderate,
            Tier::Epic => &self.epic,
        }
    }

    fn bucket_mut(&mut self, tier: Tier) -> &mut Vec<ItemId> {
        match tier {
            Tier::Cheap => &mut self.cheap,
            Tier::Moderate => &mut self.moderate,
            Tier::Epic => &mut self.epic,
        }
    }

    pub fn count(&self, tier: Tier) -> usize {
        self.get(tier).len()
    }

    pub fn total(&self) -> usize {
        Tier::ALL.iter().map(|tier| self.count(*tier)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Removes and returns a random id from `tier`.
    pub fn take_random(&mut self, tier: Tier, rng: &mut impl Rng) -> Option<ItemId> {
        let bucket = self.bucket_mut(tier);
        if bucket.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..bucket.len());
        Some(bucket.swap_remove(index))
    }
}

/// Hidden items that can be drawn: priced and not excluded.
pub fn eligible_items<'a>(
    hidden: &[ItemId],
    library: &'a Library,
    exclude: &[ItemId],
) -> Vec<&'a LibraryItem> {
    hidden
        .iter()
        .filter(|id| !exclude.contains(id))
        .filter_map(|id| library.get(*id))
        .filter(|item| item.is_priced())
        .collect()
}

/// Picks a tier: `target` with probability `target_weight`, the remainder
/// split evenly between the other two tiers.
fn weighted_tier(target: Tier, target_weight: f64, rng: &mut impl Rng) -> Tier {
    let roll: f64 = rng.gen();
    if roll < target_weight {
        return target;
    }
    let others: Vec<Tier> = Tier::ALL.into_iter().filter(|t| *t != target).collect();
    let split = (1.0 - target_weight) / 2.0;
    if roll < target_weight + split {
        others[0]
    } else {
        others[1]
    }
}

/// Draws one priced hidden item.
///
/// With a target tier the pick is weighted towards it. If the chosen tier
/// has nothing eligible, or there is no target, any eligible item may come
/// up. Returns `None` when nothing is eligible.
pub fn draw_from_pool(
    hidden: &[ItemId],
    library: &Library,
    target: Option<Tier>,
    exclude: &[ItemId],
    config: &BalanceConfig,
    rng: &mut impl Rng,
) -> Option<DrawResult> {
    let eligible = eligible_items(hidden, library, exclude);
    if eligible.is_empty() {
        warn!(
            hidden = hidden.len(),
            excluded = exclude.len(),
            "no priced hidden items to draw"
        );
        return None;
    }

    let buckets = TierBuckets::from_items(eligible.iter().copied(), config);
    debug!(
        cheap = buckets.count(Tier::Cheap),
        moderate = buckets.count(Tier::Moderate),
        epic = buckets.count(Tier::Epic),
        "hidden pool tier distribution"
    );

    if let Some(target) = target {
        let tier = weighted_tier(target, config.draws.draw_target_weight, rng);
        if let Some(id) = buckets.get(tier).choose(rng) {
            debug!(id, tier = tier.name(), target = target.name(), "drew targeted item");
            return Some(DrawResult { item_id: *id, tier });
        }
    }

    let item = eligible.choose(rng)?;
    let tier = item_tier(item, config);
    debug!(id = item.id, tier = tier.name(), "drew random item");
    Some(DrawResult {
        item_id: item.id,
        tier,
    })
}

/// Tier a shop position aims for; out-of-range positions aim cheap.
pub fn slot_target_tier(index: usize) -> Tier {
    SLOT_TIER_PATTERN.get(index).copied().unwrap_or(Tier::Cheap)
}

pub fn can_afford_draw(liberation_keys: u64, config: &BalanceConfig) -> bool {
    liberation_keys >= config.economy.draw_cost
}

pub fn can_afford_redraw(liberation_keys: u64, config: &BalanceConfig) -> bool {
    liberation_keys >= config.economy.redraw_cost
}
