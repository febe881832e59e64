//! Vault state: pool membership, per-item progress and the progress track.

use super::constants::{SHOP_SLOT_COUNT, STORAGE_VERSION};
use super::types::{ItemId, Library, ShopSlot, Tier};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// The three disjoint pools every known item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pool {
    /// Playable and generating power
    Unlocked,
    /// Played but locked; source of shop draws
    Hidden,
    /// Never played; source of Liberation Keys
    KeyItem,
}

impl Pool {
    pub const ALL: [Pool; 3] = [Pool::Unlocked, Pool::Hidden, Pool::KeyItem];
}

/// Pool membership keyed by item id.
///
/// Each id maps to exactly one pool, so the pools are disjoint by
/// construction. Ids only change pool through [`Pools::transfer`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pools {
    membership: BTreeMap<ItemId, Pool>,
}

impl Pools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds pools from three id lists, failing with the first id that
    /// appears more than once.
    pub fn from_lists(
        unlocked: &[ItemId],
        hidden: &[ItemId],
        key_items: &[ItemId],
    ) -> Result<Self, ItemId> {
        let mut pools = Self::new();
        for (ids, pool) in [
            (unlocked, Pool::Unlocked),
            (hidden, Pool::Hidden),
            (key_items, Pool::KeyItem),
        ] {
            for &id in ids {
                if !pools.insert(id, pool) {
                    return Err(id);
                }
            }
        }
        Ok(pools)
    }

    /// Adds an unknown id to a pool. Returns false if the id is already placed.
    pub fn insert(&mut self, id: ItemId, pool: Pool) -> bool {
        if self.membership.contains_key(&id) {
            return false;
        }
        self.membership.insert(id, pool);
        true
    }

    /// Moves `id` from `from` to `to`. No-op returning false unless the id
    /// currently sits in `from`.
    pub fn transfer(&mut self, id: ItemId, from: Pool, to: Pool) -> bool {
        match self.membership.get_mut(&id) {
            Some(pool) if *pool == from => {
                *pool = to;
                true
            }
            _ => false,
        }
    }

    pub fn pool_of(&self, id: ItemId) -> Option<Pool> {
        self.membership.get(&id).copied()
    }

    pub fn contains(&self, pool: Pool, id: ItemId) -> bool {
        self.pool_of(id) == Some(pool)
    }

    /// Ids in a pool, ascending.
    pub fn ids(&self, pool: Pool) -> Vec<ItemId> {
        self.membership
            .iter()
            .filter(|(_, p)| **p == pool)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn count(&self, pool: Pool) -> usize {
        self.membership.values().filter(|p| **p == pool).count()
    }

    pub fn len(&self) -> usize {
        self.membership.len()
    }

    pub fn is_empty(&self) -> bool {
        self.membership.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, Pool)> + '_ {
        self.membership.iter().map(|(id, pool)| (*id, *pool))
    }
}

/// Power bookkeeping for one clicked item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemProgress {
    #[serde(deserialize_with = "deserialize_power")]
    pub current_power: u64,
    /// Fixed when the record is created
    #[serde(deserialize_with = "deserialize_power")]
    pub max_power: u64,
    pub is_drained: bool,
    /// Played minutes seen at the last click or refresh
    pub last_playtime: u64,
    /// Unix timestamp (ms) of the click that drained the item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drained_at: Option<i64>,
}

/// Reads a power amount. Older saves hold fractional values left by
/// passive regeneration; those are floored.
fn deserialize_power<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.is_finite() && value >= 0.0 {
        Ok(value.floor() as u64)
    } else {
        Err(serde::de::Error::custom(format!("invalid power amount {value}")))
    }
}

impl ItemProgress {
    /// Whether the record is internally consistent.
    pub fn is_valid(&self) -> bool {
        self.current_power <= self.max_power
    }

    pub fn new(max_power: u64, last_playtime: u64) -> Self {
        Self {
            current_power: 0,
            max_power,
            is_drained: false,
            last_playtime,
            drained_at: None,
        }
    }

    /// Fraction of max power already collected (0.0 - 1.0).
    pub fn fill_ratio(&self) -> f64 {
        if self.max_power == 0 {
            return 1.0;
        }
        self.current_power as f64 / self.max_power as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardKind {
    /// Collection Power
    Power,
    /// Liberation Keys
    Keys,
}

/// Reward paid out on the next unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReward {
    #[serde(rename = "type")]
    pub kind: RewardKind,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockRecord {
    #[serde(rename = "appId")]
    pub item_id: ItemId,
    pub unlock_timestamp: i64,
    pub tier: Tier,
    pub name: String,
}

/// Unlock history plus the reward waiting for the next unlock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressTrack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_reward: Option<ProgressReward>,
    #[serde(default)]
    pub unlocked_games: Vec<UnlockRecord>,
}

/// Everything the engine persists between sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct VaultState {
    pub version: String,
    pub collection_power: u64,
    pub liberation_keys: u64,
    pub pools: Pools,
    pub shop_slots: [ShopSlot; SHOP_SLOT_COUNT],
    pub game_progress: BTreeMap<ItemId, ItemProgress>,
    pub progress_track: ProgressTrack,
    /// Last library snapshot seen, with merged metadata
    pub cached_library: Library,
    /// Unix timestamp (ms) of the last library sync
    pub last_sync: i64,
    /// Opaque player/library identifier
    pub player_id: String,
}

impl VaultState {
    pub fn new(player_id: impl Into<String>, pools: Pools, library: Library, now: i64) -> Self {
        Self {
            version: STORAGE_VERSION.to_string(),
            collection_power: 0,
            liberation_keys: 0,
            pools,
            shop_slots: [ShopSlot::empty(); SHOP_SLOT_COUNT],
            game_progress: BTreeMap::new(),
            progress_track: ProgressTrack::default(),
            cached_library: library,
            last_sync: now,
            player_id: player_id.into(),
        }
    }

    /// Item ids currently offered in the shop.
    pub fn shop_item_ids(&self) -> Vec<ItemId> {
        self.shop_slots.iter().filter_map(|slot| slot.item_id).collect()
    }

    /// True once nothing is left to unlock or liberate.
    pub fn is_cleared(&self) -> bool {
        self.pools.count(Pool::Hidden) == 0 && self.pools.count(Pool::KeyItem) == 0
    }
}
