//! A live vault: state, balance snapshot, storage and RNG in one place.
//!
//! Every mutating call persists the state afterwards. Save failures are
//! logged and never surfaced, so a broken disk cannot block play.

use crate::core::config::BalanceConfig;
use crate::core::constants::SHOP_SLOT_COUNT;
use crate::core::formulas::{item_tier, item_unlock_cost};
use crate::core::state::{Pool, ProgressReward, RewardKind, UnlockRecord, VaultState};
use crate::core::types::{ItemId, Library, ShopSlot, Tier};
use crate::draw::{can_afford_draw, can_afford_redraw, draw_from_pool, slot_target_tier, DrawResult};
use crate::enrichment::{
    initial_metadata_enrichment, top_up_metadata_buffer, EnrichmentReport, MetadataSource,
};
use crate::key_items::{detect_newly_played_key_items, should_sync, total_keys_awarded, KeyItemDetection};
use crate::persistence::{load_state, save_state, LoadOutcome, PersistenceError, VaultStore};
use crate::pools::{initialize_pools, needs_pool_initialization, place_new_items, promote_key_item, unlock_item};
use crate::power::{
    auto_refresh_all_drained, calculate_refresh_cost, handle_click, refresh_drained_item, regenerate,
    ClickResult,
};
use crate::shop::{draw_new_game, initialize_shop};
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("item {0} is not in the library")]
    UnknownItem(ItemId),

    #[error("item {0} is not unlocked")]
    NotUnlocked(ItemId),

    #[error("item {0} is not in the hidden pool")]
    NotHidden(ItemId),

    #[error("item {0} is not drained")]
    NotDrained(ItemId),

    #[error("shop slot {0} does not exist")]
    SlotOutOfRange(usize),

    #[error("shop slot {0} is empty")]
    SlotEmpty(usize),

    #[error("shop slot {0} is already filled")]
    SlotOccupied(usize),

    #[error("not enough Collection Power: need {needed}, have {available}")]
    InsufficientPower { needed: u64, available: u64 },

    #[error("not enough Liberation Keys: need {needed}, have {available}")]
    InsufficientKeys { needed: u64, available: u64 },

    #[error("no priced hidden items left to draw")]
    NoEligibleItems,

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Result of a successful unlock.
#[derive(Debug, Clone, PartialEq)]
pub struct UnlockOutcome {
    pub item_id: ItemId,
    pub tier: Tier,
    pub cost: u64,
    /// Progress-track reward paid for this unlock
    pub reward: Option<ProgressReward>,
    /// What refilled the slot, if anything was left to draw
    pub replacement: Option<DrawResult>,
}

/// Result of a library sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub detections: Vec<KeyItemDetection>,
    pub keys_awarded: u64,
    /// Drained items reset because a key item was played
    pub refreshed: usize,
    /// Items seen for the first time
    pub new_items: Vec<ItemId>,
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Picks the reward for the next unlock from the configured pools.
pub fn pick_random_reward(config: &BalanceConfig, rng: &mut impl Rng) -> Option<ProgressReward> {
    let track = &config.progress_track;
    let pool: Vec<ProgressReward> = track
        .power_rewards
        .iter()
        .map(|amount| ProgressReward {
            kind: RewardKind::Power,
            amount: *amount,
        })
        .chain(track.key_rewards.iter().map(|amount| ProgressReward {
            kind: RewardKind::Keys,
            amount: *amount,
        }))
        .collect();
    pool.choose(rng).copied()
}

pub struct VaultSession<R: Rng> {
    state: VaultState,
    config: Arc<BalanceConfig>,
    store: Box<dyn VaultStore>,
    rng: R,
    /// Why an unreadable save was thrown away when this session opened
    discarded_save: Option<String>,
}

impl<R: Rng> VaultSession<R> {
    /// Opens the saved vault, or builds a new one from `library`.
    ///
    /// A first run partitions the library, records the starting item,
    /// prices the hidden buffer and stocks the shop. A loaded vault whose
    /// shop is empty (for example one migrated from the legacy format) gets
    /// its shop stocked as well. When the stored document was unreadable the
    /// new vault reports it through [`VaultSession::discarded_save`].
    pub fn open(
        player_id: impl Into<String>,
        library: Library,
        mut store: Box<dyn VaultStore>,
        config: Arc<BalanceConfig>,
        source: &dyn MetadataSource,
        rng: R,
        now: i64,
    ) -> Result<Self, SessionError> {
        let state = match load_state(store.as_mut())? {
            LoadOutcome::Loaded(state) if !needs_pool_initialization(Some(&state)) => state,
            LoadOutcome::Discarded(reason) => {
                warn!(reason = %reason, "saved vault was unreadable, starting over");
                let mut session = Self::new_game(player_id, library, store, config, source, rng, now);
                session.discarded_save = Some(reason);
                return Ok(session);
            }
            LoadOutcome::Loaded(_) | LoadOutcome::Missing => {
                return Ok(Self::new_game(player_id, library, store, config, source, rng, now))
            }
        };
        let mut session = Self {
            state,
            config,
            store,
            rng,
            discarded_save: None,
        };
        info!(player = %session.state.player_id, "vault opened");

        if session.state.shop_slots.iter().all(ShopSlot::is_empty) {
            session.stock_shop(source);
            session.persist();
        }
        Ok(session)
    }

    /// Starts a fresh vault, replacing whatever the store holds.
    pub fn new_game(
        player_id: impl Into<String>,
        mut library: Library,
        store: Box<dyn VaultStore>,
        config: Arc<BalanceConfig>,
        source: &dyn MetadataSource,
        mut rng: R,
        now: i64,
    ) -> Self {
        let init = initialize_pools(&mut library, &config, source, &mut rng);
        let mut state = VaultState::new(player_id, init.pools, library, now);

        if let Some(id) = init.starting_item {
            if let Some(item) = state.cached_library.get(id) {
                state.progress_track.unlocked_games.push(UnlockRecord {
                    item_id: id,
                    unlock_timestamp: now,
                    tier: item_tier(item, &config),
                    name: item.name.clone(),
                });
            }
        }
        state.progress_track.next_reward = pick_random_reward(&config, &mut rng);

        let mut session = Self {
            state,
            config,
            store,
            rng,
            discarded_save: None,
        };
        let hidden = session.state.pools.ids(Pool::Hidden);
        initial_metadata_enrichment(
            &hidden,
            &mut session.state.cached_library,
            source,
            &session.config,
            &mut session.rng,
        );
        session.stock_shop(source);
        session.persist();
        info!(player = %session.state.player_id, "new vault created");
        session
    }

    pub fn state(&self) -> &VaultState {
        &self.state
    }

    pub fn into_state(self) -> VaultState {
        self.state
    }

    /// Set when `open` found a save it could not read and replaced it.
    pub fn discarded_save(&self) -> Option<&str> {
        self.discarded_save.as_deref()
    }

    pub fn config(&self) -> &BalanceConfig {
        &self.config
    }

    /// Swaps in a new balance snapshot; existing progress records keep
    /// their max power.
    pub fn set_config(&mut self, config: Arc<BalanceConfig>) {
        self.config = config;
    }

    pub fn store(&self) -> &dyn VaultStore {
        self.store.as_ref()
    }

    fn stock_shop(&mut self, source: &dyn MetadataSource) {
        let hidden = self.state.pools.ids(Pool::Hidden);
        self.state.shop_slots = initialize_shop(
            &hidden,
            &mut self.state.cached_library,
            source,
            &self.config,
            &mut self.rng,
        );
    }

    /// Writes the state to the store, logging failures.
    pub fn persist(&mut self) {
        if let Err(err) = save_state(self.store.as_mut(), &self.state) {
            warn!(error = %err, "failed to save vault");
        }
    }

    fn require_unlocked(&self, id: ItemId) -> Result<(), SessionError> {
        match self.state.pools.pool_of(id) {
            Some(Pool::Unlocked) => Ok(()),
            Some(_) => Err(SessionError::NotUnlocked(id)),
            None => Err(SessionError::UnknownItem(id)),
        }
    }

    fn slot(&self, index: usize) -> Result<ShopSlot, SessionError> {
        self.state
            .shop_slots
            .get(index)
            .copied()
            .ok_or(SessionError::SlotOutOfRange(index))
    }

    /// Shop items other than the one in `index`.
    fn other_shop_items(&self, index: usize) -> Vec<ItemId> {
        self.state
            .shop_slots
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .filter_map(|(_, slot)| slot.item_id)
            .collect()
    }

    /// Clicks an unlocked item and credits the power gained.
    pub fn click(&mut self, id: ItemId, now: i64) -> Result<ClickResult, SessionError> {
        self.require_unlocked(id)?;
        let item = self
            .state
            .cached_library
            .get(id)
            .ok_or(SessionError::UnknownItem(id))?;

        let result = handle_click(item, self.state.game_progress.get(&id), &self.config, now);
        self.state.game_progress.insert(id, result.progress.clone());
        self.state.collection_power += result.power_gained;

        if result.is_drained && result.power_gained > 0 {
            debug!(id, "item drained");
        }
        self.persist();
        Ok(result)
    }

    /// Pays Liberation Keys to reset a drained item. Returns the cost.
    pub fn refresh_item(&mut self, id: ItemId) -> Result<u64, SessionError> {
        let item = self
            .state
            .cached_library
            .get(id)
            .ok_or(SessionError::UnknownItem(id))?;
        let progress = self
            .state
            .game_progress
            .get(&id)
            .filter(|p| p.is_drained)
            .ok_or(SessionError::NotDrained(id))?;

        let cost = calculate_refresh_cost(item, &self.config);
        if self.state.liberation_keys < cost {
            return Err(SessionError::InsufficientKeys {
                needed: cost,
                available: self.state.liberation_keys,
            });
        }

        let refreshed = refresh_drained_item(progress, item);
        self.state.liberation_keys -= cost;
        self.state.game_progress.insert(id, refreshed);
        info!(id, cost, "item refreshed");
        self.persist();
        Ok(cost)
    }

    /// Buys the item offered in slot `index` with Collection Power.
    ///
    /// The item moves to the unlocked pool, the pending progress-track
    /// reward is paid and re-rolled, the metadata buffer is topped up and
    /// the slot is refilled towards its target tier.
    pub fn unlock_slot(
        &mut self,
        index: usize,
        source: &dyn MetadataSource,
        now: i64,
    ) -> Result<UnlockOutcome, SessionError> {
        let id = self.slot(index)?.item_id.ok_or(SessionError::SlotEmpty(index))?;
        if !self.state.pools.contains(Pool::Hidden, id) {
            return Err(SessionError::NotHidden(id));
        }
        let item = self
            .state
            .cached_library
            .get(id)
            .ok_or(SessionError::UnknownItem(id))?;

        let cost = item_unlock_cost(item, &self.config);
        if self.state.collection_power < cost {
            return Err(SessionError::InsufficientPower {
                needed: cost,
                available: self.state.collection_power,
            });
        }
        let tier = item_tier(item, &self.config);
        let name = item.name.clone();

        self.state.collection_power -= cost;
        unlock_item(&mut self.state, id);
        self.state.progress_track.unlocked_games.push(UnlockRecord {
            item_id: id,
            unlock_timestamp: now,
            tier,
            name,
        });

        let reward = self.state.progress_track.next_reward.take();
        if let Some(reward) = reward {
            match reward.kind {
                RewardKind::Power => self.state.collection_power += reward.amount,
                RewardKind::Keys => self.state.liberation_keys += reward.amount,
            }
        }
        self.state.progress_track.next_reward = pick_random_reward(&self.config, &mut self.rng);

        let hidden = self.state.pools.ids(Pool::Hidden);
        top_up_metadata_buffer(
            &hidden,
            &mut self.state.cached_library,
            source,
            &self.config,
            &mut self.rng,
        );

        let exclude = self.other_shop_items(index);
        let replacement = draw_new_game(
            slot_target_tier(index),
            &hidden,
            &self.state.cached_library,
            &exclude,
            &self.config,
            &mut self.rng,
        );
        self.state.shop_slots[index] = match replacement {
            Some(draw) => ShopSlot::filled(draw.item_id, draw.tier),
            None => ShopSlot::empty(),
        };

        info!(id, cost, tier = tier.name(), reward = ?reward, "item unlocked from shop");
        self.persist();
        Ok(UnlockOutcome {
            item_id: id,
            tier,
            cost,
            reward,
            replacement,
        })
    }

    /// Pays the draw cost to fill an empty slot. Nothing is charged when
    /// there is nothing to draw.
    pub fn draw_slot(&mut self, index: usize) -> Result<DrawResult, SessionError> {
        if !self.slot(index)?.is_empty() {
            return Err(SessionError::SlotOccupied(index));
        }
        let cost = self.config.economy.draw_cost;
        if !can_afford_draw(self.state.liberation_keys, &self.config) {
            return Err(SessionError::InsufficientKeys {
                needed: cost,
                available: self.state.liberation_keys,
            });
        }

        let hidden = self.state.pools.ids(Pool::Hidden);
        let exclude = self.state.shop_item_ids();
        let draw = draw_from_pool(
            &hidden,
            &self.state.cached_library,
            Some(slot_target_tier(index)),
            &exclude,
            &self.config,
            &mut self.rng,
        )
        .ok_or(SessionError::NoEligibleItems)?;

        self.state.liberation_keys -= cost;
        self.state.shop_slots[index] = ShopSlot::filled(draw.item_id, draw.tier);
        info!(slot = index, id = draw.item_id, tier = draw.tier.name(), "slot drawn");
        self.persist();
        Ok(draw)
    }

    /// Pays the redraw cost to swap the item in a filled slot for a
    /// different one. Nothing is charged when there is nothing to draw.
    pub fn redraw_slot(&mut self, index: usize) -> Result<DrawResult, SessionError> {
        if self.slot(index)?.is_empty() {
            return Err(SessionError::SlotEmpty(index));
        }
        let cost = self.config.economy.redraw_cost;
        if !can_afford_redraw(self.state.liberation_keys, &self.config) {
            return Err(SessionError::InsufficientKeys {
                needed: cost,
                available: self.state.liberation_keys,
            });
        }

        let hidden = self.state.pools.ids(Pool::Hidden);
        // The current occupant is excluded along with the other offers
        let exclude = self.state.shop_item_ids();
        let draw = draw_new_game(
            slot_target_tier(index),
            &hidden,
            &self.state.cached_library,
            &exclude,
            &self.config,
            &mut self.rng,
        )
        .ok_or(SessionError::NoEligibleItems)?;

        self.state.liberation_keys -= cost;
        self.state.shop_slots[index] = ShopSlot::filled(draw.item_id, draw.tier);
        info!(slot = index, id = draw.item_id, tier = draw.tier.name(), "slot redrawn");
        self.persist();
        Ok(draw)
    }

    /// Folds a fresh library snapshot into the vault.
    ///
    /// Key items that crossed the playtime threshold since the cached
    /// snapshot are promoted and pay out keys; unseen items are placed in
    /// a pool; cached playtimes are updated and metadata kept.
    pub fn sync_library(&mut self, fresh: &Library, now: i64) -> SyncReport {
        let key_ids = self.state.pools.ids(Pool::KeyItem);
        let detections =
            detect_newly_played_key_items(fresh, &self.state.cached_library, &key_ids, &self.config);

        for detection in &detections {
            promote_key_item(&mut self.state, detection.item_id);
        }
        let keys_awarded = total_keys_awarded(&detections);
        self.state.liberation_keys += keys_awarded;

        let mut refreshed = 0;
        if !detections.is_empty() && self.config.rewards.auto_refresh_on_key_complete {
            let (progress, count) = auto_refresh_all_drained(&self.state.game_progress);
            self.state.game_progress = progress;
            refreshed = count;
        }

        let new_items = self.state.cached_library.merge_snapshot(fresh);
        place_new_items(&mut self.state.pools, &self.state.cached_library, &new_items);
        self.state.last_sync = now;

        info!(
            detections = detections.len(),
            keys_awarded,
            refreshed,
            new_items = new_items.len(),
            "library synced"
        );
        self.persist();
        SyncReport {
            detections,
            keys_awarded,
            refreshed,
            new_items,
        }
    }

    pub fn should_sync(&self, now: i64) -> bool {
        should_sync(
            self.state.last_sync,
            self.config.advanced.sync_interval_minutes,
            now,
        )
    }

    /// Passive regeneration over unlocked items. Returns how many records
    /// changed.
    pub fn regenerate(&mut self, elapsed_secs: f64, now: i64) -> usize {
        let mut changed = 0;
        for id in self.state.pools.ids(Pool::Unlocked) {
            let Some(progress) = self.state.game_progress.get(&id) else {
                continue;
            };
            if let Some(updated) = regenerate(progress, elapsed_secs, now, &self.config) {
                self.state.game_progress.insert(id, updated);
                changed += 1;
            }
        }
        if changed > 0 {
            self.persist();
        }
        changed
    }

    /// Refills the priced buffer of the hidden pool.
    pub fn top_up_metadata(&mut self, source: &dyn MetadataSource) -> EnrichmentReport {
        let hidden = self.state.pools.ids(Pool::Hidden);
        let report = top_up_metadata_buffer(
            &hidden,
            &mut self.state.cached_library,
            source,
            &self.config,
            &mut self.rng,
        );
        if !report.enriched.is_empty() {
            self.persist();
        }
        report
    }

    /// Shop slots as a fixed array, for display.
    pub fn shop(&self) -> &[ShopSlot; SHOP_SLOT_COUNT] {
        &self.state.shop_slots
    }
}
