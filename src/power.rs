//! Click/power manager.
//!
//! Every update returns a new [`ItemProgress`] instead of editing the
//! caller's record, so callers can replay or discard results freely.

use crate::core::config::BalanceConfig;
use crate::core::formulas::{item_click_value, max_power, refresh_cost, regen_amount};
use crate::core::state::ItemProgress;
use crate::core::types::{ItemId, LibraryItem};
use std::collections::BTreeMap;

/// Outcome of a single click.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickResult {
    /// Power actually added this click (0 once drained)
    pub power_gained: u64,
    pub is_drained: bool,
    pub progress: ItemProgress,
}

/// Applies one click to `item`.
///
/// A missing record is created with the item's max power. Drained items
/// gain nothing. Otherwise the click value is added and clamped at max
/// power; reaching the clamp marks the item drained at `now`.
pub fn handle_click(
    item: &LibraryItem,
    existing: Option<&ItemProgress>,
    config: &BalanceConfig,
    now: i64,
) -> ClickResult {
    let click_value = item_click_value(item, config);
    let progress = existing
        .cloned()
        .unwrap_or_else(|| ItemProgress::new(max_power(click_value, config), item.played_minutes));

    if progress.is_drained {
        return ClickResult {
            power_gained: 0,
            is_drained: true,
            progress,
        };
    }

    let new_power = progress
        .current_power
        .saturating_add(click_value)
        .min(progress.max_power);
    let is_drained = new_power >= progress.max_power;

    ClickResult {
        power_gained: new_power.saturating_sub(progress.current_power),
        is_drained,
        progress: ItemProgress {
            current_power: new_power,
            max_power: progress.max_power,
            is_drained,
            last_playtime: item.played_minutes,
            drained_at: if is_drained { Some(now) } else { progress.drained_at },
        },
    }
}

/// Liberation Keys needed to refresh `item`.
pub fn calculate_refresh_cost(item: &LibraryItem, config: &BalanceConfig) -> u64 {
    refresh_cost(item_click_value(item, config), config)
}

/// Resets a drained item. Affordability is the caller's job.
pub fn refresh_drained_item(progress: &ItemProgress, item: &LibraryItem) -> ItemProgress {
    ItemProgress {
        current_power: 0,
        max_power: progress.max_power,
        is_drained: false,
        last_playtime: item.played_minutes,
        drained_at: None,
    }
}

/// Resets every drained record; returns the new map and how many were reset.
pub fn auto_refresh_all_drained(
    progress: &BTreeMap<ItemId, ItemProgress>,
) -> (BTreeMap<ItemId, ItemProgress>, usize) {
    let mut refreshed = 0;
    let updated = progress
        .iter()
        .map(|(id, record)| {
            if record.is_drained {
                refreshed += 1;
                let reset = ItemProgress {
                    current_power: 0,
                    is_drained: false,
                    drained_at: None,
                    ..record.clone()
                };
                (*id, reset)
            } else {
                (*id, record.clone())
            }
        })
        .collect();
    (updated, refreshed)
}

/// Passive recharge of a drained item.
///
/// Nothing happens before the cooldown since draining has passed. After
/// that the item sheds power each second; once it reaches zero it is ready
/// to click again. Returns `None` when the record is unchanged.
pub fn regenerate(
    progress: &ItemProgress,
    elapsed_secs: f64,
    now: i64,
    config: &BalanceConfig,
) -> Option<ItemProgress> {
    if !progress.is_drained || elapsed_secs <= 0.0 {
        return None;
    }
    let cooldown_ms = config.progression.regen_cooldown_seconds as i64 * 1000;
    if let Some(drained_at) = progress.drained_at {
        if now - drained_at < cooldown_ms {
            return None;
        }
    }

    let shed = regen_amount(progress.max_power, elapsed_secs, config);
    let current_power = progress.current_power.saturating_sub(shed);
    let recharged = current_power == 0;
    Some(ItemProgress {
        current_power,
        is_drained: !recharged,
        drained_at: if recharged { None } else { progress.drained_at },
        ..progress.clone()
    })
}
