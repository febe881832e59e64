//! Main simulation runner.
//!
//! Each run drives a real [`VaultSession`] with an in-memory store, so the
//! numbers reflect the same rules a player gets. A simple greedy player
//! buys the cheapest affordable offer, clicks the strongest unlocked item
//! and occasionally plays a key item between library syncs.

use super::config::SimConfig;
use super::library::{synthetic_library, SyntheticSource};
use super::report::{RunStats, SimReport};
use crate::core::config::BalanceConfig;
use crate::core::formulas::{item_click_value, item_unlock_cost};
use crate::core::state::{Pool, RewardKind};
use crate::core::types::{ItemId, Library, Tier};
use crate::persistence::MemoryStore;
use crate::power::calculate_refresh_cost;
use crate::session::VaultSession;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, warn};

/// Simulated milliseconds per player action.
const ACTION_MS: i64 = 1000;

/// Run the full simulation and return a report.
pub fn run_simulation(config: &SimConfig, balance: Arc<BalanceConfig>) -> SimReport {
    let mut all_runs = Vec::with_capacity(config.num_runs as usize);

    for run_idx in 0..config.num_runs {
        // Create RNG for this run
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed + run_idx as u64),
            None => StdRng::from_entropy(),
        };

        let run_stats = simulate_single_run(config, Arc::clone(&balance), run_idx, &mut rng);

        if config.verbosity >= 2 {
            println!(
                "Run {}/{} - actions {}, unlocks {}, keys {}, cleared {}",
                run_idx + 1,
                config.num_runs,
                run_stats.actions,
                run_stats.total_unlocks(),
                run_stats.keys_earned,
                run_stats.cleared
            );
        }
        all_runs.push(run_stats);
    }

    SimReport::from_runs(all_runs, config.max_actions)
}

type Session = VaultSession<StdRng>;

/// Cheapest filled slot the player can pay for.
fn affordable_slot(session: &Session) -> Option<usize> {
    let state = session.state();
    state
        .shop_slots
        .iter()
        .enumerate()
        .filter_map(|(index, slot)| {
            let item = state.cached_library.get(slot.item_id?)?;
            Some((index, item_unlock_cost(item, session.config())))
        })
        .filter(|(_, cost)| *cost <= state.collection_power)
        .min_by_key(|(_, cost)| *cost)
        .map(|(index, _)| index)
}

/// Unlocked item with the highest click value that still yields power.
fn best_clickable(session: &Session) -> Option<ItemId> {
    let state = session.state();
    state
        .pools
        .ids(Pool::Unlocked)
        .into_iter()
        .filter(|id| !state.game_progress.get(id).is_some_and(|p| p.is_drained))
        .filter_map(|id| state.cached_library.get(id))
        .max_by_key(|item| (item_click_value(item, session.config()), item.id))
        .map(|item| item.id)
}

/// Cheapest drained item the player can afford to refresh.
fn affordable_refresh(session: &Session) -> Option<ItemId> {
    let state = session.state();
    state
        .game_progress
        .iter()
        .filter(|(_, progress)| progress.is_drained)
        .filter_map(|(id, _)| state.cached_library.get(*id))
        .map(|item| (item.id, calculate_refresh_cost(item, session.config())))
        .filter(|(_, cost)| *cost <= state.liberation_keys)
        .min_by_key(|(_, cost)| *cost)
        .map(|(id, _)| id)
}

/// Most expensive offer, if it is an epic the player cannot afford yet.
fn redraw_candidate(session: &Session) -> Option<usize> {
    let state = session.state();
    state
        .shop_slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.tier == Some(Tier::Epic))
        .filter_map(|(index, slot)| {
            let item = state.cached_library.get(slot.item_id?)?;
            Some((index, item_unlock_cost(item, session.config())))
        })
        .filter(|(_, cost)| *cost > state.collection_power.saturating_mul(4))
        .max_by_key(|(_, cost)| *cost)
        .map(|(index, _)| index)
}

/// Plays one random key item past the key threshold.
fn play_key_item(session: &Session, library: &mut Library, rng: &mut impl Rng) -> bool {
    let key_ids = session.state().pools.ids(Pool::KeyItem);
    let Some(id) = key_ids.choose(rng) else {
        return false;
    };
    let threshold = session.config().rewards.key_game_min_minutes;
    match library.get_mut(*id) {
        Some(item) => {
            item.played_minutes += threshold + rng.gen_range(0..=90);
            true
        }
        None => false,
    }
}

/// Simulate a single vault from first run to clear (or timeout).
fn simulate_single_run(
    config: &SimConfig,
    balance: Arc<BalanceConfig>,
    run_idx: u32,
    rng: &mut StdRng,
) -> RunStats {
    let mut library = synthetic_library(config.library_size, config.unplayed_fraction, rng);
    let source = SyntheticSource;
    let mut now: i64 = 0;

    let mut session = match VaultSession::open(
        format!("sim-{run_idx}"),
        library.clone(),
        Box::new(MemoryStore::new()),
        Arc::clone(&balance),
        &source,
        StdRng::seed_from_u64(rng.gen()),
        now,
    ) {
        Ok(session) => session,
        Err(err) => {
            warn!(run = run_idx, error = %err, "simulated vault could not be opened");
            return RunStats::default();
        }
    };

    let mut stats = RunStats {
        library_size: library.len(),
        ..Default::default()
    };

    while stats.actions < config.max_actions {
        if session.state().is_cleared() {
            stats.cleared = true;
            break;
        }
        now += ACTION_MS;
        stats.actions += 1;

        if session.should_sync(now) {
            if play_key_item(&session, &mut library, rng) {
                stats.key_items_played += 1;
            }
            let report = session.sync_library(&library, now);
            stats.keys_earned += report.keys_awarded;
            session.top_up_metadata(&source);
            continue;
        }

        if let Some(index) = affordable_slot(&session) {
            match session.unlock_slot(index, &source, now) {
                Ok(outcome) => {
                    stats.record_unlock(outcome.tier);
                    match outcome.reward {
                        Some(reward) if reward.kind == RewardKind::Keys => {
                            stats.keys_earned += reward.amount
                        }
                        Some(reward) => stats.power_earned += reward.amount,
                        None => {}
                    }
                    continue;
                }
                Err(err) => debug!(error = %err, "unlock failed"),
            }
        }

        let empty_slot = session.state().shop_slots.iter().position(|s| s.is_empty());
        if let Some(index) = empty_slot {
            if session.state().liberation_keys >= session.config().economy.draw_cost
                && session.draw_slot(index).is_ok()
            {
                stats.draws += 1;
                continue;
            }
        }

        if let Some(id) = best_clickable(&session) {
            if let Ok(result) = session.click(id, now) {
                stats.clicks += 1;
                stats.power_earned += result.power_gained;
                continue;
            }
        }

        if let Some(id) = affordable_refresh(&session) {
            if session.refresh_item(id).is_ok() {
                stats.refreshes += 1;
                continue;
            }
        }

        if let Some(index) = redraw_candidate(&session) {
            if session.state().liberation_keys >= session.config().economy.redraw_cost
                && session.redraw_slot(index).is_ok()
            {
                stats.redraws += 1;
                continue;
            }
        }

        session.regenerate(ACTION_MS as f64 / 1000.0, now);
        stats.idle_actions += 1;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SimConfig {
        SimConfig {
            num_runs: 2,
            seed: Some(42),
            library_size: 15,
            unplayed_fraction: 0.2,
            max_actions: 20_000,
            balance_path: None,
            verbosity: 0,
        }
    }

    #[test]
    fn test_simulation_is_reproducible_with_seed() {
        let balance = Arc::new(BalanceConfig::default());
        let first = run_simulation(&small_config(), Arc::clone(&balance));
        let second = run_simulation(&small_config(), balance);

        assert_eq!(first.run_stats, second.run_stats);
    }

    #[test]
    fn test_runs_make_progress() {
        let report = run_simulation(&small_config(), Arc::new(BalanceConfig::default()));

        assert_eq!(report.num_runs, 2);
        for run in &report.run_stats {
            assert!(run.clicks > 0);
            assert!(run.actions <= 20_000);
            assert_eq!(run.library_size, 15);
        }
    }
}
