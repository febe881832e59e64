//! Integration test: pool invariants under random play
//!
//! Runs seeded random action sequences against a session and checks after
//! every step that each item sits in exactly one pool, that the pool union
//! never shrinks, and that progress stays within bounds.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::sync::Arc;
use vault_escape::core::{BalanceConfig, Library, LibraryItem, Pool, VaultState};
use vault_escape::pools::{promote_key_item, unlock_item};
use vault_escape::simulator::{synthetic_library, SyntheticSource};
use vault_escape::{ItemId, MemoryStore, VaultSession};

fn check_invariants(state: &VaultState, known: &HashSet<ItemId>) {
    let mut seen = HashSet::new();
    for pool in Pool::ALL {
        for id in state.pools.ids(pool) {
            assert!(seen.insert(id), "item {id} is in two pools");
        }
    }
    assert!(known.is_subset(&seen), "an item left every pool");

    let offered = state.shop_item_ids();
    let unique: HashSet<_> = offered.iter().collect();
    assert_eq!(unique.len(), offered.len(), "duplicate shop offer");

    for (id, progress) in &state.game_progress {
        assert!(progress.current_power <= progress.max_power, "item {id} over max");
        if progress.drained_at.is_some() {
            assert!(progress.is_drained, "item {id} has a drain time but is active");
        }
    }
}

#[test]
fn test_random_play_keeps_pools_disjoint() {
    for seed in 0..5u64 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut library = synthetic_library(40, 0.25, &mut rng);
        let mut session = VaultSession::open(
            "player",
            library.clone(),
            Box::new(MemoryStore::new()),
            Arc::new(BalanceConfig::default()),
            &SyntheticSource,
            ChaCha8Rng::seed_from_u64(seed + 100),
            0,
        )
        .unwrap();

        let mut known: HashSet<ItemId> = library.ids().into_iter().collect();
        check_invariants(session.state(), &known);

        let mut now = 0;
        for step in 0..2_000 {
            now += 1_000;
            match rng.gen_range(0..10) {
                0 => {
                    let index = rng.gen_range(0..5);
                    let _ = session.unlock_slot(index, &SyntheticSource, now);
                }
                1 => {
                    let index = rng.gen_range(0..5);
                    let _ = session.redraw_slot(index);
                }
                2 => {
                    let index = rng.gen_range(0..5);
                    let _ = session.draw_slot(index);
                }
                3 if step % 50 == 0 => {
                    let key_ids = session.state().pools.ids(Pool::KeyItem);
                    if let Some(id) = key_ids.first() {
                        library.get_mut(*id).unwrap().played_minutes += 40;
                    }
                    let new_id = 1_000 + step as ItemId;
                    library.insert(LibraryItem::new(new_id, "New purchase", 0));
                    known.insert(new_id);
                    session.sync_library(&library, now);
                }
                4 => {
                    let drained: Vec<ItemId> = session
                        .state()
                        .game_progress
                        .iter()
                        .filter(|(_, p)| p.is_drained)
                        .map(|(id, _)| *id)
                        .collect();
                    if let Some(id) = drained.first() {
                        let _ = session.refresh_item(*id);
                    }
                }
                5 => {
                    session.regenerate(30.0, now);
                }
                _ => {
                    let unlocked = session.state().pools.ids(Pool::Unlocked);
                    let id = unlocked[rng.gen_range(0..unlocked.len())];
                    session.click(id, now).unwrap();
                }
            }
            check_invariants(session.state(), &known);
        }
    }
}

#[test]
fn test_transitions_are_idempotent() {
    let library: Library = vec![
        LibraryItem::new(1, "Start", 300),
        LibraryItem::new(2, "Hidden", 60),
        LibraryItem::new(3, "Key", 0),
    ]
    .into();
    let pools = vault_escape::core::Pools::from_lists(&[1], &[2], &[3]).unwrap();
    let mut state = VaultState::new("player", pools, library, 0);

    assert!(!unlock_item(&mut state, 3));
    assert!(!promote_key_item(&mut state, 2));
    assert!(!unlock_item(&mut state, 1));

    assert!(promote_key_item(&mut state, 3));
    assert!(unlock_item(&mut state, 3));
    let after = state.clone();
    assert!(!promote_key_item(&mut state, 3));
    assert!(!unlock_item(&mut state, 3));
    assert_eq!(state, after);
    assert_eq!(state.pools.ids(Pool::Unlocked), vec![1, 3]);
}
