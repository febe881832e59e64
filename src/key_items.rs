//! Key-item detection: spots never-played items that crossed the playtime
//! threshold between two library snapshots.

use crate::core::config::BalanceConfig;
use crate::core::constants::MS_PER_MINUTE;
use crate::core::formulas::key_reward;
use crate::core::types::{ItemId, Library};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyItemDetection {
    pub item_id: ItemId,
    pub name: String,
    pub keys_awarded: u64,
    /// Played minutes in the current snapshot
    pub minutes_played: u64,
}

/// Compares two snapshots for the given key items.
///
/// Fires only on the crossing: the cached playtime (0 when the item was not
/// cached) is below `keyGameMinMinutes` and the current one is at or above
/// it. Items missing from `current` are skipped.
pub fn detect_newly_played_key_items(
    current: &Library,
    cached: &Library,
    key_ids: &[ItemId],
    config: &BalanceConfig,
) -> Vec<KeyItemDetection> {
    let threshold = config.rewards.key_game_min_minutes;
    let mut detections = Vec::new();

    for &id in key_ids {
        let Some(item) = current.get(id) else {
            continue;
        };
        let previous = cached.played_minutes(id).unwrap_or(0);
        if previous < threshold && item.played_minutes >= threshold {
            let keys_awarded = key_reward(item.quality, config);
            info!(
                id,
                name = %item.name,
                minutes = item.played_minutes,
                keys = keys_awarded,
                "key item played"
            );
            detections.push(KeyItemDetection {
                item_id: id,
                name: item.name.clone(),
                keys_awarded,
                minutes_played: item.played_minutes,
            });
        }
    }
    detections
}

pub fn total_keys_awarded(detections: &[KeyItemDetection]) -> u64 {
    detections.iter().map(|d| d.keys_awarded).sum()
}

/// True once at least `interval_minutes` have passed since `last_sync_ms`.
pub fn should_sync(last_sync_ms: i64, interval_minutes: u64, now_ms: i64) -> bool {
    let interval_ms = (interval_minutes as i64).saturating_mul(MS_PER_MINUTE);
    now_ms.saturating_sub(last_sync_ms) >= interval_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LibraryItem;

    fn snapshot(entries: &[(ItemId, u64)]) -> Library {
        entries
            .iter()
            .map(|(id, minutes)| LibraryItem::new(*id, format!("Game {id}"), *minutes))
            .collect()
    }

    #[test]
    fn test_crossing_threshold_fires_once() {
        let config = BalanceConfig::default();
        let cached = snapshot(&[(1, 25)]);
        let current = snapshot(&[(1, 35)]);

        let detections = detect_newly_played_key_items(&current, &cached, &[1], &config);

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].item_id, 1);
        assert_eq!(detections[0].keys_awarded, 70);
        assert_eq!(detections[0].minutes_played, 35);
    }

    #[test]
    fn test_already_above_threshold_does_not_fire() {
        let config = BalanceConfig::default();
        let cached = snapshot(&[(1, 35)]);
        let current = snapshot(&[(1, 40)]);

        assert!(detect_newly_played_key_items(&current, &cached, &[1], &config).is_empty());
    }

    #[test]
    fn test_exact_threshold_fires() {
        let config = BalanceConfig::default();
        let detections =
            detect_newly_played_key_items(&snapshot(&[(1, 30)]), &snapshot(&[(1, 29)]), &[1], &config);
        assert_eq!(detections.len(), 1);
    }

    #[test]
    fn test_missing_cache_entry_counts_as_unplayed() {
        let config = BalanceConfig::default();
        let current = snapshot(&[(7, 45)]);
        let detections = detect_newly_played_key_items(&current, &Library::new(), &[7], &config);
        assert_eq!(detections.len(), 1);
    }

    #[test]
    fn test_only_key_ids_are_checked() {
        let config = BalanceConfig::default();
        let cached = snapshot(&[(1, 0), (2, 0)]);
        let current = snapshot(&[(1, 60), (2, 60)]);

        let detections = detect_newly_played_key_items(&current, &cached, &[2, 3], &config);

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].item_id, 2);
    }

    #[test]
    fn test_reward_uses_quality() {
        let config = BalanceConfig::default();
        let current: Library = vec![LibraryItem::new(1, "Scored", 90).with_metadata(92, 10.0)].into();
        let detections = detect_newly_played_key_items(&current, &Library::new(), &[1], &config);
        assert_eq!(total_keys_awarded(&detections), 92);
    }

    #[test]
    fn test_should_sync_interval() {
        let five_minutes = 5 * 60 * 1000;
        assert!(!should_sync(0, 5, five_minutes - 1));
        assert!(should_sync(0, 5, five_minutes));
        assert!(should_sync(0, 0, 0));
    }
}
