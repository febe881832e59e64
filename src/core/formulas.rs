//! Economy formulas.
//!
//! Pure functions of a [`BalanceConfig`] and item attributes. Absent
//! quality or completion hours are replaced by the configured defaults
//! before evaluation, so every function is total.

use super::config::BalanceConfig;
use super::constants::MINUTES_PER_HOUR;
use super::types::{LibraryItem, Tier};

/// Floors a non-negative product into currency; NaN and negatives become 0.
fn floor_currency(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.floor() as u64
    } else {
        0
    }
}

/// Collection Power needed to unlock an item.
pub fn unlock_cost(quality: f64, completion_hours: f64, config: &BalanceConfig) -> u64 {
    floor_currency(quality * completion_hours * config.economy.unlock_cost_multiplier)
}

/// Power generated by one click on an item with the given playtime.
pub fn click_value(played_minutes: u64, config: &BalanceConfig) -> u64 {
    let whole_hours = (played_minutes / MINUTES_PER_HOUR) as f64;
    floor_currency(whole_hours * config.progression.click_value_multiplier)
        .max(config.advanced.min_click_value)
}

/// Total power an item yields before it drains.
pub fn max_power(click_value: u64, config: &BalanceConfig) -> u64 {
    floor_currency(click_value as f64 * config.progression.max_power_multiplier)
}

/// Liberation Keys needed to refresh a drained item.
pub fn refresh_cost(click_value: u64, config: &BalanceConfig) -> u64 {
    floor_currency(click_value as f64 * config.progression.refresh_cost_multiplier)
        .max(config.advanced.min_refresh_cost)
}

/// Liberation Keys awarded when a key item crosses the play threshold.
pub fn key_reward(quality: Option<u32>, config: &BalanceConfig) -> u64 {
    let quality = quality
        .filter(|q| *q > 0)
        .unwrap_or(config.defaults.default_metacritic);
    floor_currency(quality as f64 * config.rewards.key_reward_multiplier)
}

/// Strict less-than on both thresholds: a cost equal to `cheapMaxCost` is moderate.
pub fn classify_tier(unlock_cost: u64, config: &BalanceConfig) -> Tier {
    if unlock_cost < config.tiers.cheap_max_cost {
        Tier::Cheap
    } else if unlock_cost < config.tiers.moderate_max_cost {
        Tier::Moderate
    } else {
        Tier::Epic
    }
}

/// Power shed by a drained item over `elapsed_secs` of passive regeneration.
pub fn regen_amount(max_power: u64, elapsed_secs: f64, config: &BalanceConfig) -> u64 {
    let rate = config.progression.passive_regen_rate_percent / 100.0;
    floor_currency(max_power as f64 * rate * elapsed_secs).max(1)
}

pub fn item_quality(item: &LibraryItem, config: &BalanceConfig) -> f64 {
    item.quality
        .filter(|q| *q > 0)
        .unwrap_or(config.defaults.default_metacritic) as f64
}

pub fn item_completion_hours(item: &LibraryItem, config: &BalanceConfig) -> f64 {
    item.completion_hours
        .filter(|h| *h > 0.0)
        .unwrap_or(config.defaults.default_hours_tobeat)
}

/// Unlock cost of an item with defaults substituted for missing metadata.
pub fn item_unlock_cost(item: &LibraryItem, config: &BalanceConfig) -> u64 {
    let hours = if config.advanced.playtime_based_unlock_costs {
        item.played_minutes as f64 / MINUTES_PER_HOUR as f64
    } else {
        item_completion_hours(item, config)
    };
    unlock_cost(item_quality(item, config), hours, config)
}

pub fn item_tier(item: &LibraryItem, config: &BalanceConfig) -> Tier {
    classify_tier(item_unlock_cost(item, config), config)
}

pub fn item_click_value(item: &LibraryItem, config: &BalanceConfig) -> u64 {
    click_value(item.played_minutes, config)
}

pub fn item_max_power(item: &LibraryItem, config: &BalanceConfig) -> u64 {
    max_power(item_click_value(item, config), config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlock_cost_formula() {
        let config = BalanceConfig::default();
        assert_eq!(unlock_cost(75.0, 10.0, &config), 750);
        // Fractional hours floor
        assert_eq!(unlock_cost(85.0, 12.5, &config), 1062);
    }

    #[test]
    fn test_unlock_cost_scales_with_multiplier() {
        let mut config = BalanceConfig::default();
        config.economy.unlock_cost_multiplier = 0.5;
        assert_eq!(unlock_cost(75.0, 10.0, &config), 375);
    }

    #[test]
    fn test_click_value_uses_whole_hours() {
        let config = BalanceConfig::default();
        assert_eq!(click_value(600, &config), 10);
        assert_eq!(click_value(659, &config), 10);
        assert_eq!(click_value(660, &config), 11);
    }

    #[test]
    fn test_click_value_floor() {
        let config = BalanceConfig::default();
        // Under an hour still clicks for the minimum
        assert_eq!(click_value(45, &config), 1);
        assert_eq!(click_value(0, &config), 1);
    }

    #[test]
    fn test_max_power() {
        let config = BalanceConfig::default();
        assert_eq!(max_power(10, &config), 1000);
    }

    #[test]
    fn test_refresh_cost_has_minimum() {
        let mut config = BalanceConfig::default();
        assert_eq!(refresh_cost(10, &config), 10);
        config.progression.refresh_cost_multiplier = 0.0;
        assert_eq!(refresh_cost(10, &config), 1);
    }

    #[test]
    fn test_key_reward_defaults_quality() {
        let config = BalanceConfig::default();
        assert_eq!(key_reward(Some(88), &config), 88);
        assert_eq!(key_reward(None, &config), 70);
        assert_eq!(key_reward(Some(0), &config), 70);
    }

    #[test]
    fn test_tier_boundaries_are_strict() {
        let config = BalanceConfig::default();
        assert_eq!(classify_tier(999, &config), Tier::Cheap);
        assert_eq!(classify_tier(1000, &config), Tier::Moderate);
        assert_eq!(classify_tier(2999, &config), Tier::Moderate);
        assert_eq!(classify_tier(3000, &config), Tier::Epic);
    }

    #[test]
    fn test_item_unlock_cost_substitutes_defaults() {
        let config = BalanceConfig::default();
        let bare = LibraryItem::new(1, "Unknown", 90);
        // 70 * 30
        assert_eq!(item_unlock_cost(&bare, &config), 2100);
        assert_eq!(item_tier(&bare, &config), Tier::Moderate);
    }

    #[test]
    fn test_playtime_based_unlock_costs() {
        let mut config = BalanceConfig::default();
        config.advanced.playtime_based_unlock_costs = true;
        let item = LibraryItem::new(1, "Played", 600).with_metadata(80, 50.0);
        // 80 * 10 hours played
        assert_eq!(item_unlock_cost(&item, &config), 800);
    }

    #[test]
    fn test_regen_amount_is_at_least_one() {
        let config = BalanceConfig::default();
        // 0.5% of 1000 per second
        assert_eq!(regen_amount(1000, 1.0, &config), 5);
        assert_eq!(regen_amount(100, 1.0, &config), 1);
        assert_eq!(regen_amount(1000, 10.0, &config), 50);
    }
}
