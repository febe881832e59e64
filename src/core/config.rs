//! Balance configuration: typed snapshot of `balance.json` plus its loader.
//!
//! Every formula in the engine reads its numbers from a [`BalanceConfig`].
//! The loader caches one snapshot and falls back to the built-in defaults
//! whenever the document cannot be read, parsed or validated, so formulas
//! are always computable.

use super::constants::{CONFIG_COMMENT_PREFIX, CONFIG_FILE_NAME};
use super::types::Tier;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read balance config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse balance config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid balance config: {0}")]
    Invalid(String),
}

/// Shop prices and the unlock cost scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomyConfig {
    /// Liberation Keys spent to draw into an empty slot
    pub draw_cost: u64,
    /// Liberation Keys spent to reroll an occupied slot
    pub redraw_cost: u64,
    pub unlock_cost_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionConfig {
    pub click_value_multiplier: f64,
    pub max_power_multiplier: f64,
    /// Share of max power shed per second by a drained item (percent)
    pub passive_regen_rate_percent: f64,
    /// Seconds a drained item waits before passive regeneration starts
    pub regen_cooldown_seconds: u64,
    pub refresh_cost_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardsConfig {
    pub key_reward_multiplier: f64,
    /// Play minutes a key item must cross to award keys
    pub key_game_min_minutes: u64,
    pub auto_refresh_on_key_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierConfig {
    /// Unlock costs strictly below this are cheap
    pub cheap_max_cost: u64,
    /// Unlock costs strictly below this (and not cheap) are moderate
    pub moderate_max_cost: u64,
}

/// Window used to pick the single item the vault starts with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartingGameConfig {
    pub metacritic_min: u32,
    pub metacritic_max: u32,
    pub hours_played_min: u64,
    pub hours_played_max: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultsConfig {
    pub default_metacritic: u32,
    pub default_hours_tobeat: f64,
    /// Quality estimated for an item with a single recommendation
    #[serde(default = "default_recommendation_base")]
    pub recommendation_quality_base: u32,
    #[serde(default = "default_recommendation_ceiling")]
    pub recommendation_quality_ceiling: u32,
    /// Quality points added per order of magnitude of recommendations
    #[serde(default = "default_recommendation_scale")]
    pub recommendation_quality_scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedConfig {
    pub min_click_value: u64,
    pub min_refresh_cost: u64,
    /// Price items by hours played instead of hours to beat
    pub playtime_based_unlock_costs: bool,
    /// Hidden items that should carry pricing metadata at all times
    #[serde(default = "default_metadata_buffer_size")]
    pub metadata_buffer_size: usize,
    #[serde(default = "default_sync_interval_minutes")]
    pub sync_interval_minutes: u64,
}

/// Tiers a redraw may fall back to from a given target tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierNeighbors {
    pub adjacent: Vec<Tier>,
    pub opposite: Vec<Tier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierAdjacency {
    pub cheap: TierNeighbors,
    pub moderate: TierNeighbors,
    pub epic: TierNeighbors,
}

impl TierAdjacency {
    pub fn neighbors(&self, tier: Tier) -> &TierNeighbors {
        match tier {
            Tier::Cheap => &self.cheap,
            Tier::Moderate => &self.moderate,
            Tier::Epic => &self.epic,
        }
    }
}

impl Default for TierAdjacency {
    // Moderate has two neighbours and no single opposite, so both of its
    // fallbacks are a coin flip between cheap and epic.
    fn default() -> Self {
        Self {
            cheap: TierNeighbors {
                adjacent: vec![Tier::Moderate],
                opposite: vec![Tier::Epic],
            },
            moderate: TierNeighbors {
                adjacent: vec![Tier::Cheap, Tier::Epic],
                opposite: vec![Tier::Cheap, Tier::Epic],
            },
            epic: TierNeighbors {
                adjacent: vec![Tier::Moderate],
                opposite: vec![Tier::Cheap],
            },
        }
    }
}

/// Weights of the two random draw paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DrawConfig {
    /// Chance a paid draw lands in the slot's target tier
    pub draw_target_weight: f64,
    /// Chance a redraw lands in the target tier
    pub redraw_target_weight: f64,
    /// Chance a redraw lands in an adjacent tier; the rest goes to the opposite
    pub redraw_adjacent_weight: f64,
    pub adjacency: TierAdjacency,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            draw_target_weight: 0.9,
            redraw_target_weight: 0.7,
            redraw_adjacent_weight: 0.2,
            adjacency: TierAdjacency::default(),
        }
    }
}

/// Rewards paid out on the progress track after each unlock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressTrackConfig {
    pub power_rewards: Vec<u64>,
    pub key_rewards: Vec<u64>,
}

impl Default for ProgressTrackConfig {
    fn default() -> Self {
        Self {
            power_rewards: vec![250, 750, 1250],
            key_rewards: vec![3, 6, 13],
        }
    }
}

/// Full balance document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceConfig {
    pub economy: EconomyConfig,
    pub progression: ProgressionConfig,
    pub rewards: RewardsConfig,
    pub tiers: TierConfig,
    pub starting_game: StartingGameConfig,
    pub defaults: DefaultsConfig,
    pub advanced: AdvancedConfig,
    #[serde(default)]
    pub draws: DrawConfig,
    #[serde(default)]
    pub progress_track: ProgressTrackConfig,
}

fn default_recommendation_base() -> u32 {
    70
}

fn default_recommendation_ceiling() -> u32 {
    90
}

fn default_recommendation_scale() -> f64 {
    5.0
}

fn default_metadata_buffer_size() -> usize {
    10
}

fn default_sync_interval_minutes() -> u64 {
    5
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            economy: EconomyConfig {
                draw_cost: 10,
                redraw_cost: 5,
                unlock_cost_multiplier: 1.0,
            },
            progression: ProgressionConfig {
                click_value_multiplier: 1.0,
                max_power_multiplier: 100.0,
                passive_regen_rate_percent: 0.5,
                regen_cooldown_seconds: 10,
                refresh_cost_multiplier: 1.0,
            },
            rewards: RewardsConfig {
                key_reward_multiplier: 1.0,
                key_game_min_minutes: 30,
                auto_refresh_on_key_complete: true,
            },
            tiers: TierConfig {
                cheap_max_cost: 1000,
                moderate_max_cost: 3000,
            },
            starting_game: StartingGameConfig {
                metacritic_min: 70,
                metacritic_max: 79,
                hours_played_min: 5,
                hours_played_max: 10,
            },
            defaults: DefaultsConfig {
                default_metacritic: 70,
                default_hours_tobeat: 30.0,
                recommendation_quality_base: default_recommendation_base(),
                recommendation_quality_ceiling: default_recommendation_ceiling(),
                recommendation_quality_scale: default_recommendation_scale(),
            },
            advanced: AdvancedConfig {
                min_click_value: 1,
                min_refresh_cost: 1,
                playtime_based_unlock_costs: false,
                metadata_buffer_size: default_metadata_buffer_size(),
                sync_interval_minutes: default_sync_interval_minutes(),
            },
            draws: DrawConfig::default(),
            progress_track: ProgressTrackConfig::default(),
        }
    }
}

/// Recursively removes comment fields (keys starting with `_`).
pub fn strip_comment_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !key.starts_with(CONFIG_COMMENT_PREFIX));
            for child in map.values_mut() {
                strip_comment_fields(child);
            }
        }
        Value::Array(items) => {
            for child in items {
                strip_comment_fields(child);
            }
        }
        _ => {}
    }
}

impl BalanceConfig {
    /// Parses and validates a balance document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut raw: Value = serde_json::from_str(json)?;
        strip_comment_fields(&mut raw);
        let config: BalanceConfig = serde_json::from_value(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Rejects documents that would make formulas or draws meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let multipliers = [
            ("economy.unlockCostMultiplier", self.economy.unlock_cost_multiplier),
            ("progression.clickValueMultiplier", self.progression.click_value_multiplier),
            ("progression.maxPowerMultiplier", self.progression.max_power_multiplier),
            ("progression.passiveRegenRatePercent", self.progression.passive_regen_rate_percent),
            ("progression.refreshCostMultiplier", self.progression.refresh_cost_multiplier),
            ("rewards.keyRewardMultiplier", self.rewards.key_reward_multiplier),
            ("defaults.defaultHoursTobeat", self.defaults.default_hours_tobeat),
            ("defaults.recommendationQualityScale", self.defaults.recommendation_quality_scale),
        ];
        for (name, value) in multipliers {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        if self.tiers.cheap_max_cost >= self.tiers.moderate_max_cost {
            return Err(ConfigError::Invalid(format!(
                "tiers.cheapMaxCost ({}) must be below tiers.moderateMaxCost ({})",
                self.tiers.cheap_max_cost, self.tiers.moderate_max_cost
            )));
        }

        let start = &self.starting_game;
        if start.metacritic_min > start.metacritic_max || start.hours_played_min > start.hours_played_max {
            return Err(ConfigError::Invalid(
                "startingGame minimums must not exceed maximums".to_string(),
            ));
        }

        let draws = &self.draws;
        for (name, weight) in [
            ("draws.drawTargetWeight", draws.draw_target_weight),
            ("draws.redrawTargetWeight", draws.redraw_target_weight),
            ("draws.redrawAdjacentWeight", draws.redraw_adjacent_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within [0, 1], got {weight}"
                )));
            }
        }
        if draws.redraw_target_weight + draws.redraw_adjacent_weight > 1.0 {
            return Err(ConfigError::Invalid(
                "draws.redrawTargetWeight + draws.redrawAdjacentWeight must not exceed 1".to_string(),
            ));
        }
        for tier in Tier::ALL {
            let neighbors = draws.adjacency.neighbors(tier);
            if neighbors.adjacent.is_empty() || neighbors.opposite.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "draws.adjacency.{} needs at least one adjacent and one opposite tier",
                    tier.name()
                )));
            }
        }

        Ok(())
    }
}

/// Owns the cached configuration snapshot and its reload lifecycle.
#[derive(Debug)]
pub struct ConfigLoader {
    path: PathBuf,
    cached: Option<Arc<BalanceConfig>>,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: None,
        }
    }

    /// Loader pointed at `balance.json` in the platform config directory.
    pub fn from_default_location() -> Option<Self> {
        let dirs = ProjectDirs::from("", "", "vault-escape")?;
        Some(Self::new(dirs.config_dir().join(CONFIG_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.cached.is_some()
    }

    /// Returns the cached snapshot, loading it on first use.
    pub fn get(&mut self) -> Arc<BalanceConfig> {
        if let Some(config) = &self.cached {
            return Arc::clone(config);
        }

        let config = match BalanceConfig::from_file(&self.path) {
            Ok(config) => {
                info!(path = %self.path.display(), "balance config loaded");
                config
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "balance config unavailable, using defaults");
                BalanceConfig::default()
            }
        };
        let config = Arc::new(config);
        self.cached = Some(Arc::clone(&config));
        config
    }

    /// Drops the cached snapshot so the next `get` reads the document again.
    pub fn reset(&mut self) {
        self.cached = None;
        debug!("balance config cache cleared");
    }

    pub fn reload(&mut self) -> Arc<BalanceConfig> {
        self.reset();
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    const BALANCE_JSON: &str = include_str!("../../config/balance.json");

    fn temp_config_path() -> PathBuf {
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "vault-config-test-{}-{}",
            std::process::id(),
            test_id
        ));
        fs::create_dir_all(&dir).unwrap();
        dir.join(CONFIG_FILE_NAME)
    }

    #[test]
    fn test_shipped_document_matches_defaults() {
        let config = BalanceConfig::from_json_str(BALANCE_JSON).expect("shipped config parses");
        assert_eq!(config, BalanceConfig::default());
    }

    #[test]
    fn test_comment_fields_are_stripped() {
        let mut value: Value = serde_json::json!({
            "_comment": "top",
            "economy": { "_note": "x", "drawCost": 10 },
            "list": [{ "_hidden": 1, "kept": 2 }]
        });
        strip_comment_fields(&mut value);
        assert_eq!(
            value,
            serde_json::json!({ "economy": { "drawCost": 10 }, "list": [{ "kept": 2 }] })
        );
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let mut value: Value = serde_json::from_str(BALANCE_JSON).unwrap();
        value["economy"].as_object_mut().unwrap().remove("drawCost");
        let result = BalanceConfig::from_json_str(&value.to_string());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_optional_sections_default() {
        let mut value: Value = serde_json::from_str(BALANCE_JSON).unwrap();
        let root = value.as_object_mut().unwrap();
        root.remove("draws");
        root.remove("progressTrack");
        let config = BalanceConfig::from_json_str(&value.to_string()).unwrap();
        assert_eq!(config.draws, DrawConfig::default());
        assert_eq!(config.progress_track.key_rewards, vec![3, 6, 13]);
    }

    #[test]
    fn test_inverted_tier_thresholds_are_invalid() {
        let mut config = BalanceConfig::default();
        config.tiers.cheap_max_cost = 3000;
        config.tiers.moderate_max_cost = 1000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_redraw_weights_over_one_are_invalid() {
        let mut config = BalanceConfig::default();
        config.draws.redraw_target_weight = 0.9;
        config.draws.redraw_adjacent_weight = 0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_loader_falls_back_to_defaults_when_missing() {
        let mut loader = ConfigLoader::new(temp_config_path());
        let config = loader.get();
        assert_eq!(*config, BalanceConfig::default());
        assert!(loader.is_loaded());
    }

    #[test]
    fn test_loader_falls_back_on_garbage() {
        let path = temp_config_path();
        fs::write(&path, "{ not json").unwrap();
        let mut loader = ConfigLoader::new(&path);
        assert_eq!(*loader.get(), BalanceConfig::default());
    }

    #[test]
    fn test_loader_caches_until_reload() {
        let path = temp_config_path();
        fs::write(&path, BALANCE_JSON).unwrap();
        let mut loader = ConfigLoader::new(&path);
        assert_eq!(loader.get().economy.draw_cost, 10);

        let mut value: Value = serde_json::from_str(BALANCE_JSON).unwrap();
        value["economy"]["drawCost"] = serde_json::json!(25);
        fs::write(&path, value.to_string()).unwrap();

        // Still cached
        assert_eq!(loader.get().economy.draw_cost, 10);
        // Hot reload picks up the edit
        assert_eq!(loader.reload().economy.draw_cost, 25);
    }
}
