use super::types::Tier;

// Persistence
pub const STORAGE_KEY: &str = "steamVaultState";
pub const STORAGE_VERSION: &str = "1.5";
pub const LEGACY_STORAGE_VERSION: &str = "1.0";

// Shop layout
pub const SHOP_SLOT_COUNT: usize = 5;
/// Target tier of each shop position, kept across redraws.
pub const SLOT_TIER_PATTERN: [Tier; SHOP_SLOT_COUNT] = [
    Tier::Cheap,
    Tier::Moderate,
    Tier::Cheap,
    Tier::Epic,
    Tier::Moderate,
];
/// Composition of a freshly initialized shop: 3 cheap, 1 moderate, 1 epic.
pub const INITIAL_SHOP_TIERS: [Tier; SHOP_SLOT_COUNT] = [
    Tier::Cheap,
    Tier::Cheap,
    Tier::Cheap,
    Tier::Moderate,
    Tier::Epic,
];

// Configuration
pub const CONFIG_FILE_NAME: &str = "balance.json";
/// Keys starting with this prefix are comments in the balance document.
pub const CONFIG_COMMENT_PREFIX: char = '_';

// Timing
pub const MINUTES_PER_HOUR: u64 = 60;
pub const MS_PER_MINUTE: i64 = 60 * 1000;
