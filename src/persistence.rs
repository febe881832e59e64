//! Versioned persistence of [`VaultState`].
//!
//! The state is stored as one JSON document under a fixed key. The document
//! carries a `version` tag: the current layout loads directly, the legacy
//! points-based layout is migrated forward, anything else is treated as
//! corrupt and cleared.

use crate::core::constants::{LEGACY_STORAGE_VERSION, SHOP_SLOT_COUNT, STORAGE_KEY, STORAGE_VERSION};
use crate::core::state::{ItemProgress, Pool, Pools, ProgressTrack, VaultState};
use crate::core::types::{ItemId, Library, LibraryItem, ShopSlot};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("could not encode vault document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not determine save directory")]
    NoSaveDirectory,

    #[error("vault document has no version tag")]
    MissingVersion,

    #[error("unsupported vault document version {0:?}")]
    UnsupportedVersion(String),

    #[error("item {0} is listed in more than one pool")]
    OverlappingPools(ItemId),

    #[error("item {id} holds {current} power but its maximum is {max}")]
    InvalidProgress { id: ItemId, current: u64, max: u64 },
}

/// What [`load_state`] found in the store.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(VaultState),
    /// Nothing was saved
    Missing,
    /// A document was present but unreadable and has been removed
    Discarded(String),
}

impl LoadOutcome {
    pub fn into_state(self) -> Option<VaultState> {
        match self {
            LoadOutcome::Loaded(state) => Some(state),
            LoadOutcome::Missing | LoadOutcome::Discarded(_) => None,
        }
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, LoadOutcome::Discarded(_))
    }
}

/// Raw key-value storage for the vault document.
pub trait VaultStore {
    fn load_raw(&self) -> Result<Option<String>, PersistenceError>;
    fn save_raw(&mut self, json: &str) -> Result<(), PersistenceError>;
    fn clear(&mut self) -> Result<(), PersistenceError>;
}

/// File-backed store in the platform config directory.
#[derive(Debug, Clone)]
pub struct SaveManager {
    save_path: PathBuf,
}

impl SaveManager {
    /// Creates a store at `<config dir>/vault-escape/steamVaultState.json`,
    /// creating the directory if needed.
    pub fn new() -> Result<Self, PersistenceError> {
        let project_dirs =
            ProjectDirs::from("", "", "vault-escape").ok_or(PersistenceError::NoSaveDirectory)?;

        let config_dir = project_dirs.config_dir();
        fs::create_dir_all(config_dir)?;

        Ok(Self::at_path(config_dir.join(format!("{STORAGE_KEY}.json"))))
    }

    pub fn at_path(save_path: impl Into<PathBuf>) -> Self {
        Self {
            save_path: save_path.into(),
        }
    }

    /// Creates a SaveManager for testing with a unique temporary directory
    #[cfg(test)]
    fn new_for_test() -> io::Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

        let test_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let temp_dir = std::env::temp_dir().join(format!(
            "vault-save-test-{}-{}",
            std::process::id(),
            test_id
        ));
        fs::create_dir_all(&temp_dir)?;

        Ok(Self::at_path(temp_dir.join(format!("{STORAGE_KEY}.json"))))
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub fn save_exists(&self) -> bool {
        self.save_path.exists()
    }
}

impl VaultStore for SaveManager {
    fn load_raw(&self) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(&self.save_path) {
            Ok(json) => Ok(Some(json)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save_raw(&mut self, json: &str) -> Result<(), PersistenceError> {
        if let Some(parent) = self.save_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.save_path, json)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.save_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory store for simulations and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    document: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(json: impl Into<String>) -> Self {
        Self {
            document: Some(json.into()),
        }
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }
}

impl VaultStore for MemoryStore {
    fn load_raw(&self) -> Result<Option<String>, PersistenceError> {
        Ok(self.document.clone())
    }

    fn save_raw(&mut self, json: &str) -> Result<(), PersistenceError> {
        self.document = Some(json.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PersistenceError> {
        self.document = None;
        Ok(())
    }
}

/// Current (1.5) document layout.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VaultDocument {
    version: String,
    collection_power: u64,
    liberation_keys: u64,
    #[serde(rename = "pool1_unlocked")]
    unlocked: Vec<ItemId>,
    #[serde(rename = "pool2_hidden")]
    hidden: Vec<ItemId>,
    #[serde(rename = "pool3_keyGames")]
    key_items: Vec<ItemId>,
    shop_slots: Vec<ShopSlot>,
    #[serde(default)]
    game_progress: BTreeMap<ItemId, ItemProgress>,
    #[serde(default)]
    progress_track: ProgressTrack,
    #[serde(default)]
    cached_library: Library,
    #[serde(default)]
    last_sync: i64,
    #[serde(rename = "steamId", default)]
    player_id: String,
}

impl VaultDocument {
    fn from_state(state: &VaultState) -> Self {
        Self {
            version: STORAGE_VERSION.to_string(),
            collection_power: state.collection_power,
            liberation_keys: state.liberation_keys,
            unlocked: state.pools.ids(Pool::Unlocked),
            hidden: state.pools.ids(Pool::Hidden),
            key_items: state.pools.ids(Pool::KeyItem),
            shop_slots: state.shop_slots.to_vec(),
            game_progress: state.game_progress.clone(),
            progress_track: state.progress_track.clone(),
            cached_library: state.cached_library.clone(),
            last_sync: state.last_sync,
            player_id: state.player_id.clone(),
        }
    }

    fn into_state(self) -> Result<VaultState, PersistenceError> {
        let pools = Pools::from_lists(&self.unlocked, &self.hidden, &self.key_items)
            .map_err(PersistenceError::OverlappingPools)?;

        if let Some((id, progress)) = self.game_progress.iter().find(|(_, p)| !p.is_valid()) {
            return Err(PersistenceError::InvalidProgress {
                id: *id,
                current: progress.current_power,
                max: progress.max_power,
            });
        }

        let mut shop_slots = [ShopSlot::empty(); SHOP_SLOT_COUNT];
        for (slot, stored) in shop_slots.iter_mut().zip(self.shop_slots) {
            *slot = stored;
        }

        Ok(VaultState {
            version: STORAGE_VERSION.to_string(),
            collection_power: self.collection_power,
            liberation_keys: self.liberation_keys,
            pools,
            shop_slots,
            game_progress: self.game_progress,
            progress_track: self.progress_track,
            cached_library: self.cached_library,
            last_sync: self.last_sync,
            player_id: self.player_id,
        })
    }
}

/// Legacy (1.0) document: a points counter and a list of unlocked ids.
/// Ids were stored as numbers or numeric strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyDocument {
    #[serde(default)]
    points: f64,
    #[serde(default)]
    unlocked_games: Vec<Value>,
    #[serde(default)]
    cached_library: Vec<Value>,
    #[serde(default)]
    last_refresh: i64,
}

fn legacy_id(value: &Value) -> Option<ItemId> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|id| ItemId::try_from(id).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl LegacyDocument {
    fn migrate(self) -> VaultState {
        let library: Library = self
            .cached_library
            .into_iter()
            .filter_map(|entry| serde_json::from_value::<LibraryItem>(entry).ok())
            .collect();
        let unlocked: HashSet<ItemId> = self.unlocked_games.iter().filter_map(legacy_id).collect();

        let mut pools = Pools::new();
        for item in library.iter() {
            let pool = if !item.is_played() {
                Pool::KeyItem
            } else if unlocked.contains(&item.id) {
                Pool::Unlocked
            } else {
                Pool::Hidden
            };
            pools.insert(item.id, pool);
        }

        // Every vault needs something to click
        if pools.count(Pool::Unlocked) == 0 {
            let least_played = library
                .iter()
                .filter(|item| item.is_played())
                .min_by_key(|item| (item.played_minutes, item.id))
                .map(|item| item.id);
            if let Some(id) = least_played {
                pools.transfer(id, Pool::Hidden, Pool::Unlocked);
            }
        }

        let mut state = VaultState::new(String::new(), pools, library, self.last_refresh);
        state.collection_power = if self.points.is_finite() && self.points > 0.0 {
            self.points.floor() as u64
        } else {
            0
        };

        info!(
            unlocked = state.pools.count(Pool::Unlocked),
            hidden = state.pools.count(Pool::Hidden),
            key_items = state.pools.count(Pool::KeyItem),
            collection_power = state.collection_power,
            "migrated legacy vault document"
        );
        state
    }
}

/// Encodes the state as a current-version document.
pub fn serialize_state(state: &VaultState) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string_pretty(&VaultDocument::from_state(state))?)
}

/// Decodes a document of any supported version.
pub fn deserialize_state(json: &str) -> Result<VaultState, PersistenceError> {
    let value: Value = serde_json::from_str(json)?;
    let version = value
        .get("version")
        .and_then(Value::as_str)
        .ok_or(PersistenceError::MissingVersion)?
        .to_string();

    match version.as_str() {
        STORAGE_VERSION => serde_json::from_value::<VaultDocument>(value)?.into_state(),
        LEGACY_STORAGE_VERSION => Ok(serde_json::from_value::<LegacyDocument>(value)?.migrate()),
        _ => Err(PersistenceError::UnsupportedVersion(version)),
    }
}

/// Loads the saved state.
///
/// A document that cannot be decoded is removed from the store and
/// reported as [`LoadOutcome::Discarded`] so callers can tell the player
/// their progress was lost. Only storage failures are errors.
pub fn load_state(store: &mut dyn VaultStore) -> Result<LoadOutcome, PersistenceError> {
    let Some(json) = store.load_raw()? else {
        debug!("no saved vault");
        return Ok(LoadOutcome::Missing);
    };

    match deserialize_state(&json) {
        Ok(state) => {
            debug!(version = %state.version, "vault loaded");
            Ok(LoadOutcome::Loaded(state))
        }
        Err(err) => {
            warn!(error = %err, "discarding unreadable vault document");
            store.clear()?;
            Ok(LoadOutcome::Discarded(err.to_string()))
        }
    }
}

pub fn save_state(store: &mut dyn VaultStore, state: &VaultState) -> Result<(), PersistenceError> {
    let json = serialize_state(state)?;
    store.save_raw(&json)?;
    debug!(bytes = json.len(), "vault saved");
    Ok(())
}

pub fn clear_state(store: &mut dyn VaultStore) -> Result<(), PersistenceError> {
    store.clear()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{ProgressReward, RewardKind, UnlockRecord};
    use crate::core::types::Tier;

    fn sample_state() -> VaultState {
        let library: Library = vec![
            LibraryItem::new(10, "Unlocked", 420).with_metadata(75, 12.5),
            LibraryItem::new(20, "Hidden", 90),
            LibraryItem::new(30, "Key", 0),
        ]
        .into();
        let pools = Pools::from_lists(&[10], &[20], &[30]).unwrap();
        let mut state = VaultState::new("76561198000000000", pools, library, 1_700_000_000_000);
        state.collection_power = 1234;
        state.liberation_keys = 17;
        state.shop_slots[1] = ShopSlot::filled(20, Tier::Moderate);

        let mut progress = ItemProgress::new(700, 420);
        progress.current_power = 700;
        progress.is_drained = true;
        progress.drained_at = Some(1_700_000_100_000);
        state.game_progress.insert(10, progress);

        state.progress_track.next_reward = Some(ProgressReward {
            kind: RewardKind::Keys,
            amount: 6,
        });
        state.progress_track.unlocked_games.push(UnlockRecord {
            item_id: 10,
            unlock_timestamp: 1_700_000_000_000,
            tier: Tier::Cheap,
            name: "Unlocked".to_string(),
        });
        state
    }

    #[test]
    fn test_round_trip_preserves_state() {
        let state = sample_state();
        let json = serialize_state(&state).unwrap();
        let loaded = deserialize_state(&json).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_document_uses_stored_key_names() {
        let json = serialize_state(&sample_state()).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], "1.5");
        assert_eq!(value["collectionPower"], 1234);
        assert_eq!(value["pool1_unlocked"], serde_json::json!([10]));
        assert_eq!(value["pool3_keyGames"], serde_json::json!([30]));
        assert_eq!(value["shopSlots"][1]["appId"], 20);
        assert_eq!(value["shopSlots"][1]["tier"], "moderate");
        assert_eq!(value["gameProgress"]["10"]["isDrained"], true);
        assert_eq!(value["cachedLibrary"][0]["playtime_forever"], 420);
        assert_eq!(value["steamId"], "76561198000000000");
    }

    #[test]
    fn test_unknown_version_clears_store() {
        let mut store = MemoryStore::with_document(r#"{"version":"9.9","collectionPower":1}"#);
        assert!(load_state(&mut store).unwrap().is_discarded());
        assert!(store.document().is_none());
    }

    #[test]
    fn test_missing_version_and_garbage_are_discarded() {
        for doc in [r#"{"collectionPower":1}"#, "not json at all", r#"{"version":15}"#] {
            let mut store = MemoryStore::with_document(doc);
            assert!(load_state(&mut store).unwrap().is_discarded(), "{doc}");
            assert!(store.document().is_none());
        }
    }

    #[test]
    fn test_overlapping_pools_are_corrupt() {
        let mut value: Value = serde_json::from_str(&serialize_state(&sample_state()).unwrap()).unwrap();
        value["pool2_hidden"] = serde_json::json!([20, 10]);

        let err = deserialize_state(&value.to_string()).unwrap_err();
        assert!(matches!(err, PersistenceError::OverlappingPools(10)));

        let mut store = MemoryStore::with_document(value.to_string());
        assert!(load_state(&mut store).unwrap().is_discarded());
    }

    #[test]
    fn test_progress_above_max_is_corrupt() {
        let mut value: Value = serde_json::from_str(&serialize_state(&sample_state()).unwrap()).unwrap();
        value["gameProgress"]["10"]["currentPower"] = serde_json::json!(2000);
        value["gameProgress"]["10"]["maxPower"] = serde_json::json!(1000);
        value["gameProgress"]["10"]["isDrained"] = serde_json::json!(false);

        let err = deserialize_state(&value.to_string()).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::InvalidProgress { id: 10, current: 2000, max: 1000 }
        ));

        let mut store = MemoryStore::with_document(value.to_string());
        assert!(load_state(&mut store).unwrap().is_discarded());
        assert!(store.document().is_none());
    }

    #[test]
    fn test_fractional_power_loads() {
        let mut value: Value = serde_json::from_str(&serialize_state(&sample_state()).unwrap()).unwrap();
        value["gameProgress"]["10"]["currentPower"] = serde_json::json!(99.5);

        let mut store = MemoryStore::with_document(value.to_string());
        let state = load_state(&mut store).unwrap().into_state().unwrap();

        assert_eq!(state.game_progress[&10].current_power, 99);
        assert!(store.document().is_some());
    }

    #[test]
    fn test_legacy_document_migrates() {
        let legacy = r#"{
            "version": "1.0",
            "points": 512.75,
            "unlockedGames": [1, "2"],
            "featuredGame": 1,
            "cachedLibrary": [
                {"appid": 1, "name": "One", "playtime_forever": 300},
                {"appid": 2, "name": "Two", "playtime_forever": 0},
                {"appid": 3, "name": "Three", "playtime_forever": 45, "metacritic": 81},
                {"appid": "bogus", "name": "Broken", "playtime_forever": 5}
            ],
            "lastRefresh": 1600000000000
        }"#;

        let state = deserialize_state(legacy).unwrap();

        assert_eq!(state.version, STORAGE_VERSION);
        assert_eq!(state.collection_power, 512);
        assert_eq!(state.pools.ids(Pool::Unlocked), vec![1]);
        assert_eq!(state.pools.ids(Pool::Hidden), vec![3]);
        assert_eq!(state.pools.ids(Pool::KeyItem), vec![2]);
        assert_eq!(state.cached_library.len(), 3);
        assert_eq!(state.cached_library.get(3).unwrap().quality, Some(81));
        assert_eq!(state.last_sync, 1_600_000_000_000);
        assert!(state.shop_slots.iter().all(ShopSlot::is_empty));
    }

    #[test]
    fn test_legacy_without_unlocks_unlocks_least_played() {
        let legacy = r#"{
            "version": "1.0",
            "points": 0,
            "unlockedGames": [],
            "cachedLibrary": [
                {"appid": 1, "name": "Long", "playtime_forever": 900},
                {"appid": 2, "name": "Short", "playtime_forever": 40}
            ],
            "lastRefresh": 0
        }"#;

        let state = deserialize_state(legacy).unwrap();
        assert_eq!(state.pools.ids(Pool::Unlocked), vec![2]);
        assert_eq!(state.pools.ids(Pool::Hidden), vec![1]);
    }

    #[test]
    fn test_save_manager_round_trip() {
        let mut manager = SaveManager::new_for_test().expect("Failed to create SaveManager");
        assert_eq!(load_state(&mut manager).unwrap(), LoadOutcome::Missing);

        let state = sample_state();
        save_state(&mut manager, &state).unwrap();
        assert!(manager.save_exists());

        let loaded = load_state(&mut manager).unwrap().into_state().unwrap();
        assert_eq!(loaded, state);

        clear_state(&mut manager).unwrap();
        assert!(!manager.save_exists());
        // Clearing twice is fine
        clear_state(&mut manager).unwrap();
    }

    #[test]
    fn test_short_shop_list_is_padded() {
        let mut value: Value = serde_json::from_str(&serialize_state(&sample_state()).unwrap()).unwrap();
        value["shopSlots"] = serde_json::json!([{"appId": 20, "tier": "cheap"}]);

        let state = deserialize_state(&value.to_string()).unwrap();
        assert_eq!(state.shop_slots[0], ShopSlot::filled(20, Tier::Cheap));
        assert!(state.shop_slots[1..].iter().all(ShopSlot::is_empty));
    }
}
