//! Library items, tiers and shop slots shared by every manager.

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Store identifier of a library item.
pub type ItemId = u32;

/// A game from the player's library, as handed over by the library fetch.
///
/// Quality and completion hours stay `None` until the enrichment manager
/// merges provider metadata into the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryItem {
    #[serde(rename = "appid")]
    pub id: ItemId,
    pub name: String,
    #[serde(rename = "playtime_forever")]
    pub played_minutes: u64,
    #[serde(rename = "metacritic", default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
    #[serde(rename = "hoursTobeat", default, skip_serializing_if = "Option::is_none")]
    pub completion_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<u64>,
}

impl LibraryItem {
    pub fn new(id: ItemId, name: impl Into<String>, played_minutes: u64) -> Self {
        Self {
            id,
            name: name.into(),
            played_minutes,
            quality: None,
            completion_hours: None,
            tags: None,
            recommendations: None,
        }
    }

    /// Builder used by tests and the simulator to hand out pre-priced items.
    pub fn with_metadata(mut self, quality: u32, completion_hours: f64) -> Self {
        self.quality = Some(quality);
        self.completion_hours = Some(completion_hours);
        self
    }

    pub fn is_played(&self) -> bool {
        self.played_minutes > 0
    }

    /// An item is priced once both pricing inputs are known and non-zero.
    pub fn is_priced(&self) -> bool {
        matches!(self.quality, Some(q) if q > 0)
            && matches!(self.completion_hours, Some(h) if h > 0.0)
    }
}

/// The engine's view of the player's library, ordered by item id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<LibraryItem>", into = "Vec<LibraryItem>")]
pub struct Library {
    items: BTreeMap<ItemId, LibraryItem>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ItemId) -> Option<&LibraryItem> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut LibraryItem> {
        self.items.get_mut(&id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    /// Inserts or replaces an item, returning the previous entry.
    pub fn insert(&mut self, item: LibraryItem) -> Option<LibraryItem> {
        self.items.insert(item.id, item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> btree_map::Values<'_, ItemId, LibraryItem> {
        self.items.values()
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items.keys().copied().collect()
    }

    pub fn played_minutes(&self, id: ItemId) -> Option<u64> {
        self.items.get(&id).map(|item| item.played_minutes)
    }

    /// Folds a freshly fetched snapshot into this one.
    ///
    /// Names and playtimes come from `fresh`; metadata already merged by
    /// enrichment is kept. Returns the ids that were not known before.
    pub fn merge_snapshot(&mut self, fresh: &Library) -> Vec<ItemId> {
        let mut added = Vec::new();
        for item in fresh.iter() {
            match self.items.get_mut(&item.id) {
                Some(existing) => {
                    existing.name = item.name.clone();
                    existing.played_minutes = item.played_minutes;
                    if item.is_priced() && !existing.is_priced() {
                        existing.quality = item.quality;
                        existing.completion_hours = item.completion_hours;
                    }
                }
                None => {
                    self.items.insert(item.id, item.clone());
                    added.push(item.id);
                }
            }
        }
        added
    }
}

impl From<Vec<LibraryItem>> for Library {
    fn from(items: Vec<LibraryItem>) -> Self {
        items.into_iter().collect()
    }
}

impl From<Library> for Vec<LibraryItem> {
    fn from(library: Library) -> Self {
        library.items.into_values().collect()
    }
}

impl FromIterator<LibraryItem> for Library {
    fn from_iter<I: IntoIterator<Item = LibraryItem>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().map(|item| (item.id, item)).collect(),
        }
    }
}

/// Price band of an item, derived from its unlock cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Cheap,
    Moderate,
    Epic,
}

impl Tier {
    /// All tiers from cheapest to most expensive
    pub const ALL: [Tier; 3] = [Tier::Cheap, Tier::Moderate, Tier::Epic];

    pub fn name(&self) -> &'static str {
        match self {
            Tier::Cheap => "cheap",
            Tier::Moderate => "moderate",
            Tier::Epic => "epic",
        }
    }
}

/// One position of the shop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopSlot {
    #[serde(rename = "appId")]
    pub item_id: Option<ItemId>,
    pub tier: Option<Tier>,
}

impl ShopSlot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn filled(item_id: ItemId, tier: Tier) -> Self {
        Self {
            item_id: Some(item_id),
            tier: Some(tier),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.item_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_priced_requires_both_fields() {
        let item = LibraryItem::new(1, "Portal", 120);
        assert!(!item.is_priced());

        let mut partial = item.clone();
        partial.quality = Some(90);
        assert!(!partial.is_priced());

        let priced = item.with_metadata(90, 3.5);
        assert!(priced.is_priced());
    }

    #[test]
    fn test_zero_quality_is_not_priced() {
        let item = LibraryItem::new(1, "Portal", 120).with_metadata(0, 3.5);
        assert!(!item.is_priced());
    }

    #[test]
    fn test_library_deserializes_from_store_json() {
        let json = r#"[
            {"appid": 620, "name": "Portal 2", "playtime_forever": 900, "metacritic": 95},
            {"appid": 400, "name": "Portal", "playtime_forever": 0}
        ]"#;
        let library: Library = serde_json::from_str(json).unwrap();
        assert_eq!(library.ids(), vec![400, 620]);
        assert_eq!(library.get(620).unwrap().quality, Some(95));
        assert_eq!(library.played_minutes(400), Some(0));
    }

    #[test]
    fn test_merge_snapshot_keeps_enriched_metadata() {
        let mut cached: Library = vec![LibraryItem::new(1, "A", 10).with_metadata(80, 12.0)].into();
        let fresh: Library = vec![LibraryItem::new(1, "A", 95), LibraryItem::new(2, "B", 0)].into();

        let added = cached.merge_snapshot(&fresh);

        assert_eq!(added, vec![2]);
        let a = cached.get(1).unwrap();
        assert_eq!(a.played_minutes, 95);
        assert_eq!(a.quality, Some(80));
        assert_eq!(a.completion_hours, Some(12.0));
    }

    #[test]
    fn test_shop_slot_serializes_with_app_id() {
        let slot = ShopSlot::filled(42, Tier::Epic);
        let json = serde_json::to_string(&slot).unwrap();
        assert_eq!(json, r#"{"appId":42,"tier":"epic"}"#);
        assert!(ShopSlot::empty().is_empty());
    }
}
