//! Metadata enrichment.
//!
//! The draw system can only price items that carry a quality score and a
//! completion estimate. Both come from two external providers behind
//! [`MetadataSource`]; this module merges them into library items and keeps
//! a minimum number of priced items in the hidden pool.

use crate::core::config::BalanceConfig;
use crate::core::types::{ItemId, Library, LibraryItem};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnrichError {
    #[error("no metadata available for item {0}")]
    NotFound(ItemId),

    #[error("metadata fetch for item {id} failed: {message}")]
    Fetch { id: ItemId, message: String },

    #[error("metadata fetch for item {0} timed out")]
    Timeout(ItemId),
}

/// Store listing data (first provider).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreMetadata {
    pub quality: Option<u32>,
    pub recommendations: Option<u64>,
}

/// Playtime statistics (second provider).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaytimeMetadata {
    pub completion_hours: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub quality: Option<u32>,
}

/// The two external metadata providers, keyed by item id.
///
/// Implementations perform blocking fetches; callers wanting a deadline
/// should enforce it inside the implementation and report
/// [`EnrichError::Timeout`].
pub trait MetadataSource {
    fn store_metadata(&self, id: ItemId) -> Result<StoreMetadata, EnrichError>;
    fn playtime_metadata(&self, id: ItemId) -> Result<PlaytimeMetadata, EnrichError>;
}

/// Result of one buffer maintenance pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    /// Items selected for enrichment this pass
    pub requested: usize,
    pub enriched: Vec<ItemId>,
    pub failed: Vec<ItemId>,
    /// Priced hidden items after the pass
    pub priced: usize,
}

/// Quality estimated from a recommendation count when no score exists.
pub fn quality_from_recommendations(recommendations: u64, config: &BalanceConfig) -> u32 {
    let defaults = &config.defaults;
    let magnitude =
        (recommendations.saturating_add(1) as f64).log10() * defaults.recommendation_quality_scale;
    let estimate = defaults.recommendation_quality_base as f64 + magnitude.floor();
    (estimate as u32).min(defaults.recommendation_quality_ceiling)
}

/// Fetches both providers for `item` and returns the merged copy.
///
/// Quality prefers the store score, then the playtime provider's score,
/// then an estimate from recommendations, then the configured default.
/// Completion hours fall back to the default. Fails only when neither
/// provider answers; the input item is left untouched either way.
pub fn enrich_item(
    item: &LibraryItem,
    source: &dyn MetadataSource,
    config: &BalanceConfig,
) -> Result<LibraryItem, EnrichError> {
    let store = source.store_metadata(item.id);
    let playtime = source.playtime_metadata(item.id);

    let (store, playtime) = match (store, playtime) {
        (Err(err), Err(_)) => return Err(err),
        (store, playtime) => {
            if let Err(err) = &store {
                debug!(id = item.id, error = %err, "store metadata missing");
            }
            if let Err(err) = &playtime {
                debug!(id = item.id, error = %err, "playtime metadata missing");
            }
            (store.unwrap_or_default(), playtime.unwrap_or_default())
        }
    };

    let recommendations = store.recommendations.or(item.recommendations);
    let quality = store
        .quality
        .filter(|q| *q > 0)
        .or(playtime.quality.filter(|q| *q > 0))
        .or_else(|| {
            recommendations
                .filter(|r| *r > 0)
                .map(|r| quality_from_recommendations(r, config))
        })
        .unwrap_or(config.defaults.default_metacritic);

    let completion_hours = playtime
        .completion_hours
        .filter(|h| h.is_finite() && *h > 0.0)
        .unwrap_or(config.defaults.default_hours_tobeat);

    let mut enriched = item.clone();
    enriched.quality = Some(quality);
    enriched.completion_hours = Some(completion_hours);
    enriched.tags = Some(playtime.tags.unwrap_or_default());
    enriched.recommendations = Some(recommendations.unwrap_or(0));
    Ok(enriched)
}

/// Enriches the library entry for `id` in place.
pub fn enrich_in_library(
    library: &mut Library,
    id: ItemId,
    source: &dyn MetadataSource,
    config: &BalanceConfig,
) -> Result<(), EnrichError> {
    let item = library.get(id).ok_or(EnrichError::NotFound(id))?;
    let enriched = enrich_item(item, source, config)?;
    library.insert(enriched);
    Ok(())
}

/// Number of hidden items that can be priced.
pub fn count_priced(hidden: &[ItemId], library: &Library) -> usize {
    hidden
        .iter()
        .filter(|id| library.get(**id).is_some_and(LibraryItem::is_priced))
        .count()
}

/// Hidden items still missing pricing metadata.
pub fn unpriced_ids(hidden: &[ItemId], library: &Library) -> Vec<ItemId> {
    hidden
        .iter()
        .copied()
        .filter(|id| library.get(*id).is_some_and(|item| !item.is_priced()))
        .collect()
}

/// Tops the hidden pool up to `target` priced items.
///
/// Picks random unpriced items to close the gap and enriches them one at a
/// time. A failed item is skipped and stays a candidate for the next pass.
pub fn maintain_metadata_buffer(
    hidden: &[ItemId],
    library: &mut Library,
    target: usize,
    source: &dyn MetadataSource,
    config: &BalanceConfig,
    rng: &mut impl Rng,
) -> EnrichmentReport {
    let current = count_priced(hidden, library);
    if current >= target {
        debug!(current, target, "metadata buffer sufficient");
        return EnrichmentReport {
            priced: current,
            ..Default::default()
        };
    }

    let needed = target - current;
    let mut candidates = unpriced_ids(hidden, library);
    if candidates.is_empty() {
        debug!(current, target, "no unpriced hidden items left to enrich");
        return EnrichmentReport {
            priced: current,
            ..Default::default()
        };
    }
    candidates.shuffle(rng);
    candidates.truncate(needed);

    let mut report = EnrichmentReport {
        requested: candidates.len(),
        ..Default::default()
    };
    for id in candidates {
        match enrich_in_library(library, id, source, config) {
            Ok(()) => report.enriched.push(id),
            Err(err) => {
                warn!(id, error = %err, "metadata enrichment failed, retrying next pass");
                report.failed.push(id);
            }
        }
    }
    report.priced = count_priced(hidden, library);

    info!(
        enriched = report.enriched.len(),
        failed = report.failed.len(),
        priced = report.priced,
        target,
        "metadata buffer maintained"
    );
    report
}

/// First-run fill of the buffer.
pub fn initial_metadata_enrichment(
    hidden: &[ItemId],
    library: &mut Library,
    source: &dyn MetadataSource,
    config: &BalanceConfig,
    rng: &mut impl Rng,
) -> EnrichmentReport {
    let target = config.advanced.metadata_buffer_size;
    maintain_metadata_buffer(hidden, library, target, source, config, rng)
}

/// Refill after an unlock took a priced item out of the hidden pool.
pub fn top_up_metadata_buffer(
    hidden: &[ItemId],
    library: &mut Library,
    source: &dyn MetadataSource,
    config: &BalanceConfig,
    rng: &mut impl Rng,
) -> EnrichmentReport {
    let target = config.advanced.metadata_buffer_size;
    maintain_metadata_buffer(hidden, library, target, source, config, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Provider double: every id answers unless listed as failing.
    #[derive(Default)]
    struct FakeSource {
        failing: HashSet<ItemId>,
        store_down: bool,
        calls: RefCell<Vec<ItemId>>,
    }

    impl MetadataSource for FakeSource {
        fn store_metadata(&self, id: ItemId) -> Result<StoreMetadata, EnrichError> {
            self.calls.borrow_mut().push(id);
            if self.store_down || self.failing.contains(&id) {
                return Err(EnrichError::Fetch {
                    id,
                    message: "503".to_string(),
                });
            }
            Ok(StoreMetadata {
                quality: Some(80),
                recommendations: Some(1200),
            })
        }

        fn playtime_metadata(&self, id: ItemId) -> Result<PlaytimeMetadata, EnrichError> {
            if self.failing.contains(&id) {
                return Err(EnrichError::Timeout(id));
            }
            Ok(PlaytimeMetadata {
                completion_hours: Some(12.0),
                tags: Some(vec!["Indie".to_string()]),
                quality: Some(65),
            })
        }
    }

    fn library_of(n: u32) -> Library {
        (1..=n)
            .map(|id| LibraryItem::new(id, format!("Game {id}"), 120))
            .collect()
    }

    #[test]
    fn test_enrich_prefers_store_quality() {
        let config = BalanceConfig::default();
        let source = FakeSource::default();
        let item = LibraryItem::new(1, "A", 60);

        let enriched = enrich_item(&item, &source, &config).unwrap();

        assert_eq!(enriched.quality, Some(80));
        assert_eq!(enriched.completion_hours, Some(12.0));
        assert_eq!(enriched.tags, Some(vec!["Indie".to_string()]));
        assert!(enriched.is_priced());
        // Input untouched
        assert!(!item.is_priced());
    }

    #[test]
    fn test_enrich_falls_back_to_second_provider_quality() {
        let config = BalanceConfig::default();
        let source = FakeSource {
            store_down: true,
            ..Default::default()
        };
        let enriched = enrich_item(&LibraryItem::new(1, "A", 60), &source, &config).unwrap();
        assert_eq!(enriched.quality, Some(65));
    }

    #[test]
    fn test_enrich_fails_when_both_providers_fail() {
        let config = BalanceConfig::default();
        let source = FakeSource {
            failing: HashSet::from([1]),
            ..Default::default()
        };
        let result = enrich_item(&LibraryItem::new(1, "A", 60), &source, &config);
        assert!(matches!(result, Err(EnrichError::Fetch { id: 1, .. })));
    }

    #[test]
    fn test_quality_from_recommendations() {
        let config = BalanceConfig::default();
        // log10(2000) * 5 = 16.5 -> 70 + 16
        assert_eq!(quality_from_recommendations(1999, &config), 86);
        // Capped at the ceiling
        assert_eq!(quality_from_recommendations(10_000_000, &config), 90);
        assert_eq!(quality_from_recommendations(0, &config), 70);
        assert_eq!(quality_from_recommendations(u64::MAX, &config), 90);
    }

    #[test]
    fn test_buffer_noop_when_sufficient() {
        let config = BalanceConfig::default();
        let source = FakeSource::default();
        let mut library: Library = (1..=3)
            .map(|id| LibraryItem::new(id, "x", 60).with_metadata(80, 10.0))
            .collect();
        let mut rng = StdRng::seed_from_u64(7);

        let report = maintain_metadata_buffer(&[1, 2, 3], &mut library, 3, &source, &config, &mut rng);

        assert_eq!(report.requested, 0);
        assert_eq!(report.priced, 3);
        assert!(source.calls.borrow().is_empty());
    }

    #[test]
    fn test_buffer_enriches_only_the_gap() {
        let config = BalanceConfig::default();
        let source = FakeSource::default();
        let mut library = library_of(20);
        let hidden: Vec<ItemId> = (1..=20).collect();
        let mut rng = StdRng::seed_from_u64(42);

        let report = maintain_metadata_buffer(&hidden, &mut library, 10, &source, &config, &mut rng);

        assert_eq!(report.requested, 10);
        assert_eq!(report.enriched.len(), 10);
        assert_eq!(report.priced, 10);
        assert_eq!(count_priced(&hidden, &library), 10);
        // Sequential, one store call per item
        assert_eq!(source.calls.borrow().len(), 10);
    }

    #[test]
    fn test_buffer_tolerates_failures() {
        let config = BalanceConfig::default();
        let source = FakeSource {
            failing: (1..=5).collect(),
            ..Default::default()
        };
        let mut library = library_of(8);
        let hidden: Vec<ItemId> = (1..=8).collect();
        let mut rng = StdRng::seed_from_u64(1);

        let report = maintain_metadata_buffer(&hidden, &mut library, 8, &source, &config, &mut rng);

        assert_eq!(report.requested, 8);
        assert_eq!(report.failed.len(), 5);
        assert_eq!(report.enriched.len(), 3);
        assert_eq!(report.priced, 3);
        // Failed items stay candidates
        assert_eq!(unpriced_ids(&hidden, &library), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_buffer_ignores_ids_outside_hidden_pool() {
        let config = BalanceConfig::default();
        let source = FakeSource::default();
        let mut library = library_of(5);
        let mut rng = StdRng::seed_from_u64(3);

        let report = maintain_metadata_buffer(&[1, 2], &mut library, 10, &source, &config, &mut rng);

        assert_eq!(report.requested, 2);
        assert!(!library.get(5).unwrap().is_priced());
    }
}
