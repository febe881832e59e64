//! Synthetic libraries and an offline metadata source for simulations.

use crate::core::types::{ItemId, Library, LibraryItem};
use crate::enrichment::{EnrichError, MetadataSource, PlaytimeMetadata, StoreMetadata};
use rand::Rng;

/// Builds a library of `size` items. Roughly `unplayed_fraction` of them are
/// never played; the rest get between 1 minute and 60 hours.
pub fn synthetic_library(size: u32, unplayed_fraction: f64, rng: &mut impl Rng) -> Library {
    (1..=size)
        .map(|id| {
            let played_minutes = if rng.gen_bool(unplayed_fraction.clamp(0.0, 1.0)) {
                0
            } else {
                rng.gen_range(1..=3600)
            };
            LibraryItem::new(id, format!("Game #{id}"), played_minutes)
        })
        .collect()
}

/// Metadata derived from the item id, so every run sees the same catalog.
///
/// A few ids have no store listing and a few have no playtime statistics,
/// which exercises the fallbacks of the enrichment path.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticSource;

impl SyntheticSource {
    fn mix(id: ItemId, salt: u32) -> u32 {
        id.wrapping_mul(2_654_435_761).rotate_left(salt) ^ salt
    }
}

impl MetadataSource for SyntheticSource {
    fn store_metadata(&self, id: ItemId) -> Result<StoreMetadata, EnrichError> {
        if id % 17 == 0 {
            return Err(EnrichError::NotFound(id));
        }
        let quality = (id % 11 != 0).then(|| 55 + Self::mix(id, 7) % 41);
        Ok(StoreMetadata {
            quality,
            recommendations: Some(u64::from(Self::mix(id, 13) % 200_000)),
        })
    }

    fn playtime_metadata(&self, id: ItemId) -> Result<PlaytimeMetadata, EnrichError> {
        if id % 23 == 0 {
            return Err(EnrichError::Fetch {
                id,
                message: "statistics unavailable".to_string(),
            });
        }
        Ok(PlaytimeMetadata {
            completion_hours: Some(2.0 + f64::from(Self::mix(id, 3) % 800) / 10.0),
            tags: Some(vec!["Synthetic".to_string()]),
            quality: None,
        })
    }
}
