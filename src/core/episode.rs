//! Episode records and explicit override merging
//!
//! Episodes arrive from the upstream catalog and are never mutated. Edits made
//! before authoring (a new title, a replacement thumbnail, a local copy of the
//! media) live in separate `EpisodeOverride` records that are merged by
//! `resolve_episodes()` right before planning and rendering.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single episode as resolved by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Catalog identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Ordinal within the season (1-based as shown to viewers)
    pub index: u32,
    /// Runtime in seconds (0 when unknown)
    #[serde(default)]
    pub duration_seconds: f64,
    /// Synopsis text
    #[serde(default)]
    pub overview: String,
    /// Local thumbnail image, if one was downloaded
    #[serde(default)]
    pub thumbnail: Option<PathBuf>,
    /// Where the encoder reads the media from (path or stream URL)
    pub source: String,
}

impl Episode {
    /// Duration in minutes
    pub fn duration_minutes(&self) -> f64 {
        self.duration_seconds / 60.0
    }

    /// Whether the catalog supplied a usable duration
    pub fn has_known_duration(&self) -> bool {
        self.duration_seconds.is_finite() && self.duration_seconds > 0.0
    }
}

/// User edits applied on top of a catalog episode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeOverride {
    /// Which episode this override targets
    pub episode_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<PathBuf>,
    #[serde(default)]
    pub source: Option<String>,
}

impl EpisodeOverride {
    /// Produce a new episode with every set field of this override applied
    pub fn apply(&self, base: &Episode) -> Episode {
        let mut merged = base.clone();
        if let Some(title) = &self.title {
            merged.title = title.clone();
        }
        if let Some(thumbnail) = &self.thumbnail {
            merged.thumbnail = Some(thumbnail.clone());
        }
        if let Some(source) = &self.source {
            merged.source = source.clone();
        }
        merged
    }
}

/// Merge overrides into the base episode list
///
/// Order of `base` is preserved. Overrides are applied in the order given, so a
/// later override for the same episode wins field by field. Overrides naming an
/// unknown episode are ignored with a warning.
pub fn resolve_episodes(base: &[Episode], overrides: &[EpisodeOverride]) -> Vec<Episode> {
    for ov in overrides {
        if !base.iter().any(|e| e.id == ov.episode_id) {
            log::warn!("Ignoring override for unknown episode '{}'", ov.episode_id);
        }
    }

    base.iter()
        .map(|episode| {
            overrides
                .iter()
                .filter(|ov| ov.episode_id == episode.id)
                .fold(episode.clone(), |acc, ov| ov.apply(&acc))
        })
        .collect()
}
