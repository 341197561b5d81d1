//! Project manifest: one season to be authored

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::{resolve_episodes, Episode, EpisodeOverride};

/// Current manifest format
pub const MANIFEST_VERSION: &str = "1.0";

/// A saved authoring project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
    /// Version of the manifest format
    pub version: String,

    /// When this project was created (RFC 3339)
    pub created: String,

    /// When this project was last modified (RFC 3339)
    pub modified: String,

    /// Series name, used for the menu heading, volume labels and ISO names
    pub series_title: String,

    /// Season name, appended to the menu heading
    pub season_title: String,

    /// Season synopsis printed at the bottom of the menu
    #[serde(default)]
    pub overview: String,

    /// Menu background artwork
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backdrop: Option<PathBuf>,

    /// Logo drawn instead of the title text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<PathBuf>,

    /// Audio looped under the menu
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_audio: Option<PathBuf>,

    /// Episodes in play order, as supplied by the catalog
    pub episodes: Vec<Episode>,

    /// User edits applied on top of `episodes`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<EpisodeOverride>,
}

impl ProjectManifest {
    pub fn new(series_title: String, season_title: String, episodes: Vec<Episode>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();

        Self {
            version: MANIFEST_VERSION.to_string(),
            created: now.clone(),
            modified: now,
            series_title,
            season_title,
            overview: String::new(),
            backdrop: None,
            logo: None,
            theme_audio: None,
            episodes,
            overrides: Vec::new(),
        }
    }

    /// Episodes with all overrides merged, in play order
    pub fn resolved_episodes(&self) -> Vec<Episode> {
        resolve_episodes(&self.episodes, &self.overrides)
    }

    /// Record an override; later overrides win field by field
    pub fn add_override(&mut self, ov: EpisodeOverride) {
        self.overrides.push(ov);
        self.touch();
    }

    /// Update the modified timestamp
    pub fn touch(&mut self) {
        self.modified = chrono::Utc::now().to_rfc3339();
    }
}
