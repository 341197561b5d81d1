//! Project storage and media directory scanning

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::types::ProjectManifest;
use crate::core::Episode;

/// Extensions treated as episode media
const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "m4v", "avi", "mov", "ts", "m2ts", "mpg", "mpeg", "wmv", "webm"];

/// Manifest load/save failures
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Failed to read project file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write project file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse project file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("No video files found in {0}")]
    NoMedia(PathBuf),
}

/// Save a project manifest to a file
pub fn save_project(manifest: &ProjectManifest, path: &Path) -> Result<(), ProjectError> {
    let json = serde_json::to_string_pretty(manifest).map_err(|source| ProjectError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ProjectError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, json).map_err(|source| ProjectError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    log::debug!("Saved project to {:?}", path);
    Ok(())
}

/// Load a project manifest from a file
pub fn load_project(path: &Path) -> Result<ProjectManifest, ProjectError> {
    let contents = fs::read_to_string(path).map_err(|source| ProjectError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&contents).map_err(|source| ProjectError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Check if a path has a video extension
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Build an episode list from the video files under `dir`
///
/// Files are ordered by path, numbered from 1 and titled after their file
/// stem. Durations are left at 0 for the workflow to probe.
pub fn episodes_from_directory(dir: &Path) -> Result<Vec<Episode>, ProjectError> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_video_file(e.path()))
        .map(|e| e.into_path())
        .collect();

    if files.is_empty() {
        return Err(ProjectError::NoMedia(dir.to_path_buf()));
    }

    // Sort for consistent ordering
    files.sort();

    Ok(files
        .into_iter()
        .enumerate()
        .map(|(i, path)| {
            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().replace(['_', '.'], " "))
                .unwrap_or_default();
            Episode {
                id: format!("file-{}", i + 1),
                title: title.trim().to_string(),
                index: i as u32 + 1,
                duration_seconds: 0.0,
                overview: String::new(),
                thumbnail: None,
                source: path.to_string_lossy().into_owned(),
            }
        })
        .collect())
}
