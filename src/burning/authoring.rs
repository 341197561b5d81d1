//! DVD structure authoring with dvdauthor
//!
//! dvdauthor reads the descriptor XML and writes `VIDEO_TS`/`AUDIO_TS` under
//! the descriptor's `dest` directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::conversion::install_hint;

/// dvdauthor failures
#[derive(Debug, thiserror::Error)]
pub enum AuthoringError {
    #[error("Failed to execute dvdauthor: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("dvdauthor failed: {0}")]
    Failed(String),
    #[error("dvdauthor produced no VIDEO_TS in {0}")]
    MissingOutput(PathBuf),
    #[error("Failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Run dvdauthor on a descriptor
///
/// # Arguments
/// * `dvdauthor` - Path to the dvdauthor executable
/// * `descriptor` - Path to the descriptor XML
/// * `dest` - The `dest` directory named in the descriptor
///
/// # Returns
/// * `Ok(PathBuf)` with the `VIDEO_TS` directory
/// * `Err(AuthoringError)` if dvdauthor fails or writes nothing
pub fn build_dvd_structure(
    dvdauthor: &Path,
    descriptor: &Path,
    dest: &Path,
) -> Result<PathBuf, AuthoringError> {
    // dvdauthor refuses to overwrite an existing VIDEO_TS
    if dest.exists() {
        std::fs::remove_dir_all(dest).map_err(|source| AuthoringError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
    }
    std::fs::create_dir_all(dest).map_err(|source| AuthoringError::Io {
        path: dest.to_path_buf(),
        source,
    })?;

    log::info!("Running dvdauthor on {}", descriptor.display());
    let mut cmd = Command::new(dvdauthor);
    cmd.arg("-x").arg(descriptor).stdin(Stdio::null());
    if let Some(dir) = descriptor.parent() {
        cmd.current_dir(dir);
    }

    let output = cmd.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            log::error!("dvdauthor not found. {}", install_hint("dvdauthor"));
        }
        AuthoringError::Spawn(e)
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AuthoringError::Failed(crate::conversion::stderr_tail(&stderr)));
    }

    let video_ts = dest.join("VIDEO_TS");
    if !video_ts.is_dir() {
        return Err(AuthoringError::MissingOutput(dest.to_path_buf()));
    }

    log::info!("Built DVD structure: {}", dest.display());
    Ok(video_ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_dvdauthor() {
        let dir = TempDir::new().unwrap();
        let result = build_dvd_structure(
            Path::new("/nonexistent/dvdauthor"),
            &dir.path().join("dvdauthor.xml"),
            &dir.path().join("DVD"),
        );
        assert!(matches!(result, Err(AuthoringError::Spawn(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_builds_video_ts() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("DVD");
        // Stale output from an earlier run is replaced
        std::fs::create_dir_all(dest.join("VIDEO_TS")).unwrap();
        std::fs::write(dest.join("VIDEO_TS/STALE.VOB"), b"old").unwrap();

        let tool = crate::test_fixtures::fake_tool(
            dir.path(),
            "dvdauthor",
            &format!("mkdir -p '{}/VIDEO_TS' && touch '{}/VIDEO_TS/VIDEO_TS.IFO'", dest.display(), dest.display()),
        );
        let video_ts = build_dvd_structure(&tool, &dir.path().join("dvdauthor.xml"), &dest).unwrap();

        assert_eq!(video_ts, dest.join("VIDEO_TS"));
        assert!(video_ts.join("VIDEO_TS.IFO").exists());
        assert!(!video_ts.join("STALE.VOB").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let tool = crate::test_fixtures::fake_tool(
            dir.path(),
            "dvdauthor",
            "echo 'ERR:  Cannot open VOB' >&2; exit 1",
        );
        let err = build_dvd_structure(&tool, &dir.path().join("d.xml"), &dir.path().join("DVD")).unwrap_err();
        assert!(err.to_string().contains("Cannot open VOB"));
    }

    #[cfg(unix)]
    #[test]
    fn test_success_without_output_is_error() {
        let dir = TempDir::new().unwrap();
        let tool = crate::test_fixtures::fake_tool(dir.path(), "dvdauthor", "exit 0");
        let err = build_dvd_structure(&tool, &dir.path().join("d.xml"), &dir.path().join("DVD")).unwrap_err();
        assert!(matches!(err, AuthoringError::MissingOutput(_)));
    }
}
