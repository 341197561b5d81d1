//! Video conversion module
//!
//! Boundary to the external encoder: locating the tools, building ffmpeg
//! command lines, parsing ffmpeg's progress stream, and running transcode
//! jobs on a bounded worker pool.

mod background;
mod ffmpeg;
mod parallel;
mod progress;

pub use background::EncodeEvent;
pub use ffmpeg::{
    extract_subtitles, menu_video_args, probe_duration, render_menu_video, subtitle_args,
    transcode_args, write_chapter_file, EncodeSettings, MenuVideoOptions, MENU_LOOP_SECONDS,
};
pub use parallel::{calculate_worker_count, EncodeError, EncodeSummary, EncodingCoordinator};
pub use progress::{parse_progress_line, ProgressLine, ProgressTracker};
pub(crate) use ffmpeg::stderr_tail;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Missing or unusable external tools
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("{tool} not found. {hint}")]
    NotFound { tool: String, hint: String },
    #[error("{tool} at {path} is not executable")]
    NotExecutable { tool: String, path: PathBuf },
}

/// Install instructions shown when a tool is missing
pub fn install_hint(tool: &str) -> String {
    let package = match tool {
        "ffmpeg" | "ffprobe" => "ffmpeg",
        "mkisofs" | "genisoimage" => "genisoimage",
        other => other,
    };
    format!(
        "Please install it (Ubuntu/Debian: sudo apt install {}; macOS: brew install {}) or set its path in the settings",
        package, package
    )
}

/// Verify that `path` exists and is executable
pub fn verify_executable(tool: &str, path: &Path) -> Result<PathBuf, ToolError> {
    if !path.exists() {
        return Err(ToolError::NotFound {
            tool: tool.to_string(),
            hint: format!("Configured path {} does not exist", path.display()),
        });
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let executable = std::fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false);
        if !executable {
            return Err(ToolError::NotExecutable {
                tool: tool.to_string(),
                path: path.to_path_buf(),
            });
        }
    }

    Ok(path.to_path_buf())
}

/// Find `tool`, preferring an explicit override over `PATH`
pub fn locate_tool(tool: &str, overrides: &HashMap<String, PathBuf>) -> Result<PathBuf, ToolError> {
    if let Some(path) = overrides.get(tool) {
        let path = verify_executable(tool, path)?;
        log::debug!("Using configured {} at {}", tool, path.display());
        return Ok(path);
    }

    match which::which(tool) {
        Ok(path) => {
            log::debug!("Found {} at {}", tool, path.display());
            Ok(path)
        }
        Err(_) => Err(ToolError::NotFound {
            tool: tool.to_string(),
            hint: install_hint(tool),
        }),
    }
}

/// First of `candidates` that can be located
pub fn locate_any(
    candidates: &[&str],
    overrides: &HashMap<String, PathBuf>,
) -> Result<(String, PathBuf), ToolError> {
    let mut first_err = None;
    for name in candidates {
        match locate_tool(name, overrides) {
            Ok(path) => return Ok((name.to_string(), path)),
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }
    Err(first_err.unwrap_or_else(|| ToolError::NotFound {
        tool: candidates.join("/"),
        hint: String::from("No candidates given"),
    }))
}
