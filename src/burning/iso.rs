//! ISO creation from an authored DVD structure
//!
//! Uses mkisofs/genisoimage or xorriso on Linux and `hdiutil makehybrid` on
//! macOS. All of them are given the directory that contains `VIDEO_TS`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::conversion::{locate_any, stderr_tail, ToolError};

/// ISO9660 volume identifiers are limited to 32 characters
pub const MAX_VOLUME_LABEL: usize = 32;

/// Longest file name produced by [`sanitize_filename`]
pub const MAX_FILENAME: usize = 200;

/// ISO creation failures
#[derive(Debug, thiserror::Error)]
pub enum IsoError {
    #[error("Source directory not found: {0}")]
    MissingSource(PathBuf),
    #[error("Failed to execute {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to create ISO: {0}")]
    Failed(String),
    #[error("Failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The external program used to master the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsoTool {
    /// mkisofs or genisoimage
    Mkisofs(PathBuf),
    /// xorriso in mkisofs emulation mode
    Xorriso(PathBuf),
    /// macOS hdiutil
    Hdiutil(PathBuf),
}

impl IsoTool {
    /// Find the first available ISO tool
    pub fn discover(overrides: &HashMap<String, PathBuf>) -> Result<Self, ToolError> {
        let (name, path) = locate_any(&["mkisofs", "genisoimage", "xorriso", "hdiutil"], overrides)?;
        Ok(match name.as_str() {
            "xorriso" => IsoTool::Xorriso(path),
            "hdiutil" => IsoTool::Hdiutil(path),
            _ => IsoTool::Mkisofs(path),
        })
    }

    pub fn program(&self) -> &Path {
        match self {
            IsoTool::Mkisofs(p) | IsoTool::Xorriso(p) | IsoTool::Hdiutil(p) => p,
        }
    }

    /// Arguments for mastering `source_dir` into `iso_path`
    pub fn args(&self, source_dir: &Path, volume_label: &str, iso_path: &Path) -> Vec<String> {
        let source = source_dir.to_string_lossy().into_owned();
        let output = iso_path.to_string_lossy().into_owned();
        let label = volume_label.to_string();

        match self {
            IsoTool::Mkisofs(_) => vec![
                "-dvd-video".into(),
                "-V".into(),
                label,
                "-o".into(),
                output,
                source,
            ],
            IsoTool::Xorriso(_) => vec![
                "-as".into(),
                "mkisofs".into(),
                "-dvd-video".into(),
                "-V".into(),
                label,
                "-o".into(),
                output,
                source,
            ],
            IsoTool::Hdiutil(_) => vec![
                "makehybrid".into(),
                "-udf".into(),
                "-udf-volume-name".into(),
                label.clone(),
                "-iso".into(),
                "-joliet".into(),
                "-joliet-volume-name".into(),
                label,
                "-o".into(),
                output,
                source,
            ],
        }
    }
}

/// Sanitize a string for use as a file name
///
/// Keeps alphanumerics, spaces, dots, underscores and hyphens, collapses
/// runs of whitespace, and truncates to [`MAX_FILENAME`] characters.
pub fn sanitize_filename(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | ' '))
        .collect();
    let collapsed = kept.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .chars()
        .take(MAX_FILENAME)
        .collect::<String>()
        .trim()
        .to_string()
}

/// ISO file name for one disc of a season
///
/// # Example
/// `iso_file_name("Firefly", "Season 1", 2)` -> `"Firefly_Season 1_Disc2.iso"`
pub fn iso_file_name(series: &str, season: &str, disc_number: usize) -> String {
    let stem = sanitize_filename(&format!("{}_{}_Disc{}", series, season, disc_number));
    format!("{}.iso", stem)
}

/// Volume label for one disc: `SERIES_D{n}`, uppercased, at most 32 characters
///
/// Characters outside `A-Z0-9_` become underscores. The disc suffix is kept
/// when the series name has to be shortened.
pub fn volume_label(series: &str, disc_number: usize) -> String {
    let suffix = format!("_D{}", disc_number);

    let mut base = String::new();
    for c in series.to_uppercase().chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' && (base.is_empty() || base.ends_with('_')) {
            continue;
        }
        base.push(c);
    }
    let base = base.trim_end_matches('_');
    let base = if base.is_empty() { "DVDVIDEO" } else { base };

    let room = MAX_VOLUME_LABEL.saturating_sub(suffix.len());
    let base: String = base.chars().take(room).collect();
    let mut label = format!("{}{}", base.trim_end_matches('_'), suffix);
    label.truncate(MAX_VOLUME_LABEL);
    label
}

/// Create an ISO image from a directory
///
/// # Arguments
/// * `tool` - ISO tool to run
/// * `source_dir` - Directory containing `VIDEO_TS`
/// * `volume_label` - Label for the ISO volume (truncated to 32 characters)
/// * `iso_path` - Where to write the image; an existing file is replaced
///
/// # Returns
/// * `Ok(PathBuf)` with the path to the created ISO
/// * `Err(IsoError)` with error details on failure
pub fn create_iso(
    tool: &IsoTool,
    source_dir: &Path,
    volume_label: &str,
    iso_path: &Path,
) -> Result<PathBuf, IsoError> {
    if !source_dir.is_dir() {
        return Err(IsoError::MissingSource(source_dir.to_path_buf()));
    }

    if iso_path.exists() {
        log::info!("Removing existing ISO file at {}", iso_path.display());
        fs::remove_file(iso_path).map_err(|source| IsoError::Io {
            path: iso_path.to_path_buf(),
            source,
        })?;
    }
    if let Some(parent) = iso_path.parent() {
        fs::create_dir_all(parent).map_err(|source| IsoError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let label: String = volume_label.chars().take(MAX_VOLUME_LABEL).collect();
    log::info!(
        "Creating ISO from {} to {} with volume label '{}'",
        source_dir.display(),
        iso_path.display(),
        label
    );

    let output = Command::new(tool.program())
        .args(tool.args(source_dir, &label, iso_path))
        .stdin(Stdio::null())
        .output()
        .map_err(|source| IsoError::Spawn {
            tool: tool.program().display().to_string(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(IsoError::Failed(stderr_tail(&stderr)));
    }
    if !iso_path.exists() {
        return Err(IsoError::Failed(format!("{} was not written", iso_path.display())));
    }

    log::info!("ISO created successfully at {}", iso_path.display());
    Ok(iso_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Doctor Who: Series 1/2"), "Doctor Who Series 12");
        assert_eq!(sanitize_filename("  a   b\tc  "), "a b c");
        assert_eq!(sanitize_filename("keep._- this"), "keep._- this");
        assert_eq!(sanitize_filename(&"x".repeat(300)).len(), MAX_FILENAME);
    }

    #[test]
    fn test_iso_file_name() {
        assert_eq!(iso_file_name("Firefly", "Season 1", 2), "Firefly_Season 1_Disc2.iso");
        assert_eq!(iso_file_name("M*A*S*H", "S1", 1), "MASH_S1_Disc1.iso");
    }

    #[test]
    fn test_volume_label() {
        assert_eq!(volume_label("Firefly", 1), "FIREFLY_D1");
        assert_eq!(volume_label("The Office (US)", 3), "THE_OFFICE_US_D3");
        assert_eq!(volume_label("", 2), "DVDVIDEO_D2");
    }

    #[test]
    fn test_volume_label_truncated_to_32() {
        let label = volume_label("Avatar The Last Airbender Complete Collection", 12);
        assert_eq!(label.len(), MAX_VOLUME_LABEL);
        assert!(label.ends_with("_D12"));
        assert!(label.starts_with("AVATAR_THE_LAST"));
    }

    #[test]
    fn test_tool_args() {
        let tool = IsoTool::Mkisofs(PathBuf::from("/usr/bin/genisoimage"));
        let args = tool.args(Path::new("/work/disc1/DVD"), "SHOW_D1", Path::new("/out/show.iso"));
        assert_eq!(args, vec!["-dvd-video", "-V", "SHOW_D1", "-o", "/out/show.iso", "/work/disc1/DVD"]);

        let xorriso = IsoTool::Xorriso(PathBuf::from("xorriso"));
        let args = xorriso.args(Path::new("/d"), "L", Path::new("/o.iso"));
        assert_eq!(&args[..2], &["-as", "mkisofs"]);

        let hdiutil = IsoTool::Hdiutil(PathBuf::from("hdiutil"));
        let args = hdiutil.args(Path::new("/d"), "L", Path::new("/o.iso"));
        assert_eq!(args[0], "makehybrid");
        assert!(args.contains(&"-udf".to_string()));
    }

    #[test]
    fn test_missing_source() {
        let tool = IsoTool::Mkisofs(PathBuf::from("mkisofs"));
        let result = create_iso(&tool, Path::new("/nonexistent/DVD"), "X", Path::new("/tmp/x.iso"));
        assert!(matches!(result, Err(IsoError::MissingSource(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_create_iso_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("DVD");
        fs::create_dir_all(source.join("VIDEO_TS")).unwrap();
        let iso = dir.path().join("out/show.iso");
        fs::create_dir_all(iso.parent().unwrap()).unwrap();
        fs::write(&iso, b"stale").unwrap();

        // Writes the label it was given to the -o target
        let script = crate::test_fixtures::fake_tool(
            dir.path(),
            "mkisofs",
            r#"while [ $# -gt 0 ]; do
  case "$1" in
    -V) label="$2"; shift 2 ;;
    -o) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
printf '%s' "$label" > "$out""#,
        );
        let long_label = "L".repeat(40);
        let path = create_iso(&IsoTool::Mkisofs(script), &source, &long_label, &iso).unwrap();

        assert_eq!(path, iso);
        assert_eq!(fs::read_to_string(&iso).unwrap(), "L".repeat(32));
    }

    #[cfg(unix)]
    #[test]
    fn test_create_iso_failure() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("DVD");
        fs::create_dir_all(&source).unwrap();
        let script = crate::test_fixtures::fake_tool(
            dir.path(),
            "mkisofs",
            "echo 'mkisofs: No such file or directory. Invalid node' >&2; exit 1",
        );
        let err = create_iso(&IsoTool::Mkisofs(script), &source, "X", &dir.path().join("x.iso")).unwrap_err();
        assert!(err.to_string().contains("Invalid node"));
    }
}
