//! Test fixtures shared across modules
//!
//! Episodes, jobs, scratch images, and stand-in executables for the external
//! tools. The fake tools are small `sh` scripts so the process plumbing can be
//! exercised without ffmpeg or dvdauthor installed.

#![cfg(test)]

use std::path::{Path, PathBuf};

use crate::core::{Episode, TranscodeJob};

/// An episode with a predictable id (`ep-{index}`) and source
pub fn episode(index: u32, title: &str, duration_seconds: f64) -> Episode {
    Episode {
        id: format!("ep-{}", index),
        title: title.to_string(),
        index,
        duration_seconds,
        overview: String::new(),
        thumbnail: None,
        source: format!("/media/show/s01e{:02}.mkv", index),
    }
}

/// `count` episodes titled "Episode N", each `minutes` long
pub fn episodes(count: u32, minutes: f64) -> Vec<Episode> {
    (1..=count)
        .map(|i| episode(i, &format!("Episode {}", i), minutes * 60.0))
        .collect()
}

/// One pending job per duration, indexed from 1
pub fn jobs_with_minutes(minutes: &[f64]) -> Vec<TranscodeJob> {
    let eps: Vec<Episode> = minutes
        .iter()
        .enumerate()
        .map(|(i, m)| episode(i as u32 + 1, &format!("Episode {}", i + 1), m * 60.0))
        .collect();
    TranscodeJob::for_episodes(&eps, Path::new("/tmp/dvd-staging"))
}

/// Write a solid-color PNG and return its path
pub fn solid_image(dir: &Path, name: &str, width: u32, height: u32, rgb: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    img.save(&path).expect("Failed to write fixture image");
    path
}

/// Write an executable shell script standing in for an external tool
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write fake tool");
    let mut perms = std::fs::metadata(&path)
        .expect("Failed to stat fake tool")
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("Failed to chmod fake tool");
    path
}

/// A fake ffmpeg that reports progress on stdout and writes its last argument
///
/// Emits `out_time_us` at 25%, 50% and 100% of `duration_secs` so progress
/// parsing can be observed.
#[cfg(unix)]
pub fn fake_ffmpeg(dir: &Path, duration_secs: u64) -> PathBuf {
    let us = duration_secs * 1_000_000;
    let body = format!(
        r#"for last; do :; done
echo "frame=1"
echo "out_time_us={q}"
echo "out_time_us={h}"
echo "out_time_us=N/A"
echo "out_time_us={f}"
echo "progress=end"
echo "encoded" > "$last"
exit 0"#,
        q = us / 4,
        h = us / 2,
        f = us
    );
    fake_tool(dir, "ffmpeg", &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_fixture() {
        let ep = episode(3, "Three", 90.0);
        assert_eq!(ep.id, "ep-3");
        assert_eq!(ep.index, 3);
        assert_eq!(ep.source, "/media/show/s01e03.mkv");
    }

    #[test]
    fn test_jobs_with_minutes() {
        let jobs = jobs_with_minutes(&[1.0, 2.0]);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].episode().index, 2);
        assert_eq!(jobs[1].duration_seconds(), 120.0);
    }

    #[test]
    fn test_solid_image() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = solid_image(dir.path(), "red.png", 8, 4, [255, 0, 0]);
        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (8, 4));
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
    }
}
