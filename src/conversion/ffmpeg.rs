//! FFmpeg command construction and one-shot helpers
//!
//! Builds the argument lists for title transcodes and the looping menu
//! video, and wraps the small synchronous ffprobe/ffmpeg calls (duration
//! probe, subtitle extraction).

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::parallel::EncodeError;
use crate::core::{format_timestamp, AudioSettings, TranscodeJob, VideoStandard};

/// Length of the looping menu video (seconds)
pub const MENU_LOOP_SECONDS: u32 = 30;

/// Parameters shared by every title on a disc
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub standard: VideoStandard,
    /// Planned video bitrate (bits/sec)
    pub video_bitrate: u32,
    pub audio: AudioSettings,
}

impl EncodeSettings {
    pub fn new(standard: VideoStandard, video_bitrate: u32, audio: AudioSettings) -> Self {
        Self {
            standard,
            video_bitrate,
            audio,
        }
    }
}

fn push<S: Into<OsString>>(args: &mut Vec<OsString>, items: impl IntoIterator<Item = S>) {
    args.extend(items.into_iter().map(Into::into));
}

/// ffmpeg arguments for a DVD-compliant MPEG-2 program stream
///
/// # Arguments
/// * `settings` - Standard, planned bitrate and audio parameters
/// * `input` - Source path or stream URL
/// * `output` - Destination `.mpg`
///
/// Progress is written to stdout as `key=value` lines.
pub fn transcode_args(settings: &EncodeSettings, input: &str, output: &Path) -> Vec<OsString> {
    let (w, h) = settings.standard.resolution();
    let bitrate = settings.video_bitrate as u64;
    let mut args = Vec::new();

    push(&mut args, ["-y", "-i", input]);
    push(&mut args, ["-target", settings.standard.ffmpeg_target()]);
    push(&mut args, ["-f".to_string(), "vob".to_string()]);
    push(
        &mut args,
        [
            "-c:v".to_string(),
            "mpeg2video".to_string(),
            "-b:v".to_string(),
            bitrate.to_string(),
            "-maxrate".to_string(),
            (bitrate * 11 / 10).to_string(),
            "-bufsize".to_string(),
            (bitrate * 2).to_string(),
            "-g".to_string(),
            "15".to_string(),
            "-bf".to_string(),
            "2".to_string(),
            "-s".to_string(),
            format!("{}x{}", w, h),
            "-aspect".to_string(),
            "16:9".to_string(),
            "-r".to_string(),
            settings.standard.frame_rate().to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
        ],
    );
    push(
        &mut args,
        [
            "-c:a".to_string(),
            "ac3".to_string(),
            "-b:a".to_string(),
            format!("{}k", settings.audio.bitrate_kbps),
            "-ar".to_string(),
            settings.audio.sample_rate.to_string(),
            "-ac".to_string(),
            settings.audio.channels.to_string(),
        ],
    );
    push(&mut args, ["-progress", "pipe:1", "-nostats"]);
    args.push(output.as_os_str().to_owned());
    args
}

/// Options for the looping menu video
#[derive(Debug, Clone, PartialEq)]
pub struct MenuVideoOptions {
    pub standard: VideoStandard,
    pub duration_secs: u32,
    /// Theme audio, faded out over the last two seconds
    pub audio: Option<PathBuf>,
}

impl Default for MenuVideoOptions {
    fn default() -> Self {
        Self {
            standard: VideoStandard::Ntsc,
            duration_secs: MENU_LOOP_SECONDS,
            audio: None,
        }
    }
}

/// ffmpeg arguments turning a still menu background into a looping video
pub fn menu_video_args(options: &MenuVideoOptions, background: &Path, output: &Path) -> Vec<OsString> {
    let (w, h) = options.standard.resolution();
    let mut args: Vec<OsString> = Vec::new();

    push(&mut args, ["-y", "-loop", "1", "-i"]);
    args.push(background.as_os_str().to_owned());

    if let Some(audio) = options.audio.as_deref().filter(|p| p.exists()) {
        push(&mut args, ["-i"]);
        args.push(audio.as_os_str().to_owned());
        push(
            &mut args,
            [
                "-shortest".to_string(),
                "-af".to_string(),
                format!(
                    "afade=t=out:st={}:d=2",
                    options.duration_secs.saturating_sub(2)
                ),
            ],
        );
    }

    push(
        &mut args,
        [
            "-t".to_string(),
            options.duration_secs.to_string(),
            "-target".to_string(),
            options.standard.ffmpeg_target().to_string(),
            "-c:v".to_string(),
            "mpeg2video".to_string(),
            "-b:v".to_string(),
            "5000k".to_string(),
            "-maxrate".to_string(),
            "8000k".to_string(),
            "-bufsize".to_string(),
            "2000k".to_string(),
            "-s".to_string(),
            format!("{}x{}", w, h),
            "-r".to_string(),
            options.standard.frame_rate().to_string(),
            "-aspect".to_string(),
            "16:9".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "ac3".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
            "-ar".to_string(),
            "48000".to_string(),
        ],
    );
    args.push(output.as_os_str().to_owned());
    args
}

/// Render the menu video, blocking until ffmpeg exits
pub fn render_menu_video(
    ffmpeg_path: &Path,
    options: &MenuVideoOptions,
    background: &Path,
    output: &Path,
) -> Result<PathBuf, EncodeError> {
    let args = menu_video_args(options, background, output);
    log::debug!("Running: {} {:?}", ffmpeg_path.display(), args);

    let result = Command::new(ffmpeg_path)
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| EncodeError::Spawn {
            tool: ffmpeg_path.display().to_string(),
            source,
        })?;

    if !result.status.success() {
        return Err(EncodeError::ExitStatus {
            code: result.status.code(),
            stderr_tail: stderr_tail(&String::from_utf8_lossy(&result.stderr)),
        });
    }
    if !output.exists() {
        return Err(EncodeError::MissingOutput(output.to_path_buf()));
    }

    log::info!("Generated menu video: {}", output.display());
    Ok(output.to_path_buf())
}

/// Last few lines of a tool's stderr, for error messages
pub(crate) fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(5);
    lines[start..].join("\n")
}

/// Media duration in seconds via ffprobe, or 0.0 when it cannot be determined
pub fn probe_duration(ffprobe_path: &Path, input: &str) -> f64 {
    let output = Command::new(ffprobe_path)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
            input,
        ])
        .stdin(Stdio::null())
        .output();

    match output {
        Ok(out) if out.status.success() => {
            let text = String::from_utf8_lossy(&out.stdout);
            match text.trim().parse::<f64>() {
                Ok(secs) if secs.is_finite() && secs > 0.0 => secs,
                _ => {
                    log::warn!("ffprobe gave no duration for {}", input);
                    0.0
                }
            }
        }
        Ok(out) => {
            log::warn!(
                "ffprobe failed for {}: {}",
                input,
                stderr_tail(&String::from_utf8_lossy(&out.stderr))
            );
            0.0
        }
        Err(e) => {
            log::warn!("Could not run ffprobe: {}", e);
            0.0
        }
    }
}

/// ffmpeg arguments extracting the first subtitle stream to SRT
pub fn subtitle_args(input: &str, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    push(&mut args, ["-y", "-i", input, "-map", "0:s:0", "-c:s", "srt"]);
    args.push(output.as_os_str().to_owned());
    args
}

/// Extract the first subtitle stream of `input` next to the title
///
/// Returns `None` when there are no subtitles or extraction fails; either
/// way the title itself is unaffected.
pub fn extract_subtitles(
    ffmpeg_path: &Path,
    ffprobe_path: &Path,
    input: &str,
    output: &Path,
) -> Option<PathBuf> {
    let probe = Command::new(ffprobe_path)
        .args([
            "-v",
            "error",
            "-select_streams",
            "s",
            "-show_entries",
            "stream=index,codec_name",
            "-of",
            "csv=p=0",
            input,
        ])
        .stdin(Stdio::null())
        .output()
        .ok()?;

    if String::from_utf8_lossy(&probe.stdout).trim().is_empty() {
        log::info!("No subtitles found in {}", input);
        return None;
    }

    let result = Command::new(ffmpeg_path)
        .args(subtitle_args(input, output))
        .stdin(Stdio::null())
        .output()
        .ok()?;

    if result.status.success() && output.exists() {
        log::info!("Extracted subtitles to {}", output.display());
        Some(output.to_path_buf())
    } else {
        log::warn!(
            "Failed to extract subtitles: {}",
            stderr_tail(&String::from_utf8_lossy(&result.stderr))
        );
        None
    }
}

/// Write an OGM-style chapter file with one chapter per job
///
/// ```text
/// CHAPTER01=00:00:00.000
/// CHAPTER01NAME=Pilot
/// ```
pub fn write_chapter_file(jobs: &[TranscodeJob], path: &Path) -> std::io::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut lines = Vec::with_capacity(jobs.len() * 2);
    let mut start = 0.0;
    for (i, job) in jobs.iter().enumerate() {
        lines.push(format!("CHAPTER{:02}={}", i + 1, format_timestamp(start)));
        lines.push(format!("CHAPTER{:02}NAME={}", i + 1, job.episode().title));
        start += job.duration_seconds();
    }

    std::fs::write(path, lines.join("\n"))?;
    log::info!("Created chapter file: {}", path.display());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::jobs_with_minutes;
    use tempfile::TempDir;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn value_after(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }

    #[test]
    fn test_transcode_args_ntsc() {
        let settings = EncodeSettings::new(VideoStandard::Ntsc, 6_000_000, AudioSettings::default());
        let args = strings(&transcode_args(&settings, "/in/ep.mkv", Path::new("/out/ep01.mpg")));

        assert_eq!(value_after(&args, "-i").as_deref(), Some("/in/ep.mkv"));
        assert_eq!(value_after(&args, "-b:v").as_deref(), Some("6000000"));
        assert_eq!(value_after(&args, "-maxrate").as_deref(), Some("6600000"));
        assert_eq!(value_after(&args, "-bufsize").as_deref(), Some("12000000"));
        assert_eq!(value_after(&args, "-s").as_deref(), Some("720x480"));
        assert_eq!(value_after(&args, "-r").as_deref(), Some("30000/1001"));
        assert_eq!(value_after(&args, "-target").as_deref(), Some("ntsc-dvd"));
        assert_eq!(value_after(&args, "-b:a").as_deref(), Some("448k"));
        assert_eq!(value_after(&args, "-progress").as_deref(), Some("pipe:1"));
        assert!(args.contains(&"-nostats".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/out/ep01.mpg"));
    }

    #[test]
    fn test_transcode_args_pal() {
        let settings = EncodeSettings::new(VideoStandard::Pal, 1_000_000, AudioSettings::default());
        let args = strings(&transcode_args(&settings, "in", Path::new("out.mpg")));
        assert_eq!(value_after(&args, "-s").as_deref(), Some("720x576"));
        assert_eq!(value_after(&args, "-r").as_deref(), Some("25"));
        assert_eq!(value_after(&args, "-target").as_deref(), Some("pal-dvd"));
    }

    #[test]
    fn test_menu_video_args_without_audio() {
        let args = strings(&menu_video_args(
            &MenuVideoOptions::default(),
            Path::new("/m/bg.png"),
            Path::new("/m/menu.mpg"),
        ));
        assert_eq!(value_after(&args, "-loop").as_deref(), Some("1"));
        assert_eq!(value_after(&args, "-t").as_deref(), Some("30"));
        assert_eq!(value_after(&args, "-b:v").as_deref(), Some("5000k"));
        assert!(!args.contains(&"-af".to_string()));
    }

    #[test]
    fn test_menu_video_args_fade_theme_audio() {
        let dir = TempDir::new().unwrap();
        let theme = dir.path().join("theme.mp3");
        std::fs::write(&theme, b"id3").unwrap();
        let options = MenuVideoOptions {
            audio: Some(theme.clone()),
            ..Default::default()
        };
        let args = strings(&menu_video_args(&options, Path::new("bg.png"), Path::new("menu.mpg")));
        assert_eq!(value_after(&args, "-af").as_deref(), Some("afade=t=out:st=28:d=2"));
        assert!(args.contains(&theme.to_string_lossy().into_owned()));
    }

    #[test]
    fn test_subtitle_args() {
        let args = strings(&subtitle_args("in.mkv", Path::new("ep01.srt")));
        assert_eq!(value_after(&args, "-map").as_deref(), Some("0:s:0"));
        assert_eq!(value_after(&args, "-c:s").as_deref(), Some("srt"));
    }

    #[test]
    fn test_chapter_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chapters.txt");
        let jobs = jobs_with_minutes(&[45.0, 30.5]);
        write_chapter_file(&jobs, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "CHAPTER01=00:00:00.000",
                "CHAPTER01NAME=Episode 1",
                "CHAPTER02=00:45:00.000",
                "CHAPTER02NAME=Episode 2",
            ]
        );
    }

    #[test]
    fn test_probe_missing_tool_is_zero() {
        assert_eq!(probe_duration(Path::new("/nonexistent/ffprobe"), "x.mkv"), 0.0);
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_parses_duration() {
        let dir = TempDir::new().unwrap();
        let probe = crate::test_fixtures::fake_tool(dir.path(), "ffprobe", "echo 1325.44");
        assert_eq!(probe_duration(&probe, "x.mkv"), 1325.44);
    }

    #[cfg(unix)]
    #[test]
    fn test_render_menu_video_failure_keeps_stderr() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = crate::test_fixtures::fake_tool(dir.path(), "ffmpeg", "echo 'Invalid data' >&2\nexit 1");
        let err = render_menu_video(
            &ffmpeg,
            &MenuVideoOptions::default(),
            Path::new("bg.png"),
            &dir.path().join("menu.mpg"),
        )
        .unwrap_err();
        match err {
            EncodeError::ExitStatus { code, stderr_tail } => {
                assert_eq!(code, Some(1));
                assert!(stderr_tail.contains("Invalid data"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let text = "a\nb\n\nc\nd\ne\nf\ng\n";
        assert_eq!(stderr_tail(text), "c\nd\ne\nf\ng");
    }
}
