//! Core application logic and state
//!
//! This module contains:
//! - Episode records and user overrides
//! - Transcode jobs and their lifecycle
//! - Bitrate calculation for DVD-fitting optimization
//! - Disc planning (spanning a season across discs)
//! - Application-wide settings

mod bitrate;
mod episode;
mod job;
mod planner;
mod settings;

pub use bitrate::{
    calculate_optimal_bitrate, calculate_video_bitrate, combined_bitrate, format_bitrate, size_mb,
    usable_capacity_mb, DEFAULT_AUDIO_BITRATE_KBPS, DEFAULT_VIDEO_BITRATE, DVD_CAPACITY_MB,
    MAX_VIDEO_BITRATE, MENU_OVERHEAD_MB, MIN_VIDEO_BITRATE,
};
pub use episode::{resolve_episodes, Episode, EpisodeOverride};
pub use job::{JobId, JobStatus, TranscodeJob};
pub use planner::{DiscAssignment, DiscPlanner, PlanError, PlannerConfig};
pub use settings::{
    AppSettings, AudioSettings, MenuSettings, MenuStyle, SettingsError, VideoStandard,
};

/// Format a duration in seconds as HH:MM:SS.mmm
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let secs = (total_ms / 1000) % 60;
    let mins = (total_ms / 60_000) % 60;
    let hours = total_ms / 3_600_000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
}

/// Format duration as MM:SS or H:MM:SS
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}
