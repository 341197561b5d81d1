//! Bitrate calculation for DVD-fitting optimization
//!
//! Derives a single video bitrate that fills the usable disc budget once the
//! fixed-rate audio track has been accounted for. Sizes are expressed in
//! binary megabytes (1 MB = 1024 * 1024 bytes) throughout.

/// Physical capacity budgeted for a single-layer DVD (MB)
pub const DVD_CAPACITY_MB: f64 = 4500.0;

/// Space reserved for menus and authoring overhead (MB)
pub const MENU_OVERHEAD_MB: f64 = 100.0;

/// Lowest DVD-compliant video bitrate we will encode at (bits/sec)
pub const MIN_VIDEO_BITRATE: u32 = 1_000_000;

/// Highest DVD-compliant video bitrate (bits/sec)
pub const MAX_VIDEO_BITRATE: u32 = 9_800_000;

/// Used when the total duration is unknown or zero (bits/sec)
pub const DEFAULT_VIDEO_BITRATE: u32 = 6_000_000;

/// AC-3 audio bitrate used for every title (kbps)
pub const DEFAULT_AUDIO_BITRATE_KBPS: u32 = 448;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Usable space once the menu overhead is reserved
pub fn usable_capacity_mb(disc_capacity_mb: f64, overhead_mb: f64) -> f64 {
    (disc_capacity_mb - overhead_mb).max(0.0)
}

/// Calculate the video bitrate that fills `available_capacity_mb` with
/// `total_duration_minutes` of content at the default audio bitrate
pub fn calculate_optimal_bitrate(total_duration_minutes: f64, available_capacity_mb: f64) -> u32 {
    calculate_video_bitrate(
        total_duration_minutes,
        available_capacity_mb,
        DEFAULT_AUDIO_BITRATE_KBPS,
    )
}

/// Calculate the video bitrate for a given audio bitrate
///
/// bitrate = (capacity - audio size) * 8 / duration, clamped to
/// [`MIN_VIDEO_BITRATE`, `MAX_VIDEO_BITRATE`]. A non-positive (or NaN)
/// duration or a NaN capacity yields [`DEFAULT_VIDEO_BITRATE`].
pub fn calculate_video_bitrate(
    total_duration_minutes: f64,
    available_capacity_mb: f64,
    audio_bitrate_kbps: u32,
) -> u32 {
    if !(total_duration_minutes > 0.0) || !total_duration_minutes.is_finite() {
        log::warn!(
            "Total duration unknown ({} min), using default bitrate {}",
            total_duration_minutes,
            format_bitrate(DEFAULT_VIDEO_BITRATE)
        );
        return DEFAULT_VIDEO_BITRATE;
    }
    if available_capacity_mb.is_nan() {
        log::warn!(
            "Disc capacity unknown, using default bitrate {}",
            format_bitrate(DEFAULT_VIDEO_BITRATE)
        );
        return DEFAULT_VIDEO_BITRATE;
    }

    let seconds = total_duration_minutes * 60.0;
    let audio_size_mb = size_mb(audio_bitrate_kbps as u64 * 1000, seconds);
    let video_space_mb = available_capacity_mb - audio_size_mb;

    let raw = video_space_mb * 8.0 * BYTES_PER_MB / seconds;
    let bitrate = raw.clamp(MIN_VIDEO_BITRATE as f64, MAX_VIDEO_BITRATE as f64) as u32;

    log::debug!(
        "Calculated optimal bitrate: {} for {:.0} minutes ({:.0} MB budget)",
        format_bitrate(bitrate),
        total_duration_minutes,
        available_capacity_mb
    );

    bitrate
}

/// Size in MB of `seconds` of content at `bits_per_second`
pub fn size_mb(bits_per_second: u64, seconds: f64) -> f64 {
    bits_per_second as f64 * seconds / 8.0 / BYTES_PER_MB
}

/// Combined mux bitrate of a title (video + audio) in bits/sec
pub fn combined_bitrate(video_bitrate: u32, audio_bitrate_kbps: u32) -> u64 {
    video_bitrate as u64 + audio_bitrate_kbps as u64 * 1000
}

/// Format bitrate for display (e.g., "5.20 Mbps")
pub fn format_bitrate(bits_per_second: u32) -> String {
    format!("{:.2} Mbps", bits_per_second as f64 / 1_000_000.0)
}
