//! Disc spanning: order-preserving bin packing of jobs onto discs
//!
//! The target bitrate is derived once from the aggregate duration of every
//! job and is never re-derived per disc, so the last disc may end up
//! under-filled.

use super::bitrate::{
    calculate_video_bitrate, combined_bitrate, format_bitrate, size_mb, usable_capacity_mb,
    DEFAULT_AUDIO_BITRATE_KBPS, DVD_CAPACITY_MB, MENU_OVERHEAD_MB,
};
use super::TranscodeJob;

/// Planning failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    /// A single episode cannot fit on an empty disc at the planned bitrate
    #[error(
        "episode '{episode_id}' needs {estimated_size_mb:.0} MB but a disc only holds {usable_capacity_mb:.0} MB"
    )]
    Overflow {
        episode_id: String,
        estimated_size_mb: f64,
        usable_capacity_mb: f64,
    },
}

/// Capacity and audio parameters for planning
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Physical disc capacity (MB)
    pub disc_capacity_mb: f64,
    /// Reserved for menus and authoring overhead (MB)
    pub overhead_mb: f64,
    /// Audio bitrate of every title (kbps)
    pub audio_bitrate_kbps: u32,
    /// Close a disc once it holds this many titles
    pub max_titles_per_disc: Option<usize>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            disc_capacity_mb: DVD_CAPACITY_MB,
            overhead_mb: MENU_OVERHEAD_MB,
            audio_bitrate_kbps: DEFAULT_AUDIO_BITRATE_KBPS,
            max_titles_per_disc: None,
        }
    }
}

impl PlannerConfig {
    pub fn usable_capacity_mb(&self) -> f64 {
        usable_capacity_mb(self.disc_capacity_mb, self.overhead_mb)
    }
}

/// The jobs assigned to one physical disc
#[derive(Debug, Clone)]
pub struct DiscAssignment {
    disc_number: usize,
    jobs: Vec<TranscodeJob>,
    total_minutes: f64,
    estimated_size_mb: f64,
    video_bitrate: u32,
}

impl DiscAssignment {
    /// 1-based disc ordinal
    pub fn disc_number(&self) -> usize {
        self.disc_number
    }

    pub fn jobs(&self) -> &[TranscodeJob] {
        &self.jobs
    }

    pub fn total_minutes(&self) -> f64 {
        self.total_minutes
    }

    pub fn estimated_size_mb(&self) -> f64 {
        self.estimated_size_mb
    }

    /// Global video bitrate every job on this disc is encoded at
    pub fn video_bitrate(&self) -> u32 {
        self.video_bitrate
    }

    /// Short human-readable summary, e.g. "Disc 1: Episodes 1-9 (405 min, ~4195 MB)"
    pub fn summary(&self) -> String {
        let first = self.jobs.first().map(|j| j.episode().index).unwrap_or(0);
        let last = self.jobs.last().map(|j| j.episode().index).unwrap_or(0);
        format!(
            "Disc {}: Episodes {}-{} ({:.0} min, ~{:.0} MB)",
            self.disc_number, first, last, self.total_minutes, self.estimated_size_mb
        )
    }
}

/// Plans how an ordered list of jobs spans one or more discs
#[derive(Debug, Clone, Default)]
pub struct DiscPlanner {
    config: PlannerConfig,
}

impl DiscPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Video bitrate for the aggregate duration of `jobs`
    pub fn target_bitrate(&self, jobs: &[TranscodeJob]) -> u32 {
        let total_seconds: f64 = jobs.iter().map(|j| j.duration_seconds()).sum();
        calculate_video_bitrate(
            total_seconds / 60.0,
            self.config.usable_capacity_mb(),
            self.config.audio_bitrate_kbps,
        )
    }

    /// Partition `jobs` into capacity-bounded discs without reordering
    ///
    /// Single forward greedy scan: a job that would push the current disc over
    /// the usable capacity (or past the title limit) starts a new disc. A job
    /// that cannot fit even on an empty disc is a [`PlanError::Overflow`].
    pub fn plan(&self, jobs: Vec<TranscodeJob>) -> Result<Vec<DiscAssignment>, PlanError> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let usable = self.config.usable_capacity_mb();
        let unknown = jobs.iter().filter(|j| j.duration_seconds() <= 0.0).count();
        if unknown > 0 {
            log::warn!(
                "{} episode(s) have no known duration; they are planned as zero-length",
                unknown
            );
        }

        let video_bitrate = self.target_bitrate(&jobs);
        let total_bitrate = combined_bitrate(video_bitrate, self.config.audio_bitrate_kbps);

        if let Some(job) = jobs
            .iter()
            .find(|j| size_mb(total_bitrate, j.duration_seconds()) > usable)
        {
            return Err(PlanError::Overflow {
                episode_id: job.episode().id.clone(),
                estimated_size_mb: size_mb(total_bitrate, job.duration_seconds()),
                usable_capacity_mb: usable,
            });
        }

        let title_limit = self.config.max_titles_per_disc.filter(|&n| n > 0);
        let mut discs = Vec::new();
        let mut current: Vec<TranscodeJob> = Vec::new();
        let mut current_seconds = 0.0;

        for job in jobs {
            let seconds = job.duration_seconds();
            let over_capacity = size_mb(total_bitrate, current_seconds + seconds) > usable;
            let at_title_limit = title_limit.is_some_and(|n| current.len() >= n);

            if !current.is_empty() && (over_capacity || at_title_limit) {
                discs.push(self.close_disc(
                    discs.len() + 1,
                    std::mem::take(&mut current),
                    current_seconds,
                    video_bitrate,
                    total_bitrate,
                ));
                current_seconds = 0.0;
            }

            current.push(job);
            current_seconds += seconds;
        }

        if !current.is_empty() {
            discs.push(self.close_disc(
                discs.len() + 1,
                current,
                current_seconds,
                video_bitrate,
                total_bitrate,
            ));
        }

        log::info!(
            "Content requires {} disc(s) at {}",
            discs.len(),
            format_bitrate(video_bitrate)
        );
        for disc in &discs {
            log::info!("  {}", disc.summary());
        }

        Ok(discs)
    }

    fn close_disc(
        &self,
        disc_number: usize,
        jobs: Vec<TranscodeJob>,
        seconds: f64,
        video_bitrate: u32,
        total_bitrate: u64,
    ) -> DiscAssignment {
        DiscAssignment {
            disc_number,
            jobs,
            total_minutes: seconds / 60.0,
            estimated_size_mb: size_mb(total_bitrate, seconds),
            video_bitrate,
        }
    }
}
