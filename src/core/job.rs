//! Transcode job records
//!
//! Jobs are created by the disc planner and only mutated by the encoding
//! coordinator. Progress is monotonic from the consumer's point of view: a
//! lower value reported after a higher one is ignored.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Episode;

/// Unique identifier for a job within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(pub uuid::Uuid);

impl JobId {
    pub fn new() -> Self {
        JobId(uuid::Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a transcode job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    /// Complete and Failed are terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

/// One episode to be encoded into one output artifact
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    id: JobId,
    episode: Arc<Episode>,
    input: String,
    output_path: PathBuf,
    progress: f64,
    status: JobStatus,
    error: Option<String>,
}

impl TranscodeJob {
    /// Create a pending job reading from the episode's source locator
    pub fn new(episode: Arc<Episode>, output_path: PathBuf) -> Self {
        let input = episode.source.clone();
        Self {
            id: JobId::new(),
            episode,
            input,
            output_path,
            progress: 0.0,
            status: JobStatus::Pending,
            error: None,
        }
    }

    /// Build jobs for a list of episodes, naming outputs `epNN.mpg` in `staging_dir`
    pub fn for_episodes(episodes: &[Episode], staging_dir: &Path) -> Vec<Self> {
        episodes
            .iter()
            .map(|ep| {
                let output = staging_dir.join(format!("ep{:02}.mpg", ep.index));
                Self::new(Arc::new(ep.clone()), output)
            })
            .collect()
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn episode(&self) -> &Episode {
        &self.episode
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn duration_seconds(&self) -> f64 {
        let secs = self.episode.duration_seconds;
        if secs.is_finite() && secs > 0.0 { secs } else { 0.0 }
    }

    pub(crate) fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.error = None;
    }

    /// Record a progress sample, clamped to [0, 1] and never regressing
    ///
    /// Returns true when the stored value changed.
    pub(crate) fn report_progress(&mut self, fraction: f64) -> bool {
        if !fraction.is_finite() {
            return false;
        }
        let clamped = fraction.clamp(0.0, 1.0);
        if clamped > self.progress {
            self.progress = clamped;
            true
        } else {
            false
        }
    }

    pub(crate) fn mark_complete(&mut self) {
        self.status = JobStatus::Complete;
        self.progress = 1.0;
        self.error = None;
    }

    pub(crate) fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
    }
}
