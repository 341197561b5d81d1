//! Encoder events
//!
//! Emitted by the encoding coordinator over a tokio mpsc channel so a front
//! end can follow each job without touching the jobs themselves.

use std::path::PathBuf;

use crate::core::JobId;

/// Events emitted while encoding a disc
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeEvent {
    /// An external encode process was started
    Started { job: JobId, episode_index: u32 },
    /// Progress advanced (0.0 - 1.0, never decreasing per job)
    Progress { job: JobId, fraction: f64 },
    /// The job finished and its output exists
    Completed { job: JobId, output: PathBuf },
    /// The job failed or was cancelled; siblings continue
    Failed { job: JobId, error: String },
}

impl EncodeEvent {
    pub fn job(&self) -> JobId {
        match self {
            EncodeEvent::Started { job, .. }
            | EncodeEvent::Progress { job, .. }
            | EncodeEvent::Completed { job, .. }
            | EncodeEvent::Failed { job, .. } => *job,
        }
    }

    /// Completed and Failed end a job's event sequence
    pub fn is_terminal(&self) -> bool {
        matches!(self, EncodeEvent::Completed { .. } | EncodeEvent::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_job_and_terminal() {
        let id = JobId::new();
        let started = EncodeEvent::Started { job: id, episode_index: 3 };
        let failed = EncodeEvent::Failed { job: id, error: "boom".into() };
        assert_eq!(started.job(), id);
        assert!(!started.is_terminal());
        assert!(failed.is_terminal());
    }
}
