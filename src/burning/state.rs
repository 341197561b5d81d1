//! Shared workflow state
//!
//! `WorkflowState` is cloned into every stage of the authoring run. All
//! fields are atomics or mutex-guarded so a front end can poll it from
//! another thread while the workflow is running.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Current stage of an authoring run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    /// Planning discs and probing durations
    Planning,
    /// Transcoding episodes
    Encoding,
    /// Drawing the menu layers and the looping menu video
    RenderingMenu,
    /// Running dvdauthor
    Authoring,
    /// Creating ISO image
    CreatingIso,
    /// Burning ISO to disc
    Burning,
    /// Finishing up (closing session)
    Finishing,
    /// Process complete (success or simulated)
    Complete,
    /// Process was cancelled
    Cancelled,
}

impl WorkflowStage {
    pub fn display_text(&self) -> &'static str {
        match self {
            WorkflowStage::Planning => "Planning discs...",
            WorkflowStage::Encoding => "Encoding...",
            WorkflowStage::RenderingMenu => "Rendering menu...",
            WorkflowStage::Authoring => "Authoring DVD...",
            WorkflowStage::CreatingIso => "Creating ISO...",
            WorkflowStage::Burning => "Burning...",
            WorkflowStage::Finishing => "Finishing...",
            WorkflowStage::Complete => "Complete!",
            WorkflowStage::Cancelled => "Cancelled",
        }
    }
}

/// Shared state for tracking an authoring run across threads
#[derive(Clone)]
pub struct WorkflowState {
    /// Whether cancellation has been requested
    pub cancel_requested: Arc<AtomicBool>,
    /// Disc currently being processed (1-based, 0 before the first)
    pub current_disc: Arc<AtomicUsize>,
    /// Total discs in the plan
    pub total_discs: Arc<AtomicUsize>,
    /// Titles encoded successfully across all discs
    pub encoded: Arc<AtomicUsize>,
    /// Titles that failed to encode
    pub failed: Arc<AtomicUsize>,
    /// Current stage
    pub stage: Arc<Mutex<WorkflowStage>>,
    /// Burn progress percentage (0-100, or -1 for indeterminate)
    pub burn_progress: Arc<AtomicI32>,
    /// ISO images written so far
    pub iso_paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self {
            cancel_requested: Arc::new(AtomicBool::new(false)),
            current_disc: Arc::new(AtomicUsize::new(0)),
            total_discs: Arc::new(AtomicUsize::new(0)),
            encoded: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
            stage: Arc::new(Mutex::new(WorkflowStage::Planning)),
            burn_progress: Arc::new(AtomicI32::new(-1)),
            iso_paths: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Reset for a run of `total_discs` discs
    pub fn reset(&self, total_discs: usize) {
        self.cancel_requested.store(false, Ordering::SeqCst);
        self.current_disc.store(0, Ordering::SeqCst);
        self.total_discs.store(total_discs, Ordering::SeqCst);
        self.encoded.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        self.set_stage(WorkflowStage::Planning);
        self.burn_progress.store(-1, Ordering::SeqCst);
        self.iso_paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn set_stage(&self, stage: WorkflowStage) {
        log::debug!("Workflow stage: {:?}", stage);
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner) = stage;
    }

    pub fn get_stage(&self) -> WorkflowStage {
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_total_discs(&self, total_discs: usize) {
        self.total_discs.store(total_discs, Ordering::SeqCst);
    }

    pub fn start_disc(&self, disc_number: usize) {
        self.current_disc.store(disc_number, Ordering::SeqCst);
    }

    pub fn record_encodes(&self, encoded: usize, failed: usize) {
        self.encoded.fetch_add(encoded, Ordering::SeqCst);
        self.failed.fetch_add(failed, Ordering::SeqCst);
    }

    pub fn push_iso(&self, path: PathBuf) {
        self.iso_paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path);
    }

    pub fn iso_paths(&self) -> Vec<PathBuf> {
        self.iso_paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_burn_progress(&self, progress: i32) {
        self.burn_progress.store(progress, Ordering::SeqCst);
    }

    pub fn get_burn_progress(&self) -> i32 {
        self.burn_progress.load(Ordering::SeqCst)
    }

    /// Request cancellation of the run
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Turn Ctrl-C into a cancellation request for this state
    ///
    /// A second Ctrl-C while the first is still being honoured exits
    /// immediately. The handler is process-wide and can be installed once.
    pub fn cancel_on_interrupt(&self) -> Result<(), ctrlc::Error> {
        let state = self.clone();
        ctrlc::set_handler(move || {
            if state.is_cancelled() {
                log::warn!("Interrupted again, exiting");
                std::process::exit(130);
            }
            log::warn!("Interrupt received, cancelling...");
            state.request_cancel();
        })
    }

    /// (current disc, total discs, encoded titles, failed titles)
    pub fn progress(&self) -> (usize, usize, usize, usize) {
        (
            self.current_disc.load(Ordering::SeqCst),
            self.total_discs.load(Ordering::SeqCst),
            self.encoded.load(Ordering::SeqCst),
            self.failed.load(Ordering::SeqCst),
        )
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}
