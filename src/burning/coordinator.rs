//! Burn coordination - stage transitions, progress and cancellation
//!
//! This module coordinates burning one ISO:
//! 1. Honor simulate mode
//! 2. Set up progress tracking with stage transitions
//! 3. Execute the burn
//! 4. Map the result onto the workflow state

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use super::disc::{burn_iso_with_cancel, detect_drives, BurnError, BurnTool, ProgressCallback};
use super::state::{WorkflowStage, WorkflowState};
use crate::core::AppSettings;

/// Configuration for burn coordination
#[derive(Debug, Clone)]
pub struct BurnConfig {
    /// If true, skip actual burning (just simulate)
    pub simulate: bool,
    /// Target device, or the burner's default
    pub device: Option<String>,
    /// Write speed multiplier
    pub speed: u32,
}

impl Default for BurnConfig {
    fn default() -> Self {
        Self {
            simulate: false,
            device: None,
            speed: 4,
        }
    }
}

impl BurnConfig {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            simulate: settings.simulate_burn,
            device: settings.burn_device.clone(),
            speed: settings.burn_speed,
        }
    }

    /// Fill an unset growisofs device from the drives found on this machine
    pub fn with_detected_device(self, tool: Option<&BurnTool>) -> Self {
        match tool {
            Some(BurnTool::Growisofs(_)) if self.device.is_none() => {
                self.with_first_drive(detect_drives())
            }
            _ => self,
        }
    }

    fn with_first_drive(mut self, drives: Vec<String>) -> Self {
        if self.device.is_none()
            && let Some(first) = drives.into_iter().next()
        {
            log::info!("Using detected drive {}", first);
            self.device = Some(first);
        }
        self
    }
}

/// Result of burn coordination
#[derive(Debug)]
pub enum BurnOutcome {
    /// Burn completed successfully
    Success,
    /// Burn was simulated (no actual burn)
    Simulated,
    /// Burn was cancelled by user
    Cancelled,
    /// Burn failed
    Error(BurnError),
}

impl BurnOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BurnOutcome::Success | BurnOutcome::Simulated)
    }
}

/// Coordinate the burn process for an ISO file
///
/// Stage transitions: Burning -> Finishing -> Complete, or Cancelled.
///
/// # Arguments
/// * `tool` - Burner to use (unused in simulate mode)
/// * `iso_path` - Path to the ISO file to burn
/// * `state` - WorkflowState for stage updates and cancellation
/// * `config` - Burn configuration
pub fn coordinate_burn(
    tool: Option<&BurnTool>,
    iso_path: &Path,
    state: &WorkflowState,
    config: &BurnConfig,
) -> BurnOutcome {
    if config.simulate {
        log::info!("=== SIMULATED BURN ===");
        log::info!("Would burn ISO: {}", iso_path.display());
        state.set_stage(WorkflowStage::Complete);
        return BurnOutcome::Simulated;
    }

    let Some(tool) = tool else {
        state.set_stage(WorkflowStage::Complete);
        return BurnOutcome::Error(BurnError::Failed(
            "No burner available (install growisofs)".to_string(),
        ));
    };

    log::info!("=== Burning DVD ===");
    state.set_stage(WorkflowStage::Burning);
    state.set_burn_progress(-1);

    let progress_callback = create_progress_callback(state.clone());

    match burn_iso_with_cancel(
        tool,
        iso_path,
        config.device.as_deref(),
        config.speed,
        Some(progress_callback),
        Some(state.cancel_requested.clone()),
    ) {
        Ok(()) => {
            log::info!("DVD burned successfully!");
            state.set_stage(WorkflowStage::Complete);
            BurnOutcome::Success
        }
        Err(BurnError::Cancelled) => {
            log::info!("Burn was cancelled");
            state.set_stage(WorkflowStage::Cancelled);
            BurnOutcome::Cancelled
        }
        Err(e) => {
            log::error!("Burn failed: {}", e);
            state.set_stage(WorkflowStage::Complete);
            BurnOutcome::Error(e)
        }
    }
}

/// Create progress callback that handles stage transitions
fn create_progress_callback(state: WorkflowState) -> ProgressCallback {
    let last_progress = Arc::new(AtomicI32::new(-1));

    Arc::new(move |progress: i32| {
        let prev = last_progress.load(Ordering::SeqCst);

        // Indeterminate after a near-complete burn means the session is closing
        if progress < 0 {
            if prev >= 95 && state.get_stage() == WorkflowStage::Burning {
                state.set_stage(WorkflowStage::Finishing);
            }
            return;
        }

        last_progress.store(progress, Ordering::SeqCst);
        state.set_burn_progress(progress);
    })
}
