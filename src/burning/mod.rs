//! Burning module - DVD authoring, ISO creation and disc burning
//!
//! Everything after encoding happens here: dvdauthor turns titles and menu
//! into a VIDEO_TS tree, the tree is mastered into an ISO, and the ISO is
//! written to disc. Progress and errors are reported through callbacks,
//! `Result` types and the shared [`WorkflowState`].

pub mod authoring;
pub mod coordinator;
pub mod disc;
pub mod iso;
pub mod state;
pub mod workflow;

pub use authoring::{build_dvd_structure, AuthoringError};
pub use coordinator::{coordinate_burn, BurnConfig, BurnOutcome};
pub use disc::{
    burn_iso_with_cancel, close_tray, detect_drives, eject_tray, parse_burn_progress, BurnError,
    BurnTool, ProgressCallback, TrayAction,
};
pub use iso::{create_iso, iso_file_name, sanitize_filename, volume_label, IsoError, IsoTool};
pub use state::{WorkflowStage, WorkflowState};
pub use workflow::{
    plan_discs, probe_episode_durations, AuthoringRun, AuthoringWorkflow, DiscOutcome, Toolchain,
    WorkflowError,
};
