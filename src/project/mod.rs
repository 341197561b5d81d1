//! Project module - saved authoring projects
//!
//! A project is the season being authored: catalog episodes, the user's
//! overrides, and the artwork used for the menu.

mod storage;
mod types;

pub use storage::{episodes_from_directory, is_video_file, load_project, save_project, ProjectError};
pub use types::{ProjectManifest, MANIFEST_VERSION};
