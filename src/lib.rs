//! DVD Menu Burner
//!
//! Turns a season of episodes into one or more DVD-Video discs: plans how
//! the episodes span discs, transcodes them, builds a navigable episode menu,
//! authors the disc structure with dvdauthor, masters ISO images and burns
//! them.

pub mod burning;
pub mod conversion;
pub mod core;
pub mod logging;
pub mod menu;
pub mod project;

#[cfg(test)]
mod test_fixtures;
