//! DVD menu compilation
//!
//! This module contains:
//! - Grid layout of episode buttons
//! - Directional navigation between buttons
//! - Rendering of the base, highlight and select layers
//! - The dvdauthor descriptor tying titles and menu together

mod descriptor;
mod layout;
mod navigation;
mod overlay;

pub use descriptor::{
    AuthoringDescriptor, DescriptorEmitter, DescriptorError, MenuArtifacts, MenuButton, TitleEntry,
};
pub use layout::{caption, layout, ButtonCell, LayoutConfig, MenuLayoutEngine, Neighbors, PixelBox};
pub use navigation::{NavigationGraph, NavigationGraphBuilder};
pub use overlay::{
    find_font, load_font, wrap_text, MenuPalette, MenuTheme, OverlayRenderer, RenderError,
    RenderedLayer, HIGHLIGHT_STROKE, SELECT_STROKE,
};

use std::path::{Path, PathBuf};

use crate::core::Episode;

/// Buttons per menu page
pub const MAX_BUTTONS_PER_PAGE: usize = 6;
pub const BACKGROUND_FILE: &str = "menu_background.png";
pub const HIGHLIGHT_FILE: &str = "menu_highlight.png";
pub const SELECT_FILE: &str = "menu_select.png";

/// A rendered menu page: its buttons and the three raster layers on disk
#[derive(Debug, Clone)]
pub struct MenuPage {
    pub graph: NavigationGraph,
    pub background: PathBuf,
    pub highlight: PathBuf,
    pub select: PathBuf,
}

impl MenuPage {
    pub fn cells(&self) -> &[ButtonCell] {
        self.graph.cells()
    }
}

/// Lay out, link and render one menu page into `out_dir`
///
/// Only the first [`MAX_BUTTONS_PER_PAGE`] episodes get a button.
pub fn compile_page(
    renderer: &OverlayRenderer,
    engine: &MenuLayoutEngine,
    theme: &MenuTheme,
    episodes: &[Episode],
    out_dir: &Path,
) -> Result<MenuPage, RenderError> {
    let columns = engine.config().columns;
    let cells = engine.layout(episodes, MAX_BUTTONS_PER_PAGE, columns);
    let graph = NavigationGraphBuilder::new(columns).build(&cells);

    let page = MenuPage {
        background: out_dir.join(BACKGROUND_FILE),
        highlight: out_dir.join(HIGHLIGHT_FILE),
        select: out_dir.join(SELECT_FILE),
        graph,
    };

    renderer
        .render_base(theme, page.cells())
        .save(&page.background)?;
    renderer
        .render_highlight(page.cells())
        .save(&page.highlight)?;
    renderer.render_select(page.cells()).save(&page.select)?;

    Ok(page)
}
