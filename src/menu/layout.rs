//! Menu grid geometry
//!
//! Every raster layer and the authoring descriptor read their button
//! positions from the cells produced here, so the three overlays and the
//! button coordinates can never drift apart.

use std::path::PathBuf;

use crate::core::{Episode, MenuSettings, VideoStandard};

/// Pixel rectangle from `(x0, y0)` inclusive to `(x1, y1)` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x + width,
            y1: y + height,
        }
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// Grow the box by `amount` on every side, saturating at zero
    pub fn expand(&self, amount: u32) -> Self {
        Self {
            x0: self.x0.saturating_sub(amount),
            y0: self.y0.saturating_sub(amount),
            x1: self.x1 + amount,
            y1: self.y1 + amount,
        }
    }
}

/// Indices of the cells reached by each remote-control direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbors {
    pub up: usize,
    pub down: usize,
    pub left: usize,
    pub right: usize,
}

impl Neighbors {
    /// Every direction stays on `index`
    pub fn isolated(index: usize) -> Self {
        Self {
            up: index,
            down: index,
            left: index,
            right: index,
        }
    }
}

/// One selectable button on a menu page
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonCell {
    /// Position on the page (0-based), equal to the title index on the disc
    pub index: usize,
    pub row: usize,
    pub column: usize,
    pub bounds: PixelBox,
    pub neighbors: Neighbors,
    /// Episode ordinal shown to the viewer
    pub episode_index: u32,
    pub caption: String,
    pub thumbnail: Option<PathBuf>,
}

/// Fixed geometry of a menu page
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    /// Buttons per row
    pub columns: usize,
    pub padding: u32,
    /// Extra vertical space under each row for the caption
    pub caption_height: u32,
    /// Y coordinate of the first row
    pub grid_top: u32,
    /// Horizontal and vertical TV safe-area margins
    pub safe_margin_x: u32,
    pub safe_margin_y: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::for_standard(VideoStandard::Ntsc)
    }
}

impl LayoutConfig {
    pub fn for_standard(standard: VideoStandard) -> Self {
        Self::from_settings(standard, &MenuSettings::default())
    }

    /// Geometry for `standard` with the user's thumbnail size, columns and padding
    pub fn from_settings(standard: VideoStandard, menu: &MenuSettings) -> Self {
        let (canvas_width, canvas_height) = standard.resolution();
        Self {
            canvas_width,
            canvas_height,
            cell_width: menu.thumb_width.max(1),
            cell_height: menu.thumb_height.max(1),
            columns: menu.columns.max(1),
            padding: menu.padding,
            caption_height: 20,
            grid_top: 130,
            safe_margin_x: 36,
            safe_margin_y: 24,
        }
    }

    /// This geometry, scaled down until `rows` x `columns` cells fit the
    /// safe area below `grid_top`
    pub fn fitted(&self, rows: usize, columns: usize) -> LayoutConfig {
        let rows = rows.max(1) as u32;
        let columns = columns.max(1) as u32;
        let avail_w = self.canvas_width.saturating_sub(2 * self.safe_margin_x);
        let avail_h = self
            .canvas_height
            .saturating_sub(self.safe_margin_y + self.grid_top);
        let needed_w = columns * self.cell_width + (columns - 1) * self.padding;
        let needed_h =
            rows * (self.cell_height + self.caption_height) + (rows - 1) * self.padding;
        if needed_w <= avail_w && needed_h <= avail_h {
            return self.clone();
        }

        // Shrink only the cells while the gaps still fit, otherwise everything
        let gaps_w = (columns - 1) * self.padding;
        let gaps_h = rows * self.caption_height + (rows - 1) * self.padding;
        let fitted = if gaps_w + columns <= avail_w && gaps_h + rows <= avail_h {
            let scale = ((avail_w - gaps_w) as f64 / (columns * self.cell_width) as f64)
                .min((avail_h - gaps_h) as f64 / (rows * self.cell_height) as f64);
            LayoutConfig {
                cell_width: ((self.cell_width as f64 * scale).floor() as u32).max(1),
                cell_height: ((self.cell_height as f64 * scale).floor() as u32).max(1),
                ..self.clone()
            }
        } else {
            let scale = (avail_w as f64 / needed_w as f64).min(avail_h as f64 / needed_h as f64);
            let shrink = |v: u32| (v as f64 * scale).floor() as u32;
            LayoutConfig {
                cell_width: shrink(self.cell_width).max(1),
                cell_height: shrink(self.cell_height).max(1),
                padding: shrink(self.padding),
                caption_height: shrink(self.caption_height),
                ..self.clone()
            }
        };
        log::warn!(
            "{}x{} menu grid does not fit the safe area; buttons shrunk to {}x{}",
            rows,
            columns,
            fitted.cell_width,
            fitted.cell_height
        );
        fitted
    }

    /// Width of a grid with `columns` cells per row
    pub fn grid_width(&self, columns: usize) -> u32 {
        let columns = columns.max(1) as u32;
        columns * self.cell_width + (columns - 1) * self.padding
    }

    /// Left edge of a horizontally centered grid
    pub fn start_x(&self, columns: usize) -> u32 {
        self.canvas_width.saturating_sub(self.grid_width(columns)) / 2
    }

    /// Bounding box of the cell at (`row`, `column`)
    pub fn cell_box(&self, row: usize, column: usize, columns: usize) -> PixelBox {
        let x = self.start_x(columns) + column as u32 * (self.cell_width + self.padding);
        let y = self.grid_top
            + row as u32 * (self.cell_height + self.padding + self.caption_height);
        PixelBox::new(x, y, self.cell_width, self.cell_height)
    }
}

/// Caption shown under a button: `"{index}. {title}"`, cut to 17 characters
/// plus `"..."` when longer than 20
pub fn caption(episode_index: u32, title: &str) -> String {
    let full = format!("{}. {}", episode_index, title);
    if full.chars().count() > 20 {
        let cut: String = full.chars().take(17).collect();
        format!("{}...", cut)
    } else {
        full
    }
}

/// Deterministic grid placement
#[derive(Debug, Clone, Default)]
pub struct MenuLayoutEngine {
    config: LayoutConfig,
}

impl MenuLayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Place the first `max_per_page` episodes row-major on the grid
    ///
    /// Cells shrink when the grid would leave the safe area. Neighbors start
    /// out self-referencing; see
    /// [`NavigationGraphBuilder`](super::NavigationGraphBuilder).
    pub fn layout(&self, episodes: &[Episode], max_per_page: usize, columns: usize) -> Vec<ButtonCell> {
        let columns = columns.max(1);
        let count = episodes.len().min(max_per_page);
        if count == 0 {
            return Vec::new();
        }
        let grid = self.config.fitted(count.div_ceil(columns), columns);
        if episodes.len() > max_per_page {
            log::debug!(
                "Menu page holds {} of {} episodes",
                max_per_page,
                episodes.len()
            );
        }

        episodes
            .iter()
            .take(max_per_page)
            .enumerate()
            .map(|(i, episode)| {
                let row = i / columns;
                let column = i % columns;
                ButtonCell {
                    index: i,
                    row,
                    column,
                    bounds: grid.cell_box(row, column, columns),
                    neighbors: Neighbors::isolated(i),
                    episode_index: episode.index,
                    caption: caption(episode.index, &episode.title),
                    thumbnail: episode.thumbnail.clone(),
                }
            })
            .collect()
    }
}

/// Lay out with the default NTSC geometry
pub fn layout(episodes: &[Episode], max_per_page: usize, columns: usize) -> Vec<ButtonCell> {
    MenuLayoutEngine::default().layout(episodes, max_per_page, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::episodes;
    use proptest::prelude::*;

    #[test]
    fn test_six_episodes_three_columns() {
        let cells = layout(&episodes(6, 20.0), 6, 3);
        assert_eq!(cells.len(), 6);
        assert_eq!((cells[0].row, cells[0].column), (0, 0));
        assert_eq!((cells[5].row, cells[5].column), (1, 2));
    }

    #[test]
    fn test_grid_is_centered() {
        let cells = layout(&episodes(3, 20.0), 6, 3);
        // 3 * 160 + 2 * 20 = 520 wide on a 720 canvas
        assert_eq!(cells[0].bounds, PixelBox { x0: 100, y0: 130, x1: 260, y1: 220 });
        assert_eq!(cells[2].bounds.x1, 620);
    }

    #[test]
    fn test_rows_include_caption_allowance() {
        let cells = layout(&episodes(4, 20.0), 6, 3);
        assert_eq!(cells[3].bounds.y0, 130 + 90 + 20 + 20);
        assert_eq!(cells[3].bounds.x0, cells[0].bounds.x0);
    }

    #[test]
    fn test_only_first_page_is_placed() {
        let cells = layout(&episodes(9, 20.0), 6, 3);
        assert_eq!(cells.len(), 6);
        assert_eq!(cells.last().unwrap().episode_index, 6);
    }

    #[test]
    fn test_empty_input() {
        assert!(layout(&[], 6, 3).is_empty());
    }

    #[test]
    fn test_pal_uses_same_grid() {
        let engine = MenuLayoutEngine::new(LayoutConfig::for_standard(VideoStandard::Pal));
        let cells = engine.layout(&episodes(1, 20.0), 6, 3);
        assert_eq!(engine.config().canvas_height, 576);
        assert_eq!(cells[0].bounds.x0, 100);
    }

    #[test]
    fn test_caption_truncation() {
        assert_eq!(caption(1, "Pilot"), "1. Pilot");
        let long = caption(1, "The Pilot Episode About Everything");
        assert_eq!(long, "1. The Pilot Epis...");
        assert_eq!(long.chars().count(), 20);
    }

    #[test]
    fn test_caption_exactly_twenty_is_kept() {
        // "1. " + 17 characters
        let title = "abcdefghijklmnopq";
        assert_eq!(caption(1, title).chars().count(), 20);
        assert_eq!(caption(1, title), format!("1. {}", title));
    }

    #[test]
    fn test_caption_counts_characters_not_bytes() {
        let c = caption(2, "Café Révolution Ünïcödé");
        assert!(c.ends_with("..."));
        assert_eq!(c.chars().count(), 20);
    }

    #[test]
    fn test_settings_drive_geometry() {
        let menu = MenuSettings {
            thumb_width: 120,
            thumb_height: 68,
            columns: 4,
            padding: 10,
            ..Default::default()
        };
        let config = LayoutConfig::from_settings(VideoStandard::Ntsc, &menu);
        assert_eq!(config.columns, 4);
        let cells = MenuLayoutEngine::new(config).layout(&episodes(4, 20.0), 6, 4);
        // 4 * 120 + 3 * 10 = 510 wide on a 720 canvas
        assert_eq!(cells[0].bounds, PixelBox { x0: 105, y0: 130, x1: 225, y1: 198 });
        assert_eq!(cells[3].bounds.x1, 615);
    }

    #[test]
    fn test_default_grid_is_not_shrunk() {
        let config = LayoutConfig::default();
        assert_eq!(config.fitted(2, 3), config);
    }

    #[test]
    fn test_tall_grid_shrinks_into_canvas() {
        let config = LayoutConfig::default();
        let cells = layout(&episodes(6, 20.0), 6, 1);
        assert_eq!(cells.len(), 6);
        let last = cells[5].bounds;
        assert!(last.y1 <= config.canvas_height - config.safe_margin_y);
        assert!(cells[0].bounds.width() < config.cell_width);
        for pair in cells.windows(2) {
            assert!(pair[0].bounds.y1 <= pair[1].bounds.y0);
        }
    }

    #[test]
    fn test_wide_grid_shrinks_into_canvas() {
        let config = LayoutConfig::default();
        let cells = layout(&episodes(6, 20.0), 6, 6);
        assert!(cells[0].bounds.x0 >= config.safe_margin_x);
        assert!(cells[5].bounds.x1 <= config.canvas_width - config.safe_margin_x);
        for pair in cells.windows(2) {
            assert!(pair[0].bounds.x1 <= pair[1].bounds.x0);
        }
    }

    proptest! {
        #[test]
        fn prop_boxes_stay_on_canvas(count in 1u32..=12, max in 1usize..=12, columns in 1usize..=12) {
            let config = LayoutConfig::default();
            for cell in layout(&episodes(count, 20.0), max, columns) {
                let b = cell.bounds;
                prop_assert!(b.width() > 0 && b.height() > 0);
                prop_assert!(b.x1 <= config.canvas_width && b.y1 <= config.canvas_height);
            }
        }
    }

    #[test]
    fn test_expand() {
        let b = PixelBox::new(2, 10, 5, 5).expand(4);
        assert_eq!(b, PixelBox { x0: 0, y0: 6, x1: 11, y1: 19 });
    }
}
