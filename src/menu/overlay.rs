//! Menu raster layers
//!
//! Renders the three images a DVD menu needs:
//! - the base menu (backdrop, title, thumbnails or placeholders, captions)
//! - the highlight mask (a gold frame shown on the focused button)
//! - the select mask (a thicker white frame shown while a button is pressed)
//!
//! Each layer reports the button boxes it drew around, which always come
//! straight from the cells handed in. Missing fonts or unreadable images
//! degrade to placeholders with a warning; only failing to write a layer
//! is an error.

use ab_glyph::{point, Font, FontArc, PxScale, ScaleFont};
use image::imageops::FilterType;
use image::{Pixel, Rgba, RgbaImage};
use std::path::{Path, PathBuf};

use super::layout::{ButtonCell, LayoutConfig, PixelBox};
use crate::core::{MenuSettings, MenuStyle};

/// Font files tried in order when rendering text
pub const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSansBold.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "C:\\Windows\\Fonts\\arial.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
];

pub const BACKGROUND_COLOR: Rgba<u8> = Rgba([20, 20, 30, 255]);
pub const HIGHLIGHT_COLOR: Rgba<u8> = Rgba([255, 215, 0, 255]);
pub const SELECT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const SUBTITLE_COLOR: Rgba<u8> = Rgba([200, 200, 200, 255]);
const PLACEHOLDER_FILL: Rgba<u8> = Rgba([60, 60, 80, 255]);
const PLACEHOLDER_OUTLINE: Rgba<u8> = Rgba([100, 100, 120, 255]);
const PLACEHOLDER_TEXT: Rgba<u8> = Rgba([150, 150, 150, 255]);

/// Frame stroke of the highlight layer (px)
pub const HIGHLIGHT_STROKE: u32 = 4;
/// Frame stroke of the select layer (px)
pub const SELECT_STROKE: u32 = 6;

const TITLE_SIZE: f32 = 32.0;
const CAPTION_SIZE: f32 = 12.0;
const PLACEHOLDER_SIZE: f32 = 24.0;
const OVERVIEW_SIZE: f32 = 11.0;
const OVERVIEW_COLUMNS: usize = 80;
const OVERVIEW_LINES: usize = 2;
const MAX_LOGO_HEIGHT: u32 = 80;

/// Rendering failures
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no usable font found")]
    FontUnavailable,
    #[error("failed to load image {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to save {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Colours of the base and mask layers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MenuPalette {
    pub background: Rgba<u8>,
    pub highlight: Rgba<u8>,
    pub select: Rgba<u8>,
    pub text: Rgba<u8>,
    pub subtitle: Rgba<u8>,
}

impl Default for MenuPalette {
    fn default() -> Self {
        Self {
            background: BACKGROUND_COLOR,
            highlight: HIGHLIGHT_COLOR,
            select: SELECT_COLOR,
            text: TEXT_COLOR,
            subtitle: SUBTITLE_COLOR,
        }
    }
}

impl MenuPalette {
    pub fn from_settings(menu: &MenuSettings) -> Self {
        let opaque = |[r, g, b]: [u8; 3]| Rgba([r, g, b, 255]);
        Self {
            background: opaque(menu.background_color),
            highlight: opaque(menu.highlight_color),
            select: opaque(menu.select_color),
            text: opaque(menu.text_color),
            subtitle: opaque(menu.subtitle_color),
        }
    }
}

/// Page-level artwork and text
#[derive(Debug, Clone, Default)]
pub struct MenuTheme {
    pub title: String,
    pub overview: String,
    pub backdrop: Option<PathBuf>,
    pub logo: Option<PathBuf>,
    pub style: MenuStyle,
}

/// One rendered layer and the button boxes it was drawn around
#[derive(Debug, Clone)]
pub struct RenderedLayer {
    pub image: RgbaImage,
    pub boxes: Vec<PixelBox>,
}

impl RenderedLayer {
    pub fn save(&self, path: &Path) -> Result<(), RenderError> {
        self.image.save(path).map_err(|source| RenderError::Save {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Generated menu layer: {}", path.display());
        Ok(())
    }
}

/// First existing font from [`FONT_CANDIDATES`]
pub fn find_font() -> Option<PathBuf> {
    FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

/// Load a TrueType font (or the first face of a collection)
pub fn load_font(path: &Path) -> Result<FontArc, RenderError> {
    let bytes = std::fs::read(path).map_err(|e| {
        log::warn!("Could not read font {}: {}", path.display(), e);
        RenderError::FontUnavailable
    })?;
    FontArc::try_from_vec(bytes).map_err(|e| {
        log::warn!("Could not parse font {}: {}", path.display(), e);
        RenderError::FontUnavailable
    })
}

fn load_image(path: &Path) -> Result<image::DynamicImage, RenderError> {
    image::open(path).map_err(|source| RenderError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Greedy word wrap to `width` columns, keeping at most `max_lines`
///
/// When text is dropped the last kept line ends in `"..."`.
pub fn wrap_text(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            let trimmed = last.trim_end().to_string();
            *last = format!("{}...", trimmed);
        }
    }
    lines
}

/// Draws the base, highlight and select layers from one set of cells
pub struct OverlayRenderer {
    layout: LayoutConfig,
    font: Option<FontArc>,
    palette: MenuPalette,
}

impl OverlayRenderer {
    /// Create a renderer using the first system font found
    pub fn new(layout: LayoutConfig) -> Self {
        let font = match find_font() {
            Some(path) => load_font(&path).ok(),
            None => {
                log::warn!("No system font found; menu text will be skipped");
                None
            }
        };
        Self::with_font(layout, font)
    }

    /// Create a renderer with an explicit font (or none)
    pub fn with_font(layout: LayoutConfig, font: Option<FontArc>) -> Self {
        Self {
            layout,
            font,
            palette: MenuPalette::default(),
        }
    }

    pub fn with_palette(mut self, palette: MenuPalette) -> Self {
        self.palette = palette;
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Background, title, thumbnails and captions
    pub fn render_base(&self, theme: &MenuTheme, cells: &[ButtonCell]) -> RenderedLayer {
        let (w, h) = (self.layout.canvas_width, self.layout.canvas_height);
        let mut image = self
            .load_backdrop(theme.backdrop.as_deref())
            .unwrap_or_else(|| RgbaImage::from_pixel(w, h, self.palette.background));

        match theme.style {
            MenuStyle::Modern => apply_vignette(&mut image),
            MenuStyle::Retro => {
                apply_scanlines(&mut image);
                image = image::imageops::blur(&image, 0.5);
            }
        }

        self.draw_heading(&mut image, theme);

        for cell in cells {
            self.draw_cell(&mut image, cell);
        }

        if !theme.overview.is_empty() {
            let y = h.saturating_sub(self.layout.safe_margin_y + 60);
            let line_height = OVERVIEW_SIZE as u32 + 2;
            for (i, line) in wrap_text(&theme.overview, OVERVIEW_COLUMNS, OVERVIEW_LINES)
                .iter()
                .enumerate()
            {
                self.draw_text(
                    &mut image,
                    line,
                    self.layout.safe_margin_x as f32,
                    (y + i as u32 * line_height) as f32,
                    OVERVIEW_SIZE,
                    self.palette.subtitle,
                );
            }
        }

        RenderedLayer {
            image,
            boxes: cells.iter().map(|c| c.bounds).collect(),
        }
    }

    /// Gold frames drawn just outside each button box
    pub fn render_highlight(&self, cells: &[ButtonCell]) -> RenderedLayer {
        self.render_frames(cells, HIGHLIGHT_STROKE, self.palette.highlight)
    }

    /// Thicker white frames drawn just outside each button box
    pub fn render_select(&self, cells: &[ButtonCell]) -> RenderedLayer {
        self.render_frames(cells, SELECT_STROKE, self.palette.select)
    }

    fn render_frames(&self, cells: &[ButtonCell], stroke: u32, color: Rgba<u8>) -> RenderedLayer {
        let mut image = RgbaImage::new(self.layout.canvas_width, self.layout.canvas_height);
        for cell in cells {
            draw_frame(&mut image, cell.bounds.expand(stroke), stroke, color);
        }
        RenderedLayer {
            image,
            boxes: cells.iter().map(|c| c.bounds).collect(),
        }
    }

    fn load_backdrop(&self, path: Option<&Path>) -> Option<RgbaImage> {
        let path = path?;
        let img = match load_image(path) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("Ignoring backdrop: {}", e);
                return None;
            }
        };
        let mut img = img
            .resize_exact(self.layout.canvas_width, self.layout.canvas_height, FilterType::Lanczos3)
            .to_rgba8();
        // Darken for contrast behind the grid
        for px in img.pixels_mut() {
            for c in px.0.iter_mut().take(3) {
                *c = (*c as f32 * 0.4) as u8;
            }
            px.0[3] = 255;
        }
        Some(img)
    }

    fn draw_heading(&self, image: &mut RgbaImage, theme: &MenuTheme) {
        let top = self.layout.safe_margin_y;
        if let Some(logo_path) = &theme.logo {
            match load_image(logo_path) {
                Ok(logo) => {
                    let max_w = self.layout.canvas_width.saturating_sub(2 * self.layout.safe_margin_x);
                    let logo = logo.thumbnail(max_w, MAX_LOGO_HEIGHT).to_rgba8();
                    let x = self.layout.canvas_width.saturating_sub(logo.width()) / 2;
                    image::imageops::overlay(image, &logo, x as i64, top as i64);
                    return;
                }
                Err(e) => log::warn!("Ignoring logo: {}", e),
            }
        }

        if !theme.title.is_empty() {
            let width = self.text_width(&theme.title, TITLE_SIZE);
            let x = (self.layout.canvas_width as f32 - width).max(0.0) / 2.0;
            self.draw_text(image, &theme.title, x, top as f32, TITLE_SIZE, self.palette.text);
        }
    }

    fn draw_cell(&self, image: &mut RgbaImage, cell: &ButtonCell) {
        let b = cell.bounds;
        let thumbnail = cell.thumbnail.as_deref().and_then(|path| match load_image(path) {
            Ok(img) => Some(img.resize_exact(b.width(), b.height(), FilterType::Lanczos3).to_rgba8()),
            Err(e) => {
                log::warn!("Drawing placeholder for episode {}: {}", cell.episode_index, e);
                None
            }
        });

        match thumbnail {
            Some(thumb) => image::imageops::overlay(image, &thumb, b.x0 as i64, b.y0 as i64),
            None => {
                fill_rect(image, b, PLACEHOLDER_FILL);
                draw_frame(image, b, 1, PLACEHOLDER_OUTLINE);
                let label = format!("E{}", cell.episode_index);
                let tw = self.text_width(&label, PLACEHOLDER_SIZE);
                let x = b.x0 as f32 + (b.width() as f32 - tw).max(0.0) / 2.0;
                let y = b.y0 as f32 + (b.height() as f32 - PLACEHOLDER_SIZE).max(0.0) / 2.0;
                self.draw_text(image, &label, x, y, PLACEHOLDER_SIZE, PLACEHOLDER_TEXT);
            }
        }

        let cw = self.text_width(&cell.caption, CAPTION_SIZE);
        let x = b.x0 as f32 + (b.width() as f32 - cw) / 2.0;
        self.draw_text(image, &cell.caption, x, (b.y1 + 2) as f32, CAPTION_SIZE, self.palette.text);
    }

    fn text_width(&self, text: &str, size: f32) -> f32 {
        let Some(font) = &self.font else {
            return 0.0;
        };
        let scaled = font.as_scaled(PxScale::from(size));
        let mut width = 0.0;
        let mut prev = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(p) = prev {
                width += scaled.kern(p, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        width
    }

    /// Draw `text` with its top-left corner at (`x`, `y`)
    fn draw_text(&self, image: &mut RgbaImage, text: &str, x: f32, y: f32, size: f32, color: Rgba<u8>) {
        let Some(font) = &self.font else {
            return;
        };
        let scale = PxScale::from(size);
        let scaled = font.as_scaled(scale);
        let baseline = y + scaled.ascent();
        let (w, h) = image.dimensions();

        let mut caret = x;
        let mut prev = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(p) = prev {
                caret += scaled.kern(p, id);
            }
            let glyph = id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(id);
            prev = Some(id);

            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i32 + gx as i32;
                let py = bounds.min.y as i32 + gy as i32;
                if px < 0 || py < 0 || px as u32 >= w || py as u32 >= h {
                    return;
                }
                let alpha = (coverage.clamp(0.0, 1.0) * color.0[3] as f32) as u8;
                let ink = Rgba([color.0[0], color.0[1], color.0[2], alpha]);
                image.get_pixel_mut(px as u32, py as u32).blend(&ink);
            });
        }
    }
}

fn fill_rect(image: &mut RgbaImage, b: PixelBox, color: Rgba<u8>) {
    let (w, h) = image.dimensions();
    for y in b.y0..b.y1.min(h) {
        for x in b.x0..b.x1.min(w) {
            image.put_pixel(x, y, color);
        }
    }
}

/// Stroke the inside edge of `outer` with a band `stroke` pixels wide
fn draw_frame(image: &mut RgbaImage, outer: PixelBox, stroke: u32, color: Rgba<u8>) {
    let (w, h) = image.dimensions();
    for y in outer.y0..outer.y1.min(h) {
        for x in outer.x0..outer.x1.min(w) {
            let inside = x >= outer.x0 + stroke
                && x + stroke < outer.x1
                && y >= outer.y0 + stroke
                && y + stroke < outer.y1;
            if !inside {
                image.put_pixel(x, y, color);
            }
        }
    }
}

/// Radial darkening towards the corners
fn apply_vignette(image: &mut RgbaImage) {
    let (w, h) = image.dimensions();
    let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
    let max_dist = (cx * cx + cy * cy).sqrt();
    for (x, y, px) in image.enumerate_pixels_mut() {
        let dist = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
        let alpha = (dist / max_dist * 100.0).min(80.0) as u8;
        px.blend(&Rgba([0, 0, 0, alpha]));
    }
}

/// Dark line on every other row
fn apply_scanlines(image: &mut RgbaImage) {
    for (_, y, px) in image.enumerate_pixels_mut() {
        if y % 2 == 0 {
            px.blend(&Rgba([0, 0, 0, 80]));
        }
    }
}
