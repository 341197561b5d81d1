//! dvdauthor project descriptor
//!
//! Builds a typed model of the disc structure from the encoded titles, the
//! menu artifacts and the navigation graph, then serializes it to the XML
//! dialect dvdauthor reads with `-x`.
//!
//! Structure:
//! - VMGM: a first-play program chain that jumps straight to the title set menu
//! - title set menu: the looping menu video, a highlight/select subpicture
//!   stream carrying button geometry and neighbors, and one
//!   `jump title N;` command per button
//! - titles: one program chain per video, each returning to the menu

use std::fmt;
use std::path::{Path, PathBuf};

use super::layout::PixelBox;
use super::navigation::NavigationGraph;
use crate::core::VideoStandard;

/// Descriptor failures
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// Every title needs exactly one button and vice versa
    #[error("{videos} video(s) but {buttons} menu button(s)")]
    CountMismatch { videos: usize, buttons: usize },
    #[error("failed to write descriptor {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Files making up the rendered menu
#[derive(Debug, Clone, PartialEq)]
pub struct MenuArtifacts {
    pub menu_video: PathBuf,
    pub highlight: PathBuf,
    pub select: PathBuf,
}

/// A menu button: geometry, neighbors and its jump target
#[derive(Debug, Clone, PartialEq)]
pub struct MenuButton {
    pub name: String,
    pub bounds: PixelBox,
    pub up: String,
    pub down: String,
    pub left: String,
    pub right: String,
    /// 1-based title number
    pub title: usize,
}

impl MenuButton {
    pub fn command(&self) -> String {
        format!("jump title {};", self.title)
    }
}

/// One title program chain
#[derive(Debug, Clone, PartialEq)]
pub struct TitleEntry {
    pub video: PathBuf,
    /// dvdauthor chapter list, "0" for a single chapter at the start
    pub chapters: String,
}

/// Complete authoring descriptor for one disc
#[derive(Debug, Clone, PartialEq)]
pub struct AuthoringDescriptor {
    pub dest: PathBuf,
    pub standard: VideoStandard,
    pub audio_channels: u32,
    pub menu: MenuArtifacts,
    pub buttons: Vec<MenuButton>,
    pub titles: Vec<TitleEntry>,
}

fn button_name(index: usize) -> String {
    format!("button{}", index + 1)
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn path_attr(path: &Path) -> String {
    escape(&path.to_string_lossy())
}

impl fmt::Display for AuthoringDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = self.standard.dvdauthor_format();
        writeln!(f, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(f, r#"<dvdauthor dest="{}">"#, path_attr(&self.dest))?;
        writeln!(f, "  <vmgm>")?;
        writeln!(f, "    <menus>")?;
        writeln!(f, r#"      <pgc entry="title">"#)?;
        writeln!(f, "        <pre>jump titleset 1 menu;</pre>")?;
        writeln!(f, "      </pgc>")?;
        writeln!(f, "    </menus>")?;
        writeln!(f, "  </vmgm>")?;
        writeln!(f, "  <titleset>")?;

        writeln!(f, "    <menus>")?;
        writeln!(f, r#"      <video format="{}" aspect="16:9"/>"#, format)?;
        writeln!(f, "      <subpicture>")?;
        writeln!(f, r#"        <stream id="0" mode="highlight">"#)?;
        writeln!(
            f,
            r#"          <highlight file="{}"/>"#,
            path_attr(&self.menu.highlight)
        )?;
        writeln!(f, r#"          <select file="{}"/>"#, path_attr(&self.menu.select))?;
        for b in &self.buttons {
            writeln!(
                f,
                r#"          <button name="{}" x0="{}" y0="{}" x1="{}" y1="{}" up="{}" down="{}" left="{}" right="{}"/>"#,
                b.name, b.bounds.x0, b.bounds.y0, b.bounds.x1, b.bounds.y1, b.up, b.down, b.left, b.right
            )?;
        }
        writeln!(f, "        </stream>")?;
        writeln!(f, "      </subpicture>")?;
        writeln!(f, r#"      <pgc entry="root">"#)?;
        for b in &self.buttons {
            writeln!(f, r#"        <button name="{}">{}</button>"#, b.name, b.command())?;
        }
        writeln!(
            f,
            r#"        <vob file="{}" pause="inf"/>"#,
            path_attr(&self.menu.menu_video)
        )?;
        writeln!(f, "        <post>jump cell 1;</post>")?;
        writeln!(f, "      </pgc>")?;
        writeln!(f, "    </menus>")?;

        writeln!(f, "    <titles>")?;
        writeln!(f, r#"      <video format="{}" aspect="16:9"/>"#, format)?;
        writeln!(
            f,
            r#"      <audio format="ac3" channels="{}"/>"#,
            self.audio_channels
        )?;
        for title in &self.titles {
            writeln!(f, "      <pgc>")?;
            writeln!(
                f,
                r#"        <vob file="{}" chapters="{}"/>"#,
                path_attr(&title.video),
                escape(&title.chapters)
            )?;
            writeln!(f, "        <post>call vmgm menu;</post>")?;
            writeln!(f, "      </pgc>")?;
        }
        writeln!(f, "    </titles>")?;
        writeln!(f, "  </titleset>")?;
        writeln!(f, "</dvdauthor>")?;
        Ok(())
    }
}

impl AuthoringDescriptor {
    /// Serialize to dvdauthor XML
    pub fn to_xml(&self) -> String {
        self.to_string()
    }

    /// Write the XML to `path`
    pub fn write(&self, path: &Path) -> Result<(), DescriptorError> {
        std::fs::write(path, self.to_xml()).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Generated dvdauthor XML: {}", path.display());
        Ok(())
    }
}

/// Turns titles, menu artifacts and navigation into an [`AuthoringDescriptor`]
#[derive(Debug, Clone)]
pub struct DescriptorEmitter {
    dest: PathBuf,
    standard: VideoStandard,
    audio_channels: u32,
}

impl DescriptorEmitter {
    /// `dest` is the directory dvdauthor writes VIDEO_TS into
    pub fn new(dest: impl Into<PathBuf>, standard: VideoStandard) -> Self {
        Self {
            dest: dest.into(),
            standard,
            audio_channels: 2,
        }
    }

    pub fn with_audio_channels(mut self, channels: u32) -> Self {
        self.audio_channels = channels;
        self
    }

    /// Build the descriptor; video `i` is the target of button `i`
    ///
    /// Fails with [`DescriptorError::CountMismatch`] unless there is exactly
    /// one video per navigation cell.
    pub fn emit(
        &self,
        video_files: &[PathBuf],
        artifacts: &MenuArtifacts,
        graph: &NavigationGraph,
    ) -> Result<AuthoringDescriptor, DescriptorError> {
        if video_files.len() != graph.len() {
            return Err(DescriptorError::CountMismatch {
                videos: video_files.len(),
                buttons: graph.len(),
            });
        }

        let buttons = graph
            .cells()
            .iter()
            .enumerate()
            .map(|(i, cell)| MenuButton {
                name: button_name(i),
                bounds: cell.bounds,
                up: button_name(cell.neighbors.up),
                down: button_name(cell.neighbors.down),
                left: button_name(cell.neighbors.left),
                right: button_name(cell.neighbors.right),
                title: i + 1,
            })
            .collect();

        let titles = video_files
            .iter()
            .map(|video| TitleEntry {
                video: video.clone(),
                chapters: "0".to_string(),
            })
            .collect();

        Ok(AuthoringDescriptor {
            dest: self.dest.clone(),
            standard: self.standard,
            audio_channels: self.audio_channels,
            menu: artifacts.clone(),
            buttons,
            titles,
        })
    }
}
