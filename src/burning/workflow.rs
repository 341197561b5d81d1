//! Authoring workflow execution
//!
//! Drives a whole season through the pipeline, one disc at a time:
//! encode titles, compile the menu, emit the descriptor, run dvdauthor and
//! master an ISO. A disc that fails is reported in its [`DiscOutcome`] and
//! the next disc proceeds.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::authoring::{build_dvd_structure, AuthoringError};
use super::disc::BurnTool;
use super::iso::{create_iso, iso_file_name, volume_label, IsoError, IsoTool};
use super::state::{WorkflowStage, WorkflowState};
use crate::conversion::{
    calculate_worker_count, locate_tool, probe_duration, render_menu_video, write_chapter_file,
    EncodeError, EncodeEvent, EncodeSettings, EncodingCoordinator, MenuVideoOptions, ToolError,
    MENU_LOOP_SECONDS,
};
use crate::core::{
    AppSettings, DiscAssignment, DiscPlanner, Episode, JobStatus, PlanError, TranscodeJob,
};
use crate::menu::{
    compile_page, DescriptorEmitter, DescriptorError, LayoutConfig, MenuArtifacts,
    MenuLayoutEngine, MenuPalette, MenuTheme, OverlayRenderer, RenderError, MAX_BUTTONS_PER_PAGE,
};
use crate::project::ProjectManifest;

/// File names inside each disc's work directory
const DESCRIPTOR_FILE: &str = "dvdauthor.xml";
const MENU_VIDEO_FILE: &str = "menu.mpg";
const CHAPTER_FILE: &str = "chapters.txt";

/// Errors that stop a single disc (or, for planning, the whole run)
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("No episodes on disc {0} encoded successfully")]
    NothingEncoded(usize),
    #[error("Menu rendering failed: {0}")]
    Render(#[from] RenderError),
    #[error("Menu video failed: {0}")]
    MenuVideo(#[source] EncodeError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Authoring(#[from] AuthoringError),
    #[error(transparent)]
    Iso(#[from] IsoError),
    #[error("Failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Authoring cancelled")]
    Cancelled,
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Located external programs
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub ffmpeg: PathBuf,
    /// Optional: without it unknown durations stay unknown
    pub ffprobe: Option<PathBuf>,
    pub dvdauthor: PathBuf,
    pub iso: IsoTool,
    /// Optional: only needed to burn
    pub burner: Option<BurnTool>,
}

impl Toolchain {
    /// Find every tool the workflow needs, before any work starts
    pub fn discover(overrides: &HashMap<String, PathBuf>) -> Result<Self, ToolError> {
        let ffmpeg = locate_tool("ffmpeg", overrides)?;
        let dvdauthor = locate_tool("dvdauthor", overrides)?;
        let iso = IsoTool::discover(overrides)?;

        let ffprobe = locate_tool("ffprobe", overrides)
            .map_err(|e| log::warn!("{}; episode durations cannot be probed", e))
            .ok();
        let burner = BurnTool::discover(overrides)
            .map_err(|e| log::info!("No burner available: {}", e))
            .ok();

        Ok(Self {
            ffmpeg,
            ffprobe,
            dvdauthor,
            iso,
            burner,
        })
    }
}

/// What happened to one disc
#[derive(Debug)]
pub struct DiscOutcome {
    pub disc_number: usize,
    /// Episode ordinals planned for this disc
    pub planned: Vec<u32>,
    /// Episode ordinals that made it onto the disc, in title order
    pub encoded: Vec<u32>,
    /// Episodes left off the disc and why
    pub omitted: Vec<(u32, String)>,
    pub iso: Option<PathBuf>,
    pub error: Option<WorkflowError>,
}

impl DiscOutcome {
    fn new(assignment: &DiscAssignment) -> Self {
        Self {
            disc_number: assignment.disc_number(),
            planned: assignment.jobs().iter().map(|j| j.episode().index).collect(),
            encoded: Vec::new(),
            omitted: Vec::new(),
            iso: None,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.iso.is_some()
    }
}

/// Result of authoring a whole project
#[derive(Debug)]
pub struct AuthoringRun {
    /// One line per planned disc
    pub plan: Vec<String>,
    pub discs: Vec<DiscOutcome>,
}

impl AuthoringRun {
    pub fn iso_paths(&self) -> Vec<&Path> {
        self.discs.iter().filter_map(|d| d.iso.as_deref()).collect()
    }
}

/// Fill in unknown durations with ffprobe
///
/// Episodes that still have no duration afterwards are planned as
/// zero-length and fall back to the default bitrate.
pub fn probe_episode_durations(ffprobe: Option<&Path>, episodes: Vec<Episode>) -> Vec<Episode> {
    episodes
        .into_iter()
        .map(|mut episode| {
            if !episode.has_known_duration() {
                episode.duration_seconds = match ffprobe {
                    Some(ffprobe) => probe_duration(ffprobe, &episode.source),
                    None => 0.0,
                };
                if !episode.has_known_duration() {
                    log::warn!(
                        "Duration of episode {} ({}) is unknown",
                        episode.index,
                        episode.title
                    );
                }
            }
            episode
        })
        .collect()
}

/// Plan discs so that every title on a disc fits on one menu page
pub fn plan_discs(settings: &AppSettings, episodes: &[Episode]) -> Result<Vec<DiscAssignment>, PlanError> {
    let mut config = settings.planner_config();
    config.max_titles_per_disc = Some(MAX_BUTTONS_PER_PAGE);

    let jobs = TranscodeJob::for_episodes(episodes, &settings.staging_dir().join("titles"));
    DiscPlanner::new(config).plan(jobs)
}

/// Authors every disc of a project
pub struct AuthoringWorkflow {
    settings: AppSettings,
    tools: Toolchain,
    state: WorkflowState,
    events: Option<mpsc::UnboundedSender<EncodeEvent>>,
    renderer: OverlayRenderer,
    engine: MenuLayoutEngine,
}

impl AuthoringWorkflow {
    pub fn new(settings: AppSettings, tools: Toolchain) -> Self {
        let layout = LayoutConfig::from_settings(settings.video_standard, &settings.menu);
        let palette = MenuPalette::from_settings(&settings.menu);
        Self {
            renderer: OverlayRenderer::new(layout.clone()).with_palette(palette),
            engine: MenuLayoutEngine::new(layout),
            settings,
            tools,
            state: WorkflowState::new(),
            events: None,
        }
    }

    /// Share progress and cancellation with a front end
    pub fn with_state(mut self, state: WorkflowState) -> Self {
        self.state = state;
        self
    }

    /// Forward encoder events to `tx`
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<EncodeEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Replace the menu renderer (e.g. to pin a font)
    pub fn with_renderer(mut self, renderer: OverlayRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn tools(&self) -> &Toolchain {
        &self.tools
    }

    /// Fill in unknown durations with ffprobe
    pub fn probe_durations(&self, episodes: Vec<Episode>) -> Vec<Episode> {
        probe_episode_durations(self.tools.ffprobe.as_deref(), episodes)
    }

    /// Plan discs, one menu page per disc
    pub fn plan(&self, episodes: &[Episode]) -> Result<Vec<DiscAssignment>, PlanError> {
        plan_discs(&self.settings, episodes)
    }

    /// Author every disc of `manifest`
    ///
    /// Only planning errors abort the run; per-disc failures are recorded
    /// in the returned [`AuthoringRun`].
    pub async fn author_all(&self, manifest: &ProjectManifest) -> Result<AuthoringRun, WorkflowError> {
        self.state.reset(0);
        let episodes = self.probe_durations(manifest.resolved_episodes());
        let plan = self.plan(&episodes)?;
        self.state.set_total_discs(plan.len());

        let theme = self.theme(manifest);
        let mut run = AuthoringRun {
            plan: plan.iter().map(|d| d.summary()).collect(),
            discs: Vec::with_capacity(plan.len()),
        };

        for assignment in &plan {
            if self.state.is_cancelled() {
                let mut outcome = DiscOutcome::new(assignment);
                outcome.error = Some(WorkflowError::Cancelled);
                run.discs.push(outcome);
                continue;
            }

            self.state.start_disc(assignment.disc_number());
            log::info!("=== Disc {} of {} ===", assignment.disc_number(), plan.len());

            let outcome = self.author_disc(manifest, &theme, assignment).await;
            match &outcome.error {
                Some(e) => log::error!("Disc {} failed: {}", outcome.disc_number, e),
                None => log::info!("Disc {} complete", outcome.disc_number),
            }
            run.discs.push(outcome);
        }

        self.state.set_stage(if self.state.is_cancelled() {
            WorkflowStage::Cancelled
        } else {
            WorkflowStage::Complete
        });
        Ok(run)
    }

    /// Author one disc; never fails, the error is kept in the outcome
    pub async fn author_disc(
        &self,
        manifest: &ProjectManifest,
        theme: &MenuTheme,
        assignment: &DiscAssignment,
    ) -> DiscOutcome {
        let mut outcome = DiscOutcome::new(assignment);
        match self.run_disc(manifest, theme, assignment, &mut outcome).await {
            Ok(iso) => outcome.iso = Some(iso),
            Err(e) => outcome.error = Some(e),
        }
        outcome
    }

    async fn run_disc(
        &self,
        manifest: &ProjectManifest,
        theme: &MenuTheme,
        assignment: &DiscAssignment,
        outcome: &mut DiscOutcome,
    ) -> Result<PathBuf, WorkflowError> {
        let disc_number = assignment.disc_number();
        let work_dir = self.settings.staging_dir().join(format!("disc{}", disc_number));
        std::fs::create_dir_all(&work_dir).map_err(|source| WorkflowError::Io {
            path: work_dir.clone(),
            source,
        })?;

        // Encode
        self.state.set_stage(WorkflowStage::Encoding);
        let encoded = self.encode(assignment).await;
        self.check_cancelled()?;

        // Compact: titles and buttons come only from successful encodes
        let mut episodes = Vec::new();
        let mut videos = Vec::new();
        for job in &encoded {
            if job.status() == JobStatus::Complete {
                outcome.encoded.push(job.episode().index);
                episodes.push(job.episode().clone());
                videos.push(job.output_path().to_path_buf());
            } else {
                let reason = job.error().unwrap_or("not encoded").to_string();
                log::warn!(
                    "Leaving episode {} off disc {}: {}",
                    job.episode().index,
                    disc_number,
                    reason
                );
                outcome.omitted.push((job.episode().index, reason));
            }
        }
        self.state
            .record_encodes(outcome.encoded.len(), outcome.omitted.len());
        if episodes.is_empty() {
            return Err(WorkflowError::NothingEncoded(disc_number));
        }

        let done: Vec<TranscodeJob> = encoded
            .into_iter()
            .filter(|j| j.status() == JobStatus::Complete)
            .collect();
        let chapters = work_dir.join(CHAPTER_FILE);
        if let Err(e) = write_chapter_file(&done, &chapters) {
            log::warn!("Failed to write {}: {}", chapters.display(), e);
        }

        // Menu
        self.state.set_stage(WorkflowStage::RenderingMenu);
        let page = compile_page(&self.renderer, &self.engine, theme, &episodes, &work_dir)?;
        let menu_video = {
            let ffmpeg = self.tools.ffmpeg.clone();
            let options = MenuVideoOptions {
                standard: self.settings.video_standard,
                duration_secs: MENU_LOOP_SECONDS,
                audio: manifest.theme_audio.clone(),
            };
            let background = page.background.clone();
            let output = work_dir.join(MENU_VIDEO_FILE);
            blocking(move || {
                render_menu_video(&ffmpeg, &options, &background, &output)
                    .map_err(WorkflowError::MenuVideo)
            })
            .await?
        };
        self.check_cancelled()?;

        // Descriptor and DVD structure
        self.state.set_stage(WorkflowStage::Authoring);
        let dest = work_dir.join("DVD");
        let descriptor = DescriptorEmitter::new(&dest, self.settings.video_standard)
            .with_audio_channels(self.settings.audio.channels)
            .emit(
                &videos,
                &MenuArtifacts {
                    menu_video,
                    highlight: page.highlight.clone(),
                    select: page.select.clone(),
                },
                &page.graph,
            )?;
        let descriptor_path = work_dir.join(DESCRIPTOR_FILE);
        descriptor.write(&descriptor_path)?;
        {
            let dvdauthor = self.tools.dvdauthor.clone();
            let dest = dest.clone();
            blocking(move || build_dvd_structure(&dvdauthor, &descriptor_path, &dest)).await?;
        }
        self.check_cancelled()?;

        // ISO
        self.state.set_stage(WorkflowStage::CreatingIso);
        let iso_path = self.settings.output_dir().join(iso_file_name(
            &manifest.series_title,
            &manifest.season_title,
            disc_number,
        ));
        let label = volume_label(&manifest.series_title, disc_number);
        let tool = self.tools.iso.clone();
        let iso = blocking(move || create_iso(&tool, &dest, &label, &iso_path)).await?;
        self.state.push_iso(iso.clone());

        Ok(iso)
    }

    /// Encode the disc's jobs; cancelling the workflow cancels every job
    async fn encode(&self, assignment: &DiscAssignment) -> Vec<TranscodeJob> {
        let settings = EncodeSettings::new(
            self.settings.video_standard,
            assignment.video_bitrate(),
            self.settings.audio.clone(),
        );
        let workers = self
            .settings
            .max_parallel_encodes
            .unwrap_or_else(calculate_worker_count);

        let mut coordinator = EncodingCoordinator::new(self.tools.ffmpeg.clone(), settings).with_workers(workers);
        if let Some(tx) = &self.events {
            coordinator = coordinator.with_events(tx.clone());
        }
        if self.settings.include_subtitles
            && let Some(ffprobe) = &self.tools.ffprobe
        {
            coordinator = coordinator.with_subtitles(ffprobe.clone());
        }
        let coordinator = Arc::new(coordinator);

        let watcher = {
            let coordinator = coordinator.clone();
            let state = self.state.clone();
            tokio::spawn(async move {
                loop {
                    if state.is_cancelled() {
                        coordinator.cancel_all();
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
            })
        };

        let summary = coordinator.run(assignment.jobs().to_vec()).await;
        watcher.abort();
        summary.jobs
    }

    fn theme(&self, manifest: &ProjectManifest) -> MenuTheme {
        let title = if manifest.season_title.is_empty() {
            manifest.series_title.clone()
        } else {
            format!("{} - {}", manifest.series_title, manifest.season_title)
        };
        MenuTheme {
            title,
            overview: manifest.overview.clone(),
            backdrop: manifest.backdrop.clone(),
            logo: manifest.logo.clone(),
            style: self.settings.menu_style,
        }
    }

    fn check_cancelled(&self) -> Result<(), WorkflowError> {
        if self.state.is_cancelled() {
            Err(WorkflowError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Run a blocking tool invocation on the blocking pool
async fn blocking<T, E, F>(f: F) -> Result<T, WorkflowError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    WorkflowError: From<E>,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_fixtures::{episodes, fake_ffmpeg, fake_tool};
    use std::fs;
    use tempfile::TempDir;

    const FAKE_DVDAUTHOR: &str = "mkdir -p DVD/VIDEO_TS && touch DVD/VIDEO_TS/VIDEO_TS.IFO";

    const FAKE_MKISOFS: &str = r#"while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo iso > "$out""#;

    struct Fixture {
        dir: TempDir,
        settings: AppSettings,
        tools: Toolchain,
    }

    fn fixture(ffmpeg_body: Option<&str>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("bin");
        fs::create_dir_all(&bin).unwrap();

        let ffmpeg = match ffmpeg_body {
            Some(body) => fake_tool(&bin, "ffmpeg", body),
            None => fake_ffmpeg(&bin, 1200),
        };
        let tools = Toolchain {
            ffmpeg,
            ffprobe: Some(fake_tool(&bin, "ffprobe", "echo 1800.0")),
            dvdauthor: fake_tool(&bin, "dvdauthor", FAKE_DVDAUTHOR),
            iso: IsoTool::Mkisofs(fake_tool(&bin, "mkisofs", FAKE_MKISOFS)),
            burner: None,
        };
        let settings = AppSettings {
            staging_dir: Some(dir.path().join("stage")),
            output_dir: Some(dir.path().join("out")),
            max_parallel_encodes: Some(2),
            ..Default::default()
        };
        Fixture { dir, settings, tools }
    }

    fn workflow(f: &Fixture) -> AuthoringWorkflow {
        AuthoringWorkflow::new(f.settings.clone(), f.tools.clone())
            .with_renderer(OverlayRenderer::with_font(
                LayoutConfig::for_standard(f.settings.video_standard),
                None,
            ))
    }

    fn manifest(count: u32, minutes: f64) -> ProjectManifest {
        ProjectManifest::new("Show".into(), "Season 1".into(), episodes(count, minutes))
    }

    fn button_commands(descriptor: &Path) -> Vec<String> {
        let xml = fs::read_to_string(descriptor).unwrap();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        doc.descendants()
            .filter(|n| n.has_tag_name("button") && n.text().is_some())
            .map(|n| n.text().unwrap().trim().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_single_disc_end_to_end() {
        let f = fixture(None);
        let run = workflow(&f).author_all(&manifest(3, 20.0)).await.unwrap();

        assert_eq!(run.plan.len(), 1);
        assert_eq!(run.discs.len(), 1);
        let disc = &run.discs[0];
        assert!(disc.is_success(), "{:?}", disc.error);
        assert_eq!(disc.encoded, vec![1, 2, 3]);
        assert!(disc.omitted.is_empty());

        let iso = f.dir.path().join("out/Show_Season 1_Disc1.iso");
        assert_eq!(disc.iso.as_deref(), Some(iso.as_path()));
        assert!(iso.exists());

        let work = f.dir.path().join("stage/disc1");
        assert!(work.join("menu_background.png").exists());
        assert!(work.join("menu.mpg").exists());
        assert!(work.join("chapters.txt").exists());
        assert_eq!(
            button_commands(&work.join(DESCRIPTOR_FILE)),
            vec!["jump title 1;", "jump title 2;", "jump title 3;"]
        );
    }

    #[tokio::test]
    async fn test_failed_encode_is_compacted() {
        let f = fixture(Some(
            r#"for last; do :; done
case "$last" in
  *ep02*) echo "Invalid data found when processing input" >&2; exit 1 ;;
esac
echo ok > "$last""#,
        ));
        let wf = workflow(&f);
        let run = wf.author_all(&manifest(3, 20.0)).await.unwrap();

        let disc = &run.discs[0];
        assert!(disc.is_success(), "{:?}", disc.error);
        assert_eq!(disc.planned, vec![1, 2, 3]);
        assert_eq!(disc.encoded, vec![1, 3]);
        assert_eq!(disc.omitted.len(), 1);
        assert_eq!(disc.omitted[0].0, 2);
        assert!(disc.omitted[0].1.contains("Invalid data"));

        // Button 2 now jumps to title 2, which is episode 3
        let work = f.dir.path().join("stage/disc1");
        assert_eq!(
            button_commands(&work.join(DESCRIPTOR_FILE)),
            vec!["jump title 1;", "jump title 2;"]
        );
        assert_eq!(wf.state().progress(), (1, 1, 2, 1));
    }

    #[tokio::test]
    async fn test_failed_disc_does_not_stop_next() {
        // Eight short episodes span two discs at six titles per menu
        let f = fixture(Some(
            r#"for last; do :; done
case "$last" in
  *ep0[1-6].mpg) exit 1 ;;
esac
echo ok > "$last""#,
        ));
        let run = workflow(&f).author_all(&manifest(8, 10.0)).await.unwrap();

        assert_eq!(run.discs.len(), 2);
        assert!(matches!(run.discs[0].error, Some(WorkflowError::NothingEncoded(1))));
        assert!(run.discs[1].is_success(), "{:?}", run.discs[1].error);
        assert_eq!(run.discs[1].encoded, vec![7, 8]);
        assert_eq!(run.iso_paths().len(), 1);
    }

    #[tokio::test]
    async fn test_oversize_episode_aborts_before_encoding() {
        let f = fixture(None);
        let result = workflow(&f).author_all(&manifest(1, 800.0)).await;
        assert!(matches!(result, Err(WorkflowError::Plan(PlanError::Overflow { .. }))));
        assert!(!f.dir.path().join("stage/disc1").exists());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let f = fixture(None);
        let wf = workflow(&f);
        let m = manifest(2, 20.0);

        wf.state().request_cancel();
        let plan = wf.plan(&m.resolved_episodes()).unwrap();
        let outcome = wf.author_disc(&m, &wf.theme(&m), &plan[0]).await;
        assert!(matches!(outcome.error, Some(WorkflowError::Cancelled)));
        assert!(outcome.iso.is_none());
    }

    #[tokio::test]
    async fn test_cancel_during_encode_stops_every_disc() {
        let f = fixture(Some(
            r#"for last; do :; done
echo partial > "$last"
exec sleep 30"#,
        ));
        let wf = workflow(&f);
        let state = wf.state().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            state.request_cancel();
        });

        let started = std::time::Instant::now();
        let run = wf.author_all(&manifest(8, 10.0)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));

        assert_eq!(run.discs.len(), 2);
        for disc in &run.discs {
            assert!(matches!(disc.error, Some(WorkflowError::Cancelled)), "{:?}", disc.error);
            assert!(disc.iso.is_none());
        }
        assert_eq!(wf.state().get_stage(), WorkflowStage::Cancelled);

        // Interrupted titles are removed
        let titles = f.dir.path().join("stage/titles");
        let leftovers = fs::read_dir(&titles).map(|d| d.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);
        assert!(!f.dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_menu_settings_reach_layers_and_buttons() {
        let mut f = fixture(None);
        f.settings.menu.columns = 1;
        f.settings.menu.highlight_color = [0, 255, 0];
        let wf = AuthoringWorkflow::new(f.settings.clone(), f.tools.clone());
        let run = wf.author_all(&manifest(2, 20.0)).await.unwrap();
        assert!(run.discs[0].is_success(), "{:?}", run.discs[0].error);

        let work = f.dir.path().join("stage/disc1");
        let highlight = image::open(work.join("menu_highlight.png")).unwrap().to_rgba8();
        assert!(highlight.pixels().any(|p| p.0 == [0, 255, 0, 255]));
        assert!(!highlight.pixels().any(|p| p.0 == [255, 215, 0, 255]));

        // One column: the buttons stack and down leads to the next one
        let xml = fs::read_to_string(work.join(DESCRIPTOR_FILE)).unwrap();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let buttons: Vec<_> = doc
            .descendants()
            .filter(|n| n.has_tag_name("button") && n.attribute("x0").is_some())
            .collect();
        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[0].attribute("x0"), buttons[1].attribute("x0"));
        assert_eq!(buttons[0].attribute("down"), buttons[1].attribute("name"));
    }

    #[tokio::test]
    async fn test_authoring_does_not_block_runtime() {
        let mut f = fixture(None);
        f.tools.dvdauthor = fake_tool(
            &f.dir.path().join("bin"),
            "dvdauthor",
            &format!("sleep 1; {}", FAKE_DVDAUTHOR),
        );
        let wf = workflow(&f);

        // Counts ticks of a sibling task while dvdauthor runs
        let ticks = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            let state = wf.state().clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    if state.get_stage() == WorkflowStage::Authoring {
                        ticks.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    }
                }
            })
        };

        let run = wf.author_all(&manifest(2, 20.0)).await.unwrap();
        ticker.abort();

        assert!(run.discs[0].is_success(), "{:?}", run.discs[0].error);
        assert!(ticks.load(std::sync::atomic::Ordering::SeqCst) > 5);
    }

    #[test]
    fn test_plan_limits_titles_to_menu_page() {
        let f = fixture(None);
        let plan = workflow(&f).plan(&episodes(8, 10.0)).unwrap();
        let sizes: Vec<usize> = plan.iter().map(|d| d.jobs().len()).collect();
        assert_eq!(sizes, vec![6, 2]);
    }

    #[test]
    fn test_probe_fills_unknown_durations() {
        let f = fixture(None);
        let mut eps = episodes(2, 20.0);
        eps[1].duration_seconds = 0.0;
        let probed = workflow(&f).probe_durations(eps);
        assert_eq!(probed[0].duration_seconds, 1200.0);
        assert_eq!(probed[1].duration_seconds, 1800.0);
    }

    #[test]
    fn test_theme_heading() {
        let f = fixture(None);
        let mut m = manifest(1, 20.0);
        m.overview = "A crew of smugglers.".into();
        let theme = workflow(&f).theme(&m);
        assert_eq!(theme.title, "Show - Season 1");
        assert_eq!(theme.overview, "A crew of smugglers.");
    }
}
