//! DVD Menu Burner - command line front end
//!
//! Plans, authors and burns episode DVDs from a saved project manifest.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;

use dvd_menu_burner::burning::{
    close_tray, coordinate_burn, eject_tray, plan_discs, probe_episode_durations,
    AuthoringWorkflow, BurnConfig, BurnOutcome, BurnTool, Toolchain, WorkflowState,
};
use dvd_menu_burner::conversion::{locate_tool, EncodeEvent};
use dvd_menu_burner::core::{format_bitrate, format_duration, AppSettings, MenuStyle, VideoStandard};
use dvd_menu_burner::logging::init_logging;
use dvd_menu_burner::project::{episodes_from_directory, load_project, save_project, ProjectManifest};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Time for a drive to spin up a freshly inserted disc
const DISC_SETTLE: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "dvd-menu-burner")]
#[command(about = "Author episode DVDs with a navigable menu", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (defaults to the per-user settings)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    overrides: SettingsOverrides,
}

/// Flags that override individual settings fields
#[derive(clap::Args)]
struct SettingsOverrides {
    /// Broadcast standard
    #[arg(long, global = true, value_enum)]
    standard: Option<StandardArg>,

    /// Menu look
    #[arg(long, global = true, value_enum)]
    style: Option<StyleArg>,

    /// Directory for intermediate files
    #[arg(long, global = true)]
    staging: Option<PathBuf>,

    /// Directory for finished ISO images
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Concurrent encodes
    #[arg(short = 'j', long, global = true)]
    workers: Option<usize>,

    /// Burner device
    #[arg(long, global = true)]
    device: Option<String>,

    /// Write speed multiplier
    #[arg(long, global = true)]
    speed: Option<u32>,

    /// Don't actually burn
    #[arg(long, global = true)]
    simulate: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StandardArg {
    Ntsc,
    Pal,
}

#[derive(Clone, Copy, ValueEnum)]
enum StyleArg {
    Modern,
    Retro,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a project from a directory of episode files
    Init {
        /// Directory containing the episodes
        media_dir: PathBuf,

        /// Series name
        #[arg(long)]
        series: String,

        /// Season name
        #[arg(long, default_value = "Season 1")]
        season: String,

        /// Where to write the project file
        #[arg(short, long, default_value = "project.json")]
        project: PathBuf,
    },

    /// Show how a project spans discs
    Plan {
        /// Project file
        project: PathBuf,
    },

    /// Encode, build menus and master one ISO per disc
    Author {
        /// Project file
        project: PathBuf,

        /// Burn each ISO after authoring
        #[arg(long)]
        burn: bool,
    },

    /// Burn existing ISO images
    Burn {
        /// ISO images, in disc order
        #[arg(required = true)]
        isos: Vec<PathBuf>,
    },
}

impl SettingsOverrides {
    fn apply(&self, settings: &mut AppSettings) {
        if let Some(standard) = self.standard {
            settings.video_standard = match standard {
                StandardArg::Ntsc => VideoStandard::Ntsc,
                StandardArg::Pal => VideoStandard::Pal,
            };
        }
        if let Some(style) = self.style {
            settings.menu_style = match style {
                StyleArg::Modern => MenuStyle::Modern,
                StyleArg::Retro => MenuStyle::Retro,
            };
        }
        if let Some(dir) = &self.staging {
            settings.staging_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.output {
            settings.output_dir = Some(dir.clone());
        }
        if let Some(workers) = self.workers {
            settings.max_parallel_encodes = Some(workers.max(1));
        }
        if let Some(device) = &self.device {
            settings.burn_device = Some(device.clone());
        }
        if let Some(speed) = self.speed {
            settings.burn_speed = speed;
        }
        if self.simulate {
            settings.simulate_burn = true;
        }
    }
}

fn load_settings(cli: &Cli) -> CliResult<AppSettings> {
    let mut settings = match &cli.config {
        Some(path) => AppSettings::load_from(path)?,
        None => AppSettings::load(),
    };
    cli.overrides.apply(&mut settings);
    Ok(settings)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every disc succeeded
fn run(cli: Cli) -> CliResult<bool> {
    let settings = load_settings(&cli)?;

    match &cli.command {
        Commands::Init {
            media_dir,
            series,
            season,
            project,
        } => {
            let episodes = episodes_from_directory(media_dir)?;
            log::info!("Found {} episode(s) in {}", episodes.len(), media_dir.display());
            let manifest = ProjectManifest::new(series.clone(), season.clone(), episodes);
            save_project(&manifest, project)?;
            log::info!("Wrote project {}", project.display());
            Ok(true)
        }
        Commands::Plan { project } => {
            print_plan(&settings, project)?;
            Ok(true)
        }
        Commands::Author { project, burn } => {
            let state = interruptible_state();
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(author(settings, project, *burn, state))
        }
        Commands::Burn { isos } => {
            let state = interruptible_state();
            let tool = BurnTool::discover(&settings.tool_paths).ok();
            let paths: Vec<&Path> = isos.iter().map(PathBuf::as_path).collect();
            Ok(burn_all(tool.as_ref(), &paths, &settings, &state))
        }
    }
}

/// Workflow state that Ctrl-C cancels
fn interruptible_state() -> WorkflowState {
    let state = WorkflowState::new();
    if let Err(e) = state.cancel_on_interrupt() {
        log::warn!("Ctrl-C will not cancel cleanly: {}", e);
    }
    state
}

fn print_plan(settings: &AppSettings, project: &Path) -> CliResult<()> {
    let manifest = load_project(project)?;
    let ffprobe = locate_tool("ffprobe", &settings.tool_paths).ok();
    let episodes = probe_episode_durations(ffprobe.as_deref(), manifest.resolved_episodes());
    let plan = plan_discs(settings, &episodes)?;

    println!("{} - {}: {} disc(s)", manifest.series_title, manifest.season_title, plan.len());
    for disc in &plan {
        println!(
            "Disc {}: {} title(s), {} at {} (~{:.0} MB)",
            disc.disc_number(),
            disc.jobs().len(),
            format_duration(disc.total_minutes() * 60.0),
            format_bitrate(disc.video_bitrate()),
            disc.estimated_size_mb()
        );
        for job in disc.jobs() {
            let ep = job.episode();
            println!("  {:>3}. {} ({})", ep.index, ep.title, format_duration(ep.duration_seconds));
        }
    }
    Ok(())
}

async fn author(settings: AppSettings, project: &Path, burn: bool, state: WorkflowState) -> CliResult<bool> {
    let manifest = load_project(project)?;
    let tools = Toolchain::discover(&settings.tool_paths)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                EncodeEvent::Started { episode_index, .. } => {
                    log::info!("Encoding episode {}", episode_index)
                }
                EncodeEvent::Progress { job, fraction } => {
                    log::debug!("{}: {:.0}%", job, fraction * 100.0)
                }
                EncodeEvent::Completed { output, .. } => {
                    log::info!("Encoded {}", output.display())
                }
                EncodeEvent::Failed { error, .. } => log::warn!("Encode failed: {}", error),
            }
        }
    });

    let workflow = AuthoringWorkflow::new(settings.clone(), tools.clone())
        .with_state(state.clone())
        .with_events(tx);
    let run = workflow.author_all(&manifest).await?;
    drop(workflow);
    let _ = reporter.await;

    let mut all_ok = true;
    for disc in &run.discs {
        match (&disc.iso, &disc.error) {
            (Some(iso), None) => println!("Disc {}: {}", disc.disc_number, iso.display()),
            (_, Some(e)) => {
                all_ok = false;
                println!("Disc {}: FAILED - {}", disc.disc_number, e);
            }
            (None, None) => all_ok = false,
        }
        for (index, reason) in &disc.omitted {
            all_ok = false;
            println!("  episode {} left off: {}", index, reason);
        }
    }

    if burn && !state.is_cancelled() {
        let isos = run.iso_paths();
        let burned = tokio::task::block_in_place(|| {
            burn_all(tools.burner.as_ref(), &isos, &settings, &state)
        });
        all_ok &= burned;
    }
    Ok(all_ok)
}

/// Burn each ISO in turn, ejecting and waiting for a blank disc between them
fn burn_all(tool: Option<&BurnTool>, isos: &[&Path], settings: &AppSettings, state: &WorkflowState) -> bool {
    let config = BurnConfig::from_settings(settings).with_detected_device(tool);
    let mut all_ok = true;
    state.set_total_discs(isos.len());

    for (i, iso) in isos.iter().enumerate() {
        if i > 0 && !config.simulate && !wait_for_disc(i + 1, isos.len(), config.device.as_deref()) {
            log::info!("Burning stopped before disc {}", i + 1);
            return false;
        }
        if state.is_cancelled() {
            log::info!("Burning cancelled before disc {}", i + 1);
            return false;
        }

        state.start_disc(i + 1);
        state.set_burn_progress(-1);
        match coordinate_burn(tool, iso, state, &config) {
            BurnOutcome::Success | BurnOutcome::Simulated => {}
            BurnOutcome::Cancelled => return false,
            BurnOutcome::Error(e) => {
                log::error!("Disc {} burn failed: {}", i + 1, e);
                all_ok = false;
            }
        }
    }
    all_ok
}

/// Eject the finished disc and prompt for the next blank one
///
/// False when the user declines.
fn wait_for_disc(disc: usize, total: usize, device: Option<&str>) -> bool {
    let rule = "=".repeat(50);
    println!("\n{}\n  Please insert DISC {} of {}\n{}", rule, disc, total, rule);

    if eject_tray(device) {
        print!("Tray ejected. ");
    }
    print!("Insert a blank DVD and press Enter (q to stop): ");
    let _ = io::stdout().flush();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => false,
        Ok(_) if line.trim().eq_ignore_ascii_case("q") => false,
        Ok(_) => {
            close_tray(device);
            std::thread::sleep(DISC_SETTLE);
            println!("Disc {} loaded. Continuing...", disc);
            true
        }
    }
}
