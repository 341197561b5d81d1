//! DVD burning using growisofs or hdiutil

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::conversion::{locate_any, stderr_tail, ToolError};

/// Progress callback type for burn operations (0-100, or -1 for indeterminate)
pub type ProgressCallback = Arc<dyn Fn(i32) + Send + Sync>;

/// Device used by growisofs when none is configured
pub const DEFAULT_DEVICE: &str = "/dev/sr0";

/// How long a cancelled burner gets to exit before it is killed
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Upper bound for an eject or tray-close command
const TRAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Burn failures
#[derive(Debug, thiserror::Error)]
pub enum BurnError {
    #[error("ISO file not found: {0}")]
    IsoNotFound(PathBuf),
    #[error("Failed to execute {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Burn process failed: {0}")]
    Failed(String),
    #[error("Burn cancelled by user")]
    Cancelled,
}

/// The external program that writes the disc
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BurnTool {
    Growisofs(PathBuf),
    Hdiutil(PathBuf),
}

impl BurnTool {
    /// Find growisofs, falling back to hdiutil
    pub fn discover(overrides: &HashMap<String, PathBuf>) -> Result<Self, ToolError> {
        let (name, path) = locate_any(&["growisofs", "hdiutil"], overrides)?;
        Ok(if name == "hdiutil" {
            BurnTool::Hdiutil(path)
        } else {
            BurnTool::Growisofs(path)
        })
    }

    pub fn program(&self) -> &Path {
        match self {
            BurnTool::Growisofs(p) | BurnTool::Hdiutil(p) => p,
        }
    }

    /// Arguments to burn `iso_path`
    pub fn args(&self, iso_path: &Path, device: Option<&str>, speed: u32) -> Vec<String> {
        let iso = iso_path.to_string_lossy().into_owned();
        match self {
            BurnTool::Growisofs(_) => vec![
                "-dvd-compat".to_string(),
                format!("-speed={}", speed.max(1)),
                "-Z".to_string(),
                format!("{}={}", device.unwrap_or(DEFAULT_DEVICE), iso),
            ],
            BurnTool::Hdiutil(_) => {
                let mut args = vec![
                    "burn".to_string(),
                    "-noverifyburn".to_string(),
                    "-puppetstrings".to_string(),
                ];
                if let Some(device) = device {
                    args.push("-device".to_string());
                    args.push(device.to_string());
                }
                args.push(iso);
                args
            }
        }
    }
}

/// Parse a progress percentage from burner output
///
/// Understands growisofs lines such as
/// `  147423232/4697620480 ( 3.1%) @3.2x, remaining 11:45` and hdiutil
/// puppetstrings lines such as `PERCENT:12.5` (`-1` means indeterminate).
pub fn parse_burn_progress(line: &str) -> Option<i32> {
    if let Some(rest) = line.trim().strip_prefix("PERCENT:") {
        let value = rest.trim().parse::<f64>().ok()?;
        return Some(if value < 0.0 { -1 } else { value.round().min(100.0) as i32 });
    }

    let before = &line[..line.find('%')?];
    let token = before.split_whitespace().last()?.trim_start_matches('(');
    let value = token.parse::<f64>().ok()?;
    (0.0..=100.0).contains(&value).then(|| value.round() as i32)
}

/// Burn an ISO file with cancellation support
///
/// Blocks until the burner exits. Output is read on helper threads so
/// cancellation is checked every 100 ms.
///
/// # Arguments
/// * `tool` - Burner to run
/// * `iso_path` - Path to the ISO file to burn
/// * `device` - Target device (growisofs defaults to `/dev/sr0`)
/// * `speed` - Write speed multiplier
/// * `on_progress` - Optional callback for progress updates
/// * `cancel_token` - Optional cancellation token to abort the burn
pub fn burn_iso_with_cancel(
    tool: &BurnTool,
    iso_path: &Path,
    device: Option<&str>,
    speed: u32,
    on_progress: Option<ProgressCallback>,
    cancel_token: Option<Arc<AtomicBool>>,
) -> Result<(), BurnError> {
    if !iso_path.exists() {
        return Err(BurnError::IsoNotFound(iso_path.to_path_buf()));
    }

    let args = tool.args(iso_path, device, speed);
    log::info!("Starting burn: {} {}", tool.program().display(), args.join(" "));

    let mut child = Command::new(tool.program())
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| BurnError::Spawn {
            tool: tool.program().display().to_string(),
            source,
        })?;

    // growisofs reports on stderr, hdiutil on stdout
    let captured = Arc::new(Mutex::new(String::new()));
    let readers: Vec<_> = [
        child.stdout.take().map(|s| Box::new(s) as Box<dyn Read + Send>),
        child.stderr.take().map(|s| Box::new(s) as Box<dyn Read + Send>),
    ]
    .into_iter()
    .flatten()
    .map(|stream| {
        let on_progress = on_progress.clone();
        let captured = captured.clone();
        std::thread::spawn(move || {
            for line in BufReader::new(stream).lines().map_while(Result::ok) {
                if let Some(percent) = parse_burn_progress(&line) {
                    if let Some(callback) = &on_progress {
                        callback(percent);
                    }
                } else {
                    let mut captured = captured.lock().unwrap_or_else(PoisonError::into_inner);
                    captured.push_str(&line);
                    captured.push('\n');
                }
            }
        })
    })
    .collect();

    let join_readers = |readers: Vec<std::thread::JoinHandle<()>>| {
        for reader in readers {
            let _ = reader.join();
        }
    };

    loop {
        if let Some(token) = &cancel_token
            && token.load(Ordering::SeqCst)
        {
            log::info!("Burn cancelled - stopping {}", tool.program().display());
            terminate(&mut child);
            join_readers(readers);
            return Err(BurnError::Cancelled);
        }

        match child.try_wait() {
            Ok(Some(status)) => {
                join_readers(readers);
                if status.success() {
                    log::info!("Burn completed successfully");
                    return Ok(());
                }
                let output = captured.lock().unwrap_or_else(PoisonError::into_inner);
                return Err(BurnError::Failed(stderr_tail(&output)));
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(100)),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                join_readers(readers);
                return Err(BurnError::Failed(format!("Error checking burn process: {}", e)));
            }
        }
    }
}

/// Ask the burner to stop, then kill it if it does not exit in time
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        // SIGTERM lets growisofs close the session instead of leaving the
        // drive in an unfinished write
        unsafe {
            libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
        }
        let deadline = Instant::now() + TERMINATE_GRACE;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = child.try_wait() {
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Optical drives attached to this machine
///
/// Linux lists `/dev/sr*` then `/dev/dvd*`; macOS asks `diskutil list`.
pub fn detect_drives() -> Vec<String> {
    #[cfg(target_os = "macos")]
    {
        match Command::new("diskutil").arg("list").stdin(Stdio::null()).output() {
            Ok(output) => parse_diskutil_drives(&String::from_utf8_lossy(&output.stdout)),
            Err(e) => {
                log::debug!("diskutil unavailable: {}", e);
                Vec::new()
            }
        }
    }
    #[cfg(not(target_os = "macos"))]
    {
        optical_devices_in(Path::new("/dev"))
    }
}

/// Optical device nodes (`sr<N>`, `dvd*`) in `dev_dir`, sorted per family
pub fn optical_devices_in(dev_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dev_dir) else {
        return Vec::new();
    };
    let names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();

    let is_sr = |name: &str| {
        name.strip_prefix("sr")
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
    };
    let mut sr: Vec<&String> = names.iter().filter(|n| is_sr(n.as_str())).collect();
    let mut dvd: Vec<&String> = names.iter().filter(|n| n.starts_with("dvd")).collect();
    sr.sort();
    dvd.sort();

    sr.into_iter()
        .chain(dvd)
        .map(|name| dev_dir.join(name).to_string_lossy().into_owned())
        .collect()
}

/// Device paths of the DVD/CD entries in `diskutil list` output
pub fn parse_diskutil_drives(output: &str) -> Vec<String> {
    let mut drives: Vec<String> = Vec::new();
    for line in output.lines().filter(|l| l.contains("DVD") || l.contains("CD")) {
        let Some(last) = line.split_whitespace().last() else {
            continue;
        };
        let device = if last.starts_with("/dev/") {
            last.to_string()
        } else {
            format!("/dev/{}", last)
        };
        if !drives.contains(&device) {
            drives.push(device);
        }
    }
    drives
}

/// Tray movement between discs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayAction {
    Eject,
    Close,
}

/// Program and arguments that move the tray of `device`
pub fn tray_command(action: TrayAction, device: Option<&str>) -> (&'static str, Vec<String>) {
    if cfg!(target_os = "macos") {
        let verb = match action {
            TrayAction::Eject => "eject",
            TrayAction::Close => "close",
        };
        return ("drutil", vec!["tray".to_string(), verb.to_string()]);
    }

    let device = device.unwrap_or(DEFAULT_DEVICE).to_string();
    match action {
        TrayAction::Eject => ("eject", vec![device]),
        TrayAction::Close => ("eject", vec!["-t".to_string(), device]),
    }
}

/// Open the tray of `device`; false when the drive could not be ejected
pub fn eject_tray(device: Option<&str>) -> bool {
    let (program, args) = tray_command(TrayAction::Eject, device);
    run_tray_command(Path::new(program), &args, TRAY_TIMEOUT)
}

/// Pull the tray of `device` back in; false when that is not possible
pub fn close_tray(device: Option<&str>) -> bool {
    let (program, args) = tray_command(TrayAction::Close, device);
    run_tray_command(Path::new(program), &args, TRAY_TIMEOUT)
}

fn run_tray_command(program: &Path, args: &[String], timeout: Duration) -> bool {
    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            log::warn!("Failed to move disc tray with {}: {}", program.display(), e);
            return false;
        }
    };

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    log::warn!("{} {} exited with {}", program.display(), args.join(" "), status);
                }
                return status.success();
            }
            Ok(None) if Instant::now() < deadline => std::thread::sleep(Duration::from_millis(50)),
            Ok(None) => {
                log::warn!("{} timed out after {:?}", program.display(), timeout);
                let _ = child.kill();
                let _ = child.wait();
                return false;
            }
            Err(e) => {
                log::warn!("Error waiting for {}: {}", program.display(), e);
                let _ = child.kill();
                let _ = child.wait();
                return false;
            }
        }
    }
}
