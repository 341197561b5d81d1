//! Parallel title encoding using tokio
//!
//! Runs one external ffmpeg process per transcode job on a worker pool sized
//! from the CPU count. Each job parses its own progress stream and can be
//! cancelled individually; a failed or cancelled job never affects its
//! siblings, and jobs that already completed stay valid.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch, Semaphore};

use super::background::EncodeEvent;
use super::ffmpeg::{extract_subtitles, stderr_tail, transcode_args, EncodeSettings};
use super::progress::ProgressTracker;
use crate::core::{JobId, JobStatus, TranscodeJob};

/// Per-job encode failures
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("encoder exited with status {code:?}: {stderr_tail}")]
    ExitStatus {
        code: Option<i32>,
        stderr_tail: String,
    },
    #[error("encoder finished but {0} was not written")]
    MissingOutput(PathBuf),
    #[error("encode cancelled")]
    Cancelled,
    #[error("I/O error during encode: {0}")]
    Io(#[from] std::io::Error),
}

/// Calculate the number of parallel encodes based on CPU cores
///
/// MPEG-2 encodes are heavy, so this uses 75% of cores clamped to 1-4.
pub fn calculate_worker_count() -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2);

    ((available as f32 * 0.75).ceil() as usize).clamp(1, 4)
}

/// Outcome of encoding one disc's jobs
#[derive(Debug, Clone)]
pub struct EncodeSummary {
    /// Jobs in their original order, each in a terminal state
    pub jobs: Vec<TranscodeJob>,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl EncodeSummary {
    fn from_jobs(jobs: Vec<TranscodeJob>, cancelled: bool) -> Self {
        let completed = jobs
            .iter()
            .filter(|j| j.status() == JobStatus::Complete)
            .count();
        let failed = jobs.len() - completed;
        Self {
            jobs,
            completed,
            failed,
            cancelled,
        }
    }

    /// Successfully encoded jobs, in plan order
    pub fn succeeded(&self) -> impl Iterator<Item = &TranscodeJob> {
        self.jobs
            .iter()
            .filter(|j| j.status() == JobStatus::Complete)
    }

    /// Jobs that failed or were cancelled
    pub fn unsuccessful(&self) -> impl Iterator<Item = &TranscodeJob> {
        self.jobs
            .iter()
            .filter(|j| j.status() != JobStatus::Complete)
    }
}

/// Shared, read-only inputs of every encode task
struct JobContext {
    ffmpeg: PathBuf,
    settings: EncodeSettings,
    events: Option<mpsc::UnboundedSender<EncodeEvent>>,
    /// ffprobe path when subtitles should be extracted
    subtitle_probe: Option<PathBuf>,
}

impl JobContext {
    fn emit(&self, event: EncodeEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Dispatches transcode jobs to external ffmpeg processes
pub struct EncodingCoordinator {
    ctx: Arc<JobContext>,
    workers: usize,
    cancels: Mutex<HashMap<JobId, watch::Sender<bool>>>,
    cancel_all: AtomicBool,
}

impl EncodingCoordinator {
    pub fn new(ffmpeg: PathBuf, settings: EncodeSettings) -> Self {
        Self {
            ctx: Arc::new(JobContext {
                ffmpeg,
                settings,
                events: None,
                subtitle_probe: None,
            }),
            workers: calculate_worker_count(),
            cancels: Mutex::new(HashMap::new()),
            cancel_all: AtomicBool::new(false),
        }
    }

    /// Override the worker count (at least one)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Send [`EncodeEvent`]s to `tx`
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<EncodeEvent>) -> Self {
        if let Some(ctx) = Arc::get_mut(&mut self.ctx) {
            ctx.events = Some(tx);
        }
        self
    }

    /// Extract subtitles next to each completed title
    pub fn with_subtitles(mut self, ffprobe: PathBuf) -> Self {
        if let Some(ctx) = Arc::get_mut(&mut self.ctx) {
            ctx.subtitle_probe = Some(ffprobe);
        }
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Cancel one job; returns false if the job is unknown
    ///
    /// Only that job's process is killed.
    pub fn cancel_job(&self, id: JobId) -> bool {
        let cancels = self.cancels.lock().unwrap_or_else(PoisonError::into_inner);
        match cancels.get(&id) {
            Some(tx) => {
                log::info!("Cancelling encode job {}", id);
                tx.send_replace(true);
                true
            }
            None => false,
        }
    }

    /// Cancel every registered job and stop starting new ones
    pub fn cancel_all(&self) {
        self.cancel_all.store(true, Ordering::SeqCst);
        let cancels = self.cancels.lock().unwrap_or_else(PoisonError::into_inner);
        for tx in cancels.values() {
            tx.send_replace(true);
        }
    }

    /// Encode `jobs` with at most `workers` processes at a time
    ///
    /// Returns every job in its original order with a terminal status.
    pub async fn run(&self, jobs: Vec<TranscodeJob>) -> EncodeSummary {
        let receivers: Vec<watch::Receiver<bool>> = {
            let mut cancels = self.cancels.lock().unwrap_or_else(PoisonError::into_inner);
            cancels.clear();
            let pre_cancelled = self.cancel_all.load(Ordering::SeqCst);
            jobs.iter()
                .map(|job| {
                    let (tx, rx) = watch::channel(pre_cancelled);
                    cancels.insert(job.id(), tx);
                    rx
                })
                .collect()
        };

        log::info!(
            "Starting parallel encode: {} titles with {} workers",
            jobs.len(),
            self.workers
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut slots: Vec<Option<TranscodeJob>> = vec![None; jobs.len()];
        let fallbacks = jobs.clone();
        let mut futures = FuturesUnordered::new();

        for (pos, (job, cancel)) in jobs.into_iter().zip(receivers).enumerate() {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let ctx = self.ctx.clone();

            let handle = tokio::spawn(async move {
                let job = encode_job(&ctx, job, cancel).await;
                drop(permit);
                job
            });
            futures.push(async move { (pos, handle.await) });
        }

        while let Some((pos, result)) = futures.next().await {
            match result {
                Ok(job) => slots[pos] = Some(job),
                Err(e) => log::error!("Encode task for title {} aborted: {}", pos + 1, e),
            }
        }

        let jobs: Vec<TranscodeJob> = slots
            .into_iter()
            .zip(fallbacks)
            .map(|(slot, mut original)| {
                slot.unwrap_or_else(|| {
                    original.mark_failed("encode task did not finish");
                    original
                })
            })
            .collect();

        let summary = EncodeSummary::from_jobs(jobs, self.cancel_all.load(Ordering::SeqCst));
        log::info!(
            "Encode finished: {} completed, {} failed",
            summary.completed,
            summary.failed
        );
        summary
    }
}

/// Run one job to a terminal state, emitting events along the way
async fn encode_job(
    ctx: &JobContext,
    mut job: TranscodeJob,
    mut cancel: watch::Receiver<bool>,
) -> TranscodeJob {
    job.mark_running();
    ctx.emit(EncodeEvent::Started {
        job: job.id(),
        episode_index: job.episode().index,
    });
    log::info!(
        "Encoding episode {} ({}) -> {}",
        job.episode().index,
        job.episode().title,
        job.output_path().display()
    );

    match run_ffmpeg(ctx, &mut job, &mut cancel).await {
        Ok(()) => {
            job.mark_complete();
            log::info!("Completed: {}", job.output_path().display());
            if let Some(ffprobe) = &ctx.subtitle_probe {
                extract_subtitles_async(&ctx.ffmpeg, ffprobe, &job).await;
            }
            ctx.emit(EncodeEvent::Completed {
                job: job.id(),
                output: job.output_path().to_path_buf(),
            });
        }
        Err(e) => {
            // Never leave a partial title behind
            let _ = tokio::fs::remove_file(job.output_path()).await;
            log::error!("Failed: episode {} - {}", job.episode().index, e);
            job.mark_failed(e.to_string());
            ctx.emit(EncodeEvent::Failed {
                job: job.id(),
                error: e.to_string(),
            });
        }
    }
    job
}

async fn run_ffmpeg(
    ctx: &JobContext,
    job: &mut TranscodeJob,
    cancel: &mut watch::Receiver<bool>,
) -> Result<(), EncodeError> {
    if *cancel.borrow() {
        return Err(EncodeError::Cancelled);
    }
    if let Some(parent) = job.output_path().parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let args = transcode_args(&ctx.settings, job.input(), job.output_path());
    let mut child = Command::new(&ctx.ffmpeg)
        .args(&args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| EncodeError::Spawn {
            tool: ctx.ffmpeg.display().to_string(),
            source,
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("encoder stdout was not captured"))?;
    let stderr = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut buf).await;
        }
        buf
    });

    // Raw segments: one undecodable line must not end the encode
    let mut lines = BufReader::new(stdout).split(b'\n');
    let mut tracker = ProgressTracker::new(job.duration_seconds());
    let mut cancel_open = true;

    loop {
        tokio::select! {
            cancelled = async { cancel.wait_for(|c| *c).await.is_ok() }, if cancel_open => {
                if cancelled {
                    let _ = child.kill().await;
                    stderr_task.abort();
                    return Err(EncodeError::Cancelled);
                }
                // Coordinator dropped; nobody can cancel any more
                cancel_open = false;
            }
            line = lines.next_segment() => match line? {
                Some(bytes) => {
                    let line = String::from_utf8_lossy(&bytes);
                    if let Some(fraction) = tracker.observe(line.trim_end_matches('\r')) {
                        if job.report_progress(fraction) {
                            ctx.emit(EncodeEvent::Progress { job: job.id(), fraction: job.progress() });
                        }
                    }
                }
                None => break,
            },
        }
    }

    let status = child.wait().await?;
    let stderr = stderr_task.await.unwrap_or_default();

    if !status.success() {
        return Err(EncodeError::ExitStatus {
            code: status.code(),
            stderr_tail: stderr_tail(&stderr),
        });
    }
    if !output_exists(job.output_path()).await {
        return Err(EncodeError::MissingOutput(job.output_path().to_path_buf()));
    }
    Ok(())
}

async fn output_exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

async fn extract_subtitles_async(ffmpeg: &Path, ffprobe: &Path, job: &TranscodeJob) {
    let ffmpeg = ffmpeg.to_path_buf();
    let ffprobe = ffprobe.to_path_buf();
    let input = job.input().to_string();
    let srt = job.output_path().with_extension("srt");
    let _ = tokio::task::spawn_blocking(move || extract_subtitles(&ffmpeg, &ffprobe, &input, &srt)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AudioSettings, VideoStandard};
    use crate::test_fixtures::{episode, fake_ffmpeg, fake_tool};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn settings() -> EncodeSettings {
        EncodeSettings::new(VideoStandard::Ntsc, 6_000_000, AudioSettings::default())
    }

    fn jobs(dir: &Path, count: u32, seconds: f64) -> Vec<TranscodeJob> {
        let eps: Vec<_> = (1..=count)
            .map(|i| episode(i, &format!("Episode {}", i), seconds))
            .collect();
        TranscodeJob::for_episodes(&eps, dir)
    }

    #[test]
    fn test_calculate_worker_count() {
        let count = calculate_worker_count();
        assert!((1..=4).contains(&count));
    }

    #[tokio::test]
    async fn test_empty_jobs() {
        let coord = EncodingCoordinator::new(PathBuf::from("/nonexistent/ffmpeg"), settings());
        let summary = coord.run(Vec::new()).await;
        assert!(summary.jobs.is_empty());
        assert_eq!((summary.completed, summary.failed), (0, 0));
        assert!(!summary.cancelled);
    }

    #[tokio::test]
    async fn test_missing_encoder_fails_every_job() {
        let dir = TempDir::new().unwrap();
        let coord = EncodingCoordinator::new(PathBuf::from("/nonexistent/ffmpeg"), settings());
        let summary = coord.run(jobs(dir.path(), 3, 60.0)).await;
        assert_eq!(summary.failed, 3);
        for job in &summary.jobs {
            assert_eq!(job.status(), JobStatus::Failed);
            assert!(job.error().unwrap().contains("failed to start"));
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_progress_events_and_completion() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), 60);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let coord = EncodingCoordinator::new(ffmpeg, settings())
            .with_workers(2)
            .with_events(tx);

        let input = jobs(&dir.path().join("out"), 2, 60.0);
        let first = input[0].id();
        let summary = coord.run(input).await;
        drop(coord);

        assert_eq!(summary.completed, 2);
        assert!(summary.jobs.iter().all(|j| j.progress() == 1.0));
        assert!(summary.jobs.iter().all(|j| j.output_path().exists()));
        assert_eq!(summary.jobs[0].id(), first);

        let mut fractions = Vec::new();
        let mut completed = 0;
        while let Some(event) = rx.recv().await {
            match event {
                EncodeEvent::Progress { job, fraction } if job == first => fractions.push(fraction),
                EncodeEvent::Completed { .. } => completed += 1,
                _ => {}
            }
        }
        assert_eq!(fractions, vec![0.25, 0.5, 1.0]);
        assert_eq!(completed, 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_undecodable_progress_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = fake_tool(
            dir.path(),
            "ffmpeg",
            r#"for last; do :; done
echo "out_time_us=15000000"
printf '\377\376garbage\n'
echo "out_time_us=30000000"
echo "progress=end"
echo "encoded" > "$last""#,
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let coord = EncodingCoordinator::new(ffmpeg, settings())
            .with_workers(1)
            .with_events(tx);

        let summary = coord.run(jobs(&dir.path().join("out"), 1, 60.0)).await;
        drop(coord);

        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 0);
        let job = &summary.jobs[0];
        assert_eq!(job.status(), JobStatus::Complete);
        assert_eq!(job.progress(), 1.0);
        assert!(job.output_path().exists());

        let mut fractions = Vec::new();
        while let Some(event) = rx.recv().await {
            if let EncodeEvent::Progress { fraction, .. } = event {
                fractions.push(fraction);
            }
        }
        assert_eq!(fractions, vec![0.25, 0.5, 1.0]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_job_does_not_stop_siblings() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = fake_tool(
            dir.path(),
            "ffmpeg",
            r#"for last; do :; done
case "$last" in
  *ep02*) echo "Conversion failed!" >&2; exit 1 ;;
esac
echo "progress=end"
echo ok > "$last""#,
        );
        let coord = EncodingCoordinator::new(ffmpeg, settings()).with_workers(1);
        let summary = coord.run(jobs(&dir.path().join("out"), 3, 60.0)).await;

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);
        let failed = &summary.jobs[1];
        assert_eq!(failed.status(), JobStatus::Failed);
        assert!(failed.error().unwrap().contains("Conversion failed!"));
        assert!(!failed.output_path().exists());
        assert_eq!(summary.succeeded().count(), 2);
        assert_eq!(summary.unsuccessful().next().unwrap().episode().index, 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_output_is_failure() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = fake_tool(dir.path(), "ffmpeg", "exit 0");
        let coord = EncodingCoordinator::new(ffmpeg, settings());
        let summary = coord.run(jobs(dir.path(), 1, 60.0)).await;
        assert!(summary.jobs[0].error().unwrap().contains("was not written"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_one_job() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = fake_tool(
            dir.path(),
            "ffmpeg",
            r#"for last; do :; done
case "$last" in
  *ep01*) exec sleep 30 ;;
esac
echo ok > "$last""#,
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let coord = Arc::new(
            EncodingCoordinator::new(ffmpeg, settings())
                .with_workers(2)
                .with_events(tx),
        );

        let input = jobs(&dir.path().join("out"), 2, 60.0);
        let target = input[0].id();
        let runner = {
            let coord = coord.clone();
            tokio::spawn(async move { coord.run(input).await })
        };

        while let Some(event) = rx.recv().await {
            if matches!(event, EncodeEvent::Started { job, .. } if job == target) {
                break;
            }
        }
        assert!(coord.cancel_job(target));

        let summary = tokio::time::timeout(std::time::Duration::from_secs(10), runner)
            .await
            .expect("cancel should stop the job promptly")
            .unwrap();

        assert_eq!(summary.jobs[0].status(), JobStatus::Failed);
        assert_eq!(summary.jobs[0].error(), Some("encode cancelled"));
        assert_eq!(summary.jobs[1].status(), JobStatus::Complete);
        assert!(!summary.cancelled);
    }

    #[tokio::test]
    async fn test_cancel_all_before_run() {
        let dir = TempDir::new().unwrap();
        let coord = EncodingCoordinator::new(PathBuf::from("/nonexistent/ffmpeg"), settings());
        coord.cancel_all();
        let summary = coord.run(jobs(dir.path(), 2, 60.0)).await;
        assert!(summary.cancelled);
        assert!(summary.jobs.iter().all(|j| j.error() == Some("encode cancelled")));
    }

    #[test]
    fn test_cancel_unknown_job() {
        let coord = EncodingCoordinator::new(PathBuf::from("ffmpeg"), settings());
        assert!(!coord.cancel_job(JobId::new()));
    }
}
