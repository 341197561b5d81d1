//! ffmpeg `-progress` stream parsing
//!
//! ffmpeg writes blocks of `key=value` lines; only `out_time_us` and the
//! final `progress=end` matter here. Anything else, including malformed
//! values such as `out_time_us=N/A`, is skipped.

/// A line of the progress stream that carries information
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressLine {
    /// Output timestamp in microseconds
    OutTime(u64),
    /// `progress=end`
    End,
}

/// Parse one line; `None` for anything unrecognised
pub fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let (key, value) = line.trim().split_once('=')?;
    match key.trim() {
        "out_time_us" | "out_time_ms" => value.trim().parse::<i64>().ok().map(|v| ProgressLine::OutTime(v.max(0) as u64)),
        "progress" if value.trim() == "end" => Some(ProgressLine::End),
        _ => None,
    }
}

/// Converts progress lines to a monotonic fraction of a known duration
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    duration_seconds: f64,
    fraction: f64,
}

impl ProgressTracker {
    pub fn new(duration_seconds: f64) -> Self {
        let duration_seconds = if duration_seconds.is_finite() && duration_seconds > 0.0 {
            duration_seconds
        } else {
            0.0
        };
        Self {
            duration_seconds,
            fraction: 0.0,
        }
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Feed one line; returns the new fraction when it advanced
    ///
    /// Without a known duration only `progress=end` moves the fraction.
    pub fn observe(&mut self, line: &str) -> Option<f64> {
        let candidate = match parse_progress_line(line)? {
            ProgressLine::OutTime(us) if self.duration_seconds > 0.0 => {
                (us as f64 / 1_000_000.0 / self.duration_seconds).clamp(0.0, 1.0)
            }
            ProgressLine::OutTime(_) => return None,
            ProgressLine::End => 1.0,
        };

        if candidate > self.fraction {
            self.fraction = candidate;
            Some(candidate)
        } else {
            None
        }
    }
}
