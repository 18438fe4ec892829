//! Parsing of ffmpeg `-progress pipe:2` output.
//!
//! ffmpeg prints `key=value` blocks terminated by `progress=continue` or
//! `progress=end`. [`ProgressParser`] accumulates one block at a time and
//! yields a [`ProgressSample`] when a block closes. Any other stderr line
//! (warnings, errors) passes through untouched.

/// Snapshot of an ffmpeg progress block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressSample {
    /// Output position in seconds.
    pub out_time: f64,
    pub frame: Option<u64>,
    pub speed: Option<String>,
    /// `progress=end` was seen.
    pub finished: bool,
}

impl ProgressSample {
    /// Share of `duration` covered so far, clamped to `0.0..=1.0`.
    pub fn fraction_of(&self, duration: f64) -> f64 {
        if duration <= 0.0 {
            return if self.finished { 1.0 } else { 0.0 };
        }
        (self.out_time / duration).clamp(0.0, 1.0)
    }
}

/// Incremental parser for ffmpeg progress lines.
#[derive(Debug, Default)]
pub struct ProgressParser {
    current: ProgressSample,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one stderr line; returns a sample when a block completes.
    pub fn feed(&mut self, line: &str) -> Option<ProgressSample> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();
        match key {
            "out_time_us" | "out_time_ms" => {
                // Both keys carry microseconds.
                if let Ok(us) = value.parse::<i64>() {
                    self.current.out_time = us.max(0) as f64 / 1_000_000.0;
                }
            }
            "frame" => self.current.frame = value.parse().ok(),
            "speed" if value != "N/A" => self.current.speed = Some(value.to_string()),
            "progress" => {
                self.current.finished = value == "end";
                return Some(self.current.clone());
            }
            _ => {}
        }
        None
    }
}
