//! Source media model: probed metadata, registered files, and segments.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::ids::{MediaFileId, SegmentId};

// ---------------------------------------------------------------------------
// MediaInfo
// ---------------------------------------------------------------------------

/// Probed properties of the primary video stream of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    /// Frame rate numerator.
    pub fps_num: u32,
    /// Frame rate denominator, never zero.
    pub fps_den: u32,
    /// Container duration in seconds.
    pub duration: f64,
    pub codec: String,
    pub pix_fmt: String,
    /// Overall bitrate in bits per second, when reported.
    pub bitrate: Option<u64>,
}

impl MediaInfo {
    /// Frames per second derived from the rational frame rate.
    pub fn fps(&self) -> f64 {
        if self.fps_den == 0 {
            return f64::from(self.fps_num);
        }
        f64::from(self.fps_num) / f64::from(self.fps_den)
    }

    /// One-line summary: `1920×1080 • 29.97 fps • h264 • 1m05s • 4500 kbps`.
    pub fn badge(&self) -> String {
        let fps = self.fps();
        let fps_text = if fps > 0.0 {
            format!("{fps:.2}")
        } else {
            "?".to_string()
        };
        let total = self.duration.max(0.0);
        let minutes = (total / 60.0).floor() as u64;
        let seconds = (total % 60.0).round() as u64;
        let bitrate = self
            .bitrate
            .map(|b| format!(" • {} kbps", b / 1000))
            .unwrap_or_default();
        format!(
            "{}×{} • {} fps • {} • {}m{:02}s{}",
            self.width, self.height, fps_text, self.codec, minutes, seconds, bitrate
        )
    }
}

// ---------------------------------------------------------------------------
// MediaFile
// ---------------------------------------------------------------------------

/// A source file registered by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: MediaFileId,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<MediaInfo>,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            id: MediaFileId::new(),
            path: path.into(),
            info: None,
        }
    }

    pub fn with_info(mut self, info: MediaInfo) -> Self {
        self.info = Some(info);
        self
    }
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// Shortest accepted segment, in seconds.
pub const MIN_SEGMENT_DURATION: f64 = 0.001;

/// A `[start, end)` range of one source file with its global merge order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub file_id: MediaFileId,
    /// Start in seconds.
    pub start: f64,
    /// End in seconds (exclusive).
    pub end: f64,
    /// Position in the concatenated output, across all files.
    pub order: i64,
}

impl Segment {
    /// Create a segment with a fresh id.
    pub fn new(file_id: MediaFileId, start: f64, end: f64, order: i64) -> Self {
        Self {
            id: SegmentId::new(),
            file_id,
            start,
            end,
            order,
        }
    }

    /// Length of the range in seconds (zero for inverted ranges).
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Check `0 <= start < end` with finite bounds, at least
    /// [`MIN_SEGMENT_DURATION`] apart.
    pub fn validate(&self) -> Result<()> {
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(Error::invalid_segment(self.id, "bounds must be finite"));
        }
        if self.start < 0.0 {
            return Err(Error::invalid_segment(
                self.id,
                format!("start {:.3}s is negative", self.start),
            ));
        }
        if self.end <= self.start {
            return Err(Error::invalid_segment(
                self.id,
                format!(
                    "end {:.3}s must be after start {:.3}s",
                    self.end, self.start
                ),
            ));
        }
        if self.duration() < MIN_SEGMENT_DURATION {
            return Err(Error::invalid_segment(
                self.id,
                format!(
                    "{:.6}s is shorter than the minimum of {MIN_SEGMENT_DURATION}s",
                    self.duration()
                ),
            ));
        }
        Ok(())
    }
}

/// Sort segments by `order`, keeping insertion order for equal values.
pub fn sort_by_order(segments: &mut [Segment]) {
    // `sort_by_key` is stable, which gives the insertion tie-break.
    segments.sort_by_key(|s| s.order);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> MediaInfo {
        MediaInfo {
            width: 1920,
            height: 1080,
            fps_num: 30000,
            fps_den: 1001,
            duration: 65.2,
            codec: "h264".into(),
            pix_fmt: "yuv420p".into(),
            bitrate: Some(4_500_000),
        }
    }

    #[test]
    fn fps_from_rational() {
        assert!((info().fps() - 29.97).abs() < 0.01);
    }

    #[test]
    fn fps_with_zero_denominator() {
        let mut i = info();
        i.fps_num = 25;
        i.fps_den = 0;
        assert_eq!(i.fps(), 25.0);
    }

    #[test]
    fn badge_text() {
        assert_eq!(
            info().badge(),
            "1920×1080 • 29.97 fps • h264 • 1m05s • 4500 kbps"
        );
    }

    #[test]
    fn badge_without_bitrate_or_fps() {
        let mut i = info();
        i.bitrate = None;
        i.fps_num = 0;
        i.fps_den = 1;
        assert_eq!(i.badge(), "1920×1080 • ? fps • h264 • 1m05s");
    }

    #[test]
    fn segment_duration() {
        let seg = Segment::new(MediaFileId::new(), 10.0, 12.5, 0);
        assert_eq!(seg.duration(), 2.5);
        assert!(seg.validate().is_ok());
    }

    #[test]
    fn segment_rejects_inverted_range() {
        let seg = Segment::new(MediaFileId::new(), 5.0, 5.0, 0);
        assert!(matches!(seg.validate(), Err(Error::InvalidSegment { .. })));
        let seg = Segment::new(MediaFileId::new(), 6.0, 5.0, 0);
        assert!(seg.validate().is_err());
        assert_eq!(seg.duration(), 0.0);
    }

    #[test]
    fn segment_rejects_sub_millisecond_range() {
        let seg = Segment::new(MediaFileId::new(), 1.0001, 1.0004, 0);
        assert!(matches!(seg.validate(), Err(Error::InvalidSegment { .. })));
        let seg = Segment::new(MediaFileId::new(), 1.0, 1.002, 0);
        assert!(seg.validate().is_ok());
    }

    #[test]
    fn segment_rejects_negative_and_nan() {
        assert!(Segment::new(MediaFileId::new(), -1.0, 5.0, 0)
            .validate()
            .is_err());
        assert!(Segment::new(MediaFileId::new(), 0.0, f64::NAN, 0)
            .validate()
            .is_err());
    }

    #[test]
    fn sort_is_global_and_stable() {
        let a = MediaFileId::new();
        let b = MediaFileId::new();
        let mut segs = vec![
            Segment::new(a, 0.0, 1.0, 3),
            Segment::new(b, 0.0, 1.0, 1),
            Segment::new(a, 2.0, 3.0, 2),
            Segment::new(b, 4.0, 5.0, 1),
        ];
        let tie_first = segs[1].id;
        let tie_second = segs[3].id;
        sort_by_order(&mut segs);
        let orders: Vec<i64> = segs.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 1, 2, 3]);
        assert_eq!(segs[0].id, tie_first);
        assert_eq!(segs[1].id, tie_second);
    }
}
