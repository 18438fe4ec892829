//! Scale and letterbox filter chains.
//!
//! [`ScaleFilterBuilder`] turns an optional target box into an ffmpeg `-vf`
//! chain. Requested dimensions are rounded down to even numbers before they
//! reach ffmpeg, and the scaler is told to keep its own output divisible by
//! two, so the encoded frame is never odd-sized and never larger than asked.

use cutlist_core::{Error, ExportProfile, Result, Watermark};

/// Resampling algorithm used for every scale.
const SCALE_FLAGS: &str = "bicubic";

/// An ordered list of ffmpeg video filters plus the box they fit into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChain {
    filters: Vec<String>,
    width: Option<u32>,
    height: Option<u32>,
    letterbox: bool,
}

impl FilterChain {
    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// The chain as a single `-vf` argument.
    pub fn to_arg(&self) -> String {
        self.filters.join(",")
    }

    /// Even-rounded target box. `None` means the source size is kept on
    /// that axis.
    pub fn bounds(&self) -> (Option<u32>, Option<u32>) {
        (self.width, self.height)
    }

    pub fn is_letterboxed(&self) -> bool {
        self.letterbox
    }

    /// Frame size this chain produces for a `src_w`x`src_h` input.
    pub fn output_size(&self, src_w: u32, src_h: u32) -> (u32, u32) {
        if src_w == 0 || src_h == 0 {
            return (self.width.unwrap_or(0), self.height.unwrap_or(0));
        }
        let (sw, sh) = (f64::from(src_w), f64::from(src_h));
        match (self.width, self.height) {
            (Some(w), Some(h)) if self.letterbox => (w, h),
            (Some(w), Some(h)) => {
                let ratio = (f64::from(w) / sw).min(f64::from(h) / sh).min(1.0);
                (even_down(sw * ratio), even_down(sh * ratio))
            }
            (Some(w), None) => {
                let out_w = even_down(sw.min(f64::from(w)));
                (out_w, even_round(sh * f64::from(out_w) / sw))
            }
            (None, Some(h)) => {
                let out_h = even_down(sh.min(f64::from(h)));
                (even_round(sw * f64::from(out_h) / sh), out_h)
            }
            (None, None) => (src_w, src_h),
        }
    }
}

fn even_down(v: f64) -> u32 {
    let v = v.floor().max(0.0) as u32;
    (v - v % 2).max(2)
}

fn even_round(v: f64) -> u32 {
    let v = (v / 2.0).round().max(1.0) as u32;
    v * 2
}

/// Round a requested dimension down to the nearest even integer.
///
/// # Errors
///
/// [`Error::InvalidProfile`] when the value is zero or negative, or rounds
/// down to zero.
pub fn even_dimension(axis: &str, value: i32) -> Result<u32> {
    if value <= 0 {
        return Err(Error::InvalidProfile(format!(
            "target {axis} {value} must be positive"
        )));
    }
    let even = (value as u32) & !1;
    if even == 0 {
        return Err(Error::InvalidProfile(format!(
            "target {axis} {value} is too small to encode"
        )));
    }
    Ok(even)
}

/// Builds the scale (and optional pad) chain for a target box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScaleFilterBuilder {
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub letterbox: bool,
}

impl ScaleFilterBuilder {
    pub fn new(width: Option<i32>, height: Option<i32>, letterbox: bool) -> Self {
        Self {
            width,
            height,
            letterbox,
        }
    }

    pub fn from_profile(profile: &ExportProfile) -> Self {
        Self::new(profile.width, profile.height, profile.letterbox)
    }

    /// Produce the filter chain, or `None` when no scaling was requested.
    ///
    /// Letterboxing needs a full box; with only one axis set the chain is a
    /// plain aspect-preserving scale.
    pub fn build(&self) -> Result<Option<FilterChain>> {
        let width = self.width.map(|w| even_dimension("width", w)).transpose()?;
        let height = self
            .height
            .map(|h| even_dimension("height", h))
            .transpose()?;

        let chain = match (width, height) {
            (None, None) => return Ok(None),
            (Some(w), Some(h)) => {
                let mut filters = vec![format!(
                    "scale=w='min({w},iw)':h='min({h},ih)':force_original_aspect_ratio=decrease:force_divisible_by=2:flags={SCALE_FLAGS}"
                )];
                if self.letterbox {
                    filters.push(format!(
                        "pad=w={w}:h={h}:x=(ow-iw)/2:y=(oh-ih)/2:color=black"
                    ));
                    filters.push("setsar=1".to_string());
                }
                FilterChain {
                    filters,
                    width,
                    height,
                    letterbox: self.letterbox,
                }
            }
            (Some(w), None) => FilterChain {
                filters: vec![format!(
                    "scale=w='trunc(min({w},iw)/2)*2':h=-2:flags={SCALE_FLAGS}"
                )],
                width,
                height,
                letterbox: false,
            },
            (None, Some(h)) => FilterChain {
                filters: vec![format!(
                    "scale=w=-2:h='trunc(min({h},ih)/2)*2':flags={SCALE_FLAGS}"
                )],
                width,
                height,
                letterbox: false,
            },
        };

        if self.letterbox && !chain.letterbox {
            tracing::debug!("letterbox needs both width and height; scaling only");
        }

        Ok(Some(chain))
    }
}

/// Compose the scale chain and a watermark overlay into a `-filter_complex`
/// graph whose result is labelled `[vout]`.
///
/// Input 0 is the source video, input 1 the watermark image. The watermark
/// is resized to `scale_pct` percent of its own width and pinned to the
/// bottom-left corner.
pub fn watermark_graph(chain: Option<&FilterChain>, watermark: &Watermark) -> String {
    let base = chain.map(FilterChain::to_arg).unwrap_or_else(|| "null".into());
    format!(
        "[0:v]{base}[base];[1:v]scale=w=iw*{pct}/100:h=-1[wm];[base][wm]overlay=x={left}:y=H-h-{bottom}[vout]",
        pct = watermark.scale_pct,
        left = watermark.margin_left,
        bottom = watermark.margin_bottom,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(w: Option<i32>, h: Option<i32>, letterbox: bool) -> FilterChain {
        ScaleFilterBuilder::new(w, h, letterbox)
            .build()
            .unwrap()
            .unwrap()
    }

    #[test]
    fn no_target_means_no_chain() {
        assert!(ScaleFilterBuilder::default().build().unwrap().is_none());
        assert!(ScaleFilterBuilder::new(None, None, true).build().unwrap().is_none());
    }

    #[test]
    fn odd_target_rounds_down_to_even() {
        let c = chain(Some(1279), Some(719), false);
        assert_eq!(c.bounds(), (Some(1278), Some(718)));
        assert_eq!(
            c.to_arg(),
            "scale=w='min(1278,iw)':h='min(718,ih)':force_original_aspect_ratio=decrease:force_divisible_by=2:flags=bicubic"
        );

        for (sw, sh) in [(1920, 1080), (1281, 721), (4096, 2160), (640, 480), (1080, 1920)] {
            let (w, h) = c.output_size(sw, sh);
            assert!(w <= 1278 && h <= 718, "{sw}x{sh} -> {w}x{h}");
            assert_eq!(w % 2, 0);
            assert_eq!(h % 2, 0);
        }
    }

    #[test]
    fn letterbox_pads_to_box() {
        let c = chain(Some(1920), Some(1080), true);
        assert_eq!(c.filters().len(), 3);
        assert_eq!(
            c.filters()[1],
            "pad=w=1920:h=1080:x=(ow-iw)/2:y=(oh-ih)/2:color=black"
        );
        assert!(c.is_letterboxed());
        assert_eq!(c.output_size(1440, 1080), (1920, 1080));
    }

    #[test]
    fn letterbox_with_one_axis_is_plain_scale() {
        let c = chain(Some(1280), None, true);
        assert!(!c.is_letterboxed());
        assert_eq!(c.filters().len(), 1);
        assert!(c.to_arg().contains("h=-2"));
        assert_eq!(c.output_size(1920, 1080), (1280, 720));
    }

    #[test]
    fn never_upscales() {
        let c = chain(Some(3840), Some(2160), false);
        assert_eq!(c.output_size(1280, 720), (1280, 720));
        assert_eq!(c.output_size(1279, 719), (1278, 718));
    }

    #[test]
    fn rejects_non_positive() {
        for (w, h) in [(Some(0), Some(720)), (Some(1280), Some(-4)), (Some(1), None)] {
            let err = ScaleFilterBuilder::new(w, h, false).build().unwrap_err();
            assert!(matches!(err, Error::InvalidProfile(_)), "{err}");
        }
    }

    #[test]
    fn watermark_graph_labels_output() {
        let wm = Watermark::new("/logo.png");
        let c = chain(Some(1280), Some(720), false);
        let graph = watermark_graph(Some(&c), &wm);
        assert!(graph.starts_with("[0:v]scale="));
        assert!(graph.ends_with("overlay=x=16:y=H-h-16[vout]"));
        assert!(graph.contains("[1:v]scale=w=iw*20/100:h=-1[wm]"));

        let bare = watermark_graph(None, &wm);
        assert!(bare.starts_with("[0:v]null[base]"));
    }
}
