//! Per-frame scan feedback rendering.

use super::{Color, OverlaySurface};
use crate::consensus::Verdict;
use crate::decode::{ProcessedFrame, RegionOfInterest};
use crate::geometry::{Point, Rect};

/// Colours and sizes used by the overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    /// Scan region outline.
    pub target: Color,
    /// Located-but-undecoded candidate (low emphasis).
    pub candidate: Color,
    /// Decoded barcode box.
    pub decoded: Color,
    /// Consensus progress bar.
    pub progress: Color,
    /// Full-width bar shown once a code is confirmed.
    pub confirmed: Color,
    pub line_width: u32,
    pub bar_height: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            target: Color::rgba(255, 255, 255, 160),
            candidate: Color::rgba(0, 200, 0, 110),
            decoded: Color::rgba(0, 255, 0, 255),
            progress: Color::rgba(255, 200, 0, 230),
            confirmed: Color::rgba(0, 255, 0, 255),
            line_width: 2,
            bar_height: 6,
        }
    }
}

/// Draws live feedback for each processed frame.
///
/// Rendering happens on the decoder's cadence: the session calls
/// [`render`](OverlayRenderer::render) once per processed frame. A missing
/// surface is a no-op, since it usually means the host is tearing down.
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    region: RegionOfInterest,
    style: OverlayStyle,
    frames_rendered: u64,
}

impl OverlayRenderer {
    pub fn new(region: RegionOfInterest, style: OverlayStyle) -> Self {
        Self {
            region,
            style,
            frames_rendered: 0,
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Redraws the overlay for one processed frame.
    ///
    /// `verdict` is the consensus outcome for the frame's decoded code,
    /// if it had one.
    pub fn render(
        &mut self,
        surface: Option<&mut dyn OverlaySurface>,
        frame: &ProcessedFrame,
        verdict: Option<&Verdict>,
    ) {
        let Some(surface) = surface else {
            return;
        };
        surface.clear();

        let (width, height) = surface.size();
        if width == 0 || height == 0 || frame.width == 0 || frame.height == 0 {
            return;
        }
        self.frames_rendered += 1;

        let sx = width as f32 / frame.width as f32;
        let sy = height as f32 / frame.height as f32;
        let style = self.style;

        // Target region
        let target = self.region.to_rect(width, height);
        surface.stroke_rect(target, style.target, 1);

        if let Some(detection) = &frame.detection {
            if let Some(region) = &detection.region {
                let scaled: Vec<Point> = region.iter().map(|p| p.scale(sx, sy)).collect();
                if detection.is_decoded() {
                    surface.stroke_polygon(&scaled, style.decoded, style.line_width * 2);
                } else {
                    surface.stroke_polygon(&scaled, style.candidate, 1);
                }
            }
        }

        match verdict {
            Some(Verdict::Confirmed(_)) => {
                surface.fill_rect(self.bar(width, height, width), style.confirmed);
            }
            Some(progress @ Verdict::Accumulating { .. }) => {
                let filled = (width as f32 * progress.progress()).round() as u32;
                surface.fill_rect(self.bar(width, height, filled), style.progress);
            }
            None => {}
        }
    }

    fn bar(&self, width: u32, height: u32, filled: u32) -> Rect {
        let bar_height = self.style.bar_height.min(height);
        Rect::new(0, height - bar_height, filled.min(width), bar_height)
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(RegionOfInterest::full(), OverlayStyle::default())
    }
}
