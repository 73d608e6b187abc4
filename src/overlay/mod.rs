//! Live scan feedback drawn over the video.
//!
//! The renderer is driven once per processed frame and draws the scan
//! region, located candidates, decoded boxes and consensus progress onto
//! any [`OverlaySurface`].

mod renderer;
mod surface;

pub use renderer::{OverlayRenderer, OverlayStyle};
pub use surface::{Color, OverlaySurface, RasterOverlay};
