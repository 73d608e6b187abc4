//! Overlay drawing surfaces.

use crate::geometry::{Point, Rect};

/// An RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// A frame-aligned surface the overlay renderer draws on.
pub trait OverlaySurface {
    /// Surface size in pixels.
    fn size(&self) -> (u32, u32);

    /// Erases everything drawn so far.
    fn clear(&mut self);

    /// Draws a closed polygon outline.
    fn stroke_polygon(&mut self, points: &[Point], color: Color, width: u32);

    /// Fills an axis-aligned rectangle.
    fn fill_rect(&mut self, rect: Rect, color: Color);

    fn stroke_rect(&mut self, rect: Rect, color: Color, width: u32) {
        self.stroke_polygon(&rect.corners(), color, width);
    }
}

/// In-memory RGBA overlay.
///
/// Hosts without a GPU canvas can composite this buffer over the video.
#[derive(Clone)]
pub struct RasterOverlay {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterOverlay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    /// Raw RGBA bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.index(x, y);
        let p = &self.pixels[i..i + 4];
        Some(Color::rgba(p[0], p[1], p[2], p[3]))
    }

    /// Number of pixels that are not fully transparent.
    pub fn painted_pixels(&self) -> usize {
        self.pixels.chunks_exact(4).filter(|p| p[3] != 0).count()
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + x as usize) * 4
    }

    fn put(&mut self, x: i64, y: i64, color: Color) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let i = self.index(x as u32, y as u32);
        self.pixels[i..i + 4].copy_from_slice(&color.to_array());
    }

    fn dot(&mut self, x: i64, y: i64, color: Color, width: u32) {
        let half = i64::from(width.max(1) / 2);
        for dy in -half..=half {
            for dx in -half..=half {
                self.put(x + dx, y + dy, color);
            }
        }
    }

    /// Bresenham line with square pen, clipped to the surface first.
    fn line(&mut self, from: Point, to: Point, color: Color, width: u32) {
        let pad = f64::from(width.max(1) / 2);
        let max = (f64::from(self.width) - 1.0 + pad, f64::from(self.height) - 1.0 + pad);
        let Some((from, to)) = clip_segment(from, to, (-pad, -pad), max) else {
            return;
        };

        let (mut x0, mut y0) = (from.0.round() as i64, from.1.round() as i64);
        let (x1, y1) = (to.0.round() as i64, to.1.round() as i64);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.dot(x0, y0, color, width);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }
}

/// Liang-Barsky clip of a segment to an axis-aligned box.
///
/// Returns `None` when the segment misses the box or has a non-finite end.
fn clip_segment(
    from: Point,
    to: Point,
    min: (f64, f64),
    max: (f64, f64),
) -> Option<((f64, f64), (f64, f64))> {
    let (x0, y0) = (f64::from(from.x), f64::from(from.y));
    let (x1, y1) = (f64::from(to.x), f64::from(to.y));
    if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
        return None;
    }

    let (dx, dy) = (x1 - x0, y1 - y0);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    let edges = [
        (-dx, x0 - min.0),
        (dx, max.0 - x0),
        (-dy, y0 - min.1),
        (dy, max.1 - y0),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }

    Some((
        (x0 + t0 * dx, y0 + t0 * dy),
        (x0 + t1 * dx, y0 + t1 * dy),
    ))
}

impl OverlaySurface for RasterOverlay {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.pixels.fill(0);
    }

    fn stroke_polygon(&mut self, points: &[Point], color: Color, width: u32) {
        match points {
            [] => {}
            [only] => self.dot(only.x.round() as i64, only.y.round() as i64, color, width),
            _ => {
                for (i, from) in points.iter().enumerate() {
                    let to = points[(i + 1) % points.len()];
                    self.line(*from, to, color, width);
                }
            }
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let rect = rect.clamp_to(self.width, self.height);
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                let i = self.index(x, y);
                self.pixels[i..i + 4].copy_from_slice(&color.to_array());
            }
        }
    }
}

impl std::fmt::Debug for RasterOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterOverlay")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("painted", &self.painted_pixels())
            .finish()
    }
}
