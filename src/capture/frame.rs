//! Frame type representing a captured luma image with metadata.

use crate::geometry::Rect;
use std::time::Instant;

/// A single captured frame from a video track.
///
/// Pixels are 8-bit luma, row-major, tightly packed. Barcode decoding
/// only needs intensity, so colour planes are dropped at capture time.
#[derive(Clone)]
pub struct Frame {
    /// Raw luma samples.
    pixels: Vec<u8>,
    /// Frame width in pixels.
    width: u32,
    /// Frame height in pixels.
    height: u32,
    /// Capture timestamp, used for decode frequency throttling.
    timestamp: Instant,
    /// Monotonic sequence number within the producing track.
    sequence: u64,
}

impl Frame {
    /// Creates a new frame stamped with the current time.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self::with_timestamp(pixels, width, height, sequence, Instant::now())
    }

    /// Creates a frame with an explicit capture timestamp.
    pub fn with_timestamp(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        sequence: u64,
        timestamp: Instant,
    ) -> Self {
        Self {
            pixels,
            width,
            height,
            timestamp,
            sequence,
        }
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Validates that the pixel buffer size matches dimensions.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.pixel_count()
    }

    /// Copies the pixels inside `rect` into a new frame.
    ///
    /// The rectangle is clipped to the frame bounds. Timestamp and
    /// sequence are carried over so the crop still identifies its source.
    pub fn crop(&self, rect: Rect) -> Frame {
        let rect = rect.clamp_to(self.width, self.height);
        if rect == Rect::new(0, 0, self.width, self.height) {
            return self.clone();
        }

        let mut pixels = Vec::with_capacity((rect.width as usize) * (rect.height as usize));
        if self.is_valid() {
            for row in rect.y..rect.bottom() {
                let start = (row as usize) * (self.width as usize) + rect.x as usize;
                pixels.extend_from_slice(&self.pixels[start..start + rect.width as usize]);
            }
        }

        Frame {
            pixels,
            width: rect.width,
            height: rect.height,
            timestamp: self.timestamp,
            sequence: self.sequence,
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let pixels = vec![0u8; 640 * 480];
        let frame = Frame::new(pixels, 640, 480, 1);

        assert_eq!(frame.width(), 640);
        assert_eq!(frame.height(), 480);
        assert_eq!(frame.sequence(), 1);
        assert!(frame.is_valid());
    }

    #[test]
    fn test_frame_invalid_size() {
        let pixels = vec![0u8; 100]; // Wrong size
        let frame = Frame::new(pixels, 640, 480, 1);

        assert!(!frame.is_valid());
    }

    #[test]
    fn test_crop_copies_window() {
        // 4x3 frame with pixel value = index
        let frame = Frame::new((0u8..12).collect(), 4, 3, 7);
        let cropped = frame.crop(Rect::new(1, 1, 2, 2));

        assert_eq!(cropped.width(), 2);
        assert_eq!(cropped.height(), 2);
        assert_eq!(cropped.pixels(), &[5, 6, 9, 10]);
        assert_eq!(cropped.sequence(), 7);
        assert_eq!(cropped.timestamp(), frame.timestamp());
    }

    #[test]
    fn test_crop_clips_to_bounds() {
        let frame = Frame::new(vec![1u8; 16], 4, 4, 1);
        let cropped = frame.crop(Rect::new(2, 2, 10, 10));
        assert_eq!((cropped.width(), cropped.height()), (2, 2));
        assert!(cropped.is_valid());
    }
}
