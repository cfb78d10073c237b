//! Decoded video frames and audio sample blocks.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Pixel dimensions of a frame or canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height, or `None` for a degenerate size.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some(self.width as f64 / self.height as f64)
        }
    }

    pub fn is_even(&self) -> bool {
        self.width % 2 == 0 && self.height % 2 == 0
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One decoded RGBA frame.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image: RgbaImage,
    /// Presentation time relative to the feed's own start.
    pub timestamp_ns: u64,
    /// Monotonic per-feed counter.
    pub sequence: u64,
}

impl VideoFrame {
    pub fn new(image: RgbaImage, timestamp_ns: u64, sequence: u64) -> Self {
        Self {
            image,
            timestamp_ns,
            sequence,
        }
    }

    /// A frame filled with a single colour.
    pub fn solid(size: FrameSize, rgba: [u8; 4], timestamp_ns: u64, sequence: u64) -> Self {
        Self::new(
            RgbaImage::from_pixel(size.width, size.height, image::Rgba(rgba)),
            timestamp_ns,
            sequence,
        )
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.image.width(), self.image.height())
    }
}

/// Interleaved 32-bit float PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioBlock {
    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_ns(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1_000_000_000 / self.sample_rate as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_of_degenerate_size_is_unknown() {
        assert_eq!(FrameSize::new(0, 240).aspect_ratio(), None);
        assert!((FrameSize::new(320, 240).aspect_ratio().unwrap() - 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn solid_frame_has_requested_size() {
        let frame = VideoFrame::solid(FrameSize::new(4, 2), [255, 0, 0, 255], 0, 0);
        assert_eq!(frame.size(), FrameSize::new(4, 2));
        assert_eq!(frame.image.get_pixel(3, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn audio_block_duration() {
        let block = AudioBlock {
            sample_rate: 48_000,
            channels: 2,
            samples: vec![0.0; 960 * 2],
        };
        assert_eq!(block.frames(), 960);
        assert_eq!(block.duration_ns(), 20_000_000);
    }
}
