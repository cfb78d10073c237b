//! Built-in Motion-JPEG encoder.
//!
//! Every frame becomes an independent baseline JPEG appended to the output,
//! which players read as a raw `mjpeg` stream. Needs no system codecs, so it
//! backs demos and machines without GStreamer. Audio is not supported.

use clipmix_common::{ClipmixError, ClipmixResult};
use clipmix_platform_core::{AudioBlock, VideoFrame};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::DynamicImage;

use crate::encoder::{EncoderBackend, EncoderParams, IncrementalEncoder};

pub const MIME_MJPEG: &str = "video/x-motion-jpeg";

/// Encoder family producing `video/x-motion-jpeg`.
#[derive(Debug, Clone)]
pub struct MjpegEncoderBackend {
    quality: u8,
}

impl Default for MjpegEncoderBackend {
    fn default() -> Self {
        Self { quality: 80 }
    }
}

impl MjpegEncoderBackend {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl EncoderBackend for MjpegEncoderBackend {
    fn name(&self) -> &str {
        "mjpeg"
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        mime_type == MIME_MJPEG
    }

    fn fallback_mime_type(&self) -> Option<&str> {
        Some(MIME_MJPEG)
    }

    fn open(&self, params: &EncoderParams) -> ClipmixResult<Box<dyn IncrementalEncoder>> {
        if params.mime_type != MIME_MJPEG {
            return Err(ClipmixError::unsupported(format!(
                "Motion-JPEG encoder cannot produce '{}'",
                params.mime_type
            )));
        }
        if params.audio.is_some() {
            tracing::warn!("Motion-JPEG output has no audio track; samples will be dropped");
        }
        Ok(Box::new(MjpegEncoder {
            width: params.width,
            height: params.height,
            quality: self.quality,
            pending: Vec::new(),
            frames: 0,
        }))
    }
}

struct MjpegEncoder {
    width: u32,
    height: u32,
    quality: u8,
    pending: Vec<u8>,
    frames: u64,
}

impl IncrementalEncoder for MjpegEncoder {
    fn encode_video(&mut self, frame: &VideoFrame, _pts_ns: u64) -> ClipmixResult<()> {
        let rgba = if frame.image.dimensions() == (self.width, self.height) {
            frame.image.clone()
        } else {
            imageops::resize(&frame.image, self.width, self.height, FilterType::Triangle)
        };
        let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

        JpegEncoder::new_with_quality(&mut self.pending, self.quality)
            .encode_image(&rgb)
            .map_err(|e| ClipmixError::encoder(format!("JPEG encode failed: {e}")))?;
        self.frames += 1;
        Ok(())
    }

    fn encode_audio(&mut self, _block: &AudioBlock, _pts_ns: u64) -> ClipmixResult<()> {
        Ok(())
    }

    fn drain(&mut self) -> ClipmixResult<Vec<u8>> {
        Ok(std::mem::take(&mut self.pending))
    }

    fn finish(mut self: Box<Self>) -> ClipmixResult<Vec<u8>> {
        tracing::debug!(frames = self.frames, "Motion-JPEG stream closed");
        Ok(std::mem::take(&mut self.pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipmix_media_model::QualityPreset;
    use clipmix_platform_core::FrameSize;

    use crate::encoder::select_mime_type;

    #[test]
    fn selected_as_fallback() {
        let backend = MjpegEncoderBackend::default();
        assert_eq!(select_mime_type(&backend, true).unwrap(), MIME_MJPEG);
    }

    #[test]
    fn frames_are_scaled_and_jpeg_encoded() {
        let backend = MjpegEncoderBackend::new(70);
        let params = EncoderParams::new(
            MIME_MJPEG,
            FrameSize::new(64, 36),
            &QualityPreset::Low.config(),
        );
        let mut encoder = backend.open(&params).unwrap();
        let frame = VideoFrame::solid(FrameSize::new(128, 72), [10, 200, 30, 255], 0, 0);

        encoder.encode_video(&frame, 0).unwrap();
        encoder.encode_video(&frame, 66_666_666).unwrap();
        let first = encoder.drain().unwrap();
        assert!(encoder.drain().unwrap().is_empty());

        // Two JPEG start-of-image markers.
        let markers = first.windows(2).filter(|w| w[0] == 0xFF && w[1] == 0xD8).count();
        assert_eq!(markers, 2);

        let decoded = image::load_from_memory(&first).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 36));
        assert!(encoder.finish().unwrap().is_empty());
    }

    #[test]
    fn rejects_webm() {
        let params = EncoderParams::new(
            crate::encoder::MIME_VP9,
            FrameSize::new(64, 36),
            &QualityPreset::Low.config(),
        );
        assert!(MjpegEncoderBackend::default().open(&params).is_err());
    }
}
