//! Incremental encoder contracts and codec selection.

use clipmix_common::{ClipmixError, ClipmixResult};
use clipmix_media_model::{mime_declares_audio, QualityConfig};
use clipmix_platform_core::{AudioBlock, FrameSize, VideoFrame};

/// VP9 video with Opus audio in WebM.
pub const MIME_VP9_OPUS: &str = "video/webm;codecs=vp9,opus";
/// VP9 video only.
pub const MIME_VP9: &str = "video/webm;codecs=vp9";
/// Generic WebM; the encoder picks its codecs.
pub const MIME_WEBM: &str = "video/webm";

/// One flushed piece of encoder output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    /// Position in the output, starting at 0.
    pub sequence: u64,
    /// Media time of the last input before the flush.
    pub timestamp_ns: u64,
    pub data: Vec<u8>,
}

/// Raw audio layout handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Everything an encoder needs to open an output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderParams {
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub video_bitrate_kbps: u32,
    /// Audio bitrate in bits per second.
    pub audio_bitrate_bps: u32,
    /// Present when an audio track is encoded.
    pub audio: Option<AudioFormat>,
}

impl EncoderParams {
    pub fn new(mime_type: impl Into<String>, size: FrameSize, quality: &QualityConfig) -> Self {
        Self {
            mime_type: mime_type.into(),
            width: size.width,
            height: size.height,
            frame_rate: quality.frame_rate,
            video_bitrate_kbps: quality.video_bitrate_kbps(),
            audio_bitrate_bps: quality.audio_bitrate,
            audio: None,
        }
    }

    pub fn with_audio(mut self, format: AudioFormat) -> Self {
        self.audio = Some(format);
        self
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

/// An open encoder that consumes frames and yields bytes incrementally.
pub trait IncrementalEncoder: Send {
    /// Encode one video frame. `pts_ns` counts recorded time only.
    fn encode_video(&mut self, frame: &VideoFrame, pts_ns: u64) -> ClipmixResult<()>;

    /// Encode one block of interleaved samples.
    fn encode_audio(&mut self, block: &AudioBlock, pts_ns: u64) -> ClipmixResult<()>;

    /// Bytes produced since the previous drain. May be empty.
    fn drain(&mut self) -> ClipmixResult<Vec<u8>>;

    /// Flush and close the output, returning the remaining bytes.
    fn finish(self: Box<Self>) -> ClipmixResult<Vec<u8>>;
}

/// A family of encoders.
pub trait EncoderBackend: Send + Sync {
    fn name(&self) -> &str;

    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Container to use when none of the WebM types is supported.
    fn fallback_mime_type(&self) -> Option<&str> {
        None
    }

    fn open(&self, params: &EncoderParams) -> ClipmixResult<Box<dyn IncrementalEncoder>>;
}

/// Pick the best container/codec descriptor the backend supports.
///
/// VP9+Opus is only considered when the stream actually has audio, so a
/// video-only recording never advertises an audio track.
pub fn select_mime_type(backend: &dyn EncoderBackend, has_audio: bool) -> ClipmixResult<String> {
    let candidates: &[&str] = if has_audio {
        &[MIME_VP9_OPUS, MIME_VP9, MIME_WEBM]
    } else {
        &[MIME_VP9, MIME_WEBM]
    };

    candidates
        .iter()
        .copied()
        .find(|mime| backend.is_type_supported(mime))
        .or_else(|| backend.fallback_mime_type())
        .map(str::to_string)
        .ok_or_else(|| {
            ClipmixError::unsupported(format!(
                "Encoder '{}' supports none of the recording formats",
                backend.name()
            ))
        })
}

/// Whether audio should be fed to an encoder opened for `mime_type`.
///
/// Explicit codec lists must name an audio codec; bare WebM accepts audio
/// whenever the stream has it. Other containers never carry audio.
pub fn mime_carries_audio(mime_type: &str, has_audio: bool) -> bool {
    has_audio
        && (mime_declares_audio(mime_type)
            || (mime_type.starts_with(MIME_WEBM) && !mime_type.contains("codecs=")))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Supports(&'static [&'static str]);

    impl EncoderBackend for Supports {
        fn name(&self) -> &str {
            "test"
        }

        fn is_type_supported(&self, mime_type: &str) -> bool {
            self.0.contains(&mime_type)
        }

        fn open(&self, _params: &EncoderParams) -> ClipmixResult<Box<dyn IncrementalEncoder>> {
            Err(ClipmixError::encoder("not needed"))
        }
    }

    #[test]
    fn prefers_combined_codec_when_audio_present() {
        let backend = Supports(&[MIME_WEBM, MIME_VP9, MIME_VP9_OPUS]);
        assert_eq!(select_mime_type(&backend, true).unwrap(), MIME_VP9_OPUS);
        assert_eq!(select_mime_type(&backend, false).unwrap(), MIME_VP9);
    }

    #[test]
    fn falls_back_to_generic_container() {
        let backend = Supports(&[MIME_WEBM]);
        assert_eq!(select_mime_type(&backend, true).unwrap(), MIME_WEBM);
    }

    #[test]
    fn unsupported_backend_is_an_error() {
        let err = select_mime_type(&Supports(&[]), false).unwrap_err();
        assert!(matches!(err, ClipmixError::Unsupported { .. }));
    }

    #[test]
    fn audio_routing_follows_descriptor() {
        assert!(mime_carries_audio(MIME_VP9_OPUS, true));
        assert!(mime_carries_audio(MIME_WEBM, true));
        assert!(!mime_carries_audio(MIME_VP9, true));
        assert!(!mime_carries_audio(MIME_WEBM, false));
        assert!(!mime_carries_audio("video/x-motion-jpeg", true));
    }
}
