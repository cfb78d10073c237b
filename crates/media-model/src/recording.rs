//! Session states and finished recordings.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No recording, or the last attempt was aborted.
    #[default]
    Idle,
    /// Capturing and encoding.
    Recording,
    /// Capture is live but nothing reaches the encoder.
    Paused,
    /// Encoder finalized; a finished recording may be available.
    Stopped,
}

impl SessionState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }
}

/// The assembled output of one completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedRecording {
    /// Container and codec descriptor, e.g. `video/webm;codecs=vp9,opus`.
    pub mime_type: String,

    /// All encoded chunks, concatenated in production order.
    #[serde(skip)]
    pub bytes: Vec<u8>,

    /// Recorded duration excluding paused spans.
    pub duration_ms: u64,

    /// Number of encoder chunks assembled.
    pub chunk_count: usize,

    /// Set when the encoder failed and this is a best-effort tail.
    pub truncated: bool,

    pub created_at: DateTime<Local>,
}

impl FinishedRecording {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }

    /// Whether the codec descriptor declares an audio track.
    pub fn has_audio_codec(&self) -> bool {
        mime_declares_audio(&self.mime_type)
    }

    /// File extension for the container.
    pub fn file_extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }

    /// `recording-YYYY-MM-DD-HHMM.<ext>`, stamped with the creation time.
    pub fn suggested_file_name(&self) -> String {
        format!(
            "recording-{}.{}",
            self.created_at.format("%Y-%m-%d-%H%M"),
            self.file_extension()
        )
    }
}

/// Whether a `codecs=` list names an audio codec.
pub fn mime_declares_audio(mime: &str) -> bool {
    const AUDIO_CODECS: [&str; 4] = ["opus", "vorbis", "mp4a", "aac"];
    mime.split_once("codecs=")
        .map(|(_, codecs)| {
            codecs
                .trim_matches('"')
                .split(',')
                .any(|codec| AUDIO_CODECS.contains(&codec.trim()))
        })
        .unwrap_or(false)
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    let container = mime.split(';').next().unwrap_or_default().trim();
    match container {
        "video/webm" | "audio/webm" => "webm",
        "video/mp4" => "mp4",
        "video/x-matroska" => "mkv",
        "video/x-motion-jpeg" => "mjpeg",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn recording(mime: &str) -> FinishedRecording {
        FinishedRecording {
            mime_type: mime.to_string(),
            bytes: vec![1, 2, 3],
            duration_ms: 2500,
            chunk_count: 3,
            truncated: false,
            created_at: Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap(),
        }
    }

    #[test]
    fn audio_codec_detection() {
        assert!(recording("video/webm;codecs=vp9,opus").has_audio_codec());
        assert!(!recording("video/webm;codecs=vp9").has_audio_codec());
        assert!(!recording("video/webm").has_audio_codec());
    }

    #[test]
    fn suggested_name_uses_creation_time() {
        let rec = recording("video/webm;codecs=vp9");
        assert_eq!(rec.suggested_file_name(), "recording-2024-03-09-1405.webm");
        assert_eq!(rec.duration_secs(), 2.5);
        assert_eq!(rec.len(), 3);
    }

    #[test]
    fn unknown_container_gets_generic_extension() {
        assert_eq!(extension_for_mime("application/x-clipmix-frames"), "bin");
        assert_eq!(extension_for_mime("video/mp4;codecs=avc1"), "mp4");
        assert_eq!(extension_for_mime("video/x-motion-jpeg"), "mjpeg");
    }

    #[test]
    fn active_states() {
        assert!(SessionState::Recording.is_active());
        assert!(SessionState::Paused.is_active());
        assert!(!SessionState::Stopped.is_active());
        assert!(!SessionState::Idle.is_active());
    }
}
