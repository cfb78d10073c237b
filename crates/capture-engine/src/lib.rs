//! Clipmix Capture Engine
//!
//! Turns live capture feeds into a finished recording. The session
//! controller acquires devices through a [`CaptureBackend`], optionally routes
//! screen and webcam through the compositor, and drives an incremental
//! encoder that flushes output roughly once per second.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  RecordingSession                     │
//! │  ┌──────────┐   ┌────────────┐                        │
//! │  │ Screen   ├──►│ Compositor │◄── webcam (optional)   │
//! │  └──────────┘   └─────┬──────┘                        │
//! │  ┌──────────┐         ▼                               │
//! │  │ Mic      ├──► MediaRecorder ──► EncoderBackend      │
//! │  └──────────┘         │                               │
//! │                       ▼                               │
//! │              chunks ──► FinishedRecording              │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! [`CaptureBackend`]: clipmix_platform_core::CaptureBackend

pub mod encoder;
#[cfg(feature = "gstreamer")]
pub mod gst_backend;
pub mod mjpeg;
pub mod recorder;
pub mod session;
pub mod synthetic;

pub use encoder::*;
#[cfg(feature = "gstreamer")]
pub use gst_backend::{init_gstreamer, GstCaptureBackend, GstEncoderBackend};
pub use mjpeg::{MjpegEncoderBackend, MIME_MJPEG};
pub use recorder::*;
pub use session::*;
