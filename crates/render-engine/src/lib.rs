//! Clipmix Render Engine
//!
//! Real-time compositing of a screen feed and an optional webcam overlay
//! into one fixed-rate video stream.
//!
//! # Pipeline
//!
//! ```text
//! screen feed ──► FrameSourceAdapter ──┐
//!                                      ├── Canvas (contain + clipped overlay)
//! webcam feed ──► FrameSourceAdapter ──┘         │
//!                                                ▼
//!                                    Compositor tick loop (N fps)
//!                                                │
//!                                                ▼
//!                                       OutputStreamSink (VideoFeed)
//! ```

pub mod adapter;
pub mod canvas;
pub mod compositor;
pub mod layout;
pub mod shape;
pub mod sink;

pub use adapter::FrameSourceAdapter;
pub use canvas::Canvas;
pub use compositor::{Compositor, CompositorStats};
pub use layout::{contain_rect, fit_output_size, overlay_rect, Rect};
pub use shape::ClipShape;
pub use sink::OutputStreamSink;
