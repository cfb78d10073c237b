//! Output Stream Sink: the compositor's frames as a [`VideoFeed`].

use std::sync::Arc;

use clipmix_platform_core::{EndSignal, FrameSize, VideoFeed, VideoFrame};
use tokio::sync::watch;

/// Live view of a running compositor.
///
/// Clones share the same underlying channels. Stopping the sink does not stop
/// the compositor; it ends when [`crate::Compositor::stop`] runs.
#[derive(Clone)]
pub struct OutputStreamSink {
    frames: watch::Receiver<Option<Arc<VideoFrame>>>,
    size: watch::Receiver<FrameSize>,
    frame_rate: u32,
    end: EndSignal,
}

impl OutputStreamSink {
    pub(crate) fn new(
        frames: watch::Receiver<Option<Arc<VideoFrame>>>,
        size: watch::Receiver<FrameSize>,
        frame_rate: u32,
        end: EndSignal,
    ) -> Self {
        Self {
            frames,
            size,
            frame_rate,
            end,
        }
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Wait for the next published composite frame.
    pub async fn next_frame(&mut self) -> Option<Arc<VideoFrame>> {
        self.frames.changed().await.ok()?;
        self.frames.borrow_and_update().clone()
    }
}

impl VideoFeed for OutputStreamSink {
    fn label(&self) -> &str {
        "compositor"
    }

    fn native_size(&self) -> Option<FrameSize> {
        Some(*self.size.borrow())
    }

    fn latest_frame(&self) -> Option<Arc<VideoFrame>> {
        self.frames.borrow().clone()
    }

    fn frame_rate_hint(&self) -> Option<u32> {
        Some(self.frame_rate)
    }

    fn stop(&self) {}

    fn is_live(&self) -> bool {
        !self.end.is_fired()
    }

    fn ended(&self) -> watch::Receiver<bool> {
        self.end.subscribe()
    }
}

impl std::fmt::Debug for OutputStreamSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStreamSink")
            .field("size", &*self.size.borrow())
            .field("frame_rate", &self.frame_rate)
            .field("live", &self.is_live())
            .finish()
    }
}
