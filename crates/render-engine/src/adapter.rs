//! Frame Source Adapter: a live video feed as a pollable frame provider.

use std::sync::Arc;

use clipmix_platform_core::{FrameSize, VideoFeed, VideoFrame};

use crate::canvas::Canvas;
use crate::layout::Rect;
use crate::shape::ClipShape;

/// Wraps one [`VideoFeed`] for the compositor.
///
/// Holds no frame of its own; every draw samples the feed's latest frame, so
/// nothing is carried over between adapters or between attachments.
pub struct FrameSourceAdapter {
    feed: Arc<dyn VideoFeed>,
    attached: bool,
}

impl FrameSourceAdapter {
    pub fn attach(feed: Arc<dyn VideoFeed>) -> Self {
        tracing::debug!(feed = feed.label(), "Frame source attached");
        Self {
            feed,
            attached: true,
        }
    }

    pub fn label(&self) -> &str {
        self.feed.label()
    }

    /// Whether the feed has delivered at least one decodable frame.
    pub fn current_frame_ready(&self) -> bool {
        self.attached && self.feed.latest_frame().is_some()
    }

    /// Size of the frames the feed currently produces. Falls back to the
    /// latest frame when the feed does not advertise a native size.
    pub fn native_size(&self) -> Option<FrameSize> {
        if !self.attached {
            return None;
        }
        self.feed
            .native_size()
            .or_else(|| self.feed.latest_frame().map(|f| f.size()))
    }

    /// Aspect ratio of the feed, once known.
    pub fn aspect_ratio(&self) -> Option<f64> {
        self.native_size().and_then(|s| s.aspect_ratio())
    }

    /// Draw the current frame into `rect`, masked by `clip`.
    ///
    /// Does nothing and returns `false` when no frame has arrived yet or the
    /// adapter is detached.
    pub fn draw_into(&self, canvas: &mut Canvas, rect: Rect, clip: Option<ClipShape>) -> bool {
        match self.frame() {
            Some(frame) => {
                canvas.draw_frame(&frame.image, rect, clip);
                true
            }
            None => false,
        }
    }

    /// Draw the current frame with a placement derived from its size.
    pub fn draw_placed(
        &self,
        canvas: &mut Canvas,
        place: impl FnOnce(FrameSize) -> Rect,
        clip: Option<ClipShape>,
    ) -> bool {
        match self.frame() {
            Some(frame) => {
                let rect = place(frame.size());
                canvas.draw_frame(&frame.image, rect, clip);
                true
            }
            None => false,
        }
    }

    /// Stop sampling the feed. The feed itself stays open; its owner releases it.
    pub fn detach(&mut self) {
        if self.attached {
            self.attached = false;
            tracing::debug!(feed = self.feed.label(), "Frame source detached");
        }
    }

    fn frame(&self) -> Option<Arc<VideoFrame>> {
        if self.attached {
            self.feed.latest_frame()
        } else {
            None
        }
    }
}

impl std::fmt::Debug for FrameSourceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSourceAdapter")
            .field("feed", &self.feed.label())
            .field("attached", &self.attached)
            .finish()
    }
}
