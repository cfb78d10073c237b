#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use clipmix_platform_core::{EndSignal, FrameSize, VideoFeed, VideoFrame};
use tokio::sync::watch;

pub const WHITE: [u8; 4] = [255, 255, 255, 255];
pub const RED: [u8; 4] = [255, 0, 0, 255];
pub const BLACK: [u8; 4] = [0, 0, 0, 255];

/// Hand-driven feed for compositor tests.
pub struct TestFeed {
    label: String,
    frame: Mutex<Option<Arc<VideoFrame>>>,
    size: Mutex<Option<FrameSize>>,
    end: EndSignal,
}

impl TestFeed {
    pub fn pending(label: &str) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            frame: Mutex::new(None),
            size: Mutex::new(None),
            end: EndSignal::new(),
        })
    }

    pub fn solid(label: &str, size: FrameSize, rgba: [u8; 4]) -> Arc<Self> {
        let feed = Self::pending(label);
        feed.show(size, rgba);
        feed
    }

    /// Deliver a solid frame and report its size as native.
    pub fn show(&self, size: FrameSize, rgba: [u8; 4]) {
        *self.size.lock().unwrap() = Some(size);
        *self.frame.lock().unwrap() = Some(Arc::new(VideoFrame::solid(size, rgba, 0, 0)));
    }
}

impl VideoFeed for TestFeed {
    fn label(&self) -> &str {
        &self.label
    }

    fn native_size(&self) -> Option<FrameSize> {
        *self.size.lock().unwrap()
    }

    fn latest_frame(&self) -> Option<Arc<VideoFrame>> {
        self.frame.lock().unwrap().clone()
    }

    fn stop(&self) {
        self.end.fire();
    }

    fn is_live(&self) -> bool {
        !self.end.is_fired()
    }

    fn ended(&self) -> watch::Receiver<bool> {
        self.end.subscribe()
    }
}
