//! Live feed handles.
//!
//! A feed is a running capture that can be sampled for its most recent
//! frame (video) or drained for pending samples (audio). Feeds are shared
//! between the compositor and the session controller behind `Arc`, so every
//! operation takes `&self`.

use std::sync::Arc;

use tokio::sync::watch;

use crate::frame::{AudioBlock, FrameSize, VideoFrame};

/// A live video track.
pub trait VideoFeed: Send + Sync {
    fn label(&self) -> &str;

    /// Intrinsic size of the frames currently produced, once known.
    fn native_size(&self) -> Option<FrameSize>;

    /// Most recent decoded frame, or `None` before the first frame arrives.
    fn latest_frame(&self) -> Option<Arc<VideoFrame>>;

    /// Nominal frame rate, if the producer advertises one.
    fn frame_rate_hint(&self) -> Option<u32> {
        None
    }

    /// Release the underlying device. Idempotent.
    fn stop(&self);

    fn is_live(&self) -> bool;

    /// Flips to `true` once the track ends, whether stopped locally or
    /// terminated by the platform (e.g. the user revoked screen sharing).
    fn ended(&self) -> watch::Receiver<bool>;
}

/// A live audio track.
pub trait AudioFeed: Send + Sync {
    fn label(&self) -> &str;

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Samples captured since the previous call, if any.
    fn take_samples(&self) -> Option<AudioBlock>;

    /// Release the underlying device. Idempotent.
    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// One-shot "track ended" broadcast used by feed implementations.
#[derive(Debug, Clone)]
pub struct EndSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for EndSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl EndSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Mark the track ended. Returns `true` only for the first call.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|ended| {
            if *ended {
                false
            } else {
                *ended = true;
                true
            }
        })
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Wait until `rx` reports the track ended. Returns immediately if it already
/// has, and also when every sender is gone.
pub async fn wait_ended(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|ended| *ended).await;
}
