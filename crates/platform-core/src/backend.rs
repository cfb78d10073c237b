//! Capture backend contract.

use std::sync::Arc;

use async_trait::async_trait;
use clipmix_common::ClipmixResult;
use serde::{Deserialize, Serialize};

use crate::feed::{AudioFeed, VideoFeed};
use crate::source::Source;

/// Parameters for acquiring a screen or window track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRequest {
    /// Source to capture; `None` lets the backend pick its default display.
    pub source_id: Option<String>,
    pub frame_rate: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for DisplayRequest {
    fn default() -> Self {
        Self {
            source_id: None,
            frame_rate: 30,
            max_width: 1920,
            max_height: 1080,
        }
    }
}

/// Parameters for acquiring a camera track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraRequest {
    pub device_id: Option<String>,
    /// Preferred (not guaranteed) dimensions.
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub front_facing: bool,
}

impl Default for CameraRequest {
    fn default() -> Self {
        Self {
            device_id: None,
            ideal_width: 320,
            ideal_height: 240,
            front_facing: true,
        }
    }
}

/// Acquires live capture tracks from the platform.
///
/// Errors use [`clipmix_common::ClipmixError::PermissionDenied`] when the user
/// or OS refused access, `DeviceNotFound` when nothing is attached, and
/// `Cancelled` when the user dismissed the picker.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn list_sources(&self) -> ClipmixResult<Vec<Source>>;

    async fn acquire_display(&self, request: &DisplayRequest) -> ClipmixResult<Arc<dyn VideoFeed>>;

    async fn acquire_microphone(&self) -> ClipmixResult<Arc<dyn AudioFeed>>;

    async fn acquire_camera(&self, request: &CameraRequest) -> ClipmixResult<Arc<dyn VideoFeed>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_request_defaults_to_small_front_facing() {
        let req = CameraRequest::default();
        assert_eq!((req.ideal_width, req.ideal_height), (320, 240));
        assert!(req.front_facing);
    }
}
