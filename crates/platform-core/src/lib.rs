//! Clipmix platform core contracts.
//!
//! Backend-neutral capture types shared by the compositor and the session
//! controller: capturable sources, decoded frames, live feed handles, and the
//! acquisition interface a platform backend implements.

pub mod backend;
pub mod feed;
pub mod frame;
pub mod source;

pub use backend::*;
pub use feed::*;
pub use frame::*;
pub use source::*;

use serde::{Deserialize, Serialize};

/// Display server / platform family used for capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisplayServer {
    Wayland,
    X11,
    Windows,
    MacOS,
    #[default]
    Unknown,
}

/// Detect the display server the process is running under.
pub fn detect_display_server() -> DisplayServer {
    if cfg!(target_os = "windows") {
        DisplayServer::Windows
    } else if cfg!(target_os = "macos") {
        DisplayServer::MacOS
    } else if std::env::var("WAYLAND_DISPLAY").is_ok() {
        DisplayServer::Wayland
    } else if std::env::var("DISPLAY").is_ok() {
        DisplayServer::X11
    } else {
        DisplayServer::Unknown
    }
}
