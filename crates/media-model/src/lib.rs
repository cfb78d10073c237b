//! Clipmix Media Model
//!
//! Defines the data contracts shared by the recording pipeline:
//! - **Quality:** Named presets, encoder bitrates, and size estimates
//! - **Overlay:** Webcam overlay layout for the compositor
//! - **Recording:** Session states and the finished, encoded output

pub mod overlay;
pub mod quality;
pub mod recording;

pub use overlay::*;
pub use quality::*;
pub use recording::*;
