//! Error types shared across Clipmix crates.

use std::path::PathBuf;

/// Top-level error type for Clipmix operations.
#[derive(Debug, thiserror::Error)]
pub enum ClipmixError {
    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Device not found: {message}")]
    DeviceNotFound { message: String },

    #[error("Cancelled: {message}")]
    Cancelled { message: String },

    #[error("Audio error: {message}")]
    Audio { message: String },

    #[error("Encoder error: {message}")]
    Encoder { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ClipmixError.
pub type ClipmixResult<T> = Result<T, ClipmixError>;

impl ClipmixError {
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: msg.into(),
        }
    }

    pub fn device_not_found(msg: impl Into<String>) -> Self {
        Self::DeviceNotFound {
            message: msg.into(),
        }
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled {
            message: msg.into(),
        }
    }

    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio {
            message: msg.into(),
        }
    }

    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error came from acquiring a capture device
    /// (no permission, no device, or the user dismissed the picker).
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            Self::Capture { .. }
                | Self::PermissionDenied { .. }
                | Self::DeviceNotFound { .. }
                | Self::Cancelled { .. }
        )
    }

    /// The single human-readable line shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Capture { message }
            | Self::PermissionDenied { message }
            | Self::DeviceNotFound { message }
            | Self::Cancelled { message }
            | Self::Audio { message }
            | Self::Encoder { message }
            | Self::Render { message }
            | Self::Config { message }
            | Self::InvalidState { message }
            | Self::Unsupported { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_strips_category_prefix() {
        let err = ClipmixError::permission_denied("Screen recording permission was not granted");
        assert_eq!(
            err.user_message(),
            "Screen recording permission was not granted"
        );
        assert!(err.to_string().starts_with("Permission denied:"));
    }

    #[test]
    fn device_errors_are_classified() {
        assert!(ClipmixError::cancelled("picker closed").is_device_error());
        assert!(ClipmixError::device_not_found("no camera").is_device_error());
        assert!(!ClipmixError::audio("mic busy").is_device_error());
        assert!(!ClipmixError::encoder("vp9enc failed").is_device_error());
    }
}
