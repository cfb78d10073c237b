//! Capturable sources.

use serde::{Deserialize, Serialize};

/// What a source captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Screen,
    Window,
    Camera,
}

/// A screen, window, or camera the user can pick.
///
/// Enumerated on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Opaque backend identifier, e.g. `screen:0` or `window:0x3a00007`.
    pub id: String,
    /// Human-readable label.
    pub label: String,
    pub kind: SourceKind,
    /// Optional PNG preview.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Vec<u8>>,
}

impl Source {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            thumbnail: None,
        }
    }

    /// Default display when nothing was picked: the first screen, else the
    /// first source of any kind.
    pub fn default_display(sources: &[Source]) -> Option<&Source> {
        sources
            .iter()
            .find(|s| s.kind == SourceKind::Screen)
            .or_else(|| sources.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_display_prefers_screens() {
        let sources = vec![
            Source::new("window:1", "Terminal", SourceKind::Window),
            Source::new("screen:1", "Second display", SourceKind::Screen),
            Source::new("screen:0", "Built-in display", SourceKind::Screen),
        ];
        assert_eq!(Source::default_display(&sources).unwrap().id, "screen:1");
    }

    #[test]
    fn default_display_falls_back_to_first() {
        let sources = vec![Source::new("window:7", "Editor", SourceKind::Window)];
        assert_eq!(Source::default_display(&sources).unwrap().id, "window:7");
        assert!(Source::default_display(&[]).is_none());
    }

    #[test]
    fn thumbnail_is_omitted_from_json_when_absent() {
        let json = serde_json::to_string(&Source::new("screen:0", "Main", SourceKind::Screen))
            .unwrap();
        assert!(!json.contains("thumbnail"));
        assert!(json.contains("\"kind\":\"screen\""));
    }
}
