//! Publish and transform configuration DTOs.
//!
//! Typed replacements for the upstream channel→logo / template maps: built
//! once at startup, validated, and passed down rather than re-read per stage.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Publish destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// Short-form vertical destination for derived clips.
    Shorts,
    /// Long-form destination for the branded original.
    Longform,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Shorts => "shorts",
            Destination::Longform => "longform",
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Generated metadata attached to a published artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl PublishMetadata {
    /// Fallback metadata when generation fails or is disabled.
    pub fn fallback(source_title: &str, channel: &str) -> Self {
        Self {
            title: source_title.to_string(),
            description: format!("Highlights from {}.", channel),
            tags: vec!["shorts".into(), channel.to_string()],
        }
    }
}

/// Corner placement for the branding overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoCorner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Branding overlay configuration for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    pub logo_path: PathBuf,
    pub corner: LogoCorner,
    pub margin_x: u32,
    pub margin_y: u32,
}

/// How clips are reframed to a vertical canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AspectPolicy {
    /// Center-crop to 9:16.
    #[default]
    CropCenter,
    /// Letterbox onto a blurred 9:16 background.
    PadBlur,
    /// Keep the source aspect untouched.
    Original,
}

/// One subtitle cue, relative to the clip start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSegment {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_metadata() {
        let meta = PublishMetadata::fallback("Wild Rivers", "naturechannel");
        assert_eq!(meta.title, "Wild Rivers");
        assert!(meta.description.contains("naturechannel"));
        assert!(meta.tags.contains(&"shorts".to_string()));
    }
}
